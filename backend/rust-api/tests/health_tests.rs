// Public endpoint and metrics auth verification tests
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use base64::{engine::general_purpose, Engine as _};
use http_body_util::BodyExt;
use tower::ServiceExt;

mod common;

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&body).to_string())
}

#[tokio::test]
#[serial_test::serial]
async fn test_health_endpoint_reports_healthy() {
    let app = common::create_test_app();

    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("\"status\":\"healthy\""));
    assert!(body.contains("interviewlab-api"));
}

#[tokio::test]
#[serial_test::serial]
async fn test_root_banner() {
    let app = common::create_test_app();

    let (status, body) = get(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("InterviewLab API is running"));
}

#[tokio::test]
#[serial_test::serial]
async fn test_metrics_requires_basic_auth() {
    let app = common::create_test_app();

    let (status, _) = get(&app, "/metrics").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial_test::serial]
async fn test_metrics_accepts_configured_credentials() {
    std::env::set_var("METRICS_AUTH", "metrics-user:metrics-pass");

    let app = common::create_test_app();
    let credentials = general_purpose::STANDARD.encode("metrics-user:metrics-pass");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .header("authorization", format!("Basic {credentials}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    std::env::remove_var("METRICS_AUTH");
}

#[tokio::test]
#[serial_test::serial]
async fn test_metrics_rejects_wrong_credentials() {
    std::env::set_var("METRICS_AUTH", "metrics-user:metrics-pass");

    let app = common::create_test_app();
    let credentials = general_purpose::STANDARD.encode("metrics-user:wrong");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .header("authorization", format!("Basic {credentials}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    std::env::remove_var("METRICS_AUTH");
}
