use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::metrics::{
    HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS, RATE_LIMITED_REQUESTS_TOTAL,
};

/// Collects request count and latency per route. Every route here is
/// static, so the raw path is safe as a label.
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &path])
        .observe(duration);

    if response.status() == axum::http::StatusCode::TOO_MANY_REQUESTS {
        RATE_LIMITED_REQUESTS_TOTAL.with_label_values(&[&path]).inc();
    }

    response
}
