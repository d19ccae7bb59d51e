use axum::Router;
use interviewlab_api::{config::Config, create_router, services::AppState};
use std::sync::Arc;

pub fn create_test_app() -> Router {
    // Initialize tracing for tests
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    // Load test environment from .env.test if present
    dotenvy::from_filename(".env.test").ok();

    let config = Config::load().expect("Failed to load test configuration");

    let app_state = Arc::new(AppState::new(config).expect("Failed to initialize test app state"));

    create_router(app_state)
}
