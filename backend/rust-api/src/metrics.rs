use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Upstream Metrics (sandbox + language model)
    pub static ref UPSTREAM_CALLS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "upstream_calls_total",
        "Total number of upstream service calls",
        &["service", "status"]
    )
    .unwrap();

    pub static ref UPSTREAM_CALL_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "upstream_call_duration_seconds",
        "Upstream service call duration in seconds",
        &["service"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .unwrap();

    // Business Metrics
    pub static ref RATE_LIMITED_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rate_limited_requests_total",
        "Total number of requests rejected by the rate limiter",
        &["path"]
    )
    .unwrap();

    pub static ref EXERCISES_CONFIRMED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "exercises_confirmed_total",
        "Total number of exercise confirmations detected in assistant replies",
        &["source"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Helper: track an upstream call with metrics
pub async fn track_upstream_call<F, T, E>(service: &str, future: F) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    UPSTREAM_CALLS_TOTAL
        .with_label_values(&[service, status])
        .inc();

    UPSTREAM_CALL_DURATION_SECONDS
        .with_label_values(&[service])
        .observe(duration);

    result
}
