use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::services::AppState;

const RATE_LIMIT_PER_IP: usize = 20; // requests per window
const RATE_WINDOW_SECONDS: u64 = 60; // 1 minute
const CLEANUP_MAX_AGE_SECONDS: u64 = 3600; // 1 hour
const CLEANUP_PROBABILITY: f64 = 0.1;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Rate limit exceeded. Maximum {limit} requests per {} seconds.", .window.as_secs())]
pub struct RateLimitExceeded {
    pub limit: usize,
    pub window: Duration,
}

/// Fixed-window per-key request counter with lazy cleanup. Owned by the
/// application state, not a module global, so tests and future multi-tenant
/// setups get their own store.
///
/// Advisory only: the coarse lock makes counting exact within one process,
/// but nothing is shared across replicas.
pub struct RateLimiter {
    entries: Mutex<HashMap<String, Vec<Instant>>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Record one request for `key`, rejecting it when the window is full.
    /// Rejected attempts are not recorded.
    pub fn check(
        &self,
        key: &str,
        limit: usize,
        window: Duration,
    ) -> Result<(), RateLimitExceeded> {
        self.check_at(key, limit, window, Instant::now())
    }

    fn check_at(
        &self,
        key: &str,
        limit: usize,
        window: Duration,
        now: Instant,
    ) -> Result<(), RateLimitExceeded> {
        let mut entries = self.entries.lock().expect("rate limiter lock poisoned");
        let timestamps = entries.entry(key.to_string()).or_default();

        timestamps.retain(|t| now.duration_since(*t) < window);

        if timestamps.len() >= limit {
            return Err(RateLimitExceeded { limit, window });
        }

        timestamps.push(now);
        Ok(())
    }

    /// Evict keys with no activity inside `max_age`. Called opportunistically
    /// from the middleware; correctness never depends on it (each check
    /// prunes its own key), it only bounds memory for idle keys.
    pub fn cleanup(&self, max_age: Duration) {
        self.cleanup_at(max_age, Instant::now())
    }

    fn cleanup_at(&self, max_age: Duration, now: Instant) {
        let mut entries = self.entries.lock().expect("rate limiter lock poisoned");
        entries.retain(|_, timestamps| {
            timestamps.retain(|t| now.duration_since(*t) < max_age);
            !timestamps.is_empty()
        });
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

fn extract_client_ip_from(headers: &HeaderMap, extensions: &axum::http::Extensions) -> String {
    // Preferred order: X-Forwarded-For, Forwarded, X-Real-IP, ConnectInfo
    if let Some(v) = headers.get("x-forwarded-for") {
        if let Ok(s) = v.to_str() {
            // x-forwarded-for can be a comma separated list; take first
            return s.split(',').next().unwrap_or(s).trim().to_string();
        }
    }

    if let Some(v) = headers.get("forwarded") {
        if let Ok(s) = v.to_str() {
            // forwarded: for=1.2.3.4; proto=http; by=...
            for part in s.split(';') {
                let p = part.trim();
                if p.starts_with("for=") {
                    let val = p.trim_start_matches("for=").trim().trim_matches('\"');
                    return val.to_string();
                }
            }
        }
    }

    if let Some(v) = headers.get("x-real-ip") {
        if let Ok(s) = v.to_str() {
            return s.trim().to_string();
        }
    }

    // Fall back to ConnectInfo socket address if available
    if let Some(ci) = extensions.get::<ConnectInfo<SocketAddr>>() {
        return ci.0.ip().to_string();
    }

    "unknown".to_string()
}

/// Per-IP rate limiting for the public API routes.
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, (StatusCode, String)> {
    // Allow disabling rate limits in local perf runs by setting RATE_LIMIT_DISABLED=1
    let rate_limit_disabled = std::env::var("RATE_LIMIT_DISABLED").unwrap_or_default() == "1";
    if rate_limit_disabled {
        tracing::debug!("Rate limiting disabled via RATE_LIMIT_DISABLED=1");
        return Ok(next.run(request).await);
    }

    let client_ip = extract_client_ip_from(request.headers(), request.extensions());

    // Allow overriding per-IP limit via env RATE_LIMIT_PER_IP
    let ip_limit = std::env::var("RATE_LIMIT_PER_IP")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(RATE_LIMIT_PER_IP);

    let window = Duration::from_secs(RATE_WINDOW_SECONDS);

    if let Err(e) = state.rate_limiter.check(&client_ip, ip_limit, window) {
        tracing::warn!("Rate limit exceeded for IP: {}", client_ip);
        return Err((StatusCode::TOO_MANY_REQUESTS, e.to_string()));
    }

    // Opportunistic eviction of idle keys; advisory, not a schedule.
    if rand::random::<f64>() < CLEANUP_PROBABILITY {
        state
            .rate_limiter
            .cleanup(Duration::from_secs(CLEANUP_MAX_AGE_SECONDS));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::ConnectInfo;
    use axum::http::HeaderMap;
    use std::net::SocketAddr;

    const WINDOW: Duration = Duration::from_secs(60);

    #[test]
    fn allows_up_to_limit_then_rejects() {
        let limiter = RateLimiter::new();
        let now = Instant::now();

        for _ in 0..3 {
            assert!(limiter.check_at("1.2.3.4", 3, WINDOW, now).is_ok());
        }

        let err = limiter.check_at("1.2.3.4", 3, WINDOW, now).unwrap_err();
        assert_eq!(err.limit, 3);
        assert_eq!(err.window, WINDOW);
    }

    #[test]
    fn rejected_attempts_are_not_recorded() {
        let limiter = RateLimiter::new();
        let now = Instant::now();

        for _ in 0..3 {
            limiter.check_at("1.2.3.4", 3, WINDOW, now).unwrap();
        }
        let mid = now + Duration::from_secs(30);
        for _ in 0..10 {
            assert!(limiter.check_at("1.2.3.4", 3, WINDOW, mid).is_err());
        }

        // At this point only the three accepted requests have aged out; had
        // the rejected attempts been recorded they would still fill the
        // window and this check would fail.
        let later = now + WINDOW + Duration::from_secs(1);
        assert!(limiter.check_at("1.2.3.4", 3, WINDOW, later).is_ok());
    }

    #[test]
    fn window_expiry_resets_the_count() {
        let limiter = RateLimiter::new();
        let now = Instant::now();

        for _ in 0..3 {
            limiter.check_at("1.2.3.4", 3, WINDOW, now).unwrap();
        }
        assert!(limiter.check_at("1.2.3.4", 3, WINDOW, now).is_err());

        let later = now + Duration::from_secs(61);
        assert!(limiter.check_at("1.2.3.4", 3, WINDOW, later).is_ok());
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new();
        let now = Instant::now();

        for _ in 0..3 {
            limiter.check_at("1.2.3.4", 3, WINDOW, now).unwrap();
        }
        assert!(limiter.check_at("1.2.3.4", 3, WINDOW, now).is_err());
        assert!(limiter.check_at("5.6.7.8", 3, WINDOW, now).is_ok());
    }

    #[test]
    fn cleanup_evicts_idle_keys_only() {
        let limiter = RateLimiter::new();
        let now = Instant::now();

        limiter.check_at("old", 3, WINDOW, now).unwrap();
        let later = now + Duration::from_secs(7200);
        limiter.check_at("fresh", 3, WINDOW, later).unwrap();
        assert_eq!(limiter.tracked_keys(), 2);

        limiter.cleanup_at(Duration::from_secs(3600), later);
        assert_eq!(limiter.tracked_keys(), 1);
        assert!(limiter.check_at("fresh", 1, WINDOW, later).is_err());
    }

    #[test]
    fn test_extract_client_ip_x_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "1.2.3.4, 10.0.0.1".parse().unwrap());
        let exts = axum::http::Extensions::new();
        assert_eq!(
            extract_client_ip_from(&headers, &exts),
            "1.2.3.4".to_string()
        );
    }

    #[test]
    fn test_extract_client_ip_forwarded() {
        let mut headers = HeaderMap::new();
        headers.insert("forwarded", "for=5.6.7.8;proto=http".parse().unwrap());
        let exts = axum::http::Extensions::new();
        assert_eq!(
            extract_client_ip_from(&headers, &exts),
            "5.6.7.8".to_string()
        );
    }

    #[test]
    fn test_extract_client_ip_connectinfo() {
        let headers = HeaderMap::new();
        let mut exts = axum::http::Extensions::new();
        exts.insert(ConnectInfo::<SocketAddr>("7.7.7.7:1234".parse().unwrap()));
        assert_eq!(
            extract_client_ip_from(&headers, &exts),
            "7.7.7.7".to_string()
        );
    }
}
