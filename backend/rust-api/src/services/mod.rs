use std::time::Duration;
use thiserror::Error;

use crate::config::Config;
use crate::middlewares::rate_limit::RateLimiter;

/// Failure talking to the sandbox or the language-model upstream. Surfaced
/// once to the caller; this layer never retries.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{service} returned status {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },
    #[error("{service} returned an unexpected payload: {detail}")]
    Payload {
        service: &'static str,
        detail: String,
    },
}

impl UpstreamError {
    pub async fn from_response(service: &'static str, response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        UpstreamError::Status {
            service,
            status,
            body,
        }
    }
}

pub struct AppState {
    pub config: Config,
    pub http: reqwest::Client,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        // One shared client: connection pooling across both upstreams.
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            config,
            http,
            rate_limiter: RateLimiter::new(),
        })
    }
}

pub mod challenge_service;
pub mod chat_service;
pub mod prompt_service;
pub mod sandbox_service;
