use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use validator::Validate;

use crate::metrics;
use crate::models::ExecuteRequest;
use crate::services::sandbox_service::SandboxClient;
use crate::services::AppState;

/// Run code in the remote sandbox and relay the shaped result.
pub async fn execute(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExecuteRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    req.validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    tracing::info!(
        "Executing submission: language_id={}, source_len={}",
        req.language_id,
        req.source_code.len()
    );

    let client = SandboxClient::new(
        state.http.clone(),
        state.config.sandbox_api_url.clone(),
        state.config.sandbox_api_key.clone(),
    );

    // Dropping this handler future (client disconnect) cancels the token and
    // with it any in-flight polling rounds.
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let result = metrics::track_upstream_call("sandbox", client.execute(&req, &cancel))
        .await
        .map_err(|e| {
            tracing::error!("Sandbox execution failed: {}", e);
            (StatusCode::BAD_GATEWAY, format!("Execution failed: {e}"))
        })?;

    Ok((StatusCode::OK, Json(result)))
}
