use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use validator::Validate;

use crate::models::ChallengeRequest;
use crate::services::challenge_service::ChallengeService;
use crate::services::chat_service::ChatClient;
use crate::services::AppState;

/// Generate a coding challenge (and its editor template) from the request
/// parameters and, when provided, the conversation that negotiated it.
pub async fn generate_challenge(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChallengeRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    req.validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    tracing::info!(
        "Generating challenge: language={}, difficulty={}",
        req.language,
        req.difficulty
    );

    let chat = ChatClient::new(
        state.http.clone(),
        state.config.llm_api_url.clone(),
        state.config.llm_api_key.clone(),
        state.config.llm_model.clone(),
    );
    let service = ChallengeService::new(&chat);

    match service
        .generate(
            &req.language,
            &req.difficulty,
            req.topic.as_deref(),
            &req.chat_context,
        )
        .await
    {
        Ok(response) => Ok((StatusCode::OK, Json(response))),
        Err(e) => {
            tracing::error!("Challenge generation failed: {}", e);
            let msg = e.to_string();
            let status = if msg.contains("not supported") {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::BAD_GATEWAY
            };
            Err((status, format!("Challenge generation failed: {msg}")))
        }
    }
}
