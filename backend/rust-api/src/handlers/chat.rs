use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use validator::Validate;

use crate::metrics;
use crate::models::{AutomaticPromptKind, ChatMessage, ChatRequest, ChatResponse, Role};
use crate::services::chat_service::{ChatClient, SamplingParams};
use crate::services::prompt_service::{self, PromptContext};
use crate::services::{sandbox_service, AppState};
use crate::utils::{confirmation, messages, snapshot};

/// Conversation turn: forwards the history to the language model and derives
/// the exercise flags the frontend uses to drive its UI.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    req.validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    // Snapshot consistency is enforced before any upstream call is made.
    snapshot::validate(
        req.exercise_name_snapshot.as_deref(),
        req.exercise_description_snapshot.as_deref(),
    )
    .map_err(|e| {
        tracing::warn!("Rejecting chat request with inconsistent snapshots: {}", e);
        (StatusCode::BAD_REQUEST, e.to_string())
    })?;

    let language_name = sandbox_service::language_name(req.language_id).unwrap_or("JavaScript");

    let last_user_message = req
        .messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .unwrap_or("");

    let kind = prompt_service::classify(last_user_message, req.finished);
    tracing::debug!("Chat turn classified as {:?}", kind);

    let exercise_name_snapshot = req.exercise_name_snapshot.as_deref().unwrap_or("");
    let ctx = PromptContext {
        language_name,
        current_code: &req.current_code,
        exercise_name: exercise_name_snapshot,
        execution_output: &req.execution_output,
    };

    let mut upstream = vec![ChatMessage {
        role: Role::System,
        content: prompt_service::automatic_system_prompt(kind, &ctx),
    }];

    if kind == AutomaticPromptKind::ExerciseVerdict {
        upstream.push(ChatMessage {
            role: Role::System,
            content: prompt_service::verdict_reasoning_prompt(
                language_name,
                exercise_name_snapshot,
                req.exercise_description_snapshot.as_deref(),
                &req.execution_output,
            ),
        });
    }

    upstream.extend(messages::trim_history(&req.messages, messages::HISTORY_LIMIT));

    let client = ChatClient::new(
        state.http.clone(),
        state.config.llm_api_url.clone(),
        state.config.llm_api_key.clone(),
        state.config.llm_model.clone(),
    );
    let params = SamplingParams::from_request(&req);

    let reply = metrics::track_upstream_call("language_model", client.complete(&upstream, &params))
        .await
        .map_err(|e| {
            tracing::error!("Language model call failed: {}", e);
            (StatusCode::BAD_GATEWAY, format!("Chat failed: {e}"))
        })?;

    let (can_generate_exercise, exercise_name) =
        confirmation::resolve_session_flags(req.exercise_active, kind.is_automatic(), &reply);

    if can_generate_exercise {
        metrics::EXERCISES_CONFIRMED_TOTAL
            .with_label_values(&["chat"])
            .inc();
    }

    Ok((
        StatusCode::OK,
        Json(ChatResponse {
            response: reply,
            can_generate_exercise,
            exercise_name,
        }),
    ))
}
