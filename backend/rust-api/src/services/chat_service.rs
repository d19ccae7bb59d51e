use serde::{Deserialize, Serialize};

use crate::models::{ChatMessage, ChatRequest};
use crate::services::UpstreamError;

// Sampling defaults tuned for short interviewer turns.
const DEFAULT_TEMPERATURE: f32 = 0.5;
const DEFAULT_MAX_TOKENS: u32 = 400;
const DEFAULT_PRESENCE_PENALTY: f32 = 0.0;
const DEFAULT_FREQUENCY_PENALTY: f32 = 0.2;
const DEFAULT_TOP_P: f32 = 0.9;

#[derive(Debug, Clone, Serialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
    pub top_p: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            presence_penalty: DEFAULT_PRESENCE_PENALTY,
            frequency_penalty: DEFAULT_FREQUENCY_PENALTY,
            top_p: DEFAULT_TOP_P,
        }
    }
}

impl SamplingParams {
    /// Request overrides win over the defaults, field by field.
    pub fn from_request(req: &ChatRequest) -> Self {
        let defaults = Self::default();
        Self {
            temperature: req.temperature.unwrap_or(defaults.temperature),
            max_tokens: req.max_tokens.unwrap_or(defaults.max_tokens),
            presence_penalty: req.presence_penalty.unwrap_or(defaults.presence_penalty),
            frequency_penalty: req.frequency_penalty.unwrap_or(defaults.frequency_penalty),
            top_p: req.top_p.unwrap_or(defaults.top_p),
        }
    }
}

#[derive(Serialize)]
struct CompletionPayload<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    presence_penalty: f32,
    frequency_penalty: f32,
    top_p: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client for the language-model upstream. The reply is
/// treated as opaque text; only the confirmation detector ever inspects it.
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatClient {
    pub fn new(http: reqwest::Client, base_url: String, api_key: String, model: String) -> Self {
        Self {
            http,
            base_url,
            api_key,
            model,
        }
    }

    /// Send one completion request. Non-2xx responses surface as upstream
    /// failures; nothing is retried.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &SamplingParams,
    ) -> Result<String, UpstreamError> {
        let url = format!("{}/chat/completions", self.base_url);

        let payload = CompletionPayload {
            model: &self.model,
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            presence_penalty: params.presence_penalty,
            frequency_penalty: params.frequency_penalty,
            top_p: params.top_p,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(UpstreamError::from_response("language model", response).await);
        }

        let body: CompletionResponse = response.json().await?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(UpstreamError::Payload {
                service: "language model",
                detail: "response carried no choices".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn request_with_overrides() -> ChatRequest {
        ChatRequest {
            messages: vec![ChatMessage {
                role: Role::User,
                content: "hola".to_string(),
            }],
            language_id: 63,
            exercise_active: false,
            exercise_name_snapshot: None,
            exercise_description_snapshot: None,
            current_code: String::new(),
            execution_output: String::new(),
            finished: false,
            temperature: Some(0.9),
            max_tokens: None,
            presence_penalty: None,
            frequency_penalty: Some(0.0),
            top_p: None,
        }
    }

    #[test]
    fn sampling_defaults_match_product_tuning() {
        let params = SamplingParams::default();
        assert_eq!(params.temperature, 0.5);
        assert_eq!(params.max_tokens, 400);
        assert_eq!(params.presence_penalty, 0.0);
        assert_eq!(params.frequency_penalty, 0.2);
        assert_eq!(params.top_p, 0.9);
    }

    #[test]
    fn request_overrides_apply_field_by_field() {
        let params = SamplingParams::from_request(&request_with_overrides());
        assert_eq!(params.temperature, 0.9);
        assert_eq!(params.frequency_penalty, 0.0);
        // Untouched fields keep their defaults
        assert_eq!(params.max_tokens, 400);
        assert_eq!(params.top_p, 0.9);
    }
}
