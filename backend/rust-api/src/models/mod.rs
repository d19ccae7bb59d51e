use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of the conversation as the frontend sends it. Content is
/// arbitrary text and never trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[validate(length(min = 1, message = "messages must not be empty"))]
    pub messages: Vec<ChatMessage>,
    pub language_id: i32,
    /// True while an exercise is in progress on the frontend.
    #[serde(default)]
    pub exercise_active: bool,
    #[serde(default)]
    pub exercise_name_snapshot: Option<String>,
    /// Base64 token; validated against the name snapshot before use.
    #[serde(default)]
    pub exercise_description_snapshot: Option<String>,
    #[serde(default)]
    pub current_code: String,
    #[serde(default)]
    pub execution_output: String,
    /// Set when the user submitted the exercise for a final verdict.
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub presence_penalty: Option<f32>,
    #[serde(default)]
    pub frequency_penalty: Option<f32>,
    #[serde(default)]
    pub top_p: Option<f32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: String,
    pub can_generate_exercise: bool,
    pub exercise_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub language_id: i32,
    #[validate(length(min = 1, message = "sourceCode must not be empty"))]
    pub source_code: String,
    #[serde(default)]
    pub stdin: String,
}

/// Shaped sandbox result. At most one of `stdout` / `stderr` /
/// `compile_output` is populated, selected by fixed priority:
/// compile error > runtime error > stdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResponse {
    pub status: Option<String>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub compile_output: Option<String>,
    pub time: Option<String>,
    pub memory: Option<i64>,
    pub exit_code: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRequest {
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: String,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub chat_context: Vec<ChatMessage>,
}

fn default_language() -> String {
    "javascript".to_string()
}

fn default_difficulty() -> String {
    "easy".to_string()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeResponse {
    pub challenge_id: String,
    pub title: String,
    pub description: String,
    pub template_code: String,
}

/// System-triggered prompt kinds. `None` means an ordinary user-authored
/// turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutomaticPromptKind {
    InitInterview,
    HintRequest,
    ExerciseEnd,
    ExerciseVerdict,
    None,
}

impl AutomaticPromptKind {
    pub fn is_automatic(self) -> bool {
        self != AutomaticPromptKind::None
    }
}
