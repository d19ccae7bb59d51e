use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use uuid::Uuid;

use crate::models::{ChallengeResponse, ChatMessage, Role};
use crate::services::chat_service::{ChatClient, SamplingParams};

const GENERATION_PROMPT: &str = r#"You are a programming challenge generator for technical interviews.

{context_instruction}

Generate a programming challenge with these specifications:
- Language: {language}
- Difficulty: {difficulty}
- Topic: {topic}

You must respond EXACTLY in this JSON format (no markdown, no extra explanations):

{
  "title": "Concise challenge title",
  "description": "Clear problem description in Spanish. Explain what the function should do.",
  "function_name": "functionName",
  "function_signature": "function functionName(param1, param2)",
  "test_cases": [
    {"input": "example parameters", "expected": "expected result", "explanation": "Why this result"}
  ]
}

Requirements:
- Challenge must be appropriate for technical interviews
- Include 3-4 diverse test cases
- Function should be implementable in 10-15 lines of code
- If no topic specified, choose one appropriate for the difficulty"#;

const CONTEXT_ANALYSIS_PROMPT: &str = r#"Analyze this chat conversation to understand what programming challenge was discussed or agreed upon.

CHAT CONVERSATION:
{chat_context}

Extract what specific challenge was mentioned, any requirements discussed, and the difficulty implied. I need to generate a challenge that matches EXACTLY what was discussed. If no specific challenge was mentioned, suggest an appropriate one for the language and context."#;

/// Challenge definition as the model returns it.
#[derive(Debug, Deserialize)]
pub struct ChallengeDefinition {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub function_name: Option<String>,
    #[serde(default)]
    pub function_signature: Option<String>,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

#[derive(Debug, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected: String,
    #[serde(default)]
    pub explanation: Option<String>,
}

pub struct ChallengeService<'a> {
    chat: &'a ChatClient,
}

impl<'a> ChallengeService<'a> {
    pub fn new(chat: &'a ChatClient) -> Self {
        Self { chat }
    }

    pub async fn generate(
        &self,
        language: &str,
        difficulty: &str,
        topic: Option<&str>,
        chat_context: &[ChatMessage],
    ) -> Result<ChallengeResponse> {
        // Fail on unsupported languages before burning an upstream call.
        if !matches!(language.to_lowercase().as_str(), "javascript" | "python") {
            return Err(anyhow!("Language {} not supported yet", language));
        }

        let context_instruction = if chat_context.is_empty() {
            "Generate a random appropriate challenge for the given parameters.".to_string()
        } else {
            self.analyze_chat_context(chat_context, language).await
        };

        let prompt = GENERATION_PROMPT
            .replace("{context_instruction}", &context_instruction)
            .replace("{language}", language)
            .replace("{difficulty}", difficulty)
            .replace("{topic}", topic.unwrap_or("algorithms"));

        let messages = vec![
            ChatMessage {
                role: Role::System,
                content: prompt,
            },
            ChatMessage {
                role: Role::User,
                content: format!(
                    "Generate a {difficulty} challenge in {language} based on the conversation context."
                ),
            },
        ];

        let params = SamplingParams {
            temperature: 0.7,
            max_tokens: 800,
            ..Default::default()
        };

        let reply = self
            .chat
            .complete(&messages, &params)
            .await
            .context("Challenge generation call failed")?;

        let definition: ChallengeDefinition = serde_json::from_str(strip_code_fences(&reply))
            .context("Challenge generator returned malformed JSON")?;

        let template_code = render_template(&definition, language)?;

        Ok(ChallengeResponse {
            challenge_id: Uuid::new_v4().to_string(),
            title: definition.title,
            description: definition.description,
            template_code,
        })
    }

    /// Best-effort second pass extracting the agreed challenge from the
    /// conversation. Falls back to a generic instruction when it fails.
    async fn analyze_chat_context(&self, chat_context: &[ChatMessage], language: &str) -> String {
        let mut chat_text = String::new();
        for message in chat_context {
            let role = match message.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            chat_text.push_str(&format!("{}: {}\n", role, message.content));
        }

        let messages = vec![
            ChatMessage {
                role: Role::System,
                content: CONTEXT_ANALYSIS_PROMPT.replace("{chat_context}", &chat_text),
            },
            ChatMessage {
                role: Role::User,
                content: format!(
                    "What challenge should I generate for {language} based on this conversation?"
                ),
            },
        ];

        let params = SamplingParams {
            temperature: 0.3,
            max_tokens: 200,
            ..Default::default()
        };

        match self.chat.complete(&messages, &params).await {
            Ok(analysis) => format!(
                "Based on the chat conversation, generate a challenge that matches what was discussed: {analysis}"
            ),
            Err(e) => {
                tracing::warn!("Chat context analysis failed, using generic prompt: {}", e);
                "Generate an appropriate challenge based on the conversation context provided."
                    .to_string()
            }
        }
    }
}

/// Models occasionally wrap the JSON in a markdown fence despite the
/// instructions; tolerate that one deviation.
fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

fn render_template(definition: &ChallengeDefinition, language: &str) -> Result<String> {
    match language.to_lowercase().as_str() {
        "javascript" => Ok(javascript_template(definition)),
        "python" => Ok(python_template(definition)),
        other => Err(anyhow!("Language {} not supported yet", other)),
    }
}

/// Drop a trailing empty body from a signature the model already closed.
fn clean_signature(signature: &str) -> &str {
    signature
        .strip_suffix(" { }")
        .or_else(|| signature.strip_suffix(" {}"))
        .unwrap_or(signature)
}

fn javascript_template(definition: &ChallengeDefinition) -> String {
    let function_name = definition.function_name.as_deref().unwrap_or("solution");
    let default_signature = format!("function {function_name}()");
    let signature = clean_signature(definition.function_signature.as_deref().unwrap_or(&default_signature));

    let mut template = format!(
        "/**\n * Problem: {}\n *\n * {}\n */\n{} {{\n  // ✍️ TU CÓDIGO AQUÍ\n\n}}\n\n// Test Cases (ejecutables)",
        definition.title, definition.description, signature
    );

    for test_case in &definition.test_cases {
        template.push_str(&format!(
            "\nconsole.log({}({})); // Esperado: {}",
            function_name, test_case.input, test_case.expected
        ));
    }

    template
}

fn python_template(definition: &ChallengeDefinition) -> String {
    let function_name = definition.function_name.as_deref().unwrap_or("solution");
    let default_signature = format!("def {function_name}():");
    let raw_signature = definition.function_signature.as_deref().unwrap_or(&default_signature);

    // The generator answers with JavaScript-style signatures; convert.
    let signature = if raw_signature.contains("function ") {
        let converted = clean_signature(raw_signature).replace("function ", "def ");
        format!("{}:", converted.trim_end())
    } else {
        raw_signature.to_string()
    };

    let mut template = format!(
        "\"\"\"\nProblem: {}\n\n{}\n\"\"\"\n{}\n    # ✍️ TU CÓDIGO AQUÍ\n    pass\n\n# Test Cases (ejecutables)",
        definition.title, definition.description, signature
    );

    for test_case in &definition.test_cases {
        template.push_str(&format!(
            "\nprint({}({}))  # Esperado: {}",
            function_name, test_case.input, test_case.expected
        ));
    }

    template
}
