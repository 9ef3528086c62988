/// LLM Client: the single point of entry for all Claude API calls in the interview service.
///
/// ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
/// The interview controller talks to `GenerationService`; provider-specific
/// request and response shapes stay in this module.
///
/// Model: claude-sonnet-4-5 (fixed, not configurable)
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::transcript::{Role, Turn};

pub mod prompts;
#[cfg(test)]
pub mod testing;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all LLM calls.
/// This is intentionally hardcoded to prevent accidental drift.
pub const MODEL: &str = "claude-sonnet-4-5";
/// Questions are short; a low cap keeps the model from rambling into the audio output.
const QUESTION_MAX_TOKENS: u32 = 400;
const STRUCTURED_MAX_TOKENS: u32 = 4096;
const QUESTION_TEMPERATURE: f32 = 0.7;
const MAX_RETRIES: u32 = 3;
/// Sent first when the conversation would otherwise open with an interviewer turn.
const KICKOFF_MESSAGE: &str = "Please begin the interview.";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("LLM call timed out after {0:?}")]
    Timeout(Duration),
}

/// Per-call knobs for a completion request.
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    /// Instruction prompt placed in the provider's system slot.
    pub system_prompt: Option<String>,
    /// The caller will parse the response as JSON.
    pub expect_structured_output: bool,
}

impl CompletionOptions {
    pub fn question(system_prompt: &str) -> Self {
        Self {
            system_prompt: Some(system_prompt.to_string()),
            expect_structured_output: false,
        }
    }

    pub fn structured() -> Self {
        Self {
            system_prompt: None,
            expect_structured_output: true,
        }
    }
}

/// Stateless text-completion capability.
///
/// Given the prior turns and one new instruction, returns the raw model text.
/// No schema is enforced: callers must treat the output as untrusted.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn complete(
        &self,
        turns: &[Turn],
        instruction: &str,
        options: CompletionOptions,
    ) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// The single LLM client used by the interview service.
/// Wraps the Anthropic Messages API with retry logic and per-kind timeouts.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    question_timeout: Duration,
    evaluation_timeout: Duration,
}

impl LlmClient {
    pub fn new(
        api_key: String,
        question_timeout: Duration,
        evaluation_timeout: Duration,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().build()?,
            api_key,
            question_timeout,
            evaluation_timeout,
        })
    }

    /// Makes a raw call to the Claude API, returning the full response object.
    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff.
    async fn call(
        &self,
        request_body: &AnthropicRequest<'_>,
        timeout: Duration,
    ) -> Result<LlmResponse, LlmError> {
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .timeout(timeout)
                .json(request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) if e.is_timeout() => {
                    last_error = Some(LlmError::Timeout(timeout));
                    continue;
                }
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<AnthropicError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let llm_response: LlmResponse = response.json().await?;

            debug!(
                "LLM call succeeded: input_tokens={}, output_tokens={}",
                llm_response.usage.input_tokens, llm_response.usage.output_tokens
            );

            return Ok(llm_response);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl GenerationService for LlmClient {
    async fn complete(
        &self,
        turns: &[Turn],
        instruction: &str,
        options: CompletionOptions,
    ) -> Result<String, LlmError> {
        let messages = build_messages(turns, instruction);

        let (system, max_tokens, temperature, timeout) = if options.expect_structured_output {
            (
                Some(
                    options
                        .system_prompt
                        .as_deref()
                        .unwrap_or(prompts::JSON_ONLY_SYSTEM),
                ),
                STRUCTURED_MAX_TOKENS,
                None,
                self.evaluation_timeout,
            )
        } else {
            (
                options.system_prompt.as_deref(),
                QUESTION_MAX_TOKENS,
                Some(QUESTION_TEMPERATURE),
                self.question_timeout,
            )
        };

        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens,
            system,
            temperature,
            messages,
        };

        let response = self.call(&request_body, timeout).await?;
        let text = response.text().ok_or(LlmError::EmptyContent)?.trim();

        if options.expect_structured_output {
            Ok(strip_json_fences(text).to_string())
        } else {
            Ok(text.to_string())
        }
    }
}

/// Maps transcript turns plus the new instruction onto alternating
/// user/assistant messages, as the Messages API requires.
fn build_messages(turns: &[Turn], instruction: &str) -> Vec<AnthropicMessage> {
    let mut messages: Vec<AnthropicMessage> = Vec::with_capacity(turns.len() + 2);

    let tail = std::iter::once((Role::Candidate, instruction));
    for (role, text) in turns.iter().map(|t| (t.role, t.text.as_str())).chain(tail) {
        if text.trim().is_empty() {
            continue;
        }
        let role = match role {
            Role::Interviewer => "assistant",
            Role::Candidate => "user",
        };

        match messages.last_mut() {
            Some(last) if last.role == role => {
                last.content.push_str("\n\n");
                last.content.push_str(text);
            }
            None if role == "assistant" => {
                messages.push(AnthropicMessage {
                    role: "user",
                    content: KICKOFF_MESSAGE.to_string(),
                });
                messages.push(AnthropicMessage {
                    role,
                    content: text.to_string(),
                });
            }
            _ => messages.push(AnthropicMessage {
                role,
                content: text.to_string(),
            }),
        }
    }

    messages
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
