//! LLMClient: a single-shot request/response client against the Anthropic
//! Messages API. No retries at this layer — the caller (ChatEngine) decides
//! what to do on failure.

use crate::error::ChatError;

use serde::{Deserialize, Serialize};
use std::time::Duration;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub finish_reason: String,
}

/// Client for a single external chat-completion backend.
pub struct LlmClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl LlmClient {
    /// Construct a client from an API key. Returns `None` when no key is
    /// configured — the caller falls back to the heuristic responder.
    pub fn from_api_key(api_key: Option<String>) -> Option<Self> {
        let api_key = api_key?;
        Some(Self {
            http: reqwest::Client::new(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
        })
    }

    /// Single-shot completion request. `messages` excludes the system prompt,
    /// which is passed separately as `system`.
    pub async fn complete(
        &self,
        system: &str,
        messages: &[ChatTurn],
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Completion, ChatError> {
        let body = AnthropicRequest {
            model: &self.model,
            max_tokens,
            system: system.to_string(),
            messages: messages
                .iter()
                .filter(|turn| turn.role != Role::System)
                .map(|turn| AnthropicMessage {
                    role: match turn.role {
                        Role::User => "user",
                        Role::Assistant => "assistant",
                        Role::System => unreachable!("system turns are filtered above"),
                    },
                    content: turn.content.clone(),
                })
                .collect(),
        };

        let response = self
            .http
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .timeout(timeout)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ChatError::RateLimited);
        }
        if status.is_server_error() {
            let text = response.text().await.unwrap_or_default();
            return Err(ChatError::ServerError(text));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ChatError::Network(format!("HTTP {status}: {text}")));
        }

        let parsed: AnthropicResponse = response
            .json()
            .await
            .map_err(|error| ChatError::ServerError(error.to_string()))?;

        let text = parsed
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        Ok(Completion {
            text,
            finish_reason: parsed.stop_reason.unwrap_or_else(|| "end_turn".to_string()),
        })
    }
}

fn classify_reqwest_error(error: reqwest::Error) -> ChatError {
    if error.is_timeout() {
        ChatError::Timeout
    } else if error.is_connect() {
        ChatError::Network(error.to_string())
    } else {
        ChatError::Network(error.to_string())
    }
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: String,
    messages: Vec<AnthropicMessage>,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicContentBlock {
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_api_key_yields_no_client() {
        assert!(LlmClient::from_api_key(None).is_none());
    }

    #[test]
    fn api_key_present_yields_client() {
        assert!(LlmClient::from_api_key(Some("sk-test".into())).is_some());
    }
}
