//! Anthropic Claude provider

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LlmError, Result};

use super::http::send_json;
use super::types::{
    ChatMessage, ChatRequest, ChatResponse, ChatRole, LlmProvider, Provider, TokenUsage,
};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Claude provider
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("base_url", &self.base_url)
            .field("has_api_key", &!self.api_key.is_empty())
            .finish()
    }
}

impl AnthropicProvider {
    pub fn new(client: Client, api_key: String, base_url: String) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Convert canonical messages to Anthropic wire format.
    ///
    /// The Messages API rejects a `system` role inside `messages`; the prompt
    /// travels in the top-level `system` field instead, so any system turn
    /// left in the history is dropped here.
    fn to_anthropic_messages(messages: &[ChatMessage]) -> Vec<AnthropicMessage<'_>> {
        messages
            .iter()
            .filter_map(|m| {
                let role = match m.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                    ChatRole::System => return None,
                };
                Some(AnthropicMessage {
                    role,
                    content: &m.content,
                })
            })
            .collect()
    }

    /// Convert Anthropic response to canonical format
    fn from_anthropic_response(resp: AnthropicApiResponse, requested_model: &str) -> Result<ChatResponse> {
        let content = resp
            .content
            .into_iter()
            .find_map(|block| match block {
                AnthropicBlock::Text { text } => Some(text),
                AnthropicBlock::Other => None,
            })
            .ok_or(LlmError::NoTextResponse {
                provider: Provider::Anthropic,
            })?;

        Ok(ChatResponse {
            content,
            // The API reports input and output separately, never a total
            usage: TokenUsage::new(resp.usage.input_tokens, resp.usage.output_tokens),
            model: resp.model.unwrap_or_else(|| requested_model.to_string()),
            finish_reason: resp.stop_reason,
        })
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn chat(&self, request: &ChatRequest<'_>) -> Result<ChatResponse> {
        if self.api_key.is_empty() {
            return Err(LlmError::MissingCredential {
                provider: Provider::Anthropic,
            });
        }

        let url = format!("{}/v1/messages", self.base_url);
        let messages = Self::to_anthropic_messages(request.messages);

        let body = AnthropicRequest {
            model: request.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: (!request.system.is_empty()).then_some(request.system),
            messages,
        };

        debug!(
            "Anthropic request: model={}, messages={}",
            request.model,
            body.messages.len()
        );

        let api_response: AnthropicApiResponse = send_json(
            Provider::Anthropic,
            self.client
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body),
        )
        .await?;

        debug!(
            "Anthropic response: blocks={}, stop_reason={:?}",
            api_response.content.len(),
            api_response.stop_reason
        );

        Self::from_anthropic_response(api_response, request.model)
    }
}

// ── Anthropic wire types ──

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicBlock {
    Text {
        text: String,
    },
    /// tool_use, thinking and anything newer
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicApiResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<AnthropicBlock>,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: AnthropicUsage,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_anthropic_messages_text() {
        let msgs = vec![ChatMessage::user("hello")];
        let result = AnthropicProvider::to_anthropic_messages(&msgs);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].role, "user");
        assert_eq!(result[0].content, "hello");
    }

    #[test]
    fn test_to_anthropic_messages_filters_system() {
        let msgs = vec![
            ChatMessage::system("stale system prompt"),
            ChatMessage::user("hello"),
            ChatMessage::assistant("hi!"),
            ChatMessage::system("another one"),
        ];
        let result = AnthropicProvider::to_anthropic_messages(&msgs);
        let roles: Vec<_> = result.iter().map(|m| m.role).collect();
        assert_eq!(roles, ["user", "assistant"]);
    }

    #[test]
    fn test_request_carries_system_field() {
        let msgs = vec![ChatMessage::system("ignored"), ChatMessage::user("hello")];
        let body = AnthropicRequest {
            model: "claude-3-5-haiku-latest",
            max_tokens: 1000,
            temperature: 0.7,
            system: Some("Answer as the site owner."),
            messages: AnthropicProvider::to_anthropic_messages(&msgs),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["system"], "Answer as the site owner.");
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
        assert!(!json.to_string().contains("ignored"));
    }

    #[test]
    fn test_from_anthropic_response_first_text_block() {
        let resp: AnthropicApiResponse = serde_json::from_value(serde_json::json!({
            "id": "msg_1",
            "model": "claude-3-5-haiku-20241022",
            "content": [
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "Hello!"},
                {"type": "text", "text": "second"}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }))
        .unwrap();
        let result = AnthropicProvider::from_anthropic_response(resp, "claude-3-5-haiku-latest").unwrap();
        assert_eq!(result.content, "Hello!");
        assert_eq!(result.finish_reason.as_deref(), Some("end_turn"));
        assert_eq!(result.model, "claude-3-5-haiku-20241022");
        assert_eq!(result.usage.prompt_tokens, 10);
        assert_eq!(result.usage.completion_tokens, 5);
        assert_eq!(result.usage.total_tokens, 15);
    }

    #[test]
    fn test_from_anthropic_response_no_text() {
        let resp: AnthropicApiResponse = serde_json::from_value(serde_json::json!({
            "content": [{"type": "tool_use", "id": "tu_1", "name": "x", "input": {}}],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 1, "output_tokens": 1}
        }))
        .unwrap();
        let err = AnthropicProvider::from_anthropic_response(resp, "claude").unwrap_err();
        assert!(matches!(err, LlmError::NoTextResponse { .. }));
        assert!(err.to_string().contains("no text response"));
    }

    #[test]
    fn test_anthropic_provider_debug_hides_key() {
        let provider = AnthropicProvider::new(
            Client::new(),
            "sk-ant-secret".to_string(),
            DEFAULT_BASE_URL.to_string(),
        );
        let debug = format!("{:?}", provider);
        assert!(!debug.contains("sk-ant-secret"));
    }
}
