//! OpenAI provider (GPT-4o, o3, etc.)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LlmError, Result};

use super::http::send_json;
use super::types::{
    ChatMessage, ChatRequest, ChatResponse, ChatRole, LlmProvider, Provider, TokenUsage,
};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// OpenAI provider
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("base_url", &self.base_url)
            .field("has_api_key", &!self.api_key.is_empty())
            .finish()
    }
}

impl OpenAiProvider {
    pub fn new(client: Client, api_key: String, base_url: String) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Convert canonical messages to OpenAI wire format.
    ///
    /// The system prompt is prepended as a `system` message. History passes
    /// through as-is; OpenAI accepts extra system turns.
    fn to_openai_messages<'a>(messages: &'a [ChatMessage], system: &'a str) -> Vec<OpenAiMessage<'a>> {
        let mut result = Vec::with_capacity(messages.len() + 1);
        if !system.is_empty() {
            result.push(OpenAiMessage {
                role: "system",
                content: system,
            });
        }
        result.extend(messages.iter().map(|m| OpenAiMessage {
            role: match m.role {
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
                ChatRole::System => "system",
            },
            content: &m.content,
        }));
        result
    }

    /// Convert OpenAI response to canonical format
    fn from_openai_response(resp: OpenAiApiResponse, requested_model: &str) -> Result<ChatResponse> {
        let provider = Provider::OpenAi;
        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse { provider })?;

        let content = choice
            .message
            .content
            .filter(|c| !c.is_empty())
            .ok_or(LlmError::EmptyResponse { provider })?;

        let usage = resp.usage.map_or(TokenUsage::default(), |u| {
            TokenUsage::new(u.prompt_tokens, u.completion_tokens)
        });

        Ok(ChatResponse {
            content,
            usage,
            model: resp.model.unwrap_or_else(|| requested_model.to_string()),
            finish_reason: choice.finish_reason,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    async fn chat(&self, request: &ChatRequest<'_>) -> Result<ChatResponse> {
        if self.api_key.is_empty() {
            return Err(LlmError::MissingCredential {
                provider: Provider::OpenAi,
            });
        }

        let url = format!("{}/v1/chat/completions", self.base_url);
        let messages = Self::to_openai_messages(request.messages, request.system);

        let body = OpenAiRequest {
            model: request.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        debug!(
            "OpenAI request: model={}, messages={}",
            request.model,
            body.messages.len()
        );

        let api_response: OpenAiApiResponse = send_json(
            Provider::OpenAi,
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body),
        )
        .await?;

        debug!(
            "OpenAI response: choices={}, finish_reason={:?}",
            api_response.choices.len(),
            api_response.choices.first().map(|c| &c.finish_reason)
        );

        Self::from_openai_response(api_response, request.model)
    }
}

// ── OpenAI wire types ──

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAiApiResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
