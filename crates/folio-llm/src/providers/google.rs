//! Google Gemini provider

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BlockReason, LlmError, Result};

use super::http::send_json;
use super::types::{
    ChatMessage, ChatRequest, ChatResponse, ChatRole, LlmProvider, Provider, TokenUsage,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Google Gemini provider
pub struct GoogleProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for GoogleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleProvider")
            .field("base_url", &self.base_url)
            .field("has_api_key", &!self.api_key.is_empty())
            .finish()
    }
}

impl GoogleProvider {
    pub fn new(client: Client, api_key: String, base_url: String) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Convert canonical messages to Gemini turns.
    ///
    /// Gemini has no system role: the system prompt is folded into the first
    /// user turn, which is always sent first. Assistant turns ahead of that
    /// user turn are dropped; with no user turn at all the prompt becomes one.
    /// Remaining assistant turns are relabeled `model`.
    fn to_gemini_contents(messages: &[ChatMessage], system: &str) -> Vec<GeminiContent> {
        let turns: Vec<&ChatMessage> = messages
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .collect();
        let mut rest = turns.as_slice();
        let mut contents = Vec::with_capacity(turns.len() + 1);

        if !system.is_empty() {
            match rest.iter().position(|m| m.role == ChatRole::User) {
                Some(idx) => {
                    if idx > 0 {
                        debug!("Dropping {} assistant turn(s) ahead of the first user turn", idx);
                    }
                    contents.push(GeminiContent::text(
                        "user",
                        format!("{}\n\n{}", system, rest[idx].content),
                    ));
                    rest = &rest[idx + 1..];
                }
                None => contents.push(GeminiContent::text("user", system.to_string())),
            }
        }

        contents.extend(rest.iter().map(|m| {
            let role = match m.role {
                ChatRole::Assistant => "model",
                _ => "user",
            };
            GeminiContent::text(role, m.content.clone())
        }));
        contents
    }

    /// Convert Gemini response to canonical format.
    ///
    /// A missing candidate and a candidate without text are different
    /// failures; the latter is explained by `finishReason`.
    fn from_gemini_response(resp: GeminiApiResponse, requested_model: &str) -> Result<ChatResponse> {
        let provider = Provider::Google;
        let candidate = match resp.candidates.into_iter().next() {
            Some(candidate) => candidate,
            None => {
                return Err(LlmError::NoCandidates {
                    provider,
                    block_reason: resp.prompt_feedback.and_then(|f| f.block_reason),
                });
            }
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(
                match BlockReason::from_finish_reason(candidate.finish_reason.as_deref()) {
                    Some(reason) => LlmError::Blocked { provider, reason },
                    None => LlmError::NoTextResponse { provider },
                },
            );
        }

        let usage = resp.usage_metadata.map_or(TokenUsage::default(), |u| {
            TokenUsage::new(
                u.prompt_token_count.unwrap_or(0),
                u.candidates_token_count.unwrap_or(0),
            )
        });

        Ok(ChatResponse {
            content: text,
            usage,
            model: resp
                .model_version
                .unwrap_or_else(|| requested_model.to_string()),
            finish_reason: candidate.finish_reason,
        })
    }
}

#[async_trait]
impl LlmProvider for GoogleProvider {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    async fn chat(&self, request: &ChatRequest<'_>) -> Result<ChatResponse> {
        if self.api_key.is_empty() {
            return Err(LlmError::MissingCredential {
                provider: Provider::Google,
            });
        }

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, request.model
        );

        let body = GeminiRequest {
            contents: Self::to_gemini_contents(request.messages, request.system),
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        };

        debug!(
            "Gemini request: model={}, contents={}",
            request.model,
            body.contents.len()
        );

        let api_response: GeminiApiResponse = send_json(
            Provider::Google,
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body),
        )
        .await?;

        debug!(
            "Gemini response: candidates={}, finish_reason={:?}",
            api_response.candidates.len(),
            api_response.candidates.first().map(|c| &c.finish_reason)
        );

        Self::from_gemini_response(api_response, request.model)
    }
}

// ── Gemini wire types ──

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

impl GeminiContent {
    fn text(role: &str, text: String) -> Self {
        Self {
            role: role.to_string(),
            parts: vec![GeminiPart { text: Some(text) }],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiApiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
    prompt_feedback: Option<GeminiPromptFeedback>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
}
