//! Provider-agnostic types shared by every adapter

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The closed set of vendors we can talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
    Google,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::OpenAi, Provider::Anthropic, Provider::Google];

    /// Resolve the vendor serving a model name.
    ///
    /// Case-insensitive substring match: "claude" is Anthropic, "gemini" is
    /// Google, anything else goes to OpenAI.
    pub fn detect(model: &str) -> Self {
        let lower = model.to_lowercase();
        if lower.contains("claude") {
            Self::Anthropic
        } else if lower.contains("gemini") {
            Self::Google
        } else {
            Self::OpenAi
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::System => write!(f, "system"),
        }
    }
}

/// Provider-agnostic chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }
}

/// A bare string in the history is a user turn
impl From<&str> for ChatMessage {
    fn from(content: &str) -> Self {
        Self::user(content)
    }
}

impl From<String> for ChatMessage {
    fn from(content: String) -> Self {
        Self::user(content)
    }
}

/// History entry as it arrives from the widget: either a full message or a plain string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatInput {
    Message(ChatMessage),
    Text(String),
}

impl From<ChatInput> for ChatMessage {
    fn from(input: ChatInput) -> Self {
        match input {
            ChatInput::Message(message) => message,
            ChatInput::Text(text) => ChatMessage::user(text),
        }
    }
}

/// Coerce raw widget history into canonical messages
pub fn normalize_history<I>(inputs: I) -> Vec<ChatMessage>
where
    I: IntoIterator,
    I::Item: Into<ChatMessage>,
{
    inputs.into_iter().map(Into::into).collect()
}

/// Per-call knobs supplied by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Requested model; decides the primary vendor
    pub model: Option<String>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1000,
            model: None,
        }
    }
}

impl ChatOptions {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// One adapter invocation: a single model on a single vendor
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub system: &'a str,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Token usage from a single API call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    /// Build usage from the two counts; the total is always their sum
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// Normalized response, identical in shape whichever vendor served it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    pub usage: TokenUsage,
    /// Model that actually answered
    pub model: String,
    pub finish_reason: Option<String>,
}

/// Trait that all LLM vendor adapters implement
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Which vendor this adapter speaks to
    fn provider(&self) -> Provider;

    /// Send exactly one request. Retrying is the router's job.
    async fn chat(&self, request: &ChatRequest<'_>) -> Result<ChatResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_provider() {
        assert_eq!(Provider::detect("claude-3-5-sonnet-latest"), Provider::Anthropic);
        assert_eq!(Provider::detect("Claude-Opus"), Provider::Anthropic);
        assert_eq!(Provider::detect("gemini-2.0-flash"), Provider::Google);
        assert_eq!(Provider::detect("models/GEMINI-pro"), Provider::Google);
        assert_eq!(Provider::detect("gpt-4o"), Provider::OpenAi);
        assert_eq!(Provider::detect("o3-mini"), Provider::OpenAi);
        assert_eq!(Provider::detect(""), Provider::OpenAi);
    }

    #[test]
    fn test_detect_claude_wins_over_gemini() {
        assert_eq!(Provider::detect("gemini-vs-claude"), Provider::Anthropic);
    }

    #[test]
    fn test_provider_display_and_serde() {
        assert_eq!(Provider::OpenAi.to_string(), "openai");
        assert_eq!(Provider::Anthropic.to_string(), "anthropic");
        assert_eq!(Provider::Google.to_string(), "google");
        assert_eq!(serde_json::to_string(&Provider::OpenAi).unwrap(), "\"openai\"");
        let parsed: Provider = serde_json::from_str("\"google\"").unwrap();
        assert_eq!(parsed, Provider::Google);
    }

    #[test]
    fn test_chat_role_display() {
        assert_eq!(ChatRole::User.to_string(), "user");
        assert_eq!(ChatRole::Assistant.to_string(), "assistant");
        assert_eq!(ChatRole::System.to_string(), "system");
    }

    #[test]
    fn test_plain_strings_become_user_messages() {
        let history: Vec<ChatInput> = serde_json::from_str(
            r#"["hi there", {"role": "assistant", "content": "hello!"}]"#,
        )
        .unwrap();
        let messages = normalize_history(history);
        assert_eq!(
            messages,
            vec![ChatMessage::user("hi there"), ChatMessage::assistant("hello!")]
        );
    }

    #[test]
    fn test_normalize_history_from_strs() {
        let messages = normalize_history(["a", "b"]);
        assert!(messages.iter().all(|m| m.role == ChatRole::User));
        assert_eq!(messages[1].content, "b");
    }

    #[test]
    fn test_chat_options_default() {
        let options = ChatOptions::default();
        assert_eq!(options.temperature, 0.7);
        assert_eq!(options.max_tokens, 1000);
        assert!(options.model.is_none());

        let partial: ChatOptions = serde_json::from_str(r#"{"model": "gpt-4o"}"#).unwrap();
        assert_eq!(partial.model.as_deref(), Some("gpt-4o"));
        assert_eq!(partial.max_tokens, 1000);
    }

    #[test]
    fn test_token_usage_total_is_sum() {
        let usage = TokenUsage::new(120, 30);
        assert_eq!(usage.total_tokens, 150);
        assert_eq!(TokenUsage::default().total_tokens, 0);
    }
}
