//! Multi-provider LLM abstraction layer
//!
//! Supports OpenAI, Anthropic and Google Gemini. Each adapter implements the
//! [`LlmProvider`] trait; the [`ProviderRegistry`] hands them to the
//! [`ModelRouter`](crate::router::ModelRouter) for fallback.

pub mod anthropic;
pub mod google;
pub mod http;
pub mod openai;
pub mod registry;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use google::GoogleProvider;
pub use openai::OpenAiProvider;
pub use registry::ProviderRegistry;
pub use types::{
    ChatInput, ChatMessage, ChatOptions, ChatRequest, ChatResponse, ChatRole, LlmProvider,
    Provider, TokenUsage, normalize_history,
};
