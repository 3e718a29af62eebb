//! Long-lived vendor handles, one per [`Provider`]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::LlmConfig;
use crate::error::{LlmError, Result};

use super::anthropic::AnthropicProvider;
use super::google::GoogleProvider;
use super::http::build_http_client;
use super::openai::OpenAiProvider;
use super::types::{LlmProvider, Provider};

/// Adapter lookup handed to the router at construction time.
///
/// Built once at startup and never mutated afterwards, so it can be shared
/// by any number of concurrent requests.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<Provider, Arc<dyn LlmProvider>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut registered: Vec<_> = self.providers.keys().map(Provider::as_str).collect();
        registered.sort_unstable();
        f.debug_struct("ProviderRegistry")
            .field("providers", &registered)
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register all three vendors from configuration.
    ///
    /// Missing API keys are not an error here; the adapter reports
    /// [`LlmError::MissingCredential`] the first time it is used.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let client = build_http_client(Duration::from_secs(config.request_timeout_secs))?;

        for provider in Provider::ALL {
            if config.vendor(provider).api_key.is_empty() {
                debug!("No API key configured for {}; calls to it will fail", provider);
            }
        }

        Ok(Self::new()
            .with_provider(Arc::new(OpenAiProvider::new(
                client.clone(),
                config.openai.api_key.clone(),
                config.base_url(Provider::OpenAi),
            )))
            .with_provider(Arc::new(AnthropicProvider::new(
                client.clone(),
                config.anthropic.api_key.clone(),
                config.base_url(Provider::Anthropic),
            )))
            .with_provider(Arc::new(GoogleProvider::new(
                client,
                config.google.api_key.clone(),
                config.base_url(Provider::Google),
            ))))
    }

    /// Register (or replace) the adapter for the vendor it reports
    pub fn with_provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.providers.insert(provider.provider(), provider);
        self
    }

    pub fn get(&self, provider: Provider) -> Result<&Arc<dyn LlmProvider>> {
        self.providers
            .get(&provider)
            .ok_or(LlmError::ProviderNotConfigured { provider })
    }

    pub fn contains(&self, provider: Provider) -> bool {
        self.providers.contains_key(&provider)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
