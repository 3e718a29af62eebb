//! Model router with automatic fallback across providers

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::chain::{ChainEntry, FallbackChain};
use crate::config::LlmConfig;
use crate::error::{ErrorClass, LlmError, Result};
use crate::providers::{ChatMessage, ChatOptions, ChatRequest, ChatResponse, ProviderRegistry};
use crate::usage::{self, PricingTable};

/// Walks a [`FallbackChain`] until one candidate answers.
///
/// Candidates are tried strictly one at a time. A retryable failure moves on
/// to the next candidate, a fatal one is returned as-is, and running out of
/// candidates yields [`LlmError::ChainExhausted`].
#[derive(Debug)]
pub struct ModelRouter {
    registry: ProviderRegistry,
    default_model: Option<String>,
    fallback_models: Option<Vec<String>>,
    /// Unlimited unless set
    max_attempts: Option<usize>,
    /// Unlimited unless set; checked before starting each fallback attempt
    time_budget: Option<Duration>,
    pricing: PricingTable,
}

impl ModelRouter {
    /// Router over an explicit registry with built-in defaults for everything else
    pub fn new(registry: ProviderRegistry) -> Self {
        Self {
            registry,
            default_model: None,
            fallback_models: None,
            max_attempts: None,
            time_budget: None,
            pricing: PricingTable::default(),
        }
    }

    /// Build the registry and router from configuration
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let registry = ProviderRegistry::from_config(config)?;
        let mut pricing = PricingTable::default();
        pricing.extend(config.model_prices.clone());

        let mut router = Self::new(registry)
            .with_fallback_models(config.fallback_models.clone())
            .with_pricing(pricing);
        if let Some(model) = &config.default_model {
            router = router.with_default_model(model.clone());
        }
        if let Some(n) = config.max_attempts {
            router = router.with_max_attempts(n);
        }
        if let Some(secs) = config.time_budget_secs {
            router = router.with_time_budget(Duration::from_secs(secs));
        }
        Ok(router)
    }

    /// Set the process-wide default model
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    /// Set the configured fallback list; `None` selects the built-in defaults
    pub fn with_fallback_models(mut self, models: Option<Vec<String>>) -> Self {
        self.fallback_models = models;
        self
    }

    /// Cap the number of candidates tried per call (at least one)
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = Some(max_attempts.max(1));
        self
    }

    /// Stop starting new fallback attempts once this much time has passed
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    pub fn with_pricing(mut self, pricing: PricingTable) -> Self {
        self.pricing = pricing;
        self
    }

    /// The chain a call with these options would walk
    pub fn chain_for(&self, options: &ChatOptions) -> FallbackChain {
        let primary =
            FallbackChain::resolve_primary(options.model.as_deref(), self.default_model.as_deref());
        FallbackChain::build(primary, self.fallback_models.as_deref())
    }

    /// Send a chat request, falling back to the next candidate on retryable errors
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        system: &str,
        options: &ChatOptions,
    ) -> Result<ChatResponse> {
        let chain = self.chain_for(options);
        let started = Instant::now();

        // The primary is always attempted, whatever the budget
        let primary = chain.primary();
        let mut attempts = 1usize;
        let mut last_failure = match self.attempt(&chain, 0, messages, system, options).await {
            Ok(response) => return Ok(response),
            Err(e) => (primary, Self::retryable_or_abort(primary, e)?),
        };

        for (idx, entry) in chain.iter().enumerate().skip(1) {
            if self.out_of_budget(attempts, started) {
                warn!(
                    "Stopping after {} attempt(s) in {:?}; {} candidate(s) not tried",
                    attempts,
                    started.elapsed(),
                    chain.len() - idx
                );
                break;
            }
            attempts += 1;

            match self.attempt(&chain, idx, messages, system, options).await {
                Ok(response) => return Ok(response),
                Err(e) => last_failure = (entry, Self::retryable_or_abort(entry, e)?),
            }
        }

        let (entry, source) = last_failure;
        Err(LlmError::ChainExhausted {
            attempts,
            provider: entry.provider,
            model: entry.model.clone(),
            source: Box::new(source),
        })
    }

    /// One call against the candidate at `idx`, logging usage on success
    async fn attempt(
        &self,
        chain: &FallbackChain,
        idx: usize,
        messages: &[ChatMessage],
        system: &str,
        options: &ChatOptions,
    ) -> Result<ChatResponse> {
        let entry = &chain.entries()[idx];
        debug!(
            "Trying {} {}/{} (candidate {}/{})",
            entry.reason,
            entry.provider,
            entry.model,
            idx + 1,
            chain.len()
        );

        let request = ChatRequest {
            model: &entry.model,
            messages,
            system,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        let response = self.registry.get(entry.provider)?.chat(&request).await?;
        if idx > 0 {
            info!(
                "Request succeeded on {} {}/{}",
                entry.reason, entry.provider, entry.model
            );
        }
        usage::record_success(entry, &response, &self.pricing);
        Ok(response)
    }

    /// Hand back a retryable failure for the next round; fatal ones end the call
    fn retryable_or_abort(entry: &ChainEntry, e: LlmError) -> Result<LlmError> {
        let class = e.classify();
        if class == ErrorClass::Fatal {
            warn!(
                "{} {}/{} failed with non-retryable error, aborting: {}",
                entry.reason, entry.provider, entry.model, e
            );
            return Err(e);
        }

        warn!(
            "{} {}/{} failed ({:?}): {}",
            entry.reason, entry.provider, entry.model, class, e
        );
        Ok(e)
    }

    fn out_of_budget(&self, attempts: usize, started: Instant) -> bool {
        if self.max_attempts.is_some_and(|max| attempts >= max) {
            return true;
        }
        self.time_budget
            .is_some_and(|budget| started.elapsed() >= budget)
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }
}
