//! Per-call usage logging and cost estimation
//!
//! Every successful chat call is logged with its provider, model, token
//! counts and an estimated USD cost. Nothing here can fail a call: unknown
//! models are logged without a cost.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::chain::ChainEntry;
use crate::providers::{ChatResponse, TokenUsage};

/// Pricing for a specific model (per million tokens)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_mtok: f64,
    pub output_per_mtok: f64,
}

impl ModelPricing {
    pub const fn new(input_per_mtok: f64, output_per_mtok: f64) -> Self {
        Self {
            input_per_mtok,
            output_per_mtok,
        }
    }

    /// Estimate cost in USD for given token usage
    pub fn estimate_cost(&self, usage: &TokenUsage) -> f64 {
        let input_cost = (usage.prompt_tokens as f64 / 1_000_000.0) * self.input_per_mtok;
        let output_cost = (usage.completion_tokens as f64 / 1_000_000.0) * self.output_per_mtok;
        input_cost + output_cost
    }
}

/// Model-name prefix to price lookup
#[derive(Debug, Clone)]
pub struct PricingTable {
    prices: HashMap<String, ModelPricing>,
}

impl Default for PricingTable {
    fn default() -> Self {
        let prices = [
            ("gpt-4o", ModelPricing::new(2.5, 10.0)),
            ("gpt-4o-mini", ModelPricing::new(0.15, 0.6)),
            ("claude-3-5-haiku", ModelPricing::new(0.8, 4.0)),
            ("claude-3-5-sonnet", ModelPricing::new(3.0, 15.0)),
            ("gemini-1.5-pro", ModelPricing::new(1.25, 5.0)),
            ("gemini-2.0-flash", ModelPricing::new(0.1, 0.4)),
        ]
        .into_iter()
        .map(|(model, pricing)| (model.to_string(), pricing))
        .collect();
        Self { prices }
    }
}

impl PricingTable {
    pub fn empty() -> Self {
        Self {
            prices: HashMap::new(),
        }
    }

    /// Add or replace the price for a model prefix
    pub fn with_price(mut self, model: impl Into<String>, pricing: ModelPricing) -> Self {
        self.prices.insert(model.into(), pricing);
        self
    }

    /// Merge configured prices over the current table
    pub fn extend<I>(&mut self, prices: I)
    where
        I: IntoIterator<Item = (String, ModelPricing)>,
    {
        self.prices.extend(prices);
    }

    /// Longest configured prefix of `model`, so dated snapshots
    /// (`gpt-4o-mini-2024-07-18`) resolve to their family price.
    pub fn lookup(&self, model: &str) -> Option<&ModelPricing> {
        self.prices
            .iter()
            .filter(|(prefix, _)| model.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, pricing)| pricing)
    }

    pub fn estimate_cost(&self, model: &str, usage: &TokenUsage) -> Option<f64> {
        self.lookup(model).map(|p| p.estimate_cost(usage))
    }
}

/// Log a served call for cost observability
pub fn record_success(entry: &ChainEntry, response: &ChatResponse, pricing: &PricingTable) {
    let usage = &response.usage;
    // Price by the requested model; vendors often report a dated snapshot
    let cost = pricing
        .estimate_cost(&entry.model, usage)
        .or_else(|| pricing.estimate_cost(&response.model, usage));

    match cost {
        Some(cost) => info!(
            "LLM usage: provider={} model={} prompt_tokens={} completion_tokens={} total_tokens={} cost=${:.6}",
            entry.provider,
            response.model,
            usage.prompt_tokens,
            usage.completion_tokens,
            usage.total_tokens,
            cost
        ),
        None => info!(
            "LLM usage: provider={} model={} prompt_tokens={} completion_tokens={} total_tokens={} cost=unknown",
            entry.provider,
            response.model,
            usage.prompt_tokens,
            usage.completion_tokens,
            usage.total_tokens
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_cost() {
        let pricing = ModelPricing::new(2.5, 10.0);
        let cost = pricing.estimate_cost(&TokenUsage::new(1_000_000, 100_000));
        assert!((cost - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_longest_prefix_wins() {
        let table = PricingTable::default();
        let mini = table.lookup("gpt-4o-mini-2024-07-18").unwrap();
        assert_eq!(mini.input_per_mtok, 0.15);
        let full = table.lookup("gpt-4o-2024-08-06").unwrap();
        assert_eq!(full.input_per_mtok, 2.5);
        assert!(table.lookup("o3-mini").is_none());
    }

    #[test]
    fn test_with_price_and_extend() {
        let mut table = PricingTable::empty().with_price("claude-y", ModelPricing::new(1.0, 2.0));
        assert!(table.estimate_cost("claude-y", &TokenUsage::new(0, 0)).is_some());
        table.extend([("claude-y".to_string(), ModelPricing::new(5.0, 5.0))]);
        assert_eq!(table.lookup("claude-y").unwrap().input_per_mtok, 5.0);
        assert!(table.estimate_cost("gpt-4o", &TokenUsage::new(1, 1)).is_none());
    }
}
