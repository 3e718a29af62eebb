//! Fallback chain construction
//!
//! A chain is the ordered list of (provider, model) candidates tried for one
//! chat call. It is rebuilt per call and is a pure function of the primary
//! model and the configured fallback list.

use crate::providers::Provider;

/// Used when neither the caller nor the configuration names a model
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Appended when no fallback list is configured: a cheaper model from the
/// default family, then a different vendor
pub const DEFAULT_FALLBACKS: [&str; 2] = ["gpt-4o-mini", "claude-3-5-haiku-latest"];

/// Why a candidate is in the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainReason {
    Primary,
    /// Configured fallback, 1-based
    Fallback(usize),
    /// Built-in fallback, 1-based
    DefaultFallback(usize),
}

impl std::fmt::Display for ChainReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "Primary"),
            Self::Fallback(n) => write!(f, "Fallback {}", n),
            Self::DefaultFallback(n) => write!(f, "Default fallback {}", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEntry {
    pub provider: Provider,
    pub model: String,
    pub reason: ChainReason,
}

impl ChainEntry {
    fn new(model: &str, reason: ChainReason) -> Self {
        Self {
            provider: Provider::detect(model),
            model: model.to_string(),
            reason,
        }
    }
}

/// Ordered candidates for one call. Never empty: the primary is always first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackChain {
    entries: Vec<ChainEntry>,
}

impl FallbackChain {
    /// Build the chain for `primary`.
    ///
    /// Configured fallbacks are appended in order. If there is no list, or
    /// it holds no usable model names, [`DEFAULT_FALLBACKS`] are appended
    /// instead so the primary is never left unprotected. Duplicates are kept;
    /// the configuration decides the order.
    pub fn build(primary: &str, fallbacks: Option<&[String]>) -> Self {
        let mut entries = vec![ChainEntry::new(primary, ChainReason::Primary)];

        let configured: Vec<&str> = fallbacks
            .unwrap_or_default()
            .iter()
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
            .collect();

        if configured.is_empty() {
            entries.extend(
                DEFAULT_FALLBACKS
                    .iter()
                    .enumerate()
                    .map(|(i, model)| ChainEntry::new(model, ChainReason::DefaultFallback(i + 1))),
            );
        } else {
            entries.extend(
                configured
                    .into_iter()
                    .enumerate()
                    .map(|(i, model)| ChainEntry::new(model, ChainReason::Fallback(i + 1))),
            );
        }

        Self { entries }
    }

    /// Resolve the primary model: the caller's choice, then the configured
    /// default, then [`DEFAULT_MODEL`].
    pub fn resolve_primary<'a>(requested: Option<&'a str>, configured: Option<&'a str>) -> &'a str {
        requested
            .filter(|m| !m.trim().is_empty())
            .or(configured.filter(|m| !m.trim().is_empty()))
            .unwrap_or(DEFAULT_MODEL)
    }

    pub fn primary(&self) -> &ChainEntry {
        &self.entries[0]
    }

    pub fn entries(&self) -> &[ChainEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// A built chain always holds its primary
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChainEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a FallbackChain {
    type Item = &'a ChainEntry;
    type IntoIter = std::slice::Iter<'a, ChainEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn models(chain: &FallbackChain) -> Vec<&str> {
        chain.iter().map(|e| e.model.as_str()).collect()
    }

    #[test]
    fn test_defaults_when_unconfigured() {
        let chain = FallbackChain::build("gemini-2.0-flash", None);
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.primary().model, "gemini-2.0-flash");
        assert_eq!(chain.primary().provider, Provider::Google);
        assert_eq!(chain.primary().reason.to_string(), "Primary");
        assert_eq!(
            models(&chain),
            ["gemini-2.0-flash", "gpt-4o-mini", "claude-3-5-haiku-latest"]
        );
        assert_eq!(chain.entries()[1].reason.to_string(), "Default fallback 1");
        assert_eq!(chain.entries()[2].reason.to_string(), "Default fallback 2");
        assert_eq!(chain.entries()[2].provider, Provider::Anthropic);
    }

    #[test]
    fn test_configured_fallbacks_preserve_order() {
        let fallbacks = vec![
            "claude-y".to_string(),
            "gpt-z".to_string(),
            "gemini-w".to_string(),
        ];
        let chain = FallbackChain::build("gemini-x", Some(fallbacks.as_slice()));
        assert_eq!(chain.len(), fallbacks.len() + 1);
        assert_eq!(models(&chain), ["gemini-x", "claude-y", "gpt-z", "gemini-w"]);
        let providers: Vec<_> = chain.iter().map(|e| e.provider).collect();
        assert_eq!(
            providers,
            [Provider::Google, Provider::Anthropic, Provider::OpenAi, Provider::Google]
        );
        let reasons: Vec<_> = chain.iter().map(|e| e.reason.to_string()).collect();
        assert_eq!(reasons, ["Primary", "Fallback 1", "Fallback 2", "Fallback 3"]);
    }

    #[test]
    fn test_empty_list_uses_defaults() {
        let chain = FallbackChain::build("gpt-4o", Some(&[][..]));
        assert_eq!(chain.len(), 3);
        assert!(matches!(chain.entries()[1].reason, ChainReason::DefaultFallback(1)));

        let blanks = vec!["  ".to_string(), String::new()];
        assert_eq!(FallbackChain::build("gpt-4o", Some(blanks.as_slice())).len(), 3);
    }

    #[test]
    fn test_duplicates_are_kept() {
        let chain = FallbackChain::build("gpt-4o-mini", None);
        assert_eq!(models(&chain), ["gpt-4o-mini", "gpt-4o-mini", "claude-3-5-haiku-latest"]);
    }

    #[test]
    fn test_build_is_deterministic() {
        let fallbacks = vec!["claude-y".to_string()];
        assert_eq!(
            FallbackChain::build("gpt-4o", Some(fallbacks.as_slice())),
            FallbackChain::build("gpt-4o", Some(fallbacks.as_slice()))
        );
    }

    #[test]
    fn test_resolve_primary() {
        assert_eq!(FallbackChain::resolve_primary(Some("claude-y"), Some("gpt-z")), "claude-y");
        assert_eq!(FallbackChain::resolve_primary(None, Some("gpt-z")), "gpt-z");
        assert_eq!(FallbackChain::resolve_primary(Some(""), Some("gpt-z")), "gpt-z");
        assert_eq!(FallbackChain::resolve_primary(None, None), DEFAULT_MODEL);
    }

    #[test]
    fn test_never_empty() {
        let chain = FallbackChain::build("", None);
        assert!(!chain.is_empty());
        assert_eq!(chain.primary().provider, Provider::OpenAi);
    }
}
