//! Error taxonomy for provider calls and the fallback chain
//!
//! Adapters surface vendor failures with their native status codes and
//! messages untouched; [`LlmError::classify`] decides whether the router may
//! move on to the next candidate.

use thiserror::Error;

use crate::providers::Provider;

/// Result alias used throughout the crate
pub type Result<T, E = LlmError> = std::result::Result<T, E>;

/// Errors raised by adapters and by the router
#[derive(Debug, Error)]
pub enum LlmError {
    /// Non-2xx HTTP response from a vendor
    #[error("{provider} API request failed with status {status}: {message}")]
    Api {
        provider: Provider,
        status: u16,
        message: String,
    },

    /// Transport-level failure before a response arrived
    #[error("{provider} request failed ({kind}): {message}")]
    Network {
        provider: Provider,
        kind: NetworkFailure,
        message: String,
    },

    #[error("{provider} API key is not configured")]
    MissingCredential { provider: Provider },

    /// Response decoded but carried nothing usable (no choices, no message)
    #[error("{provider} returned an empty response")]
    EmptyResponse { provider: Provider },

    #[error("{provider} returned no text response")]
    NoTextResponse { provider: Provider },

    /// Gemini returned zero candidates, usually because the prompt was blocked
    #[error("{provider} returned no candidates (block reason: {reason})", reason = .block_reason.as_deref().unwrap_or("none"))]
    NoCandidates {
        provider: Provider,
        block_reason: Option<String>,
    },

    /// Gemini returned a candidate without text; the finish reason says why
    #[error("{provider} {reason}")]
    Blocked {
        provider: Provider,
        reason: BlockReason,
    },

    #[error("failed to parse {provider} response: {message}")]
    InvalidResponse { provider: Provider, message: String },

    #[error("no client registered for provider {provider}")]
    ProviderNotConfigured { provider: Provider },

    /// Every attempted candidate failed with a retryable error
    #[error(
        "all model candidates failed after {attempts} attempt(s); last attempt {provider}/{model}: {source}"
    )]
    ChainExhausted {
        attempts: usize,
        provider: Provider,
        model: String,
        #[source]
        source: Box<LlmError>,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// What went wrong on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkFailure {
    Dns,
    ConnectionRefused,
    Timeout,
    Connect,
    Other,
}

impl std::fmt::Display for NetworkFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dns => write!(f, "dns resolution failed"),
            Self::ConnectionRefused => write!(f, "connection refused"),
            Self::Timeout => write!(f, "timed out"),
            Self::Connect => write!(f, "connect failed"),
            Self::Other => write!(f, "transport error"),
        }
    }
}

/// Why a Gemini candidate came back without text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    MaxTokens,
    Safety,
    Recitation,
    Other(String),
}

impl BlockReason {
    /// Map a Gemini `finishReason`. `STOP` and a missing reason are not blocks.
    pub fn from_finish_reason(reason: Option<&str>) -> Option<Self> {
        match reason? {
            "STOP" | "FINISH_REASON_UNSPECIFIED" => None,
            "MAX_TOKENS" => Some(Self::MaxTokens),
            "SAFETY" | "PROHIBITED_CONTENT" | "BLOCKLIST" | "SPII" => Some(Self::Safety),
            "RECITATION" => Some(Self::Recitation),
            other => Some(Self::Other(other.to_string())),
        }
    }
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MaxTokens => write!(f, "max output length reached before any text was produced"),
            Self::Safety => write!(f, "response blocked by safety filters"),
            Self::Recitation => write!(f, "response blocked for reciting source material"),
            Self::Other(reason) => write!(f, "response ended without text (finish reason {})", reason),
        }
    }
}

/// Retry policy outcome for a single failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Known transient: try the next candidate
    Retryable,
    /// Retrying against another vendor cannot help: abort the chain
    Fatal,
    /// Unknown failure; treated as retryable
    Unclassified,
}

/// Message fragments that mark a failure as transient regardless of status
const RETRYABLE_PATTERNS: &[&str] = &[
    "quota",
    "rate limit",
    "rate_limit",
    "resource exhausted",
    "resource_exhausted",
    "max output length reached",
];

impl LlmError {
    /// Vendor HTTP status, if the failure carried one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::ChainExhausted { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Provider the failure came from, if any
    pub fn provider(&self) -> Option<Provider> {
        match self {
            Self::Api { provider, .. }
            | Self::Network { provider, .. }
            | Self::MissingCredential { provider }
            | Self::EmptyResponse { provider }
            | Self::NoTextResponse { provider }
            | Self::NoCandidates { provider, .. }
            | Self::Blocked { provider, .. }
            | Self::InvalidResponse { provider, .. }
            | Self::ProviderNotConfigured { provider }
            | Self::ChainExhausted { provider, .. } => Some(*provider),
            Self::Client(_) => None,
        }
    }

    /// Classify this failure for the fallback loop.
    ///
    /// Status codes win over message text, so a 401 mentioning "quota" is
    /// still fatal.
    pub fn classify(&self) -> ErrorClass {
        match self {
            Self::Api {
                status, message, ..
            } => match *status {
                429 | 500 | 502 | 503 => ErrorClass::Retryable,
                400 | 401 | 403 => ErrorClass::Fatal,
                _ => classify_message(message),
            },
            // Same outcome the vendor would give us: a 401
            Self::MissingCredential { .. } => ErrorClass::Fatal,
            Self::Network { kind, message, .. } => match kind {
                NetworkFailure::Other => classify_message(message),
                _ => ErrorClass::Retryable,
            },
            Self::Blocked {
                reason: BlockReason::MaxTokens,
                ..
            } => ErrorClass::Retryable,
            Self::ChainExhausted { source, .. } => source.classify(),
            other => classify_message(&other.to_string()),
        }
    }

    /// Whether the router may advance to the next candidate
    pub fn is_retryable(&self) -> bool {
        self.classify() != ErrorClass::Fatal
    }

    /// Wrap a reqwest transport error, sorting it into a [`NetworkFailure`]
    pub(crate) fn transport(provider: Provider, err: reqwest::Error) -> Self {
        let message = error_chain(&err);
        let kind = if err.is_timeout() {
            NetworkFailure::Timeout
        } else if err.is_connect() {
            classify_connect(&message)
        } else {
            NetworkFailure::Other
        };
        Self::Network {
            provider,
            kind,
            message,
        }
    }
}

fn classify_message(message: &str) -> ErrorClass {
    let lower = message.to_lowercase();
    if RETRYABLE_PATTERNS.iter().any(|p| lower.contains(p)) {
        ErrorClass::Retryable
    } else {
        ErrorClass::Unclassified
    }
}

fn classify_connect(message: &str) -> NetworkFailure {
    let lower = message.to_lowercase();
    if lower.contains("dns")
        || lower.contains("failed to lookup")
        || lower.contains("name or service not known")
        || lower.contains("nodename nor servname")
    {
        NetworkFailure::Dns
    } else if lower.contains("refused") {
        NetworkFailure::ConnectionRefused
    } else if lower.contains("timed out") {
        NetworkFailure::Timeout
    } else {
        NetworkFailure::Connect
    }
}

/// reqwest hides the useful part (DNS, refused) in the source chain
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        out.push_str(": ");
        out.push_str(&inner.to_string());
        source = inner.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16, message: &str) -> LlmError {
        LlmError::Api {
            provider: Provider::OpenAi,
            status,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_retryable_statuses() {
        for status in [429, 500, 502, 503] {
            assert_eq!(api(status, "boom").classify(), ErrorClass::Retryable, "{status}");
        }
    }

    #[test]
    fn test_fatal_statuses() {
        for status in [400, 401, 403] {
            let err = api(status, "nope");
            assert_eq!(err.classify(), ErrorClass::Fatal, "{status}");
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn test_status_wins_over_message() {
        assert_eq!(api(401, "quota exceeded").classify(), ErrorClass::Fatal);
    }

    #[test]
    fn test_quota_and_rate_limit_messages() {
        assert_eq!(api(409, "You exceeded your current QUOTA").classify(), ErrorClass::Retryable);
        assert_eq!(api(418, "Rate Limit reached").classify(), ErrorClass::Retryable);
        assert_eq!(api(499, "RESOURCE_EXHAUSTED").classify(), ErrorClass::Retryable);
    }

    #[test]
    fn test_unclassified_defaults_to_retryable() {
        let err = api(504, "gateway timeout from upstream");
        assert_eq!(err.classify(), ErrorClass::Unclassified);
        assert!(err.is_retryable());

        let err = LlmError::InvalidResponse {
            provider: Provider::Google,
            message: "expected value at line 1".to_string(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_network_failures_are_retryable() {
        for kind in [
            NetworkFailure::Dns,
            NetworkFailure::ConnectionRefused,
            NetworkFailure::Timeout,
            NetworkFailure::Connect,
        ] {
            let err = LlmError::Network {
                provider: Provider::Anthropic,
                kind,
                message: "x".to_string(),
            };
            assert_eq!(err.classify(), ErrorClass::Retryable);
        }
    }

    #[test]
    fn test_missing_credential_is_fatal() {
        let err = LlmError::MissingCredential {
            provider: Provider::Anthropic,
        };
        assert_eq!(err.classify(), ErrorClass::Fatal);
        assert_eq!(err.to_string(), "anthropic API key is not configured");
    }

    #[test]
    fn test_gemini_blocks() {
        let truncated = LlmError::Blocked {
            provider: Provider::Google,
            reason: BlockReason::MaxTokens,
        };
        assert_eq!(truncated.classify(), ErrorClass::Retryable);
        assert!(truncated.to_string().contains("max output length reached"));

        let safety = LlmError::Blocked {
            provider: Provider::Google,
            reason: BlockReason::Safety,
        };
        assert_eq!(safety.classify(), ErrorClass::Unclassified);
        assert!(safety.to_string().contains("safety"));
    }

    #[test]
    fn test_block_reason_from_finish_reason() {
        assert_eq!(BlockReason::from_finish_reason(None), None);
        assert_eq!(BlockReason::from_finish_reason(Some("STOP")), None);
        assert_eq!(
            BlockReason::from_finish_reason(Some("MAX_TOKENS")),
            Some(BlockReason::MaxTokens)
        );
        assert_eq!(
            BlockReason::from_finish_reason(Some("SAFETY")),
            Some(BlockReason::Safety)
        );
        assert_eq!(
            BlockReason::from_finish_reason(Some("RECITATION")),
            Some(BlockReason::Recitation)
        );
        assert_eq!(
            BlockReason::from_finish_reason(Some("LANGUAGE")),
            Some(BlockReason::Other("LANGUAGE".to_string()))
        );
    }

    #[test]
    fn test_no_candidates_display() {
        let err = LlmError::NoCandidates {
            provider: Provider::Google,
            block_reason: Some("SAFETY".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "google returned no candidates (block reason: SAFETY)"
        );
    }

    #[test]
    fn test_chain_exhausted_names_last_attempt() {
        let err = LlmError::ChainExhausted {
            attempts: 3,
            provider: Provider::Anthropic,
            model: "claude-3-5-haiku-latest".to_string(),
            source: Box::new(api(503, "overloaded")),
        };
        let text = err.to_string();
        assert!(text.contains("anthropic/claude-3-5-haiku-latest"));
        assert!(text.contains("overloaded"));
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.provider(), Some(Provider::Anthropic));
    }

    #[test]
    fn test_classify_connect_messages() {
        assert_eq!(
            classify_connect("error sending request: dns error: failed to lookup address"),
            NetworkFailure::Dns
        );
        assert_eq!(
            classify_connect("tcp connect error: Connection refused (os error 111)"),
            NetworkFailure::ConnectionRefused
        );
        assert_eq!(classify_connect("something else"), NetworkFailure::Connect);
    }
}
