//! Configuration for the chat backend
//!
//! Values come from an optional TOML file (`~/.folio/config.toml`) with the
//! process environment layered on top. Nothing here is required: missing
//! credentials only fail the vendor that needs them, at call time.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::providers::{Provider, anthropic, google, openai};
use crate::usage::ModelPricing;

pub const ENV_MODEL: &str = "CHAT_MODEL";
pub const ENV_FALLBACK_MODELS: &str = "CHAT_FALLBACK_MODELS";
pub const ENV_MAX_ATTEMPTS: &str = "CHAT_MAX_ATTEMPTS";
pub const ENV_TIME_BUDGET_SECS: &str = "CHAT_TIME_BUDGET_SECS";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "CHAT_REQUEST_TIMEOUT_SECS";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Process-wide default model, used when a call names none
    pub default_model: Option<String>,
    /// Ordered fallback models; `None` means use the built-in defaults
    pub fallback_models: Option<Vec<String>>,
    pub openai: VendorConfig,
    pub anthropic: VendorConfig,
    pub google: VendorConfig,
    /// Stop after this many attempts even if candidates remain
    pub max_attempts: Option<usize>,
    /// Stop starting new attempts once this much time has passed
    pub time_budget_secs: Option<u64>,
    /// Transport timeout for a single vendor call
    pub request_timeout_secs: u64,
    /// Extra or overriding prices for usage logging, keyed by model prefix
    pub model_prices: HashMap<String, ModelPricing>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_model: None,
            fallback_models: None,
            openai: VendorConfig::default(),
            anthropic: VendorConfig::default(),
            google: VendorConfig::default(),
            max_attempts: None,
            time_budget_secs: None,
            request_timeout_secs: default_request_timeout_secs(),
            model_prices: HashMap::new(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    60
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VendorConfig {
    pub api_key: String,
    /// Override the vendor endpoint root (proxies, tests)
    pub base_url: Option<String>,
}

impl std::fmt::Debug for VendorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VendorConfig")
            .field("api_key", &mask_secret(&self.api_key))
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Environment variable names for one vendor's key and endpoint
struct VendorEnv {
    api_key: &'static str,
    base_url: &'static str,
}

fn vendor_env(provider: Provider) -> VendorEnv {
    match provider {
        Provider::OpenAi => VendorEnv {
            api_key: "OPENAI_API_KEY",
            base_url: "OPENAI_BASE_URL",
        },
        Provider::Anthropic => VendorEnv {
            api_key: "ANTHROPIC_API_KEY",
            base_url: "ANTHROPIC_BASE_URL",
        },
        Provider::Google => VendorEnv {
            api_key: "GOOGLE_AI_API_KEY",
            base_url: "GOOGLE_AI_BASE_URL",
        },
    }
}

impl LlmConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by an arbitrary lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::default().with_overrides(lookup)
    }

    /// Load the config file (explicit path, or the default location if it
    /// exists), then apply the process environment.
    pub fn load(custom_path: Option<&Path>) -> Result<Self> {
        let base = match custom_path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = config_dir().join("config.toml");
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };
        Ok(base.with_overrides(|key| std::env::var(key).ok()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config at {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        // Expand environment variables before parsing
        let expanded = expand_env_vars(content);
        let config: Self = toml::from_str(&expanded)?;

        for provider in Provider::ALL {
            let key = &config.vendor(provider).api_key;
            if !key.is_empty() && !content.contains(&format!("${{{}}}", vendor_env(provider).api_key)) {
                warn!(
                    "{} API key is hardcoded in config file. For security, use environment variables: api_key = \"${{{}}}\"",
                    provider,
                    vendor_env(provider).api_key
                );
            }
        }

        Ok(config)
    }

    /// Apply overrides from a key lookup. Empty values count as unset.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(model) = get(ENV_MODEL) {
            self.default_model = Some(model);
        }
        if let Some(raw) = get(ENV_FALLBACK_MODELS) {
            self.fallback_models = parse_fallback_list(&raw);
        }
        for provider in Provider::ALL {
            let env = vendor_env(provider);
            let vendor = self.vendor_mut(provider);
            if let Some(key) = get(env.api_key) {
                vendor.api_key = key;
            }
            if let Some(url) = get(env.base_url) {
                vendor.base_url = Some(url);
            }
        }
        if let Some(n) = get(ENV_MAX_ATTEMPTS).and_then(|v| parse_positive(ENV_MAX_ATTEMPTS, &v)) {
            self.max_attempts = Some(n as usize);
        }
        if let Some(secs) = get(ENV_TIME_BUDGET_SECS).and_then(|v| parse_positive(ENV_TIME_BUDGET_SECS, &v)) {
            self.time_budget_secs = Some(secs);
        }
        if let Some(secs) =
            get(ENV_REQUEST_TIMEOUT_SECS).and_then(|v| parse_positive(ENV_REQUEST_TIMEOUT_SECS, &v))
        {
            self.request_timeout_secs = secs;
        }
        self
    }

    pub fn vendor(&self, provider: Provider) -> &VendorConfig {
        match provider {
            Provider::OpenAi => &self.openai,
            Provider::Anthropic => &self.anthropic,
            Provider::Google => &self.google,
        }
    }

    fn vendor_mut(&mut self, provider: Provider) -> &mut VendorConfig {
        match provider {
            Provider::OpenAi => &mut self.openai,
            Provider::Anthropic => &mut self.anthropic,
            Provider::Google => &mut self.google,
        }
    }

    /// Endpoint root for a vendor, falling back to its public API
    pub fn base_url(&self, provider: Provider) -> String {
        self.vendor(provider).base_url.clone().unwrap_or_else(|| {
            match provider {
                Provider::OpenAi => openai::DEFAULT_BASE_URL,
                Provider::Anthropic => anthropic::DEFAULT_BASE_URL,
                Provider::Google => google::DEFAULT_BASE_URL,
            }
            .to_string()
        })
    }
}

/// Parse the fallback list: a JSON array of model names.
///
/// Anything that is not a JSON array yields `None` so the built-in defaults
/// apply. Non-string and blank entries are skipped.
pub fn parse_fallback_list(raw: &str) -> Option<Vec<String>> {
    let values: Vec<serde_json::Value> = match serde_json::from_str(raw) {
        Ok(values) => values,
        Err(e) => {
            warn!(
                "{} is not a JSON array of model names ({}); using default fallbacks",
                ENV_FALLBACK_MODELS, e
            );
            return None;
        }
    };

    let models = values
        .into_iter()
        .filter_map(|value| match value {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            other => {
                warn!("Skipping invalid fallback model entry: {}", other);
                None
            }
        })
        .collect();
    Some(models)
}

fn parse_positive(key: &str, value: &str) -> Option<u64> {
    match value.parse::<u64>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            warn!("Ignoring {}={:?}: expected a positive integer", key, value);
            None
        }
    }
}

/// Mask a secret string for safe display in Debug output / logs.
/// Shows first 3 and last 4 chars for keys longer than 7 chars, otherwise "***".
pub fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "(empty)".to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() > 7 {
        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", prefix, suffix)
    } else {
        "***".to_string()
    }
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".folio")
}

/// Environment variables a config file may reference as `${NAME}`
const ALLOWED_ENV_VARS: &[&str] = &[
    "OPENAI_API_KEY",
    "ANTHROPIC_API_KEY",
    "GOOGLE_AI_API_KEY",
    "OPENAI_BASE_URL",
    "ANTHROPIC_BASE_URL",
    "GOOGLE_AI_BASE_URL",
    "CHAT_MODEL",
];

fn expand_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        let var_name = &rest[start + 2..start + len];
        result.push_str(&rest[..start]);
        if ALLOWED_ENV_VARS.contains(&var_name) {
            result.push_str(&std::env::var(var_name).unwrap_or_default());
        } else {
            warn!(
                "Skipping expansion of unrecognized env var '{}' in config (not in allowlist)",
                var_name
            );
            // Leave the ${VAR} unexpanded so it's obvious
            result.push_str(&rest[start..start + len + 1]);
        }
        rest = &rest[start + len + 1..];
    }
    result.push_str(rest);
    result
}
