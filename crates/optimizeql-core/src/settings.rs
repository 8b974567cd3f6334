//! Runtime settings: model selection, timeouts and limits

use crate::{OptimizeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_PROVIDER: &str = "openrouter";
pub const DEFAULT_MODEL: &str = "meta-llama/llama-3.3-70b-instruct:free";
pub const MAX_COMPARE_ROW_LIMIT: usize = 1000;

/// Per-provider overrides from the `[providers.<name>]` tables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

/// Settings consumed by the analysis pipeline.
///
/// Every value is read once when a request starts and passed down explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub llm_provider: String,
    pub llm_model: String,
    pub llm_max_tokens: u32,
    pub explain_timeout_ms: u64,
    pub compare_timeout_ms: u64,
    pub compare_row_limit: usize,
    pub max_query_length: usize,
    pub providers: HashMap<String, ProviderSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            llm_provider: DEFAULT_PROVIDER.to_string(),
            llm_model: DEFAULT_MODEL.to_string(),
            llm_max_tokens: 4096,
            explain_timeout_ms: 10_000,
            compare_timeout_ms: 30_000,
            compare_row_limit: 100,
            max_query_length: 50_000,
            providers: HashMap::new(),
        }
    }
}

impl Settings {
    /// Default location: `<config dir>/optimizeql/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("optimizeql").join("config.toml"))
    }

    /// Load settings from `path`, or from the default location.
    ///
    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => path,
            None => return Ok(Self::default()),
        };

        if !path.exists() {
            tracing::debug!(path = %path.display(), "settings file not found, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path)?;
        let settings = Self::from_toml(&contents)
            .map_err(|e| OptimizeError::Configuration(format!("{}: {}", path.display(), e)))?;
        tracing::info!(path = %path.display(), provider = %settings.llm_provider, "settings loaded");
        Ok(settings)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| OptimizeError::Configuration(e.to_string()))
    }

    /// Overrides for `provider`, if any were configured
    pub fn provider(&self, provider: &str) -> Option<&ProviderSettings> {
        self.providers.get(provider)
    }

    /// API key for `provider`: the configured value, else `<PROVIDER>_API_KEY`
    pub fn api_key(&self, provider: &str) -> Option<String> {
        self.provider(provider)
            .and_then(|p| p.api_key.clone())
            .filter(|k| !k.is_empty())
            .or_else(|| {
                let var = format!("{}_API_KEY", provider.to_ascii_uppercase());
                std::env::var(var).ok().filter(|k| !k.is_empty())
            })
    }

    /// Model for `provider`: its own override, else the global `llm_model`
    pub fn model_for(&self, provider: &str) -> String {
        self.provider(provider)
            .and_then(|p| p.model.clone())
            .unwrap_or_else(|| self.llm_model.clone())
    }

    /// Reject statements longer than `max_query_length` characters
    pub fn check_query_length(&self, sql: &str) -> Result<()> {
        let len = sql.chars().count();
        if len > self.max_query_length {
            return Err(OptimizeError::Configuration(format!(
                "SQL is {} characters long; the limit is {}",
                len, self.max_query_length
            )));
        }
        Ok(())
    }
}

/// Clamp a requested comparison row limit to `1..=1000`
pub fn clamp_row_limit(row_limit: usize) -> usize {
    row_limit.clamp(1, MAX_COMPARE_ROW_LIMIT)
}
