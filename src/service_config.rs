// =============================================================================
// Service Configuration — JSON file + environment overrides
// =============================================================================
//
// All fields carry `#[serde(default)]` so that a partial (or empty) config file
// still loads.  Secrets are never read from or written to the file: the chat
// API key only comes from the environment.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_market_data_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_symbol() -> String {
    "AAPL".to_string()
}

fn default_period() -> String {
    "1y".to_string()
}

fn default_interval() -> String {
    "1d".to_string()
}

fn default_chat_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_chat_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_chat_timeout_secs() -> u64 {
    60
}

// =============================================================================
// MarketDataConfig
// =============================================================================

/// Where bars are fetched from and the query defaults for the chart endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataConfig {
    #[serde(default = "default_market_data_url")]
    pub base_url: String,

    /// HTTP timeout for a single chart request.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_symbol")]
    pub default_symbol: String,

    /// Look-back range, e.g. `1y`, `6mo`, `5d`.
    #[serde(default = "default_period")]
    pub default_period: String,

    /// Bar size, e.g. `1d`, `1h`, `5m`.
    #[serde(default = "default_interval")]
    pub default_interval: String,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            base_url: default_market_data_url(),
            timeout_secs: default_timeout_secs(),
            default_symbol: default_symbol(),
            default_period: default_period(),
            default_interval: default_interval(),
        }
    }
}

// =============================================================================
// ChatConfig
// =============================================================================

/// Settings for the chat relay.  Without an API key the relay is disabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_chat_url")]
    pub base_url: String,

    #[serde(default = "default_chat_model")]
    pub model: String,

    #[serde(default = "default_chat_timeout_secs")]
    pub timeout_secs: u64,

    /// Populated from `GEMINI_API_KEY` only.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: default_chat_url(),
            model: default_chat_model(),
            timeout_secs: default_chat_timeout_secs(),
            api_key: None,
        }
    }
}

// =============================================================================
// ServiceConfig
// =============================================================================

/// Top-level configuration for the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Address the HTTP server binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default)]
    pub market_data: MarketDataConfig,

    #[serde(default)]
    pub chat: ChatConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            market_data: MarketDataConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read service config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse service config from {}", path.display()))?;

        info!(
            path = %path.display(),
            bind_addr = %config.bind_addr,
            market_data_url = %config.market_data.base_url,
            "service config loaded"
        );

        Ok(config)
    }

    /// Apply overrides from a variable lookup (normally `std::env::var`).
    ///
    /// Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(addr) = get("CHART_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(url) = get("CHART_MARKET_DATA_URL") {
            self.market_data.base_url = url;
        }
        if let Some(model) = get("GEMINI_MODEL") {
            self.chat.model = model;
        }
        self.chat.api_key = get("GEMINI_API_KEY");
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }
}
