// =============================================================================
// Runtime Configuration — engine settings with atomic save
// =============================================================================
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// Secrets (Telegram token, chat id) are read from the environment only and
// never written here.
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::fusion::FusionConfig;
use crate::volatility::VolatilityConfig;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbols() -> Vec<String> {
    vec![
        "XAUUSD".to_string(),
        "EURUSD".to_string(),
        "GBPUSD".to_string(),
        "USDJPY".to_string(),
    ]
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_source_timeout_secs() -> u64 {
    10
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Watch-list analysed by the market sentiment endpoint.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Address the HTTP API binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Deadline for every upstream quote fetch.
    #[serde(default = "default_source_timeout_secs")]
    pub source_timeout_secs: u64,

    /// Base URL of the JSON quote endpoint. Without one, every fetch fails
    /// and signals are returned unenhanced.
    #[serde(default)]
    pub quote_url: Option<String>,

    /// Journal file for stored signals. In-memory only when unset.
    #[serde(default)]
    pub store_path: Option<String>,

    #[serde(default)]
    pub fusion: FusionConfig,

    #[serde(default)]
    pub volatility: VolatilityConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            bind_addr: default_bind_addr(),
            source_timeout_secs: default_source_timeout_secs(),
            quote_url: None,
            store_path: None,
            fusion: FusionConfig::default(),
            volatility: VolatilityConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        config
            .fusion
            .validate()
            .with_context(|| format!("invalid fusion settings in {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            tp_multipliers = ?config.fusion.tp_multipliers,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs.max(1))
    }

    /// Apply `CONFLUENCE_*` environment overrides.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(syms) = lookup("CONFLUENCE_SYMBOLS") {
            self.symbols = syms
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if self.symbols.is_empty() {
            self.symbols = default_symbols();
        }
        if let Some(addr) = lookup("CONFLUENCE_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(url) = lookup("CONFLUENCE_QUOTE_URL").filter(|u| !u.trim().is_empty()) {
            self.quote_url = Some(url);
        }
        if let Some(path) = lookup("CONFLUENCE_STORE_PATH").filter(|p| !p.trim().is_empty()) {
            self.store_path = Some(path);
        }
    }
}
