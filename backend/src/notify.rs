// =============================================================================
// Notification Channels — best-effort alerts for generated signals
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::error::{EngineError, EngineResult};
use crate::signals::EnhancedSignal;

const TELEGRAM_API: &str = "https://api.telegram.org";

#[async_trait::async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn notify(&self, signal: &EnhancedSignal) -> EngineResult<()>;

    fn name(&self) -> &str;
}

/// Plain-text alert body. No markup, so nothing needs escaping.
pub fn format_alert(signal: &EnhancedSignal) -> String {
    let mut lines = vec![
        format!("SIGNAL {} {}", signal.symbol, signal.bias.to_string().to_uppercase()),
        format!("Entry: {}", signal.entry),
        format!("TP1: {}  TP2: {}  TP3: {}", signal.tp1, signal.tp2, signal.tp3),
        format!("SL: {}", signal.sl),
        format!(
            "Confidence: {:.2}% ({} confluence)",
            signal.confidence, signal.confluence
        ),
        format!(
            "Fundamental: {} (score {:.2})",
            signal.fundamental_bias, signal.fundamental_score
        ),
        format!("Volatility: {:.0}", signal.volatility.score),
    ];
    if let Some(tf) = &signal.timeframe {
        lines.push(format!("Timeframe: {tf}"));
    }
    if let Some(pattern) = &signal.pattern {
        lines.push(format!("Pattern: {pattern}"));
    }
    lines.push(format!("Time: {}", signal.timestamp.format("%Y-%m-%d %H:%M:%S UTC")));
    lines.join("\n")
}

// =============================================================================
// Telegram
// =============================================================================

pub struct TelegramNotifier {
    token: String,
    chat_id: String,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build Telegram HTTP client")?;

        Ok(Self {
            token: token.into(),
            chat_id: chat_id.into(),
            api_base: TELEGRAM_API.to_string(),
            client,
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// The bot token is part of the URL; never log the result.
    fn send_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }
}

#[async_trait::async_trait]
impl NotificationChannel for TelegramNotifier {
    #[instrument(skip_all, fields(symbol = %signal.symbol), name = "telegram::notify")]
    async fn notify(&self, signal: &EnhancedSignal) -> EngineResult<()> {
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": format_alert(signal),
        });

        let resp = self
            .client
            .post(self.send_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::unavailable(format!("telegram: {}", e.without_url())))?;

        let status = resp.status();
        if !status.is_success() {
            warn!(%status, "telegram rejected alert");
            return Err(EngineError::unavailable(format!("telegram returned {status}")));
        }

        info!("telegram alert delivered");
        Ok(())
    }

    fn name(&self) -> &str {
        "telegram"
    }
}

// =============================================================================
// Log-only
// =============================================================================

pub struct LogNotifier;

#[async_trait::async_trait]
impl NotificationChannel for LogNotifier {
    async fn notify(&self, signal: &EnhancedSignal) -> EngineResult<()> {
        info!(
            symbol = %signal.symbol,
            bias = %signal.bias,
            confidence = signal.confidence,
            confluence = %signal.confluence,
            "signal alert"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
