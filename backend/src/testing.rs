// Test doubles shared by unit tests across modules.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;

use crate::app_state::AppState;
use crate::error::{EngineError, EngineResult};
use crate::market_data::{Quote, QuoteSource};
use crate::notify::NotificationChannel;
use crate::runtime_config::RuntimeConfig;
use crate::signals::EnhancedSignal;
use crate::store::MemoryStore;
use crate::types::Bias;

/// Serves fixed `(price, change_percent)` pairs; anything else is unavailable.
/// Quote sentiment is neutral unless scripted.
#[derive(Default)]
pub struct ScriptedSource {
    quotes: HashMap<String, (f64, f64)>,
    sentiments: HashMap<String, Bias>,
    pub calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, symbol: &str, price: f64, change_percent: f64) -> Self {
        self.quotes.insert(symbol.to_string(), (price, change_percent));
        self
    }

    pub fn with_sentiment(mut self, symbol: &str, sentiment: Bias) -> Self {
        self.sentiments.insert(symbol.to_string(), sentiment);
        self
    }
}

#[async_trait::async_trait]
impl QuoteSource for ScriptedSource {
    async fn fetch_quote(&self, symbol: &str) -> EngineResult<Quote> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (price, change_percent) = self
            .quotes
            .get(symbol)
            .copied()
            .ok_or_else(|| EngineError::unavailable(format!("no script for {symbol}")))?;
        Ok(Quote {
            symbol: symbol.to_string(),
            price,
            change: price * change_percent / 100.0,
            change_percent,
            sentiment: self.sentiments.get(symbol).copied().unwrap_or_default(),
            source: "scripted".to_string(),
            timestamp: Utc::now(),
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Keeps every alert it is handed.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: RwLock<Vec<EnhancedSignal>>,
}

#[async_trait::async_trait]
impl NotificationChannel for RecordingNotifier {
    async fn notify(&self, signal: &EnhancedSignal) -> EngineResult<()> {
        self.sent.write().push(signal.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

pub fn state_with(source: Arc<dyn QuoteSource>, notifier: Arc<RecordingNotifier>) -> Arc<AppState> {
    let config = RuntimeConfig {
        source_timeout_secs: 1,
        ..RuntimeConfig::default()
    };
    Arc::new(
        AppState::new(config, source, Arc::new(MemoryStore::new()), notifier)
            .expect("test state"),
    )
}
