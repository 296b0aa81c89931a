// =============================================================================
// Central Application State — Confluence Engine
// =============================================================================
//
// Ties the factor book, collaborators and configuration together behind one
// `Arc<AppState>` shared by every request handler.
//
// Thread safety:
//   - Atomic counter for lock-free version tracking.
//   - parking_lot::RwLock for every mutable shared collection.
//   - Collaborators are trait objects that manage their own interior
//     mutability.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;

use crate::factors::FactorBook;
use crate::fusion::SignalFusionEngine;
use crate::market_data::QuoteSource;
use crate::notify::NotificationChannel;
use crate::runtime_config::RuntimeConfig;
use crate::sessions::AutoAnalysisRegistry;
use crate::store::SignalStore;
use crate::volatility::VolatilityModel;

// =============================================================================
// Error Record
// =============================================================================

/// A recorded error event, surfaced on `/health`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    /// Machine-readable code (see `EngineError::code`).
    pub code: Option<String>,
    /// ISO 8601 timestamp.
    pub at: String,
}

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

// =============================================================================
// AppState
// =============================================================================

pub struct AppState {
    /// Incremented on every factor or store mutation.
    pub state_version: AtomicU64,

    pub runtime_config: Arc<RwLock<RuntimeConfig>>,

    // ── Engine ──────────────────────────────────────────────────────────
    pub factors: FactorBook,
    pub fusion: SignalFusionEngine,
    pub volatility: VolatilityModel,

    // ── Collaborators ───────────────────────────────────────────────────
    pub quote_source: Arc<dyn QuoteSource>,
    pub store: Arc<dyn SignalStore>,
    pub notifier: Arc<dyn NotificationChannel>,
    pub sessions: AutoAnalysisRegistry,

    pub recent_errors: RwLock<Vec<ErrorRecord>>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        config: RuntimeConfig,
        quote_source: Arc<dyn QuoteSource>,
        store: Arc<dyn SignalStore>,
        notifier: Arc<dyn NotificationChannel>,
    ) -> Result<Self> {
        let factors = FactorBook::new().context("factor presets are inconsistent")?;
        config.fusion.validate().context("invalid fusion config")?;

        Ok(Self {
            state_version: AtomicU64::new(1),
            fusion: SignalFusionEngine::new(config.fusion.clone()),
            volatility: VolatilityModel::new(config.volatility.clone()),
            runtime_config: Arc::new(RwLock::new(config)),
            factors,
            quote_source,
            store,
            notifier,
            sessions: AutoAnalysisRegistry::new(),
            recent_errors: RwLock::new(Vec::new()),
            start_time: std::time::Instant::now(),
        })
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Record an error with an optional machine-readable code. The ring
    /// buffer is capped at [`MAX_RECENT_ERRORS`].
    pub fn push_error_with_code(&self, msg: String, code: Option<String>) {
        let record = ErrorRecord {
            message: msg,
            code,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
    }

    // ── Health ──────────────────────────────────────────────────────────

    pub fn build_health(&self) -> HealthSnapshot {
        let config = self.runtime_config.read();
        HealthSnapshot {
            status: "ok",
            uptime_secs: self.start_time.elapsed().as_secs(),
            source: self.quote_source.name().to_string(),
            notifier: self.notifier.name().to_string(),
            state_version: self.current_state_version(),
            symbols: config.symbols.clone(),
            active_sessions: self.sessions.list().len(),
            stored_signals: self.store.len(),
            recent_errors: self.recent_errors.read().clone(),
            server_time: Utc::now().timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub source: String,
    pub notifier: String,
    pub state_version: u64,
    pub symbols: Vec<String>,
    pub active_sessions: usize,
    pub stored_signals: usize,
    pub recent_errors: Vec<ErrorRecord>,
    pub server_time: i64,
}
