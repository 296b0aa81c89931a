// =============================================================================
// Auto-Analysis Registry
// =============================================================================
//
// Records which symbols a client asked to have analysed on an interval. The
// engine itself runs no scheduler; the registry is the source of truth that
// an external poller reads.
// =============================================================================

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{EngineError, EngineResult};

pub const MIN_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoAnalysisSession {
    pub symbol: String,
    pub interval_secs: u64,
    pub started_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct AutoAnalysisRegistry {
    sessions: RwLock<HashMap<String, AutoAnalysisSession>>,
}

impl AutoAnalysisRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart with a new interval) a session for `symbol`.
    pub fn start(&self, symbol: &str, interval_secs: u64) -> EngineResult<AutoAnalysisSession> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(EngineError::invalid("symbol is required"));
        }
        if interval_secs < MIN_INTERVAL_SECS {
            return Err(EngineError::invalid(format!(
                "interval must be at least {MIN_INTERVAL_SECS}s, got {interval_secs}s"
            )));
        }

        let session = AutoAnalysisSession {
            symbol: symbol.clone(),
            interval_secs,
            started_at: Utc::now(),
        };
        self.sessions.write().insert(symbol.clone(), session.clone());
        info!(symbol = %symbol, interval_secs, "auto-analysis started");
        Ok(session)
    }

    pub fn stop(&self, symbol: &str) -> EngineResult<AutoAnalysisSession> {
        let symbol = symbol.trim().to_uppercase();
        let removed = self
            .sessions
            .write()
            .remove(&symbol)
            .ok_or_else(|| EngineError::NotFound(format!("auto-analysis for {symbol}")))?;
        info!(symbol = %symbol, "auto-analysis stopped");
        Ok(removed)
    }

    /// Active sessions sorted by symbol.
    pub fn list(&self) -> Vec<AutoAnalysisSession> {
        let mut out: Vec<_> = self.sessions.read().values().cloned().collect();
        out.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        out
    }
}
