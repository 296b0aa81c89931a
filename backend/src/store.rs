// =============================================================================
// Signal Store — append-only record of enhanced signals
// =============================================================================
//
// The in-memory store can be journaled to a JSON file. Each mutation rewrites
// the whole journal with the same tmp + rename pattern `RuntimeConfig::save`
// uses, so a crash never leaves a half-written file behind.
// =============================================================================

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::signals::EnhancedSignal;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSignal {
    pub id: String,
    pub signal: EnhancedSignal,
}

pub trait SignalStore: Send + Sync {
    /// Persist `signal` and return its freshly assigned id.
    fn append(&self, signal: EnhancedSignal) -> Result<String>;

    /// All records, newest first. The iterator owns its data.
    fn list(&self) -> Box<dyn Iterator<Item = StoredSignal> + Send>;

    fn remove(&self, id: &str) -> EngineResult<()>;

    /// Number of stored records.
    fn len(&self) -> usize;
}

pub struct MemoryStore {
    records: RwLock<Vec<StoredSignal>>,
    journal: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            journal: None,
        }
    }

    /// Open a journaled store, loading any records already on disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let records: Vec<StoredSignal> = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read signal journal {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("failed to parse signal journal {}", path.display()))?
        } else {
            Vec::new()
        };

        info!(path = %path.display(), records = records.len(), "signal journal opened");

        Ok(Self {
            records: RwLock::new(records),
            journal: Some(path),
        })
    }

    fn flush(&self, records: &[StoredSignal]) -> Result<()> {
        let Some(path) = &self.journal else {
            return Ok(());
        };

        let content = serde_json::to_string_pretty(records)
            .context("failed to serialise signal journal")?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp journal {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp journal to {}", path.display()))?;
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalStore for MemoryStore {
    fn append(&self, signal: EnhancedSignal) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let mut records = self.records.write();
        records.push(StoredSignal {
            id: id.clone(),
            signal,
        });
        if let Err(e) = self.flush(&records) {
            records.pop();
            return Err(e);
        }
        Ok(id)
    }

    fn list(&self) -> Box<dyn Iterator<Item = StoredSignal> + Send> {
        let mut snapshot: Vec<StoredSignal> = self.records.read().iter().rev().cloned().collect();
        // Stable sort keeps later inserts first among equal timestamps.
        snapshot.sort_by(|a, b| b.signal.timestamp.cmp(&a.signal.timestamp));
        Box::new(snapshot.into_iter())
    }

    fn remove(&self, id: &str) -> EngineResult<()> {
        let mut records = self.records.write();
        let idx = records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| EngineError::NotFound(format!("signal {id}")))?;
        records.remove(idx);
        if let Err(e) = self.flush(&records) {
            warn!(error = %e, id, "signal removed in memory but journal write failed");
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.records.read().len()
    }
}
