//! Persistence layer.
//!
//! Saves and loads the sell-target record to/from a JSON file. This is
//! the only durable state in the system: the BUY phase writes it, the
//! SELL phase reads it, and losing it means the bot no longer knows the
//! price at which the position was opened.
//!
//! Writes go to a sibling temp file followed by an atomic rename, so a
//! crash mid-write can never leave a half-written record. A file that
//! fails to parse is treated as absent rather than recovered.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::types::PersistedState;

/// Default state file path.
const DEFAULT_STATE_FILE: &str = "sideways_state.json";

/// Durable single-record store for the persisted sell target.
#[derive(Debug, Clone)]
pub struct PriceStore {
    path: PathBuf,
}

impl PriceStore {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path: path.unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted sell target.
    ///
    /// Returns `None` if the file doesn't exist or doesn't parse. A
    /// corrupt record is not worth partial recovery; the engine treats
    /// both the same way.
    pub fn read(&self) -> Result<Option<PersistedState>> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "No saved sell target found");
            return Ok(None);
        }

        let json = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read state from {}", self.path.display()))?;

        match serde_json::from_str::<PersistedState>(&json) {
            Ok(state) => {
                debug!(
                    path = %self.path.display(),
                    sell_price = %state.sell_price,
                    "Sell target loaded from disk"
                );
                Ok(Some(state))
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "State file corrupt, treating as absent"
                );
                Ok(None)
            }
        }
    }

    /// Persist the sell target, replacing any prior record atomically.
    pub fn write(&self, state: &PersistedState) -> Result<()> {
        let json = serde_json::to_string_pretty(state)
            .context("Failed to serialise sell target")?;

        // Same directory as the target so the rename stays on one filesystem.
        let tmp = self.tmp_path();
        fs::write(&tmp, &json)
            .with_context(|| format!("Failed to write state to {}", tmp.display()))?;
        fs::rename(&tmp, &self.path).with_context(|| {
            format!(
                "Failed to move state into place at {}",
                self.path.display()
            )
        })?;

        debug!(
            path = %self.path.display(),
            sell_price = %state.sell_price,
            "Sell target saved"
        );
        Ok(())
    }

    /// Delete the state file (for testing or reset).
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).with_context(|| {
                format!("Failed to delete state file {}", self.path.display())
            })?;
        }
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
