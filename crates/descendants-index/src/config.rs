//! Descendants index settings.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

pub const DESCENDANTS_SETTINGS_FILENAME: &str = "descendants.json";

/// Named toggles and thresholds read by the index and its store adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescendantsSettings {
    /// Bulk scopes that queue more actions than this rebuild instead of replaying.
    pub rebuild_threshold: usize,
    /// Turns closure-table maintenance off entirely.
    pub fast_query_descendants_disabled: bool,
    /// Busy timeout of the SQLite adapter. Not used on the lock paths.
    pub command_timeout_secs: u64,
    /// Hand deleted items to the blob cleanup hook.
    pub remove_unused_blobs_on_save: bool,
    pub retry: RetrySettings,
}

impl Default for DescendantsSettings {
    fn default() -> Self {
        Self {
            rebuild_threshold: 100,
            fast_query_descendants_disabled: false,
            command_timeout_secs: 300,
            remove_unused_blobs_on_save: true,
            retry: RetrySettings::default(),
        }
    }
}

impl DescendantsSettings {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts, including the first one.
    pub repeat_number: u32,
    /// Wait between attempts.
    pub interval_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            repeat_number: 6,
            interval_ms: 2_000,
        }
    }
}

impl RetrySettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Loads settings from a JSON file, falling back to defaults when it is absent.
pub fn load_settings(path: &Path) -> Result<DescendantsSettings> {
    if !path.exists() {
        return Ok(DescendantsSettings::default());
    }

    let data = std::fs::read_to_string(path)?;
    serde_json::from_str(&data).map_err(|error| {
        IndexError::Serialization(format!(
            "failed to parse descendants settings {}: {error}",
            path.display()
        ))
    })
}
