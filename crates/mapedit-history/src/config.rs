//! Edit session configuration

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Tunables for an editing session. Every field has a default, so an empty
/// TOML file is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditConfig {
    /// Length of an eased transition driven by `perform_async`.
    pub transition_duration_ms: u64,
    /// Delay between two frames of a transition.
    pub frame_interval_ms: u64,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
    /// Directory (relative to the project root) holding the history backup.
    pub backup_dir: String,
}

impl Default for EditConfig {
    fn default() -> Self {
        EditConfig {
            transition_duration_ms: 150,
            frame_interval_ms: 16,
            event_capacity: 1024,
            backup_dir: ".mapedit".to_string(),
        }
    }
}

impl EditConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&text)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn transition_duration(&self) -> Duration {
        Duration::from_millis(self.transition_duration_ms)
    }

    /// Never zero, so a transition loop always makes progress.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}
