//! Application configuration, persisted as TOML.
//!
//! Covers the knobs the ledger and guard need: where data lives, the
//! retention limits, the store byte budget, and where quota-fallback
//! exports land. Every field has a serde default so a partial config
//! file keeps working across versions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::ledger::{MAX_PINNED, MAX_TOTAL, RetentionPolicy};
use crate::store::mem::DEFAULT_CAPACITY_BYTES;

/// Result type for config operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Augur settings, persisted as TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AugurConfig {
    /// Data directory for the durable store. `None` for memory-only mode.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Maximum stored run records, pinned included.
    #[serde(default = "default_max_total")]
    pub max_total: usize,
    /// Maximum pinned records exempt from pruning.
    #[serde(default = "default_max_pinned")]
    pub max_pinned: usize,
    /// Byte budget enforced by the store backends.
    #[serde(default = "default_store_capacity_bytes")]
    pub store_capacity_bytes: u64,
    /// Directory for quota-fallback scenario exports.
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
}

fn default_max_total() -> usize {
    MAX_TOTAL
}
fn default_max_pinned() -> usize {
    MAX_PINNED
}
fn default_store_capacity_bytes() -> u64 {
    DEFAULT_CAPACITY_BYTES
}
fn default_export_dir() -> PathBuf {
    PathBuf::from("exports")
}

impl Default for AugurConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            max_total: default_max_total(),
            max_pinned: default_max_pinned(),
            store_capacity_bytes: default_store_capacity_bytes(),
            export_dir: default_export_dir(),
        }
    }
}

impl AugurConfig {
    /// Check the retention fields for consistency.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_total == 0 || self.max_pinned == 0 {
            return Err(ConfigError::Invalid {
                message: "max_total and max_pinned must be > 0".into(),
            });
        }
        if self.max_pinned > self.max_total {
            return Err(ConfigError::Invalid {
                message: format!(
                    "max_pinned ({}) must not exceed max_total ({})",
                    self.max_pinned, self.max_total
                ),
            });
        }
        Ok(())
    }

    /// The retention policy these settings describe.
    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy {
            max_total: self.max_total,
            max_pinned: self.max_pinned,
        }
    }

    /// Load from a TOML file.
    pub fn load(path: &std::path::Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &std::path::Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }
}
