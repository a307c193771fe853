//! Scenario persistence guard: quota-aware bulk saves with export fallback.
//!
//! Scenario documents are the user's editable work, so unlike the run
//! ledger they are never pruned or truncated behind the user's back. A
//! quota failure instead exports the full payload to a file and reports
//! `quota_exceeded` so the UI layer can inform the user.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ScenarioError;
use crate::model::{GraphSnapshot, now_millis};
use crate::store::KeyValueStore;

/// The one namespaced key holding the scenario document.
pub const SCENARIOS_KEY: &str = "augur:scenarios";

/// Usage fraction above which a warning is emitted.
pub const WARN_THRESHOLD_PCT: f64 = 80.0;
/// Usage fraction above which storage is reported unhealthy.
pub const CRITICAL_THRESHOLD_PCT: f64 = 90.0;

/// Result type for scenario operations.
pub type ScenarioResult<T> = std::result::Result<T, ScenarioError>;

/// A saved decision-graph document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: String,
    pub name: String,
    pub created_at: u64,
    pub updated_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<GraphSnapshot>,
}

/// The persisted (and exported) scenario document.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScenarioDocument<'a> {
    scenarios: &'a [Scenario],
    current_scenario_id: Option<&'a str>,
}

/// Outcome of a guarded scenario save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub success: bool,
    pub quota_exceeded: bool,
    /// Where the payload was exported when the store rejected it.
    pub export_path: Option<PathBuf>,
}

/// Storage health report derived from the store's quota query.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageHealth {
    pub healthy: bool,
    /// Used fraction in percent; `None` when the quota API is unavailable.
    pub percentage: Option<f64>,
    pub warnings: Vec<String>,
}

/// Wraps bulk scenario persistence with quota detection and fallback.
pub struct ScenarioGuard {
    store: Arc<dyn KeyValueStore>,
    export_dir: PathBuf,
}

impl ScenarioGuard {
    pub fn new(store: Arc<dyn KeyValueStore>, export_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            export_dir: export_dir.into(),
        }
    }

    /// Persist the full scenario document.
    ///
    /// On quota exhaustion the payload is exported to a timestamped file
    /// instead — no truncated retries, scenario data is not prunable
    /// without user consent — and the outcome reports `quota_exceeded`.
    /// Non-quota store failures propagate.
    pub fn save_scenarios(
        &self,
        scenarios: &[Scenario],
        current_scenario_id: Option<&str>,
    ) -> ScenarioResult<SaveOutcome> {
        let document = ScenarioDocument {
            scenarios,
            current_scenario_id,
        };
        let payload =
            serde_json::to_string_pretty(&document).map_err(|e| ScenarioError::Serialize {
                message: e.to_string(),
            })?;

        match self.store.set(SCENARIOS_KEY, &payload) {
            Ok(()) => Ok(SaveOutcome {
                success: true,
                quota_exceeded: false,
                export_path: None,
            }),
            Err(e) if e.is_quota_exceeded() => {
                tracing::warn!(
                    scenarios = scenarios.len(),
                    "scenario save exceeded quota, exporting to file"
                );
                let export_path = self.export_fallback(&payload)?;
                Ok(SaveOutcome {
                    success: false,
                    quota_exceeded: true,
                    export_path: Some(export_path),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Load the stored scenario document, if any.
    ///
    /// Corrupt payloads recover to an empty list with a warning, same
    /// policy as the run ledger.
    pub fn load_scenarios(&self) -> (Vec<Scenario>, Option<String>) {
        let payload = match self.store.get(SCENARIOS_KEY) {
            Ok(Some(payload)) => payload,
            Ok(None) => return (Vec::new(), None),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read scenarios, starting empty");
                return (Vec::new(), None);
            }
        };
        match serde_json::from_str::<serde_json::Value>(&payload) {
            Ok(doc) => {
                let scenarios = doc
                    .get("scenarios")
                    .and_then(|v| serde_json::from_value(v.clone()).ok())
                    .unwrap_or_default();
                let current = doc
                    .get("currentScenarioId")
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                (scenarios, current)
            }
            Err(e) => {
                tracing::warn!(error = %e, "corrupt scenario payload, starting empty");
                (Vec::new(), None)
            }
        }
    }

    /// Read quota usage and derive a health report.
    ///
    /// Unhealthy above the critical threshold or when the backend cannot
    /// measure usage at all.
    pub fn check_storage_health(&self) -> StorageHealth {
        let usage = match self.store.quota() {
            Ok(Some(usage)) => usage,
            Ok(None) => {
                return StorageHealth {
                    healthy: false,
                    percentage: None,
                    warnings: vec!["storage quota API unavailable".to_string()],
                };
            }
            Err(e) => {
                return StorageHealth {
                    healthy: false,
                    percentage: None,
                    warnings: vec![format!("storage quota query failed: {e}")],
                };
            }
        };

        let pct = usage.percentage();
        let mut warnings = Vec::new();
        if pct > CRITICAL_THRESHOLD_PCT {
            warnings.push(format!(
                "storage critically full ({pct:.0}% used) — saves may start failing"
            ));
        } else if pct > WARN_THRESHOLD_PCT {
            warnings.push(format!("storage {pct:.0}% used"));
        }

        StorageHealth {
            healthy: pct <= CRITICAL_THRESHOLD_PCT,
            percentage: Some(pct),
            warnings,
        }
    }

    /// Write the full payload to a timestamped file in the export directory.
    fn export_fallback(&self, payload: &str) -> ScenarioResult<PathBuf> {
        std::fs::create_dir_all(&self.export_dir).map_err(|e| ScenarioError::ExportWrite {
            path: self.export_dir.display().to_string(),
            source: e,
        })?;
        let path = self
            .export_dir
            .join(format!("augur-scenarios-{}.json", now_millis()));
        std::fs::write(&path, payload).map_err(|e| ScenarioError::ExportWrite {
            path: path.display().to_string(),
            source: e,
        })?;
        tracing::info!(path = %path.display(), "exported scenario payload");
        Ok(path)
    }

    /// The directory export fallbacks are written to.
    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }
}
