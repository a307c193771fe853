//! Core data model: run records, graph snapshots, and analysis payloads.
//!
//! Field names are part of the storage contract — records persisted by
//! earlier schema versions must round-trip unchanged, so every optional
//! field tolerates absence and the analysis payload accepts any shape.

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Milliseconds since the UNIX epoch.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Generate an opaque run id: creation time plus random suffix.
pub fn generate_run_id() -> String {
    format!("run-{:x}-{:08x}", now_millis(), rand::random::<u32>())
}

// ---------------------------------------------------------------------------
// Graph snapshot
// ---------------------------------------------------------------------------

/// 2D canvas position of a node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A factor/outcome node in the decision graph.
///
/// The `id` is the sole identity used for matching across snapshots;
/// label and position are mutable without invalidating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRef {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub position: Position,
}

/// A causal edge between two nodes.
///
/// `source`/`target` are identity-defining: rewiring an edge is a
/// remove+add of ids, never an in-place modification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRef {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub belief: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<String>,
}

impl EdgeRef {
    /// Weight with the missing-field default applied.
    pub fn effective_weight(&self) -> f64 {
        self.weight.unwrap_or(1.0)
    }

    /// Belief with the missing-field default applied: the effective weight.
    pub fn effective_belief(&self) -> f64 {
        self.belief.unwrap_or_else(|| self.effective_weight())
    }
}

/// The node/edge set submitted for one analysis.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub nodes: Vec<NodeRef>,
    #[serde(default)]
    pub edges: Vec<EdgeRef>,
}

// ---------------------------------------------------------------------------
// Analysis payload
// ---------------------------------------------------------------------------

/// Outcome units understood by the band formatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    Currency,
    Count,
    Percent,
}

/// Canonical (p10, p50, p90) outcome triple.
///
/// Each percentile is independently nullable — a missing value stays
/// missing, it is never substituted with 0.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeBands {
    #[serde(default)]
    pub p10: Option<f64>,
    #[serde(default)]
    pub p50: Option<f64>,
    #[serde(default)]
    pub p90: Option<f64>,
    #[serde(default)]
    pub units: Option<Units>,
    #[serde(default)]
    pub unit_symbol: Option<String>,
}

/// Result payload returned by the analysis service.
///
/// The service's shape has drifted across versions, so the payload is a
/// tagged union over the shapes the band extractor understands, with an
/// explicit unrecognized arm instead of silent field loss. The raw JSON
/// is preserved verbatim so re-serialization is lossless.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisReport {
    /// Current service shape: carries a `bands` object.
    Canonical { bands: OutcomeBands, raw: Value },
    /// Pre-bands shape: a conservative/likely/optimistic triple.
    Legacy {
        conservative: Option<f64>,
        likely: Option<f64>,
        optimistic: Option<f64>,
        raw: Value,
    },
    /// Any other payload, kept as-is.
    Unrecognized(Value),
}

impl AnalysisReport {
    /// Build a canonical report from a bands triple.
    pub fn canonical(bands: OutcomeBands) -> Self {
        let raw = serde_json::json!({
            "bands": serde_json::to_value(&bands).unwrap_or(Value::Null),
        });
        Self::Canonical { bands, raw }
    }

    /// Build a legacy-shaped report.
    pub fn legacy(conservative: Option<f64>, likely: Option<f64>, optimistic: Option<f64>) -> Self {
        let raw = serde_json::json!({
            "conservative": conservative,
            "likely": likely,
            "optimistic": optimistic,
        });
        Self::Legacy {
            conservative,
            likely,
            optimistic,
            raw,
        }
    }

    /// The raw JSON payload, whatever the recognized shape.
    pub fn raw(&self) -> &Value {
        match self {
            Self::Canonical { raw, .. } | Self::Legacy { raw, .. } => raw,
            Self::Unrecognized(raw) => raw,
        }
    }

    /// Classify a raw payload into the known shapes.
    fn classify(raw: Value) -> Self {
        let Some(obj) = raw.as_object() else {
            return Self::Unrecognized(raw);
        };

        if let Some(bands_value) = obj.get("bands") {
            // Malformed bands degrade to all-None rather than failing the record.
            let bands = serde_json::from_value(bands_value.clone()).unwrap_or_default();
            return Self::Canonical { bands, raw };
        }

        let has_legacy_key = ["conservative", "likely", "optimistic"]
            .iter()
            .any(|k| obj.contains_key(*k));
        if has_legacy_key {
            let conservative = obj.get("conservative").and_then(Value::as_f64);
            let likely = obj.get("likely").and_then(Value::as_f64);
            let optimistic = obj.get("optimistic").and_then(Value::as_f64);
            return Self::Legacy {
                conservative,
                likely,
                optimistic,
                raw,
            };
        }

        Self::Unrecognized(raw)
    }
}

impl Serialize for AnalysisReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AnalysisReport {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(Self::classify(raw))
    }
}

// ---------------------------------------------------------------------------
// Run record
// ---------------------------------------------------------------------------

/// One stored analysis execution: the result plus the inputs that produced it.
///
/// Immutable after creation except for the pin flag and the
/// duplicate-merge path in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub id: String,
    pub created_at: u64,
    pub seed: u64,
    /// Content-addressed hash of the analysis output; the dedup key.
    /// Absent means the run is never deduplicated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisReport>,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_duplicate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_count: Option<u32>,
    /// May be absent for legacy records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_snapshot: Option<GraphSnapshot>,
}

impl RunRecord {
    /// Create a fresh record with an assigned id and creation timestamp.
    pub fn new(seed: u64) -> Self {
        Self {
            id: generate_run_id(),
            created_at: now_millis(),
            seed,
            content_hash: None,
            adapter: None,
            summary: None,
            graph_hash: None,
            result: None,
            is_pinned: false,
            is_duplicate: false,
            duplicate_count: None,
            graph_snapshot: None,
        }
    }

    /// Edges of the snapshot, or an empty slice for legacy records.
    pub fn edges(&self) -> &[EdgeRef] {
        self.graph_snapshot
            .as_ref()
            .map(|g| g.edges.as_slice())
            .unwrap_or(&[])
    }

    /// Nodes of the snapshot, or an empty slice for legacy records.
    pub fn nodes(&self) -> &[NodeRef] {
        self.graph_snapshot
            .as_ref()
            .map(|g| g.nodes.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_serializes_with_contract_field_names() {
        let mut record = RunRecord::new(42);
        record.content_hash = Some("abc123".into());
        record.is_pinned = true;

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("createdAt").is_some());
        assert!(json.get("contentHash").is_some());
        assert!(json.get("isPinned").is_some());
        // Absent optionals stay absent.
        assert!(json.get("graphSnapshot").is_none());
        assert!(json.get("duplicateCount").is_none());
    }

    #[test]
    fn legacy_record_without_optional_fields_parses() {
        let json = r#"{"id":"run-1","createdAt":1000,"seed":7}"#;
        let record: RunRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "run-1");
        assert!(!record.is_pinned);
        assert!(record.graph_snapshot.is_none());
        assert!(record.result.is_none());
    }

    #[test]
    fn canonical_result_shape_classified() {
        let json = r#"{"bands":{"p10":1.0,"p50":2.0,"p90":null,"units":"currency"}}"#;
        let report: AnalysisReport = serde_json::from_str(json).unwrap();
        match report {
            AnalysisReport::Canonical { bands, .. } => {
                assert_eq!(bands.p10, Some(1.0));
                assert_eq!(bands.p90, None);
                assert_eq!(bands.units, Some(Units::Currency));
            }
            other => panic!("expected canonical, got {other:?}"),
        }
    }

    #[test]
    fn legacy_result_shape_classified() {
        let json = r#"{"conservative":10.0,"likely":20.0,"optimistic":null}"#;
        let report: AnalysisReport = serde_json::from_str(json).unwrap();
        match report {
            AnalysisReport::Legacy {
                conservative,
                likely,
                optimistic,
                ..
            } => {
                assert_eq!(conservative, Some(10.0));
                assert_eq!(likely, Some(20.0));
                assert_eq!(optimistic, None);
            }
            other => panic!("expected legacy, got {other:?}"),
        }
    }

    #[test]
    fn unknown_result_shape_preserved_verbatim() {
        let json = r#"{"drivers":[{"edge":"e1","impact":0.4}],"narrative":"text"}"#;
        let report: AnalysisReport = serde_json::from_str(json).unwrap();
        assert!(matches!(report, AnalysisReport::Unrecognized(_)));

        let back = serde_json::to_value(&report).unwrap();
        assert_eq!(back["narrative"], "text");
        assert_eq!(back["drivers"][0]["impact"], 0.4);
    }

    #[test]
    fn edge_defaults_follow_missing_field_policy() {
        let edge = EdgeRef {
            id: "e1".into(),
            source: "a".into(),
            target: "b".into(),
            weight: None,
            belief: None,
            provenance: None,
        };
        assert_eq!(edge.effective_weight(), 1.0);
        assert_eq!(edge.effective_belief(), 1.0);

        let weighted = EdgeRef {
            weight: Some(0.4),
            ..edge
        };
        assert_eq!(weighted.effective_belief(), 0.4);
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = generate_run_id();
        let b = generate_run_id();
        assert_ne!(a, b);
    }
}
