//! Graph diff engine: structural and numeric differences between snapshots.
//!
//! All matching is by entity `id` — positions, labels, and numeric
//! attributes are mutable without invalidating identity, while an edge's
//! endpoints are identity-defining (a rewire surfaces as remove+add).
//!
//! Ordering is deterministic: added/modified entries follow the current
//! snapshot's order, removed entries follow the previous snapshot's
//! order, and ranked deltas use a stable two-level sort.

use std::collections::HashMap;

use crate::model::{EdgeRef, GraphSnapshot, NodeRef, RunRecord};

/// Default row limit for ranked edge deltas.
pub const DEFAULT_DELTA_LIMIT: usize = 5;

// ---------------------------------------------------------------------------
// Structural diffs
// ---------------------------------------------------------------------------

/// Before/after pair for an entity modified in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Modification<T> {
    pub before: T,
    pub after: T,
}

/// Per-node classification between two snapshots.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeDiff {
    pub added: Vec<NodeRef>,
    pub removed: Vec<NodeRef>,
    pub modified: Vec<Modification<NodeRef>>,
}

/// Per-edge classification between two snapshots.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EdgeDiff {
    pub added: Vec<EdgeRef>,
    pub removed: Vec<EdgeRef>,
    pub modified: Vec<Modification<EdgeRef>>,
}

/// Combined node and edge diff for a snapshot pair.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SnapshotDiff {
    pub nodes: NodeDiff,
    pub edges: EdgeDiff,
}

impl SnapshotDiff {
    /// Whether the pair differs at all.
    pub fn is_empty(&self) -> bool {
        self.nodes.added.is_empty()
            && self.nodes.removed.is_empty()
            && self.nodes.modified.is_empty()
            && self.edges.added.is_empty()
            && self.edges.removed.is_empty()
            && self.edges.modified.is_empty()
    }
}

/// Classify nodes as added/removed/modified between two snapshots.
///
/// A node present in both is modified iff its label or either position
/// coordinate differs.
pub fn diff_nodes(previous: &[NodeRef], current: &[NodeRef]) -> NodeDiff {
    let prev_by_id: HashMap<&str, &NodeRef> =
        previous.iter().map(|n| (n.id.as_str(), n)).collect();
    let curr_by_id: HashMap<&str, &NodeRef> = current.iter().map(|n| (n.id.as_str(), n)).collect();

    let mut diff = NodeDiff::default();
    for node in current {
        match prev_by_id.get(node.id.as_str()) {
            None => diff.added.push(node.clone()),
            Some(prev) if node_changed(prev, node) => diff.modified.push(Modification {
                before: (*prev).clone(),
                after: node.clone(),
            }),
            Some(_) => {}
        }
    }
    for node in previous {
        if !curr_by_id.contains_key(node.id.as_str()) {
            diff.removed.push(node.clone());
        }
    }
    diff
}

/// Classify edges as added/removed/modified between two snapshots.
///
/// An edge present in both is modified iff its weight or belief differs
/// under the missing-field defaults — endpoints are not compared.
pub fn diff_edges(previous: &[EdgeRef], current: &[EdgeRef]) -> EdgeDiff {
    let prev_by_id: HashMap<&str, &EdgeRef> =
        previous.iter().map(|e| (e.id.as_str(), e)).collect();
    let curr_by_id: HashMap<&str, &EdgeRef> = current.iter().map(|e| (e.id.as_str(), e)).collect();

    let mut diff = EdgeDiff::default();
    for edge in current {
        match prev_by_id.get(edge.id.as_str()) {
            None => diff.added.push(edge.clone()),
            Some(prev) if edge_changed(prev, edge) => diff.modified.push(Modification {
                before: (*prev).clone(),
                after: edge.clone(),
            }),
            Some(_) => {}
        }
    }
    for edge in previous {
        if !curr_by_id.contains_key(edge.id.as_str()) {
            diff.removed.push(edge.clone());
        }
    }
    diff
}

/// Diff both entity kinds of a snapshot pair.
pub fn diff_snapshots(previous: &GraphSnapshot, current: &GraphSnapshot) -> SnapshotDiff {
    SnapshotDiff {
        nodes: diff_nodes(&previous.nodes, &current.nodes),
        edges: diff_edges(&previous.edges, &current.edges),
    }
}

fn node_changed(before: &NodeRef, after: &NodeRef) -> bool {
    before.label != after.label
        || before.position.x != after.position.x
        || before.position.y != after.position.y
}

fn edge_changed(before: &EdgeRef, after: &EdgeRef) -> bool {
    before.effective_weight() != after.effective_weight()
        || before.effective_belief() != after.effective_belief()
}

// ---------------------------------------------------------------------------
// Ranked edge deltas
// ---------------------------------------------------------------------------

/// Match status of an edge id across two runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeStatus {
    /// Present in both runs.
    Matched,
    /// Present only in the later run.
    Added,
    /// Present only in the earlier run.
    Removed,
}

impl std::fmt::Display for EdgeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EdgeStatus::Matched => "matched",
            EdgeStatus::Added => "added",
            EdgeStatus::Removed => "removed",
        };
        f.write_str(s)
    }
}

/// One ranked row of the run-to-run edge comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeDiffRow {
    pub id: String,
    pub status: EdgeStatus,
    pub delta_weight: f64,
    pub delta_belief: f64,
    /// 1-indexed position after sorting and truncation.
    pub rank: usize,
}

/// Rank every edge id across two runs by magnitude of change.
///
/// Matched edges get `weight_b − weight_a` and `belief_b − belief_a`
/// with missing weights defaulting to 1.0 and missing beliefs to the
/// effective weight; unmatched edges get zero deltas. Weight changes
/// drive the ordering; belief changes break ties. The result is
/// truncated to `limit` rows.
///
/// Runs without a snapshot contribute an empty edge set, so two
/// snapshot-less runs compare as zero changes rather than an error.
pub fn compute_edge_deltas(run_a: &RunRecord, run_b: &RunRecord, limit: usize) -> Vec<EdgeDiffRow> {
    let edges_a = run_a.edges();
    let edges_b = run_b.edges();

    let by_id_a: HashMap<&str, &EdgeRef> = edges_a.iter().map(|e| (e.id.as_str(), e)).collect();
    let by_id_b: HashMap<&str, &EdgeRef> = edges_b.iter().map(|e| (e.id.as_str(), e)).collect();

    // Union of ids in first-seen order (A then B) keeps the pre-sort
    // ordering independent of hash iteration.
    let mut ids: Vec<&str> = Vec::with_capacity(edges_a.len() + edges_b.len());
    for e in edges_a {
        ids.push(e.id.as_str());
    }
    for e in edges_b {
        if !by_id_a.contains_key(e.id.as_str()) {
            ids.push(e.id.as_str());
        }
    }

    let mut rows: Vec<EdgeDiffRow> = ids
        .into_iter()
        .filter_map(|id| {
            let (status, delta_weight, delta_belief) = match (by_id_a.get(id), by_id_b.get(id)) {
                (Some(a), Some(b)) => (
                    EdgeStatus::Matched,
                    b.effective_weight() - a.effective_weight(),
                    b.effective_belief() - a.effective_belief(),
                ),
                (None, Some(_)) => (EdgeStatus::Added, 0.0, 0.0),
                (Some(_), None) => (EdgeStatus::Removed, 0.0, 0.0),
                (None, None) => return None,
            };
            Some(EdgeDiffRow {
                id: id.to_string(),
                status,
                delta_weight,
                delta_belief,
                rank: 0,
            })
        })
        .collect();

    rows.sort_by(|a, b| {
        b.delta_weight
            .abs()
            .partial_cmp(&a.delta_weight.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.delta_belief
                    .abs()
                    .partial_cmp(&a.delta_belief.abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    });
    rows.truncate(limit);
    for (i, row) in rows.iter_mut().enumerate() {
        row.rank = i + 1;
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GraphSnapshot, Position};

    fn node(id: &str, label: &str, x: f64, y: f64) -> NodeRef {
        NodeRef {
            id: id.to_string(),
            label: label.to_string(),
            position: Position { x, y },
        }
    }

    fn edge(id: &str, weight: Option<f64>, belief: Option<f64>) -> EdgeRef {
        EdgeRef {
            id: id.to_string(),
            source: "a".into(),
            target: "b".into(),
            weight,
            belief,
            provenance: None,
        }
    }

    fn run_with_edges(edges: Vec<EdgeRef>) -> RunRecord {
        RunRecord {
            graph_snapshot: Some(GraphSnapshot {
                nodes: vec![],
                edges,
            }),
            ..RunRecord::new(0)
        }
    }

    #[test]
    fn node_added_removed_modified() {
        let previous = vec![node("a", "A", 0.0, 0.0), node("b", "B", 1.0, 1.0)];
        let current = vec![node("b", "B2", 1.0, 1.0), node("c", "C", 2.0, 2.0)];

        let diff = diff_nodes(&previous, &current);
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.added[0].id, "c");
        assert_eq!(diff.removed.len(), 1);
        assert_eq!(diff.removed[0].id, "a");
        assert_eq!(diff.modified.len(), 1);
        assert_eq!(diff.modified[0].before.label, "B");
        assert_eq!(diff.modified[0].after.label, "B2");
    }

    #[test]
    fn position_change_is_a_modification() {
        let previous = vec![node("a", "A", 0.0, 0.0)];
        let current = vec![node("a", "A", 0.0, 5.0)];
        let diff = diff_nodes(&previous, &current);
        assert_eq!(diff.modified.len(), 1);
    }

    #[test]
    fn identical_snapshots_diff_empty() {
        let nodes = vec![node("a", "A", 0.0, 0.0)];
        let diff = diff_nodes(&nodes, &nodes);
        assert!(diff.added.is_empty());
        assert!(diff.removed.is_empty());
        assert!(diff.modified.is_empty());
    }

    #[test]
    fn diff_symmetry() {
        let a = vec![node("a", "A", 0.0, 0.0), node("b", "B", 1.0, 1.0)];
        let b = vec![node("b", "B", 1.0, 1.0), node("c", "C", 2.0, 2.0)];

        let forward = diff_nodes(&a, &b);
        let backward = diff_nodes(&b, &a);
        assert_eq!(forward.added, backward.removed);
        assert_eq!(forward.removed, backward.added);
    }

    #[test]
    fn edge_weight_change_is_a_modification() {
        let previous = vec![edge("e1", Some(0.5), None)];
        let current = vec![edge("e1", Some(0.7), None)];
        let diff = diff_edges(&previous, &current);
        assert_eq!(diff.modified.len(), 1);
    }

    #[test]
    fn endpoint_change_is_not_a_modification() {
        let previous = vec![edge("e1", Some(0.5), Some(0.5))];
        let mut rewired = edge("e1", Some(0.5), Some(0.5));
        rewired.target = "elsewhere".into();
        let diff = diff_edges(&previous, &[rewired]);
        assert!(diff.modified.is_empty());
    }

    #[test]
    fn explicit_default_weight_equals_missing_weight() {
        // None means 1.0 under the defaults, so this pair is unchanged.
        let previous = vec![edge("e1", None, None)];
        let current = vec![edge("e1", Some(1.0), Some(1.0))];
        let diff = diff_edges(&previous, &current);
        assert!(diff.modified.is_empty());
    }

    #[test]
    fn delta_scenario_weight_change_outranks_addition() {
        let run_a = run_with_edges(vec![edge("e1", Some(0.5), None)]);
        let run_b = run_with_edges(vec![
            edge("e1", Some(0.7), None),
            edge("e2", Some(0.3), None),
        ]);

        let rows = compute_edge_deltas(&run_a, &run_b, DEFAULT_DELTA_LIMIT);
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].id, "e1");
        assert_eq!(rows[0].status, EdgeStatus::Matched);
        assert!((rows[0].delta_weight - 0.2).abs() < 1e-9);
        assert_eq!(rows[0].rank, 1);

        assert_eq!(rows[1].id, "e2");
        assert_eq!(rows[1].status, EdgeStatus::Added);
        assert_eq!(rows[1].delta_weight, 0.0);
        assert_eq!(rows[1].rank, 2);
    }

    #[test]
    fn removed_edge_gets_zero_delta() {
        let run_a = run_with_edges(vec![edge("gone", Some(0.9), None)]);
        let run_b = run_with_edges(vec![]);

        let rows = compute_edge_deltas(&run_a, &run_b, DEFAULT_DELTA_LIMIT);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, EdgeStatus::Removed);
        assert_eq!(rows[0].delta_weight, 0.0);
    }

    #[test]
    fn missing_belief_defaults_to_effective_weight() {
        let run_a = run_with_edges(vec![edge("e1", Some(0.5), None)]);
        let run_b = run_with_edges(vec![edge("e1", Some(0.8), None)]);

        let rows = compute_edge_deltas(&run_a, &run_b, DEFAULT_DELTA_LIMIT);
        // belief defaults track the weights: 0.8 − 0.5.
        assert!((rows[0].delta_belief - 0.3).abs() < 1e-9);
    }

    #[test]
    fn sort_contract_two_level() {
        let run_a = run_with_edges(vec![
            edge("w-big", Some(0.1), Some(0.5)),
            edge("tie-low", Some(0.5), Some(0.5)),
            edge("tie-high", Some(0.5), Some(0.1)),
        ]);
        let run_b = run_with_edges(vec![
            edge("w-big", Some(0.9), Some(0.5)),
            edge("tie-low", Some(0.6), Some(0.55)),
            edge("tie-high", Some(0.6), Some(0.4)),
        ]);

        let rows = compute_edge_deltas(&run_a, &run_b, DEFAULT_DELTA_LIMIT);
        for pair in rows.windows(2) {
            let (hi, lo) = (&pair[0], &pair[1]);
            assert!(hi.delta_weight.abs() >= lo.delta_weight.abs());
            if (hi.delta_weight.abs() - lo.delta_weight.abs()).abs() < 1e-12 {
                assert!(hi.delta_belief.abs() >= lo.delta_belief.abs());
            }
        }
        assert_eq!(rows[0].id, "w-big");
        assert_eq!(rows[1].id, "tie-high");
    }

    #[test]
    fn limit_truncates_and_ranks_stay_dense() {
        let run_a = run_with_edges((0..8).map(|i| edge(&format!("e{i}"), Some(0.0), None)).collect());
        let run_b = run_with_edges(
            (0..8)
                .map(|i| edge(&format!("e{i}"), Some(i as f64 / 10.0), None))
                .collect(),
        );

        let rows = compute_edge_deltas(&run_a, &run_b, 3);
        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows.iter().map(|r| r.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        // Largest |delta| first.
        assert_eq!(rows[0].id, "e7");
    }

    #[test]
    fn runs_without_snapshots_compare_as_no_change() {
        let run_a = RunRecord::new(0);
        let run_b = RunRecord::new(0);
        assert!(compute_edge_deltas(&run_a, &run_b, DEFAULT_DELTA_LIMIT).is_empty());

        let diff = diff_snapshots(&GraphSnapshot::default(), &GraphSnapshot::default());
        assert!(diff.is_empty());
    }
}
