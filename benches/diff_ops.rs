//! Benchmarks for graph diff operations.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rand::{Rng, SeedableRng};

use augur::diff::{compute_edge_deltas, diff_nodes};
use augur::model::{EdgeRef, GraphSnapshot, NodeRef, Position, RunRecord};

fn synthetic_run(seed: u64, nodes: usize, edges: usize) -> RunRecord {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let node_refs: Vec<NodeRef> = (0..nodes)
        .map(|i| NodeRef {
            id: format!("n{i}"),
            label: format!("factor {i}"),
            position: Position {
                x: rng.gen_range(0.0..1000.0),
                y: rng.gen_range(0.0..1000.0),
            },
        })
        .collect();
    let edge_refs: Vec<EdgeRef> = (0..edges)
        .map(|i| EdgeRef {
            id: format!("e{i}"),
            source: format!("n{}", i % nodes),
            target: format!("n{}", (i + 1) % nodes),
            weight: Some(rng.gen_range(0.0..1.0)),
            belief: Some(rng.gen_range(0.0..1.0)),
            provenance: None,
        })
        .collect();

    RunRecord {
        graph_snapshot: Some(GraphSnapshot {
            nodes: node_refs,
            edges: edge_refs,
        }),
        ..RunRecord::new(seed)
    }
}

fn bench_edge_deltas(c: &mut Criterion) {
    let run_a = synthetic_run(1, 200, 500);
    let run_b = synthetic_run(2, 200, 500);

    c.bench_function("edge_deltas_500", |bench| {
        bench.iter(|| black_box(compute_edge_deltas(&run_a, &run_b, 5)))
    });
}

fn bench_diff_nodes(c: &mut Criterion) {
    let run_a = synthetic_run(1, 500, 0);
    let run_b = synthetic_run(2, 500, 0);

    c.bench_function("diff_nodes_500", |bench| {
        bench.iter(|| black_box(diff_nodes(run_a.nodes(), run_b.nodes())))
    });
}

criterion_group!(benches, bench_edge_deltas, bench_diff_nodes);
criterion_main!(benches);
