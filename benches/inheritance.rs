use std::collections::HashMap;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};

use mongard::roles::validate::find_cycle;

/// Generate a layered DAG of `n` roles where each role inherits up to
/// `max_edges` roles from later layers. Acyclic by construction.
fn gen_role_graph(n: usize, max_edges: usize, seed: u64) -> HashMap<String, Vec<String>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut graph = HashMap::with_capacity(n);
    for i in 0..n {
        let mut children = Vec::new();
        if i + 1 < n {
            for _ in 0..rng.gen_range(0..=max_edges) {
                let child = rng.gen_range(i + 1..n);
                children.push(format!("role{child}"));
            }
        }
        graph.insert(format!("role{i}"), children);
    }
    graph
}

fn bench_cycle_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("inheritance_cycle_check");
    group.sample_size(30);

    for &n in &[100usize, 1_000, 10_000] {
        let acyclic = gen_role_graph(n, 4, 0x0C1C_7E57);
        group.bench_with_input(BenchmarkId::new("acyclic", n), &acyclic, |b, g| {
            b.iter(|| {
                assert!(find_cycle(g, "role0").is_none());
            })
        });

        // Close a back edge from the deepest layer to the root.
        let mut cyclic = acyclic.clone();
        cyclic.insert(format!("role{}", n - 1), vec!["role0".to_string()]);
        group.bench_with_input(BenchmarkId::new("cyclic", n), &cyclic, |b, g| {
            b.iter(|| {
                find_cycle(g, "role0");
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_cycle_detection);
criterion_main!(benches);
