//! Run with: cargo bench --bench cnm_bench

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use cnm_community::{partition, CompositeKeyMaxHeap, EdgeListGraph, GraphView, NodeId};

/// Two disjoint cliques of the given sizes.
fn two_cliques(first: usize, second: usize) -> EdgeListGraph<f32> {
    let mut g = EdgeListGraph::new(first + second);
    for (offset, size) in [(0, first), (first, second)] {
        for i in 0..size {
            for j in 0..i {
                g.insert_edge(offset + i, offset + j, 1.0).unwrap();
            }
        }
    }
    g
}

fn sparse_random(node_count: usize, edge_count: usize, seed: u64) -> EdgeListGraph<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut g = EdgeListGraph::new(node_count);
    for _ in 0..edge_count {
        let from: NodeId = rng.gen_range(0..node_count);
        let to: NodeId = rng.gen_range(0..node_count);
        g.insert_edge(from, to, rng.gen_range(1..10) as f32).unwrap();
    }
    g
}

fn bench_two_cliques(c: &mut Criterion) {
    let mut group = c.benchmark_group("Two cliques");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(20));

    for &(first, second) in &[(100, 80), (400, 300), (1000, 800)] {
        let g = two_cliques(first, second);
        group.throughput(Throughput::Elements(g.connection_count() as u64));
        group.bench_with_input(BenchmarkId::new("partition", format!("{}+{}", first, second)), &g, |b, g| {
            b.iter(|| partition(black_box(g), 1.0, 1, false).unwrap())
        });
    }
    group.finish();
}

fn bench_sparse(c: &mut Criterion) {
    let mut group = c.benchmark_group("Sparse random");
    group.sample_size(10);

    for &nodes in &[1_000usize, 10_000] {
        let g = sparse_random(nodes, nodes * 4, 7);
        group.bench_with_input(BenchmarkId::new("partition", nodes), &g, |b, g| {
            b.iter(|| partition(black_box(g), 1.0, 1, false).unwrap())
        });
    }
    group.finish();
}

fn bench_heap(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(11);
    let values: Vec<f64> = (0..10_000).map(|_| rng.gen::<f64>()).collect();

    c.bench_function("heap push, update and drain 10k", |b| {
        b.iter(|| {
            let mut heap = CompositeKeyMaxHeap::with_capacity(values.len());
            for (key, value) in values.iter().enumerate() {
                heap.push(key, *value);
            }
            for key in (0..values.len()).step_by(3) {
                heap.update_value(&key, values[key] * 0.5).unwrap();
            }
            while !heap.is_empty() {
                black_box(heap.pop().unwrap());
            }
        })
    });
}

criterion_group!(benches, bench_two_cliques, bench_sparse, bench_heap);
criterion_main!(benches);
