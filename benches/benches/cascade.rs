// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Benchmarks for lifecycle cascades and dirty passes.

use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use understory_lifecycle::{Model, NodeFlags, NodeId, Tree};

/// A complete tree of the given fan-out and depth; returns the root and leaves.
fn build(fanout: usize, depth: usize) -> (Tree<Model>, NodeId, Vec<NodeId>) {
    let mut tree = Tree::new();
    let root = tree.create_node();
    let mut level = vec![root];
    for _ in 0..depth {
        let mut next = Vec::with_capacity(level.len() * fanout);
        for &parent in &level {
            for _ in 0..fanout {
                let child = tree.create_node();
                tree.append_child(parent, child, None).unwrap();
                next.push(child);
            }
        }
        level = next;
    }
    (tree, root, level)
}

fn bench_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("lifecycle");
    for &(fanout, depth) in &[(4_usize, 4_usize), (8, 3), (2, 10)] {
        let id = BenchmarkId::new("mount_unmount", format!("{fanout}x{depth}"));
        group.bench_function(id, |b| {
            b.iter_batched(
                || build(fanout, depth),
                |(mut tree, root, _)| {
                    tree.cascade_mount(root).unwrap();
                    tree.cascade_power(root).unwrap();
                    tree.cascade_unmount(root).unwrap();
                    black_box(tree);
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("update");
    let (mut tree, root, leaves) = build(8, 3);
    tree.cascade_mount(root).unwrap();

    group.bench_function("require_one_leaf_and_flush", |b| {
        let leaf = leaves[leaves.len() / 2];
        b.iter(|| {
            tree.require_update(leaf, NodeFlags::NEEDS_MUTATE, false)
                .unwrap();
            black_box(tree.flush_updates());
        });
    });

    group.bench_function("require_every_leaf_and_flush", |b| {
        b.iter(|| {
            for &leaf in &leaves {
                tree.require_update(leaf, NodeFlags::NEEDS_AGGREGATE, false)
                    .unwrap();
            }
            black_box(tree.flush_updates());
        });
    });

    group.bench_function("cascade_whole_tree", |b| {
        b.iter(|| {
            tree.cascade_analyze(root, NodeFlags::NEEDS_MUTATE).unwrap();
        });
    });

    group.bench_function("remove_and_reinsert", |b| {
        let leaf = leaves[0];
        let parent = tree.parent(leaf).unwrap();
        b.iter(|| {
            tree.remove(leaf).unwrap();
            tree.append_child(parent, leaf, Some("leaf")).unwrap();
        });
    });
    group.finish();
}

criterion_group!(benches, bench_lifecycle, bench_update);
criterion_main!(benches);
