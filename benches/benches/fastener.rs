// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Benchmarks for fastener reads, writes and fan-out through a mounted tree.

use std::rc::Rc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use understory_fastener::{FastenerClass, FastenerMetadataBuilder};
use understory_lifecycle::{Model, NodeId, Tree};

fn bench_fastener(c: &mut Criterion) {
    let mut group = c.benchmark_group("fastener");

    for &depth in &[4_u32, 16, 64] {
        let mut tree = Tree::<Model>::new();
        let font = tree.registry_mut().register(
            "font",
            FastenerMetadataBuilder::new(12.0_f64).inherits(true).build(),
        );
        let width = tree
            .registry_mut()
            .register("width", FastenerMetadataBuilder::new(0.0_f64).build());
        let class = Rc::new(
            FastenerClass::builder("Elem")
                .field("font", font)
                .field("width", width)
                .build(),
        );

        // A chain 0 <- 1 <- ... <- depth.
        let root = tree.create_node_with(class.clone());
        let mut leaf: NodeId = root;
        for _ in 0..depth {
            let next = tree.create_node_with(class.clone());
            tree.append_child(leaf, next, None).unwrap();
            leaf = next;
        }
        tree.cascade_mount(root).unwrap();

        group.bench_function(BenchmarkId::new("read_inherited", depth), |b| {
            b.iter(|| black_box(tree.value(leaf, font).unwrap()));
        });

        group.bench_function(BenchmarkId::new("read_default", depth), |b| {
            b.iter(|| black_box(tree.value(leaf, width).unwrap()));
        });

        let mut size = 12.0;
        group.bench_function(BenchmarkId::new("write_fan_out", depth), |b| {
            b.iter(|| {
                size += 1.0;
                black_box(tree.set_value(root, font, size).unwrap());
                tree.flush_updates();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fastener);
criterion_main!(benches);
