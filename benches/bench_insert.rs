use shared::*;

use criterion::{criterion_group, Criterion};
use spart::geometry::Point;
use spart::neartree::NearTree;
use std::hint::black_box;
use tracing::info;

fn bench_immediate_insert(_c: &mut Criterion) {
    info!("setting up benchmark: immediate_insert_2d");
    let points = generate_2d_data();
    let mut cc = configure_criterion();
    cc.bench_function("immediate_insert_2d", |b| {
        b.iter(|| {
            let mut tree = NearTree::new(2, euclidean_config()).unwrap();
            for p in points.iter() {
                tree.immediate_insert(black_box(*p), None).unwrap();
            }
            black_box(&tree);
        })
    });
}

fn bench_deferred_insert_and_flush(_c: &mut Criterion) {
    info!("setting up benchmark: deferred_insert_and_flush_2d");
    let points = generate_2d_data();
    let mut cc = configure_criterion();
    cc.bench_function("deferred_insert_and_flush_2d", |b| {
        b.iter(|| {
            let mut tree = NearTree::new(2, euclidean_config()).unwrap();
            for p in points.iter() {
                tree.insert(black_box(*p), None).unwrap();
            }
            tree.complete_delayed_insert().unwrap();
            black_box(&tree);
        })
    });
}

fn bench_single_insert_into_populated_tree(_c: &mut Criterion) {
    info!("setting up benchmark: single_insert_into_populated_tree_2d");
    let points = generate_2d_data();
    let to_insert: Point<2> = *points.last().unwrap();
    let mut base_points = points.clone();
    base_points.pop();
    let mut cc = configure_criterion();
    cc.bench_function("single_insert_into_populated_tree_2d", |b| {
        b.iter_with_setup(
            || build_tree(&base_points),
            |mut tree| {
                black_box(tree.immediate_insert(to_insert, None).unwrap());
            },
        )
    });
}

criterion_group!(
    benches,
    bench_immediate_insert,
    bench_deferred_insert_and_flush,
    bench_single_insert_into_populated_tree,
);
