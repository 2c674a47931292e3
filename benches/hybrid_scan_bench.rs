//! Criterion benchmarks for the hybrid scan executor.
//!
//! Run with: `cargo bench`
//!
//! Adapted from the template's `benches/block_benchmarks.rs`: a knob (here,
//! the fraction of tile groups already covered by the index) is varied and
//! the same operation benchmarked across its range.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::sync::Arc;

use hybrid_engine::engine::{Engine, EngineConfig};
use hybrid_engine::execution::{HybridScanPlan, ScanMode};
use hybrid_engine::index::IndexKind;
use hybrid_engine::value::{Column, ColumnType, Schema};

fn build_engine(tile_group_capacity: usize, rows: i64, indexed_fraction: f64) -> (Engine, Arc<hybrid_engine::storage::Table>) {
    let engine = Engine::new(EngineConfig {
        tile_group_capacity,
        max_tile_groups: None,
        ..EngineConfig::default()
    });
    let schema = Schema::new(vec![
        Column::new("id", ColumnType::BigInt, false),
        Column::new("value", ColumnType::Varchar, false),
    ]);
    let table = engine.create_table(schema);
    let index = engine.add_index(&table, IndexKind::PrimaryUnique, vec![0]);

    let txn = engine.begin();
    for i in 0..rows {
        engine
            .insert(&txn, &table, vec![json!(i), json!("bench")])
            .unwrap();
    }
    engine.commit(&txn).unwrap();

    let total_tgs = table.tile_group_count();
    let target = ((total_tgs as f64) * indexed_fraction).floor() as usize;
    for _ in 0..target {
        engine.build_one_tile_group(&table, &index).unwrap();
    }

    (engine, table)
}

fn bench_hybrid_scan_by_coverage(c: &mut Criterion) {
    let mut group = c.benchmark_group("hybrid_scan_index_coverage");

    for coverage in [0.0, 0.25, 0.5, 0.75, 1.0] {
        let (engine, table) = build_engine(256, 5_000, coverage);
        let index = table.indexes().into_iter().next().unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(coverage), &coverage, |b, _| {
            b.iter(|| {
                let txn = engine.begin();
                let plan = HybridScanPlan {
                    table: table.clone(),
                    predicate: None,
                    index: Some(index.clone()),
                    projection: vec![0, 1],
                    key_desc: None,
                    mode: ScanMode::Hybrid,
                };
                let mut scan = engine.scan(plan, &txn);
                let mut count = 0usize;
                while let Some(tile) = scan.next().unwrap() {
                    count += tile.visible_row_count();
                }
                black_box(count)
            });
        });
    }
    group.finish();
}

fn bench_seq_vs_hybrid(c: &mut Criterion) {
    let mut group = c.benchmark_group("seq_vs_hybrid_fully_built");
    let (engine, table) = build_engine(256, 5_000, 1.0);
    let index = table.indexes().into_iter().next().unwrap();

    group.bench_function("seq", |b| {
        b.iter(|| {
            let txn = engine.begin();
            let plan = HybridScanPlan {
                table: table.clone(),
                predicate: None,
                index: None,
                projection: vec![0, 1],
                key_desc: None,
                mode: ScanMode::Seq,
            };
            let mut scan = engine.scan(plan, &txn);
            let mut count = 0usize;
            while let Some(tile) = scan.next().unwrap() {
                count += tile.visible_row_count();
            }
            black_box(count)
        });
    });

    group.bench_function("hybrid", |b| {
        b.iter(|| {
            let txn = engine.begin();
            let plan = HybridScanPlan {
                table: table.clone(),
                predicate: None,
                index: Some(index.clone()),
                projection: vec![0, 1],
                key_desc: None,
                mode: ScanMode::Hybrid,
            };
            let mut scan = engine.scan(plan, &txn);
            let mut count = 0usize;
            while let Some(tile) = scan.next().unwrap() {
                count += tile.visible_row_count();
            }
            black_box(count)
        });
    });

    group.finish();
}

criterion_group!(hybrid_scan_benches, bench_hybrid_scan_by_coverage, bench_seq_vs_hybrid);
criterion_main!(hybrid_scan_benches);
