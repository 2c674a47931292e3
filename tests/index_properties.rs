//! Property-based tests covering the invariants a hybrid scan, an online
//! index build, and a unique index must hold for any sequence of inserts.
//!
//! These catch edge cases a handful of hand-picked scenarios miss: odd tile
//! group counts, partial builder progress at arbitrary points, duplicate
//! key batches.

use proptest::prelude::*;
use serde_json::json;
use std::collections::HashSet;

use hybrid_engine::engine::{Engine, EngineConfig};
use hybrid_engine::execution::{HybridScanPlan, ScanMode};
use hybrid_engine::index::IndexKind;
use hybrid_engine::value::{Column, ColumnType, Schema};

fn schema() -> Schema {
    Schema::new(vec![
        Column::new("key", ColumnType::BigInt, false),
        Column::new("value", ColumnType::Varchar, false),
    ])
}

fn scan_all_keys(engine: &Engine, plan: HybridScanPlan, txn: &hybrid_engine::concurrency::Transaction) -> Vec<i64> {
    let mut scan = engine.scan(plan, txn);
    let mut out = Vec::new();
    while let Some(tile) = scan.next().unwrap() {
        for row in 0..tile.rows.len() {
            if tile.visibility_bitmap[row] {
                out.push(tile.get(0, row).as_i64().unwrap());
            }
        }
    }
    out
}

proptest! {
    /// Property 1 (completeness, sequential): every inserted-and-committed
    /// key shows up exactly once in a SEQ scan with no predicate.
    #[test]
    fn seq_scan_is_complete_and_duplicate_free(count in 1usize..200, capacity in 1usize..64) {
        let engine = Engine::new(EngineConfig { tile_group_capacity: capacity, max_tile_groups: None, ..EngineConfig::default() });
        let table = engine.create_table(schema());

        let txn = engine.begin();
        for k in 0..count {
            engine.insert(&txn, &table, vec![json!(k as i64), json!("v")]).unwrap();
        }
        engine.commit(&txn).unwrap();

        let reader = engine.begin();
        let plan = HybridScanPlan { table: table.clone(), predicate: None, index: None, projection: vec![0], key_desc: None, mode: ScanMode::Seq };
        let keys = scan_all_keys(&engine, plan, &reader);

        prop_assert_eq!(keys.len(), count);
        let unique: HashSet<i64> = keys.into_iter().collect();
        prop_assert_eq!(unique.len(), count);
    }

    /// Property 3/4 (hybrid equivalence, no duplicates across the boundary):
    /// whatever fraction of tile groups the builder has covered, HYBRID
    /// mode returns the same multiset as SEQ mode, with no item counted
    /// twice.
    #[test]
    fn hybrid_matches_seq_at_any_builder_progress(
        count in 1usize..300,
        capacity in 1usize..32,
        build_steps in 0usize..20,
    ) {
        let engine = Engine::new(EngineConfig { tile_group_capacity: capacity, max_tile_groups: None, ..EngineConfig::default() });
        let table = engine.create_table(schema());
        let index = engine.add_index(&table, IndexKind::PrimaryUnique, vec![0]);

        let txn = engine.begin();
        for k in 0..count {
            engine.insert(&txn, &table, vec![json!(k as i64), json!("v")]).unwrap();
        }
        engine.commit(&txn).unwrap();

        for _ in 0..build_steps {
            if !engine.build_one_tile_group(&table, &index).unwrap() {
                break;
            }
        }

        let seq_reader = engine.begin();
        let seq_plan = HybridScanPlan { table: table.clone(), predicate: None, index: None, projection: vec![0], key_desc: None, mode: ScanMode::Seq };
        let mut seq_keys = scan_all_keys(&engine, seq_plan, &seq_reader);
        seq_keys.sort();

        let hybrid_reader = engine.begin();
        let hybrid_plan = HybridScanPlan { table: table.clone(), predicate: None, index: Some(index.clone()), projection: vec![0], key_desc: None, mode: ScanMode::Hybrid };
        let mut hybrid_keys = scan_all_keys(&engine, hybrid_plan, &hybrid_reader);
        hybrid_keys.sort();

        prop_assert_eq!(seq_keys.clone(), hybrid_keys.clone());
        let unique: HashSet<i64> = hybrid_keys.iter().copied().collect();
        prop_assert_eq!(unique.len(), hybrid_keys.len());
    }

    /// Property 5 (monotonic prefix): repeated calls to `build_one_tile_group`
    /// never move `indexed_tile_group_offset` backwards.
    #[test]
    fn indexed_prefix_is_monotonic(count in 1usize..200, capacity in 1usize..32) {
        let engine = Engine::new(EngineConfig { tile_group_capacity: capacity, max_tile_groups: None, ..EngineConfig::default() });
        let table = engine.create_table(schema());
        let index = engine.add_index(&table, IndexKind::PrimaryUnique, vec![0]);

        let txn = engine.begin();
        for k in 0..count {
            engine.insert(&txn, &table, vec![json!(k as i64), json!("v")]).unwrap();
        }
        engine.commit(&txn).unwrap();

        let mut last = None;
        loop {
            let advanced = engine.build_one_tile_group(&table, &index).unwrap();
            let now = index.indexed_tile_group_offset();
            if let (Some(prev), Some(cur)) = (last, now) {
                prop_assert!(cur >= prev);
            }
            last = now;
            if !advanced {
                break;
            }
        }
    }

    /// Property 6 (unique index round trip): insert/scan_key/delete/scan_key
    /// behaves as a set of size <= 1 per key, and a duplicate live key is
    /// rejected.
    #[test]
    fn unique_insert_then_duplicate_is_rejected(key in 0i64..1000) {
        let engine = Engine::new(EngineConfig::default());
        let table = engine.create_table(schema());
        engine.add_index(&table, IndexKind::PrimaryUnique, vec![0]);

        let txn1 = engine.begin();
        let first = engine.insert(&txn1, &table, vec![json!(key), json!("a")]);
        prop_assert!(first.is_ok());
        engine.commit(&txn1).unwrap();

        let txn2 = engine.begin();
        let second = engine.insert(&txn2, &table, vec![json!(key), json!("b")]);
        prop_assert!(second.is_err());
    }

    /// Property 7 (chain-walk safety): N sequential updates of the same row
    /// leave a chain walk from the oldest pointer reaching the live version
    /// in at most N+1 steps, and a reader never revisits the same pointer.
    #[test]
    fn chain_walk_reaches_live_version(updates in 1usize..30) {
        let engine = Engine::new(EngineConfig::default());
        let table = engine.create_table(schema());

        let setup = engine.begin();
        let mut ptr = engine.insert(&setup, &table, vec![json!(1), json!("v0")]).unwrap();
        engine.commit(&setup).unwrap();
        let first_ptr = ptr;

        for i in 1..=updates {
            let txn = engine.begin();
            ptr = engine.update(&txn, &table, ptr, vec![json!(1), json!(format!("v{i}"))]).unwrap();
            engine.commit(&txn).unwrap();
        }

        let reader = engine.begin();
        let mut cur = first_ptr;
        let mut seen = HashSet::new();
        let mut steps = 0usize;
        loop {
            prop_assert!(seen.insert(cur), "chain walk revisited a slot");
            steps += 1;
            prop_assert!(steps <= updates + 1, "chain walk exceeded the update bound");
            let tg = engine.tile_group_by_id(cur.block).unwrap();
            let header = tg.header().get(cur.offset);
            if engine.mvcc().is_visible(header, &reader).is_visible() {
                break;
            }
            let next = header.next_version();
            prop_assert!(!next.is_null(), "chain ended without reaching a visible version");
            cur = next;
        }
    }
}
