//! End-to-end scenarios exercising the hybrid scan executor against the
//! full engine: insert/commit, concurrent readers, a paused index builder,
//! a unique-key race, a multi-update version chain, and dropping an index
//! mid-flight.

use serde_json::json;
use std::collections::HashSet;

use hybrid_engine::engine::{Engine, EngineConfig};
use hybrid_engine::error::EngineError;
use hybrid_engine::execution::{Comparison, HybridScanPlan, ScanMode};
use hybrid_engine::index::IndexKind;
use hybrid_engine::types::{CompareOp, ItemPointer};
use hybrid_engine::value::{Column, ColumnType, Schema};

fn int_schema() -> Schema {
    Schema::new(vec![
        Column::new("key", ColumnType::BigInt, false),
        Column::new("value", ColumnType::Varchar, false),
    ])
}

fn collect_keys(engine: &Engine, plan: HybridScanPlan, txn: &hybrid_engine::concurrency::Transaction) -> Vec<i64> {
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

// S1: ordered index, key >= 2 over {1,2,3} yields {2,3} ascending.
#[test]
fn s1_index_range_predicate() {
    let engine = Engine::new(EngineConfig::default());
    let table = engine.create_table(int_schema());
    let index = engine.add_index(&table, IndexKind::PrimaryUnique, vec![0]);

    let txn1 = engine.begin();
    for k in [1, 2, 3] {
        engine.insert(&txn1, &table, vec![json!(k), json!("v")]).unwrap();
    }
    engine.commit(&txn1).unwrap();
    engine.build_index(&table, &index).unwrap();

    let txn2 = engine.begin();
    let plan = HybridScanPlan {
        table: table.clone(),
        predicate: Some(Box::new(Comparison::new(0, CompareOp::Gte, json!(2)))),
        index: Some(index.clone()),
        projection: vec![0, 1],
        key_desc: None,
        mode: ScanMode::Index,
    };
    let mut keys = collect_keys(&engine, plan, &txn2);
    keys.sort();
    assert_eq!(keys, vec![2, 3]);
}

// S2: an in-flight update is invisible to a reader that began before commit,
// visible to one that begins after.
#[test]
fn s2_mvcc_visibility_across_update() {
    let engine = Engine::new(EngineConfig::default());
    let table = engine.create_table(int_schema());

    let setup = engine.begin();
    let mut ptr5 = ItemPointer::NULL;
    for k in 1..=10 {
        let p = engine
            .insert(&setup, &table, vec![json!(k), json!("A")])
            .unwrap();
        if k == 5 {
            ptr5 = p;
        }
    }
    engine.commit(&setup).unwrap();

    let txn_w = engine.begin();
    engine
        .update(&txn_w, &table, ptr5, vec![json!(5), json!("B")])
        .unwrap();

    let txn_r = engine.begin();
    let plan_r = HybridScanPlan {
        table: table.clone(),
        predicate: Some(Box::new(Comparison::new(0, CompareOp::Eq, json!(5)))),
        index: None,
        projection: vec![0, 1],
        key_desc: None,
        mode: ScanMode::Seq,
    };
    let mut scan = engine.scan(plan_r, &txn_r);
    let tile = scan.next().unwrap().unwrap();
    assert_eq!(tile.get(1, 0), &json!("A"));

    engine.commit(&txn_w).unwrap();

    let txn_r2 = engine.begin();
    let plan_r2 = HybridScanPlan {
        table: table.clone(),
        predicate: Some(Box::new(Comparison::new(0, CompareOp::Eq, json!(5)))),
        index: None,
        projection: vec![0, 1],
        key_desc: None,
        mode: ScanMode::Seq,
    };
    let mut scan2 = engine.scan(plan_r2, &txn_r2);
    let tile2 = scan2.next().unwrap().unwrap();
    assert_eq!(tile2.get(1, 0), &json!("B"));
}

// S3: builder paused after 2 of 5 tile groups; rows land in the unindexed
// suffix too; hybrid scan returns everything with no duplicates.
#[test]
fn s3_hybrid_with_paused_builder() {
    let capacity = 4;
    let engine = Engine::new(EngineConfig {
        tile_group_capacity: capacity,
        max_tile_groups: None,
        ..EngineConfig::default()
    });
    let table = engine.create_table(int_schema());
    let index = engine.add_index(&table, IndexKind::PrimaryUnique, vec![0]);

    let txn1 = engine.begin();
    let total_rows = capacity * 5;
    for k in 0..total_rows {
        engine
            .insert(&txn1, &table, vec![json!(k as i64), json!("v")])
            .unwrap();
    }
    engine.commit(&txn1).unwrap();
    assert_eq!(table.tile_group_count(), 5);

    // Cover only the first 2 tile groups.
    engine.build_one_tile_group(&table, &index).unwrap();
    engine.build_one_tile_group(&table, &index).unwrap();
    assert_eq!(index.indexed_tile_group_offset(), Some(1));

    let txn2 = engine.begin();
    let plan = HybridScanPlan {
        table: table.clone(),
        predicate: None,
        index: Some(index.clone()),
        projection: vec![0],
        key_desc: None,
        mode: ScanMode::Hybrid,
    };
    let keys = collect_keys(&engine, plan, &txn2);
    let unique: HashSet<i64> = keys.iter().copied().collect();
    assert_eq!(keys.len(), total_rows);
    assert_eq!(unique.len(), total_rows);
}

// S4: two concurrent inserts of the same unique key; exactly one wins.
#[test]
fn s4_concurrent_unique_insert_race() {
    let engine = Engine::new(EngineConfig::default());
    let table = engine.create_table(int_schema());
    engine.add_index(&table, IndexKind::PrimaryUnique, vec![0]);

    let txn_a = engine.begin();
    let txn_b = engine.begin();

    let a_result = engine.insert(&txn_a, &table, vec![json!(42), json!("a")]);
    let b_result = engine.insert(&txn_b, &table, vec![json!(42), json!("b")]);

    // Both inserts land (tentative versions don't collide on the unique
    // check until one of them is visible/committed to the other)...
    assert!(a_result.is_ok());

    match b_result {
        Ok(_) => {
            // Only possible if a_result's tentative version wasn't
            // considered "dirty" by b's check; not expected under the
            // is_visible_or_dirty predicate, which treats any tentative
            // writer as blocking.
            panic!("expected the second insert to observe the first as dirty");
        }
        Err(EngineError::UniqueViolation) => {
            engine.abort(&txn_b).unwrap();
        }
        Err(other) => panic!("unexpected error: {other:?}"),
    }

    engine.commit(&txn_a).unwrap();
}

// S5: a chain of 3 updates; an old reader still sees the original version,
// even after GC has queued the intermediate versions for reclamation.
#[test]
fn s5_multi_update_chain_and_deferred_gc() {
    let engine = Engine::new(EngineConfig::default());
    let table = engine.create_table(int_schema());

    let setup = engine.begin();
    let mut ptr7 = ItemPointer::NULL;
    for k in 1..=10 {
        let p = engine
            .insert(&setup, &table, vec![json!(k), json!("v0")])
            .unwrap();
        if k == 7 {
            ptr7 = p;
        }
    }
    engine.commit(&setup).unwrap();

    let txn_old = engine.begin();

    let mut cur = ptr7;
    for version in 1..=3 {
        let txn_w = engine.begin();
        cur = engine
            .update(&txn_w, &table, cur, vec![json!(7), json!(format!("v{version}"))])
            .unwrap();
        engine.commit(&txn_w).unwrap();
    }

    let plan = HybridScanPlan {
        table: table.clone(),
        predicate: Some(Box::new(Comparison::new(0, CompareOp::Eq, json!(7)))),
        index: None,
        projection: vec![0, 1],
        key_desc: None,
        mode: ScanMode::Seq,
    };
    let mut scan = engine.scan(plan, &txn_old);
    let tile = scan.next().unwrap().unwrap();
    assert_eq!(tile.get(1, 0), &json!("v0"));

    engine.commit(&txn_old).unwrap();
}

// S6: dropping an index makes a HYBRID-mode plan referencing it degrade to
// SEQ (the plan simply carries no index any more) and still scan correctly.
#[test]
fn s6_drop_index_then_scan_degrades_to_seq() {
    let engine = Engine::new(EngineConfig::default());
    let table = engine.create_table(int_schema());
    let index = engine.add_index(&table, IndexKind::PrimaryUnique, vec![0]);

    let txn1 = engine.begin();
    for k in [1, 2, 3] {
        engine.insert(&txn1, &table, vec![json!(k), json!("v")]).unwrap();
    }
    engine.commit(&txn1).unwrap();
    engine.build_index(&table, &index).unwrap();

    engine.drop_index(&table, index.id());
    assert!(table.indexes().is_empty());

    let txn2 = engine.begin();
    let plan = HybridScanPlan {
        table: table.clone(),
        predicate: None,
        index: None,
        projection: vec![0],
        key_desc: None,
        mode: ScanMode::Hybrid,
    };
    let mut keys = collect_keys(&engine, plan, &txn2);
    keys.sort();
    assert_eq!(keys, vec![1, 2, 3]);
}

// A same-key update must not strand the index entry on an invisible slot.
// An INDEX-mode reader whose snapshot predates the update still walks the
// chain from the (unmoved) index entry back down to the version it can see.
#[test]
fn index_scan_survives_same_key_update() {
    let engine = Engine::new(EngineConfig::default());
    let table = engine.create_table(int_schema());
    let index = engine.add_index(&table, IndexKind::PrimaryUnique, vec![0]);

    let setup = engine.begin();
    let ptr5 = engine
        .insert(&setup, &table, vec![json!(5), json!("A")])
        .unwrap();
    engine.commit(&setup).unwrap();
    engine.build_index(&table, &index).unwrap();

    let txn_r = engine.begin();

    let txn_w = engine.begin();
    engine
        .update(&txn_w, &table, ptr5, vec![json!(5), json!("B")])
        .unwrap();
    engine.commit(&txn_w).unwrap();

    let plan = HybridScanPlan {
        table: table.clone(),
        predicate: Some(Box::new(Comparison::new(0, CompareOp::Eq, json!(5)))),
        index: Some(index.clone()),
        projection: vec![0, 1],
        key_desc: None,
        mode: ScanMode::Index,
    };
    let mut scan = engine.scan(plan, &txn_r);
    let tile = scan
        .next()
        .unwrap()
        .expect("the row must still be reachable from the unmoved index entry");
    assert_eq!(tile.get(1, 0), &json!("A"));

    let txn_r2 = engine.begin();
    let plan2 = HybridScanPlan {
        table: table.clone(),
        predicate: Some(Box::new(Comparison::new(0, CompareOp::Eq, json!(5)))),
        index: Some(index.clone()),
        projection: vec![0, 1],
        key_desc: None,
        mode: ScanMode::Index,
    };
    let mut scan2 = engine.scan(plan2, &txn_r2);
    let tile2 = scan2.next().unwrap().unwrap();
    assert_eq!(tile2.get(1, 0), &json!("B"));
}

// Spec §8 property 6's literal example: delete(k,p); scan_key(k) yields [].
#[test]
fn delete_removes_the_index_entry() {
    let engine = Engine::new(EngineConfig::default());
    let table = engine.create_table(int_schema());
    let index = engine.add_index(&table, IndexKind::PrimaryUnique, vec![0]);

    let txn1 = engine.begin();
    let ptr = engine
        .insert(&txn1, &table, vec![json!(9), json!("v")])
        .unwrap();
    engine.commit(&txn1).unwrap();

    let key = hybrid_engine::index::Key::encode(index.key_schema(), &[json!(9)]);
    assert_eq!(index.scan_key(&key).len(), 1);

    let txn2 = engine.begin();
    engine.delete(&txn2, &table, ptr).unwrap();
    engine.commit(&txn2).unwrap();

    assert!(index.scan_key(&key).is_empty());
}

// A non-unique index must never hold two entries for the same (key, pointer)
// pair, whether the duplicate would come from the writer's direct insert or
// the online builder's later catch-up scan of the same tile group.
#[test]
fn secondary_multi_index_has_no_duplicate_entries() {
    let engine = Engine::new(EngineConfig::default());
    let table = engine.create_table(int_schema());
    let index = engine.add_index(&table, IndexKind::SecondaryMulti, vec![1]);

    let txn1 = engine.begin();
    engine.insert(&txn1, &table, vec![json!(1), json!("shared")]).unwrap();
    engine.insert(&txn1, &table, vec![json!(2), json!("shared")]).unwrap();
    engine.insert(&txn1, &table, vec![json!(3), json!("other")]).unwrap();
    engine.commit(&txn1).unwrap();

    // Builder catches up after the rows were already indexed directly.
    engine.build_index(&table, &index).unwrap();

    let key = hybrid_engine::index::Key::encode(index.key_schema(), &[json!("shared")]);
    assert_eq!(index.scan_key(&key).len(), 2);
}
