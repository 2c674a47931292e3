//! Hybrid scan executor (HSE, spec §4.5): the interesting core. Chooses per
//! call between a pure sequential scan, a pure index lookup, or a hybrid of
//! the two that uses the index over its already-built prefix and falls
//! back to sequential scanning for the still-unindexed suffix.
//!
//! Grounded directly on `original_source/src/backend/executor/
//! hybrid_scan_executor.cpp`: the `DInit`/`DExecute` split maps to
//! `HybridScanExecutor::new`/`next`, `item_pointers_`/`result_itr_` map to
//! `index_result`/`result_iter`, and the `block_threshold` field is this
//! file's `boundary_block`.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::concurrency::{Transaction, Visibility};
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::execution::logical_tile::{descriptors_from_schema, LogicalTile};
use crate::execution::predicate::Predicate;
use crate::index::IndexHandle;
use crate::storage::Table;
use crate::types::{CompareOp, ItemPointer, Oid, ScanDirection, INITIAL_TXN, MAX_CID};
use crate::value::{Tuple, Value};

/// A key-column value either fixed at plan time or resolved against the
/// executing transaction (spec §2 "runtime keys" supplement).
pub enum KeyValue {
    Bound(Value),
    Runtime(Box<dyn Fn(&Transaction) -> Value + Send + Sync>),
}

impl KeyValue {
    fn resolve(&self, txn: &Transaction) -> Value {
        match self {
            KeyValue::Bound(v) => v.clone(),
            KeyValue::Runtime(f) => f(txn),
        }
    }
}

pub struct IndexKeyDescriptor {
    pub key_values: Vec<KeyValue>,
    pub key_column_ids: Vec<usize>,
    pub comparators: Vec<CompareOp>,
    pub direction: ScanDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Seq,
    Index,
    Hybrid,
}

pub struct HybridScanPlan {
    pub table: Arc<Table>,
    pub predicate: Option<Box<dyn Predicate>>,
    pub index: Option<IndexHandle>,
    pub projection: Vec<usize>,
    pub key_desc: Option<IndexKeyDescriptor>,
    pub mode: ScanMode,
}

/// Executes one `HybridScanPlan` against one transaction; `next()` returns
/// logical tiles until EOF (spec §4.5's state machine, `INIT ->
/// (INDEX_DRAIN -> SEQ_SCAN*)* -> EOF | ERROR`).
pub struct HybridScanExecutor<'a> {
    engine: &'a Engine,
    plan: HybridScanPlan,
    txn: &'a Transaction,
    mode: ScanMode,
    current_tg_offset: usize,
    tg_count_snapshot: usize,
    index_side_armed: bool,
    index_done: bool,
    index_result: VecDeque<LogicalTile>,
    boundary_block: Oid,
    dedup_set: HashSet<ItemPointer>,
}

impl<'a> HybridScanExecutor<'a> {
    pub fn new(engine: &'a Engine, plan: HybridScanPlan, txn: &'a Transaction) -> Self {
        let tg_count_snapshot = plan.table.tile_group_count();
        let mut mode = plan.mode;
        let mut current_tg_offset = 0;
        let mut boundary_block = 0;
        let mut index_side_armed = false;

        match mode {
            ScanMode::Seq => {}
            ScanMode::Index => {
                current_tg_offset = tg_count_snapshot;
                index_side_armed = plan.index.is_some();
            }
            ScanMode::Hybrid => match plan.index.as_ref().and_then(|ix| ix.indexed_tile_group_offset()) {
                Some(k) => {
                    current_tg_offset = k + 1;
                    boundary_block = plan.table.tile_group(k).map(|tg| tg.id()).unwrap_or(0);
                    index_side_armed = true;
                }
                // Sentinel "empty" prefix: degrade to a pure sequential scan
                // (spec §4.5 init rule for HYBRID).
                None => mode = ScanMode::Seq,
            },
        }

        HybridScanExecutor {
            engine,
            plan,
            txn,
            mode,
            current_tg_offset,
            tg_count_snapshot,
            index_side_armed,
            index_done: false,
            index_result: VecDeque::new(),
            boundary_block,
            dedup_set: HashSet::new(),
        }
    }

    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    pub fn next(&mut self) -> EngineResult<Option<LogicalTile>> {
        if self.index_side_armed && !self.index_done {
            self.run_index_side()?;
            self.index_done = true;
        }
        if let Some(tile) = self.index_result.pop_front() {
            return Ok(Some(tile));
        }
        self.run_seq_side()
    }

    fn project(&self, values: &[Value]) -> Vec<Value> {
        self.plan.projection.iter().map(|&c| values[c].clone()).collect()
    }

    fn matches(&self, values: &[Value]) -> bool {
        match &self.plan.predicate {
            Some(pred) => pred.evaluate(&Tuple::new(values.to_vec())).is_true(),
            None => true,
        }
    }

    /// §4.5.1: one index lookup, chain-walked to a visible version per
    /// candidate, bucketed by tile-group id into `index_result`.
    fn run_index_side(&mut self) -> EngineResult<()> {
        let Some(index) = self.plan.index.clone() else {
            return Ok(());
        };

        let candidates = match &self.plan.key_desc {
            Some(desc) => {
                let values: Vec<Value> = desc.key_values.iter().map(|kv| kv.resolve(self.txn)).collect();
                index
                    .scan_range(&values, &desc.key_column_ids, &desc.comparators, desc.direction)
                    .unwrap_or_else(|| index.scan_all())
            }
            None => index.scan_all(),
        };

        let columns = descriptors_from_schema(self.plan.table.schema(), &self.plan.projection);
        let chain_bound = self.plan.table.chain_walk_bound();
        let mut buckets: BTreeMap<Oid, Vec<(u32, Vec<Value>)>> = BTreeMap::new();

        for entry in candidates {
            let mut ptr = entry.get();
            if self.mode == ScanMode::Hybrid && ptr.block >= self.boundary_block {
                self.dedup_set.insert(ptr);
            }

            let mut steps = 0usize;
            loop {
                steps += 1;
                if steps > chain_bound {
                    return Err(EngineError::Internal(
                        "version chain walk exceeded the table's update bound".into(),
                    ));
                }

                let tg = self
                    .engine
                    .tile_group_by_id(ptr.block)
                    .ok_or_else(|| EngineError::Internal(format!("dangling item pointer {ptr}")))?;
                let header = tg.header().get(ptr.offset);

                match self.engine.mvcc().is_visible(header, self.txn) {
                    Visibility::Visible => {
                        self.engine.mvcc().perform_read(self.txn, header, ptr).map_err(|e| {
                            self.txn.set_failure();
                            e
                        })?;
                        let values = tg.read_tuple(ptr.offset);
                        if self.matches(&values) {
                            buckets.entry(tg.id()).or_default().push((ptr.offset, self.project(&values)));
                        }
                        break;
                    }
                    Visibility::Invisible | Visibility::Deleted => {
                        let next = header.next_version();
                        if next.is_null() {
                            break;
                        }
                        let end = header.end_cid();
                        if end != MAX_CID && end < self.engine.mvcc().max_committed_cid() {
                            // Dead version discovered mid-walk: reclaim and
                            // redirect the index entry (spec §4.5.1 / §9's
                            // cooperative GC handoff).
                            if header.cas_to_invalid(INITIAL_TXN) {
                                entry.redirect(next);
                                self.engine.gc().recycle_slot(
                                    tg.table_id(),
                                    tg.clone(),
                                    ptr.offset,
                                    self.engine.mvcc().max_committed_cid(),
                                );
                            }
                        }
                        ptr = next;
                    }
                }
            }
        }

        for (tg_id, rows) in buckets {
            let mut tile = LogicalTile::new(tg_id, columns.clone());
            for (offset, values) in rows {
                tile.push(offset, true, values);
            }
            if !tile.is_empty() {
                self.index_result.push_back(tile);
            }
        }
        Ok(())
    }

    /// §4.5.2: one tile group per call, skipping anything already reported
    /// by the index side via `dedup_set`.
    fn run_seq_side(&mut self) -> EngineResult<Option<LogicalTile>> {
        while self.current_tg_offset < self.tg_count_snapshot {
            let offset = self.current_tg_offset;
            self.current_tg_offset += 1;

            let Some(tg) = self.plan.table.tile_group(offset) else {
                continue;
            };
            let upper_bound_block = self.dedup_set.iter().map(|p| p.block).max().unwrap_or(0);
            let columns = descriptors_from_schema(self.plan.table.schema(), &self.plan.projection);
            let mut tile = LogicalTile::new(tg.id(), columns);

            for s in 0..tg.next_slot() {
                let ptr = ItemPointer::new(tg.id(), s);
                if self.mode == ScanMode::Hybrid && tg.id() <= upper_bound_block && self.dedup_set.contains(&ptr) {
                    continue;
                }

                let header = tg.header().get(s);
                let visibility = self.engine.mvcc().is_visible(header, self.txn);
                let values = tg.read_tuple(s);
                let matched = self.matches(&values);

                if visibility.is_visible() {
                    if matched {
                        tile.push(s, true, self.project(&values));
                    }
                } else if matched {
                    self.engine.mvcc().perform_read(self.txn, header, ptr).map_err(|e| {
                        self.txn.set_failure();
                        e
                    })?;
                }
            }

            if !tile.is_empty() {
                return Ok(Some(tile));
            }
        }
        Ok(None)
    }
}
