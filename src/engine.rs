//! Engine: the process-wide counters and the Table/Transaction/Builder
//! surface (spec §6, §9 "no global mutable state beyond the id/timestamp
//! counters").
//!
//! Grounded on the template's `runtime/engine.rs`, which already owns a
//! registry of blocks plus the shared counters/metrics every block reads;
//! generalized here to own the table registry, the process-wide
//! tile-group-id map (spec §4.1's `tile_group_by_id`), the MVCC manager,
//! and the garbage collector.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::concurrency::{GarbageCollector, IsolationLevel, MvccManager, Transaction};
use crate::error::{EngineError, EngineResult};
use crate::execution::hybrid_scan::{HybridScanExecutor, HybridScanPlan};
use crate::index::builder::IndexBuilder;
use crate::index::key::{Key, KeyColumn, KeySchema};
use crate::index::{HashIndex, IndexHandle, IndexKind, OrderedIndex};
use crate::log::{LogSink, NullLogSink};
use crate::storage::{table::Table, TileGroup};
use crate::types::{Cid, ItemPointer, Oid};
use crate::value::{Schema, Value};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub tile_group_capacity: usize,
    pub max_tile_groups: Option<usize>,
    pub isolation: IsolationLevel,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            tile_group_capacity: 1024,
            max_tile_groups: None,
            isolation: IsolationLevel::ReadCommitted,
        }
    }
}

pub struct Engine {
    config: EngineConfig,
    mvcc: MvccManager,
    gc: GarbageCollector,
    tables: RwLock<HashMap<Oid, Arc<Table>>>,
    tile_groups_by_id: RwLock<HashMap<Oid, Arc<TileGroup>>>,
    next_table_id: AtomicU64,
    next_tile_group_id: AtomicU64,
    log_sink: Arc<dyn LogSink>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Engine {
            mvcc: MvccManager::new(config.isolation),
            gc: GarbageCollector::new(),
            tables: RwLock::new(HashMap::new()),
            tile_groups_by_id: RwLock::new(HashMap::new()),
            next_table_id: AtomicU64::new(0),
            next_tile_group_id: AtomicU64::new(0),
            log_sink: Arc::new(NullLogSink),
            config,
        }
    }

    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = sink;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn mvcc(&self) -> &MvccManager {
        &self.mvcc
    }

    pub fn gc(&self) -> &GarbageCollector {
        &self.gc
    }

    pub fn tile_group_by_id(&self, id: Oid) -> Option<Arc<TileGroup>> {
        self.tile_groups_by_id.read().get(&id).cloned()
    }

    fn mint_tile_group_id(&self) -> Oid {
        self.next_tile_group_id.fetch_add(1, Ordering::AcqRel)
    }

    pub fn create_table(&self, schema: Schema) -> Arc<Table> {
        let id = self.next_table_id.fetch_add(1, Ordering::AcqRel);
        let table = Arc::new(Table::new(
            id,
            0,
            schema,
            self.config.tile_group_capacity,
            self.config.max_tile_groups,
        ));
        self.tables.write().insert(id, table.clone());
        table
    }

    pub fn table(&self, id: Oid) -> Option<Arc<Table>> {
        self.tables.read().get(&id).cloned()
    }

    /// `add_index` (spec §6): `key_columns` names the source table columns,
    /// in key order; types are read off the table schema.
    pub fn add_index(&self, table: &Table, kind: IndexKind, key_columns: Vec<usize>) -> IndexHandle {
        let schema = table.schema();
        let key_schema = KeySchema::new(
            key_columns
                .iter()
                .map(|&c| KeyColumn {
                    source_column: c,
                    ty: schema.columns[c].ty,
                })
                .collect(),
        );
        let id = table.next_index_id();
        let index: IndexHandle = if kind.is_ordered() {
            Arc::new(OrderedIndex::new(id, kind, key_schema))
        } else {
            Arc::new(HashIndex::new(id, kind, key_schema))
        };
        table.add_index(index.clone());
        index
    }

    pub fn drop_index(&self, table: &Table, index_id: Oid) {
        table.drop_index(index_id);
    }

    /// Drive `index` to full coverage of `table` right now. Idempotent; safe
    /// to call repeatedly from any background thread (spec §6's Builder
    /// API).
    pub fn build_index(&self, table: &Arc<Table>, index: &IndexHandle) -> EngineResult<usize> {
        let key_columns: Vec<usize> = index
            .key_schema()
            .columns
            .iter()
            .map(|c| c.source_column)
            .collect();
        let builder = IndexBuilder::new(table.clone(), index.clone(), key_columns);
        builder.build_all()
    }

    /// `build_one_tile_group` (spec §6): advance `index` by exactly one tile
    /// group, for callers that want to interleave builder steps with other
    /// work rather than running to completion.
    pub fn build_one_tile_group(&self, table: &Arc<Table>, index: &IndexHandle) -> EngineResult<bool> {
        let key_columns: Vec<usize> = index
            .key_schema()
            .columns
            .iter()
            .map(|c| c.source_column)
            .collect();
        let builder = IndexBuilder::new(table.clone(), index.clone(), key_columns);
        Ok(builder.build_next_tile_group()?.is_some())
    }

    pub fn begin(&self) -> Transaction {
        self.mvcc.begin()
    }

    pub fn commit(&self, txn: &Transaction) -> EngineResult<Cid> {
        self.log_sink.begin(txn.cid);
        let cid = self.mvcc.commit(txn, |ptr| self.header_tile_group(ptr))?;
        self.log_sink.commit(cid);
        self.gc.collect(self.mvcc.oldest_active_snapshot_cid());
        Ok(cid)
    }

    pub fn abort(&self, txn: &Transaction) -> EngineResult<()> {
        self.mvcc.abort(txn, |ptr| self.header_tile_group(ptr))
    }

    fn header_tile_group(&self, ptr: ItemPointer) -> EngineResult<Arc<TileGroup>> {
        self.tile_group_by_id(ptr.block)
            .ok_or_else(|| EngineError::Internal(format!("dangling item pointer {ptr}")))
    }

    pub fn insert(&self, txn: &Transaction, table: &Arc<Table>, values: Vec<Value>) -> EngineResult<ItemPointer> {
        let tile_groups_by_id = &self.tile_groups_by_id;
        let (ptr, tg) = table.allocate_slot(
            txn.txn_id,
            || self.mint_tile_group_id(),
            |new_tg| {
                tile_groups_by_id.write().insert(new_tg.id(), new_tg);
            },
        )?;
        tg.write_tuple(ptr.offset, &values)?;
        self.mvcc.perform_insert(txn, ptr);
        for index in table.indexes() {
            self.insert_into_index(&index, &values, ptr, txn)?;
        }
        self.log_sink.insert(txn.cid, ptr);
        Ok(ptr)
    }

    fn insert_into_index(
        &self,
        index: &IndexHandle,
        values: &[Value],
        ptr: ItemPointer,
        txn: &Transaction,
    ) -> EngineResult<()> {
        let key_values: Vec<Value> = index
            .key_schema()
            .columns
            .iter()
            .map(|c| values[c.source_column].clone())
            .collect();
        let key = Key::encode(index.key_schema(), &key_values);
        if index.kind().is_unique() {
            let mvcc = &self.mvcc;
            let outcome = index.conditional_insert(key, ptr, &|existing| {
                match self.tile_group_by_id(existing.block) {
                    Some(tg) => mvcc.is_visible_or_dirty(tg.header().get(existing.offset), txn),
                    None => false,
                }
            })?;
            if let crate::index::ConditionalInsertOutcome::PredicateFailed = outcome {
                return Err(EngineError::UniqueViolation);
            }
        } else {
            index.insert(key, ptr)?;
        }
        Ok(())
    }

    pub fn update(
        &self,
        txn: &Transaction,
        table: &Arc<Table>,
        old_ptr: ItemPointer,
        new_values: Vec<Value>,
    ) -> EngineResult<ItemPointer> {
        let old_tg = self.header_tile_group(old_ptr)?;
        let old_values = old_tg.read_tuple(old_ptr.offset);

        let tile_groups_by_id = &self.tile_groups_by_id;
        let (new_ptr, new_tg) = table.allocate_slot(
            txn.txn_id,
            || self.mint_tile_group_id(),
            |new_tg| {
                tile_groups_by_id.write().insert(new_tg.id(), new_tg);
            },
        )?;
        new_tg.write_tuple(new_ptr.offset, &new_values)?;

        let old_header = old_tg.header().get(old_ptr.offset);
        old_header.set_next_version(new_ptr);
        new_tg.header().get(new_ptr.offset).set_prev_version(old_ptr);

        self.mvcc
            .perform_update(txn, old_header, old_ptr, new_ptr)?;
        table.record_update();

        for index in table.indexes() {
            let key_columns: Vec<usize> = index
                .key_schema()
                .columns
                .iter()
                .map(|c| c.source_column)
                .collect();
            let old_key_values: Vec<Value> = key_columns.iter().map(|&c| old_values[c].clone()).collect();
            let new_key_values: Vec<Value> = key_columns.iter().map(|&c| new_values[c].clone()).collect();
            let old_key = Key::encode(index.key_schema(), &old_key_values);
            let new_key = Key::encode(index.key_schema(), &new_key_values);
            if old_key != new_key {
                index.delete(&old_key, old_ptr)?;
                self.insert_into_index(&index, &new_values, new_ptr, txn)?;
            }
            // Key unchanged: leave the entry anchored at the tuple's
            // original location. `run_index_side`'s forward chain walk
            // (`next_version`) reaches the live version from there; the
            // original only redirects an index entry during GC reclamation
            // of a dead version mid-walk, never on an ordinary update (see
            // DESIGN.md's grounding note on `IndexEntry::redirect`).
        }

        self.log_sink.update(txn.cid, old_ptr, new_ptr);
        Ok(new_ptr)
    }

    pub fn delete(&self, txn: &Transaction, table: &Arc<Table>, ptr: ItemPointer) -> EngineResult<()> {
        let tg = self.header_tile_group(ptr)?;
        let header = tg.header().get(ptr.offset);
        let values = tg.read_tuple(ptr.offset);
        self.mvcc.perform_delete(txn, header, ptr)?;

        for index in table.indexes() {
            let key_values: Vec<Value> = index
                .key_schema()
                .columns
                .iter()
                .map(|c| values[c.source_column].clone())
                .collect();
            let key = Key::encode(index.key_schema(), &key_values);
            index.delete(&key, ptr)?;
        }

        self.log_sink.delete(txn.cid, ptr);
        Ok(())
    }

    /// Construct a scan executor for `plan` under `txn`. Lives as long as
    /// both are borrowed; call `.next()` until it returns `None`.
    pub fn scan<'a>(&'a self, plan: HybridScanPlan, txn: &'a Transaction) -> HybridScanExecutor<'a> {
        HybridScanExecutor::new(self, plan, txn)
    }
}
