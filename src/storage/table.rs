//! Table: an append-only sequence of tile groups plus the set of indexes
//! built over it.
//!
//! Grounded on the template's `core/registry.rs` pattern of wrapping a
//! `HashMap`/`Vec` in `parking_lot::RwLock` for "mostly reads, rare
//! appends" access, applied here to the tile-group vector (spec §4.1's
//! "readers snapshot length").

use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{EngineError, EngineResult};
use crate::index::IndexHandle;
use crate::types::{ItemPointer, Oid, TxnId};
use crate::value::{Schema, Value};

use super::tile_group::TileGroup;

pub struct Table {
    id: Oid,
    database_id: Oid,
    schema: Schema,
    tile_group_capacity: usize,
    max_tile_groups: Option<usize>,
    tile_groups: RwLock<Vec<Arc<TileGroup>>>,
    indexes: RwLock<Vec<IndexHandle>>,
    next_index_id: AtomicUsize,
    update_count: AtomicUsize,
}

impl Table {
    pub fn new(
        id: Oid,
        database_id: Oid,
        schema: Schema,
        tile_group_capacity: usize,
        max_tile_groups: Option<usize>,
    ) -> Self {
        Table {
            id,
            database_id,
            schema,
            tile_group_capacity,
            max_tile_groups,
            tile_groups: RwLock::new(Vec::new()),
            indexes: RwLock::new(Vec::new()),
            next_index_id: AtomicUsize::new(0),
            update_count: AtomicUsize::new(0),
        }
    }

    /// Bump the table-wide update counter (spec §8 property 7's chain-walk
    /// bound: any single version chain can be no longer than the total
    /// number of updates ever performed against the table).
    pub fn record_update(&self) {
        self.update_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn chain_walk_bound(&self) -> usize {
        self.update_count.load(Ordering::Relaxed) + 1
    }

    pub fn id(&self) -> Oid {
        self.id
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn tile_group_count(&self) -> usize {
        self.tile_groups.read().len()
    }

    pub fn tile_group(&self, offset: usize) -> Option<Arc<TileGroup>> {
        self.tile_groups.read().get(offset).cloned()
    }

    pub fn tile_groups_snapshot(&self) -> Vec<Arc<TileGroup>> {
        self.tile_groups.read().clone()
    }

    pub fn indexes(&self) -> Vec<IndexHandle> {
        self.indexes.read().clone()
    }

    pub fn add_index(&self, index: IndexHandle) {
        self.indexes.write().push(index);
    }

    pub fn drop_index(&self, index_id: Oid) {
        self.indexes.write().retain(|ix| ix.id() != index_id);
    }

    pub fn next_index_id(&self) -> Oid {
        self.next_index_id.fetch_add(1, Ordering::Relaxed) as Oid
    }

    /// Append a freshly allocated tile group. `new_id` is minted by the
    /// caller (the engine owns the global tile-group id counter).
    fn append_tile_group(&self, new_id: Oid) -> Arc<TileGroup> {
        let tg = Arc::new(TileGroup::new(
            new_id,
            self.id,
            self.database_id,
            &self.schema,
            self.tile_group_capacity,
        ));
        self.tile_groups.write().push(tg.clone());
        tg
    }

    /// `allocate_slot` (spec §4.1): atomically claim a slot in the active
    /// tile group, installing a new one on overflow. `mint_id`/`register`
    /// give the engine a place to bump its monotone tile-group id counter
    /// and register the new tile group in the process-wide id map; they may
    /// run more than once if a freshly appended tile group loses the race
    /// for its own first slot (concurrent installers), so both must be
    /// idempotent with respect to being called again.
    pub fn allocate_slot(
        &self,
        txn: TxnId,
        mint_id: impl Fn() -> Oid,
        register: impl Fn(Arc<TileGroup>),
    ) -> EngineResult<(ItemPointer, Arc<TileGroup>)> {
        loop {
            if let Some(tg) = self.tile_groups.read().last().cloned() {
                if let Some(ptr) = tg.try_allocate(txn) {
                    return Ok((ptr, tg));
                }
            }
            // No space in the current (or no) tile group: grow the table.
            if let Some(max) = self.max_tile_groups {
                if self.tile_group_count() >= max {
                    return Err(EngineError::StorageFull);
                }
            }
            let new_id = mint_id();
            let tg = self.append_tile_group(new_id);
            register(tg.clone());
            if let Some(ptr) = tg.try_allocate(txn) {
                return Ok((ptr, tg));
            }
            // Lost the race to claim even the first slot (shouldn't happen
            // with a freshly appended tile group, but loop rather than
            // assume): retry from the top.
        }
    }

    pub fn project(&self, tg: &TileGroup, offset: u32, columns: &[usize]) -> Vec<Value> {
        columns.iter().map(|&c| tg.get_value(c, offset)).collect()
    }
}
