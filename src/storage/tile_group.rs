//! Tile groups: fixed-capacity batches of rows with per-slot MVCC headers.
//!
//! Grounded on the template's `categories/storage/heap_file.rs` (free-slot
//! allocation via an atomic cursor) and `categories/storage/columnar.rs`
//! (column-major value storage), generalized to carry the MVCC metadata
//! spec §3 requires per slot rather than the template's page-level
//! free-space map.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::error::{EngineError, EngineResult};
use crate::types::{ItemPointer, Oid, TxnId, INITIAL_TXN, INVALID_OID, INVALID_TXN, MAX_CID};
use crate::value::{Schema, Value};

/// One slot's MVCC header fields (spec §3 "Slot header").
///
/// `next_version`/`prev_version` are stored as two atomics each rather than
/// one atomic `ItemPointer` because no native width covers `(u64, u32)`;
/// each field is only ever written by the single writer holding the slot
/// (for `next_version`) or by the online builder's GC handoff (redirecting
/// an index entry, which lives on the index side, not here), so plain
/// atomics with `Relaxed` loads gated by the `txn_id` CAS are sufficient.
pub struct SlotHeader {
    txn_id: AtomicU64,
    begin_cid: AtomicU64,
    end_cid: AtomicU64,
    next_block: AtomicU64,
    next_offset: AtomicU32,
    prev_block: AtomicU64,
    prev_offset: AtomicU32,
}

impl SlotHeader {
    fn new() -> Self {
        SlotHeader {
            txn_id: AtomicU64::new(INITIAL_TXN),
            begin_cid: AtomicU64::new(MAX_CID),
            end_cid: AtomicU64::new(MAX_CID),
            next_block: AtomicU64::new(INVALID_OID),
            next_offset: AtomicU32::new(u32::MAX),
            prev_block: AtomicU64::new(INVALID_OID),
            prev_offset: AtomicU32::new(u32::MAX),
        }
    }

    pub fn txn_id(&self) -> TxnId {
        self.txn_id.load(Ordering::Acquire)
    }

    pub fn begin_cid(&self) -> u64 {
        self.begin_cid.load(Ordering::Acquire)
    }

    pub fn end_cid(&self) -> u64 {
        self.end_cid.load(Ordering::Acquire)
    }

    pub fn set_begin_cid(&self, cid: u64) {
        self.begin_cid.store(cid, Ordering::Release);
    }

    pub fn set_end_cid(&self, cid: u64) {
        self.end_cid.store(cid, Ordering::Release);
    }

    pub fn next_version(&self) -> ItemPointer {
        let block = self.next_block.load(Ordering::Acquire);
        let offset = self.next_offset.load(Ordering::Acquire);
        if block == INVALID_OID {
            ItemPointer::NULL
        } else {
            ItemPointer::new(block, offset)
        }
    }

    pub fn set_next_version(&self, ptr: ItemPointer) {
        self.next_offset.store(ptr.offset, Ordering::Release);
        self.next_block.store(ptr.block, Ordering::Release);
    }

    pub fn prev_version(&self) -> ItemPointer {
        let block = self.prev_block.load(Ordering::Acquire);
        let offset = self.prev_offset.load(Ordering::Acquire);
        if block == INVALID_OID {
            ItemPointer::NULL
        } else {
            ItemPointer::new(block, offset)
        }
    }

    pub fn set_prev_version(&self, ptr: ItemPointer) {
        self.prev_offset.store(ptr.offset, Ordering::Release);
        self.prev_block.store(ptr.block, Ordering::Release);
    }

    /// Single-writer enforcement: claim the slot for `txn`, CAS'ing from
    /// `INITIAL_TXN`.
    pub fn try_acquire(&self, txn: TxnId) -> bool {
        self.txn_id
            .compare_exchange(INITIAL_TXN, txn, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Publish a committed writer back to `INITIAL_TXN`.
    pub fn release_to_initial(&self) {
        self.txn_id.store(INITIAL_TXN, Ordering::Release);
    }

    /// Mark the slot dead and reclaimable.
    pub fn mark_invalid(&self) {
        self.txn_id.store(INVALID_TXN, Ordering::Release);
    }

    /// GC handoff CAS (spec §4.5.1 / §4.6): only succeeds if nobody else has
    /// already reclaimed or re-acquired the slot.
    pub fn cas_to_invalid(&self, expected: TxnId) -> bool {
        self.txn_id
            .compare_exchange(expected, INVALID_TXN, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn init_for(&self, txn: TxnId) {
        self.txn_id.store(txn, Ordering::Release);
        self.begin_cid.store(MAX_CID, Ordering::Release);
        self.end_cid.store(MAX_CID, Ordering::Release);
        self.next_block.store(INVALID_OID, Ordering::Release);
        self.next_offset.store(u32::MAX, Ordering::Release);
        self.prev_block.store(INVALID_OID, Ordering::Release);
        self.prev_offset.store(u32::MAX, Ordering::Release);
    }
}

/// Per-slot headers for one tile group, plus the allocation cursor.
pub struct TileGroupHeader {
    headers: Vec<SlotHeader>,
    next_slot: AtomicU32,
}

impl TileGroupHeader {
    fn new(capacity: usize) -> Self {
        let mut headers = Vec::with_capacity(capacity);
        headers.resize_with(capacity, SlotHeader::new);
        TileGroupHeader {
            headers,
            next_slot: AtomicU32::new(0),
        }
    }

    pub fn get(&self, offset: u32) -> &SlotHeader {
        &self.headers[offset as usize]
    }

    pub fn capacity(&self) -> usize {
        self.headers.len()
    }

    /// Number of slots ever allocated (spec §3's `next_slot` cursor).
    pub fn next_slot(&self) -> u32 {
        self.next_slot.load(Ordering::Acquire)
    }

    /// Claim the next free slot, or `None` if the tile group is full.
    fn try_claim(&self) -> Option<u32> {
        loop {
            let cur = self.next_slot.load(Ordering::Acquire);
            if cur as usize >= self.headers.len() {
                return None;
            }
            if self
                .next_slot
                .compare_exchange(cur, cur + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(cur);
            }
        }
    }
}

/// Column-major value storage for one tile group (spec §3 "Tile group").
///
/// One `RwLock<Vec<Value>>` per column: reads proceed concurrently, a write
/// only ever touches the single slot the writer owns (guaranteed by the
/// `txn_id` CAS in `SlotHeader`), so write contention is negligible in
/// practice despite the coarse-grained lock.
pub struct TileGroup {
    id: Oid,
    table_id: Oid,
    database_id: Oid,
    columns: Vec<RwLock<Vec<Value>>>,
    header: TileGroupHeader,
}

impl TileGroup {
    pub fn new(id: Oid, table_id: Oid, database_id: Oid, schema: &Schema, capacity: usize) -> Self {
        let columns = (0..schema.column_count())
            .map(|_| RwLock::new(vec![Value::Null; capacity]))
            .collect();
        TileGroup {
            id,
            table_id,
            database_id,
            columns,
            header: TileGroupHeader::new(capacity),
        }
    }

    pub fn id(&self) -> Oid {
        self.id
    }

    pub fn table_id(&self) -> Oid {
        self.table_id
    }

    pub fn database_id(&self) -> Oid {
        self.database_id
    }

    pub fn header(&self) -> &TileGroupHeader {
        &self.header
    }

    pub fn capacity(&self) -> usize {
        self.header.capacity()
    }

    pub fn next_slot(&self) -> u32 {
        self.header.next_slot()
    }

    pub fn get_value(&self, col: usize, offset: u32) -> Value {
        self.columns[col].read()[offset as usize].clone()
    }

    pub fn set_value(&self, col: usize, offset: u32, value: Value) {
        self.columns[col].write()[offset as usize] = value;
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Claim a slot and initialize its header for `txn`, per spec §4.1's
    /// `allocate_slot`. Returns `None` when the tile group is full — the
    /// caller (the table) installs a new tile group and retries.
    pub fn try_allocate(&self, txn: TxnId) -> Option<ItemPointer> {
        let slot = self.header.try_claim()?;
        self.header.get(slot).init_for(txn);
        Some(ItemPointer::new(self.id, slot))
    }

    pub fn write_tuple(&self, offset: u32, values: &[Value]) -> EngineResult<()> {
        if values.len() != self.columns.len() {
            return Err(EngineError::Internal(format!(
                "tuple has {} values, schema has {} columns",
                values.len(),
                self.columns.len()
            )));
        }
        for (col, value) in values.iter().enumerate() {
            self.set_value(col, offset, value.clone());
        }
        Ok(())
    }

    pub fn read_tuple(&self, offset: u32) -> Vec<Value> {
        (0..self.columns.len())
            .map(|c| self.get_value(c, offset))
            .collect()
    }
}
