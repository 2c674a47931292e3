//! Index set (IX): ordered (B-tree-style) and unordered (hash) indexes
//! over a table, each tracking an indexed prefix the online builder
//! advances (spec §4.3).

pub mod builder;
pub mod hashidx;
pub mod key;
pub mod ordered;

pub use builder::IndexBuilder;
pub use hashidx::HashIndex;
pub use key::{Key, KeyColumn, KeySchema};
pub use ordered::OrderedIndex;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::EngineResult;
use crate::types::{CompareOp, ItemPointer, Oid, ScanDirection};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    PrimaryUnique,
    SecondaryMulti,
    HashUnique,
    HashMulti,
}

impl IndexKind {
    pub fn is_unique(self) -> bool {
        matches!(self, IndexKind::PrimaryUnique | IndexKind::HashUnique)
    }

    pub fn is_ordered(self) -> bool {
        matches!(self, IndexKind::PrimaryUnique | IndexKind::SecondaryMulti)
    }
}

/// A single `(key, pointer)` mapping. The pointer is stored behind a
/// `Mutex` so the hybrid scan executor's GC handoff can redirect it in
/// place (spec §4.5.1 / §9's `AtomicUpdateItemPointer`) without taking the
/// index's structural write latch.
pub struct IndexEntry {
    pointer: Mutex<ItemPointer>,
}

impl IndexEntry {
    pub fn new(ptr: ItemPointer) -> Arc<Self> {
        Arc::new(IndexEntry {
            pointer: Mutex::new(ptr),
        })
    }

    pub fn get(&self) -> ItemPointer {
        *self.pointer.lock()
    }

    /// Atomically swap in the successor pointer (the GC handoff).
    pub fn redirect(&self, new: ItemPointer) {
        *self.pointer.lock() = new;
    }
}

/// Predicate passed to `conditional_insert`: receives the existing pointer,
/// answers whether it blocks the insert (spec §4.3).
pub type InsertPredicate<'a> = dyn Fn(ItemPointer) -> bool + 'a;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalInsertOutcome {
    Inserted,
    PredicateFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Common capability set every index variant exposes (spec §9
/// "Polymorphism across index kinds"). `scan_range` is only meaningful for
/// ordered indexes; unordered indexes return `None`.
pub trait Index: Send + Sync {
    fn id(&self) -> Oid;
    fn kind(&self) -> IndexKind;
    fn key_schema(&self) -> &KeySchema;

    fn insert(&self, key: Key, ptr: ItemPointer) -> EngineResult<InsertOutcome>;

    fn conditional_insert(
        &self,
        key: Key,
        ptr: ItemPointer,
        predicate: &InsertPredicate,
    ) -> EngineResult<ConditionalInsertOutcome>;

    fn delete(&self, key: &Key, ptr: ItemPointer) -> EngineResult<DeleteOutcome>;

    fn scan_all(&self) -> Vec<Arc<IndexEntry>>;

    fn scan_key(&self, key: &Key) -> Vec<Arc<IndexEntry>>;

    /// Ordered range scan; `None` for unordered (hash) indexes.
    fn scan_range(
        &self,
        values: &[Value],
        key_column_ids: &[usize],
        comparators: &[CompareOp],
        direction: ScanDirection,
    ) -> Option<Vec<Arc<IndexEntry>>>;

    /// Builder-facing: number of leading tile groups fully reflected in the
    /// index. `None` means the index is still empty.
    fn indexed_tile_group_offset(&self) -> Option<usize>;

    fn advance_indexed_tile_group_offset(&self);
}

pub type IndexHandle = Arc<dyn Index>;

/// Shared bookkeeping for the indexed-prefix counter, reused by both index
/// variants so the builder handoff logic lives in one place (spec §4.3's
/// `indexed_prefix_count`).
pub(crate) struct IndexedPrefix {
    // `usize::MAX` sentinel means "empty" (no tile group covered yet).
    count: AtomicUsize,
}

const EMPTY: usize = usize::MAX;

impl IndexedPrefix {
    pub fn new() -> Self {
        IndexedPrefix {
            count: AtomicUsize::new(EMPTY),
        }
    }

    pub fn get(&self) -> Option<usize> {
        match self.count.load(Ordering::Acquire) {
            EMPTY => None,
            n => Some(n + 1),
        }
    }

    pub fn advance(&self) {
        let mut cur = self.count.load(Ordering::Acquire);
        loop {
            let next = match cur {
                EMPTY => 0,
                n => n + 1,
            };
            match self.count.compare_exchange_weak(
                cur,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => cur = actual,
            }
        }
    }
}
