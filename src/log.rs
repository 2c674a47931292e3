//! Write-ahead logging hook consumed by the core (spec §6).
//!
//! The core never implements durability itself — it only guarantees that,
//! when a `LogSink` is installed, committed records precede the visibility
//! flip of `max_committed_cid`. A no-op sink is provided for tests and for
//! callers that don't need durability.

use crate::types::{Cid, ItemPointer};

pub trait LogSink: Send + Sync {
    fn begin(&self, cid: Cid);
    fn insert(&self, cid: Cid, ptr: ItemPointer);
    fn update(&self, cid: Cid, old: ItemPointer, new: ItemPointer);
    fn delete(&self, cid: Cid, ptr: ItemPointer);
    fn commit(&self, cid: Cid);
}

/// Discards every record. Used when durability isn't wired up.
#[derive(Debug, Default)]
pub struct NullLogSink;

impl LogSink for NullLogSink {
    fn begin(&self, _cid: Cid) {}
    fn insert(&self, _cid: Cid, _ptr: ItemPointer) {}
    fn update(&self, _cid: Cid, _old: ItemPointer, _new: ItemPointer) {}
    fn delete(&self, _cid: Cid, _ptr: ItemPointer) {}
    fn commit(&self, _cid: Cid) {}
}
