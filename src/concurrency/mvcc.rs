//! MVCC manager: id/timestamp generation, visibility, read/write marking,
//! and the GC epoch watermark (spec §4.2).
//!
//! Grounded on the template's `categories/concurrency/mvcc.rs`, which
//! already models `xmin`/`xmax` version brackets and a `visible_at(ts)`
//! query; generalized here from an in-process `VersionChain` over JSON
//! blobs to the spec's CAS-guarded `SlotHeader` living inside a tile group,
//! and from a single global timestamp to per-transaction read/write sets
//! plus an active-snapshot registry the garbage collector consults.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use crate::error::{EngineError, EngineResult};
use crate::storage::SlotHeader;
use crate::types::{Cid, ItemPointer, TxnId, INVALID_TXN, MAX_CID, START_CID, START_TXN_ID};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadCommitted,
    RepeatableRead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Invisible,
    Deleted,
}

impl Visibility {
    pub fn is_visible(self) -> bool {
        matches!(self, Visibility::Visible)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnResult {
    Running,
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy)]
enum WriteOp {
    Insert(ItemPointer),
    Update { old: ItemPointer, new: ItemPointer },
    Delete(ItemPointer),
}

/// A running transaction: id, snapshot, read/write sets, and a result
/// latch (spec §3 "Transaction").
pub struct Transaction {
    pub txn_id: TxnId,
    pub cid: Cid,
    isolation: IsolationLevel,
    read_set: Mutex<Vec<ItemPointer>>,
    write_set: Mutex<Vec<WriteOp>>,
    result: AtomicU8,
}

const RESULT_RUNNING: u8 = 0;
const RESULT_SUCCESS: u8 = 1;
const RESULT_FAILURE: u8 = 2;

impl Transaction {
    pub fn result(&self) -> TxnResult {
        match self.result.load(Ordering::Acquire) {
            RESULT_SUCCESS => TxnResult::Success,
            RESULT_FAILURE => TxnResult::Failure,
            _ => TxnResult::Running,
        }
    }

    pub fn set_failure(&self) {
        self.result.store(RESULT_FAILURE, Ordering::Release);
    }

    pub fn is_failed(&self) -> bool {
        self.result() == TxnResult::Failure
    }

    pub fn read_set(&self) -> Vec<ItemPointer> {
        self.read_set.lock().clone()
    }

    pub fn write_set_len(&self) -> usize {
        self.write_set.lock().len()
    }
}

/// Assigns ids/timestamps, arbitrates slot ownership, and decides
/// visibility. One instance per `Engine` (spec §5 "no global mutable state
/// beyond the id/timestamp counters").
pub struct MvccManager {
    next_txn_id: AtomicU64,
    next_commit_cid: AtomicU64,
    max_committed_cid: AtomicU64,
    isolation: IsolationLevel,
    /// Snapshot of every still-running transaction, consulted by GC to
    /// compute `oldest_active_snapshot_cid` (spec §4.6).
    active: Mutex<BTreeMap<TxnId, Cid>>,
}

impl MvccManager {
    pub fn new(isolation: IsolationLevel) -> Self {
        MvccManager {
            next_txn_id: AtomicU64::new(START_TXN_ID),
            next_commit_cid: AtomicU64::new(START_CID),
            max_committed_cid: AtomicU64::new(START_CID - 1),
            isolation,
            active: Mutex::new(BTreeMap::new()),
        }
    }

    /// `begin()`: assign `txn_id` and snapshot `cid = next_commit_id - 1`.
    pub fn begin(&self) -> Transaction {
        let txn_id = self.next_txn_id.fetch_add(1, Ordering::AcqRel);
        let cid = self.next_commit_cid.load(Ordering::Acquire) - 1;
        self.active.lock().insert(txn_id, cid);
        Transaction {
            txn_id,
            cid,
            isolation: self.isolation,
            read_set: Mutex::new(Vec::new()),
            write_set: Mutex::new(Vec::new()),
            result: AtomicU8::new(RESULT_RUNNING),
        }
    }

    pub fn max_committed_cid(&self) -> Cid {
        self.max_committed_cid.load(Ordering::Acquire)
    }

    /// Oldest snapshot any running transaction might still need (spec
    /// §4.6's GC safety bound). `None` means no transaction is running.
    pub fn oldest_active_snapshot_cid(&self) -> Option<Cid> {
        self.active.lock().values().min().copied()
    }

    /// `is_visible`: true iff `begin_cid <= txn.cid < end_cid` and the
    /// version is not a tombstone the reader shouldn't see.
    ///
    /// A slot's `txn_id` field only gates visibility while the version is
    /// *tentative* (`begin_cid == MAX_CID`, i.e. not yet committed) — that
    /// is the only state a reader must not see unless it is the creator.
    /// Once `begin_cid` is published, the slot's content is stable even if
    /// its `txn_id` is momentarily held by an in-flight updater/deleter
    /// locking it against concurrent writers (spec §4.2's
    /// `perform_update`/`perform_delete` CAS): other readers still see the
    /// committed interval, exactly as S2 requires (a reader begun before an
    /// update commits keeps seeing the pre-update value).
    pub fn is_visible(&self, header: &SlotHeader, txn: &Transaction) -> Visibility {
        let writer = header.txn_id();
        let begin = header.begin_cid();
        let end = header.end_cid();

        if writer == INVALID_TXN {
            return Visibility::Invisible;
        }

        if begin == MAX_CID {
            // Tentative version: visible only to its own creator, and only
            // if that creator hasn't also deleted it since.
            return if writer == txn.txn_id && end == MAX_CID {
                Visibility::Visible
            } else {
                Visibility::Invisible
            };
        }

        if begin <= txn.cid && txn.cid < end {
            Visibility::Visible
        } else if end <= txn.cid {
            Visibility::Deleted
        } else {
            Visibility::Invisible
        }
    }

    /// Used by `conditional_insert`'s unique-constraint predicate: does the
    /// existing mapping count as "present" (visible to this txn, or a
    /// tentative version some other transaction might still commit)?
    pub fn is_visible_or_dirty(&self, header: &SlotHeader, txn: &Transaction) -> bool {
        let writer = header.txn_id();
        if writer != INVALID_TXN && header.begin_cid() == MAX_CID {
            return true; // pending insert, might commit and collide
        }
        self.is_visible(header, txn).is_visible()
    }

    /// `perform_read`: records the read; returns `Err(ReadConflict)` only
    /// under an isolation-specific conflict.
    pub fn perform_read(
        &self,
        txn: &Transaction,
        header: &SlotHeader,
        ptr: ItemPointer,
    ) -> EngineResult<()> {
        txn.read_set.lock().push(ptr);
        if txn.isolation == IsolationLevel::RepeatableRead {
            // A newer, already-committed version exists beyond our
            // snapshot: repeatable read must not let this transaction go
            // on to write based on a stale read.
            let next = header.next_version();
            if !next.is_null() {
                let end = header.end_cid();
                if end != MAX_CID && end <= self.max_committed_cid() && end > txn.cid {
                    return Err(EngineError::ReadConflict(ptr));
                }
            }
        }
        Ok(())
    }

    /// `perform_insert`: the slot was already claimed exclusively for
    /// `txn` by `TileGroup::try_allocate`; this just records the write.
    pub fn perform_insert(&self, txn: &Transaction, ptr: ItemPointer) {
        txn.write_set.lock().push(WriteOp::Insert(ptr));
    }

    /// `perform_update`: CAS the *old* slot's `txn_id` from `INITIAL_TXN`
    /// to `txn.txn_id` to exclude concurrent updaters of the same logical
    /// tuple; the new slot is already owned via `try_allocate`. Caller has
    /// already linked `old.next_version = new` and `new.prev_version =
    /// old` before calling this (spec: "chain links are written by the
    /// caller").
    pub fn perform_update(
        &self,
        txn: &Transaction,
        old_header: &SlotHeader,
        old: ItemPointer,
        new: ItemPointer,
    ) -> EngineResult<()> {
        if !old_header.try_acquire(txn.txn_id) {
            return Err(EngineError::WriteConflict(old));
        }
        txn.write_set.lock().push(WriteOp::Update { old, new });
        Ok(())
    }

    /// `perform_delete`: CAS the slot's own `txn_id` to exclude concurrent
    /// writers, deferring the tombstone (`end_cid`) publish to `commit`.
    pub fn perform_delete(&self, txn: &Transaction, header: &SlotHeader, ptr: ItemPointer) -> EngineResult<()> {
        if !header.try_acquire(txn.txn_id) {
            return Err(EngineError::WriteConflict(ptr));
        }
        txn.write_set.lock().push(WriteOp::Delete(ptr));
        Ok(())
    }

    /// `commit`: assign `commit_cid`, publish `begin_cid`/`end_cid`, flip
    /// `txn_id` back to `INITIAL_TXN`, advance `max_committed_cid`.
    ///
    /// `header_of` resolves an `ItemPointer` to its `SlotHeader`; it is
    /// supplied by the caller (the engine has the tile-group map, MVCC
    /// does not) so this module stays storage-layout agnostic.
    pub fn commit(
        &self,
        txn: &Transaction,
        header_of: impl Fn(ItemPointer) -> EngineResult<std::sync::Arc<crate::storage::TileGroup>>,
    ) -> EngineResult<Cid> {
        let commit_cid = self.next_commit_cid.fetch_add(1, Ordering::AcqRel);

        for op in txn.write_set.lock().iter() {
            match *op {
                WriteOp::Insert(ptr) => {
                    let tg = header_of(ptr)?;
                    let h = tg.header().get(ptr.offset);
                    h.set_begin_cid(commit_cid);
                    h.release_to_initial();
                }
                WriteOp::Update { old, new } => {
                    let old_tg = header_of(old)?;
                    let new_tg = header_of(new)?;
                    old_tg.header().get(old.offset).set_end_cid(commit_cid);
                    new_tg.header().get(new.offset).set_begin_cid(commit_cid);
                    old_tg.header().get(old.offset).release_to_initial();
                    new_tg.header().get(new.offset).release_to_initial();
                }
                WriteOp::Delete(ptr) => {
                    let tg = header_of(ptr)?;
                    let h = tg.header().get(ptr.offset);
                    h.set_end_cid(commit_cid);
                    h.release_to_initial();
                }
            }
        }

        self.advance_max_committed(commit_cid);
        self.active.lock().remove(&txn.txn_id);
        txn.result.store(RESULT_SUCCESS, Ordering::Release);
        Ok(commit_cid)
    }

    fn advance_max_committed(&self, cid: Cid) {
        let mut cur = self.max_committed_cid.load(Ordering::Acquire);
        while cid > cur {
            match self.max_committed_cid.compare_exchange_weak(
                cur,
                cid,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => cur = actual,
            }
        }
    }

    /// `abort`: tentative versions become reclaimable, superseded versions
    /// are restored, read/write sets are dropped.
    pub fn abort(
        &self,
        txn: &Transaction,
        header_of: impl Fn(ItemPointer) -> EngineResult<std::sync::Arc<crate::storage::TileGroup>>,
    ) -> EngineResult<()> {
        for op in txn.write_set.lock().iter() {
            match *op {
                WriteOp::Insert(ptr) => {
                    let tg = header_of(ptr)?;
                    tg.header().get(ptr.offset).mark_invalid();
                }
                WriteOp::Update { old, new } => {
                    let old_tg = header_of(old)?;
                    let new_tg = header_of(new)?;
                    let oh = old_tg.header().get(old.offset);
                    oh.set_end_cid(MAX_CID);
                    oh.set_next_version(ItemPointer::NULL);
                    oh.release_to_initial();
                    new_tg.header().get(new.offset).mark_invalid();
                }
                WriteOp::Delete(ptr) => {
                    let tg = header_of(ptr)?;
                    tg.header().get(ptr.offset).release_to_initial();
                }
            }
        }
        self.active.lock().remove(&txn.txn_id);
        txn.result.store(RESULT_FAILURE, Ordering::Release);
        Ok(())
    }
}
