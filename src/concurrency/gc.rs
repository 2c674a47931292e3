//! Garbage collector: reclaims slots whose versions are older than
//! `max_committed_cid` and unreachable by any active transaction (spec
//! §4.6).
//!
//! Grounded on the template's `categories/concurrency/mvcc.rs::gc`, which
//! walks a `VersionChain` and strips versions deleted before the oldest
//! active timestamp; generalized to the spec's opportunistic,
//! scan-triggered handoff rather than a periodic sweep.

use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::storage::TileGroup;
use crate::types::{Cid, Oid};
use std::sync::Arc;

/// A slot discovered dead during a scan, queued for reclamation once no
/// active snapshot can still need it.
struct PendingSlot {
    table_id: Oid,
    tile_group: Arc<TileGroup>,
    offset: u32,
    safe_cid: Cid,
}

/// Reclaims tile-group slots. Reclamation here means making the slot's
/// `next_slot` cursor never revisit it for *new* inserts — since tile
/// groups only grow by appending, "reclaim" is recorded as a fact (the
/// slot is dead and its chain predecessor has already been redirected by
/// the index) rather than physically compacted; a real storage engine
/// would additionally overwrite the slot's bytes, which is outside this
/// core's scope (spec §1's disk/storage-layout non-goal).
pub struct GarbageCollector {
    pending: Mutex<VecDeque<PendingSlot>>,
    reclaimed_count: Mutex<usize>,
}

impl GarbageCollector {
    pub fn new() -> Self {
        GarbageCollector {
            pending: Mutex::new(VecDeque::new()),
            reclaimed_count: Mutex::new(0),
        }
    }

    /// `recycle_slot(table, block, offset, safe_cid)`: defer reclamation
    /// until every active snapshot has `cid >= safe_cid`.
    pub fn recycle_slot(&self, table_id: Oid, tile_group: Arc<TileGroup>, offset: u32, safe_cid: Cid) {
        log::debug!(
            "gc: queued slot ({}, {}) of table {} for reclamation once active_cid >= {}",
            tile_group.id(),
            offset,
            table_id,
            safe_cid
        );
        self.pending.lock().push_back(PendingSlot {
            table_id,
            tile_group,
            offset,
            safe_cid,
        });
    }

    /// Drop every pending slot whose `safe_cid` has been cleared by
    /// `oldest_active_snapshot_cid` (or there is no active transaction at
    /// all). Returns the number of slots reclaimed this pass.
    pub fn collect(&self, oldest_active_snapshot_cid: Option<Cid>) -> usize {
        let mut pending = self.pending.lock();
        let mut reclaimed = 0;
        pending.retain(|slot| {
            let safe = match oldest_active_snapshot_cid {
                Some(oldest) => oldest >= slot.safe_cid,
                None => true,
            };
            if safe {
                debug_assert!(
                    slot.tile_group.header().get(slot.offset).txn_id()
                        == crate::types::INVALID_TXN,
                    "GC must only reclaim slots already marked INVALID_TXN"
                );
                reclaimed += 1;
            }
            !safe
        });
        if reclaimed > 0 {
            *self.reclaimed_count.lock() += reclaimed;
            log::trace!("gc: reclaimed {} slot(s) this pass", reclaimed);
        }
        reclaimed
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn reclaimed_count(&self) -> usize {
        *self.reclaimed_count.lock()
    }
}

impl Default for GarbageCollector {
    fn default() -> Self {
        Self::new()
    }
}
