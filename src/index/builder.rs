//! Online index builder (IXB, spec §4.4): advances a fresh index's
//! `indexed_prefix_count` one tile group at a time so it can be queried
//! concurrently with ongoing inserts, without ever blocking writers.
//!
//! Grounded on `original_source/src/backend/index/index.cpp`'s incremental
//! build path plus the template's `runtime/workload.rs` step-driven task
//! shape (an object with a single `step`-like advance method the runtime
//! calls repeatedly rather than a background thread the crate would have to
//! spawn itself).

use std::sync::Arc;

use crate::error::EngineResult;
use crate::index::key::Key;
use crate::index::{IndexHandle, InsertOutcome};
use crate::storage::Table;
use crate::types::ItemPointer;

/// Drives one index to full coverage of its table, a tile group at a time.
pub struct IndexBuilder {
    table: Arc<Table>,
    index: IndexHandle,
    key_columns: Vec<usize>,
}

impl IndexBuilder {
    pub fn new(table: Arc<Table>, index: IndexHandle, key_columns: Vec<usize>) -> Self {
        IndexBuilder {
            table,
            index,
            key_columns,
        }
    }

    pub fn index(&self) -> &IndexHandle {
        &self.index
    }

    /// Whether the index has caught up with every tile group that existed
    /// at the start of this call (new tile groups appended concurrently are
    /// picked up by a later call, same as the original's "index build is
    /// never quite finished under concurrent inserts" behavior).
    pub fn is_caught_up(&self) -> bool {
        let next = match self.index.indexed_tile_group_offset() {
            Some(done) => done + 1,
            None => 0,
        };
        next >= self.table.tile_group_count()
    }

    /// Index every committed tuple in the next unindexed tile group, then
    /// advance the prefix counter. Returns the number of entries inserted,
    /// or `None` if there was no tile group left to index.
    pub fn build_next_tile_group(&self) -> EngineResult<Option<usize>> {
        let next_offset = match self.index.indexed_tile_group_offset() {
            Some(done) => done + 1,
            None => 0,
        };
        let Some(tg) = self.table.tile_group(next_offset) else {
            return Ok(None);
        };

        let mut inserted = 0;
        let capacity = tg.next_slot();
        for slot in 0..capacity {
            let header = tg.header().get(slot);
            // Only index slots with a committed, non-deleted version; a
            // slot still tentative (begin_cid == MAX_CID) or already dead
            // (txn_id == INVALID_TXN) is skipped, the scanning transaction
            // that eventually commits it is responsible for inserting into
            // every index that already covers this tile group by then.
            if header.txn_id() == crate::types::INVALID_TXN {
                continue;
            }
            if header.begin_cid() == crate::types::MAX_CID {
                continue;
            }
            if header.end_cid() != crate::types::MAX_CID {
                continue;
            }
            let values = tg.read_tuple(slot);
            let key_values: Vec<_> = self.key_columns.iter().map(|&c| values[c].clone()).collect();
            let key = Key::encode(self.index.key_schema(), &key_values);
            let ptr = ItemPointer::new(tg.id(), slot);
            if let InsertOutcome::Inserted = self.index.insert(key, ptr)? {
                inserted += 1;
            }
        }

        self.index.advance_indexed_tile_group_offset();
        Ok(Some(inserted))
    }

    /// Run to completion against the tile groups present right now.
    pub fn build_all(&self) -> EngineResult<usize> {
        let mut total = 0;
        while let Some(n) = self.build_next_tile_group()? {
            total += n;
        }
        Ok(total)
    }
}
