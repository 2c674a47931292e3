//! Unordered (hash) index: O(1) point lookups, no range scan support.
//!
//! Grounded on `original_source/src/backend/index/hash_index.cpp`, which
//! wraps `cuckoohash_map` with the same insert/conditional-insert/delete
//! shape as the B-tree index but refuses range predicates outright.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::key::{Key, KeySchema};
use super::{
    ConditionalInsertOutcome, DeleteOutcome, Index, IndexEntry, IndexKind, IndexedPrefix,
    InsertOutcome, InsertPredicate,
};
use crate::error::EngineResult;
use crate::types::{CompareOp, ItemPointer, Oid, ScanDirection};
use crate::value::Value;

pub struct HashIndex {
    id: Oid,
    kind: IndexKind,
    key_schema: KeySchema,
    map: RwLock<HashMap<Key, Vec<Arc<IndexEntry>>>>,
    indexed_prefix: IndexedPrefix,
}

impl HashIndex {
    pub fn new(id: Oid, kind: IndexKind, key_schema: KeySchema) -> Self {
        assert!(!kind.is_ordered(), "HashIndex requires a hash kind");
        HashIndex {
            id,
            kind,
            key_schema,
            map: RwLock::new(HashMap::new()),
            indexed_prefix: IndexedPrefix::new(),
        }
    }
}

impl Index for HashIndex {
    fn id(&self) -> Oid {
        self.id
    }

    fn kind(&self) -> IndexKind {
        self.kind
    }

    fn key_schema(&self) -> &KeySchema {
        &self.key_schema
    }

    fn insert(&self, key: Key, ptr: ItemPointer) -> EngineResult<InsertOutcome> {
        let mut map = self.map.write();
        if self.kind.is_unique() && map.get(&key).is_some_and(|v| !v.is_empty()) {
            return Ok(InsertOutcome::Duplicate);
        }
        let entries = map.entry(key).or_default();
        // A writer's direct insert and the online builder's later catch-up
        // scan of the same tile group can both try to index this slot; skip
        // the second one rather than leaving two entries for one pointer.
        if entries.iter().any(|e| e.get() == ptr) {
            return Ok(InsertOutcome::Duplicate);
        }
        entries.push(IndexEntry::new(ptr));
        Ok(InsertOutcome::Inserted)
    }

    fn conditional_insert(
        &self,
        key: Key,
        ptr: ItemPointer,
        predicate: &InsertPredicate,
    ) -> EngineResult<ConditionalInsertOutcome> {
        let mut map = self.map.write();
        if let Some(existing) = map.get(&key) {
            for entry in existing {
                if predicate(entry.get()) {
                    return Ok(ConditionalInsertOutcome::PredicateFailed);
                }
            }
        }
        map.entry(key).or_default().push(IndexEntry::new(ptr));
        Ok(ConditionalInsertOutcome::Inserted)
    }

    fn delete(&self, key: &Key, ptr: ItemPointer) -> EngineResult<DeleteOutcome> {
        let mut map = self.map.write();
        match map.get_mut(key) {
            Some(entries) => {
                let before = entries.len();
                entries.retain(|e| e.get() != ptr);
                let after = entries.len();
                let empty = entries.is_empty();
                if empty {
                    map.remove(key);
                }
                if after < before || before == 0 {
                    Ok(DeleteOutcome::Deleted)
                } else {
                    Ok(DeleteOutcome::NotFound)
                }
            }
            None => Ok(DeleteOutcome::NotFound),
        }
    }

    fn scan_all(&self) -> Vec<Arc<IndexEntry>> {
        self.map.read().values().flatten().cloned().collect()
    }

    fn scan_key(&self, key: &Key) -> Vec<Arc<IndexEntry>> {
        self.map.read().get(key).cloned().unwrap_or_default()
    }

    fn scan_range(
        &self,
        _values: &[Value],
        _key_column_ids: &[usize],
        _comparators: &[CompareOp],
        _direction: ScanDirection,
    ) -> Option<Vec<Arc<IndexEntry>>> {
        None
    }

    fn indexed_tile_group_offset(&self) -> Option<usize> {
        self.indexed_prefix.get().map(|n| n - 1)
    }

    fn advance_indexed_tile_group_offset(&self) {
        self.indexed_prefix.advance();
    }
}
