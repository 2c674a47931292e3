//! Core identifier types shared across every component.
//!
//! Mirrors the template's habit (`core/block.rs`'s `BlockMetadata`) of
//! collecting small, widely-shared value types in one place rather than
//! re-declaring them per module.

use std::cmp::Ordering;
use std::fmt;

/// Object identifier: table ids, database ids, tile-group ids, index ids.
pub type Oid = u64;

/// Transaction identifier. Writers publish this into a slot header while a
/// version is tentative.
pub type TxnId = u64;

/// Commit timestamp ("cid" in spec terms). Also used as a transaction's
/// snapshot value.
pub type Cid = u64;

/// No writer currently holds the slot.
pub const INITIAL_TXN: TxnId = 0;

/// The slot is dead and reclaimable; never a live writer id.
pub const INVALID_TXN: TxnId = TxnId::MAX;

/// Open end of a version's visibility interval.
pub const MAX_CID: Cid = Cid::MAX;

/// First id handed out by the transaction id generator. Chosen so that
/// `INITIAL_TXN`/`INVALID_TXN` can never collide with a real writer.
pub const START_TXN_ID: TxnId = 1;

/// First commit id handed out by the commit id generator.
pub const START_CID: Cid = 1;

/// Sentinel tile-group offset meaning "no tile group".
pub const INVALID_OID: Oid = Oid::MAX;

/// `(block, offset)` reference to a slot inside a tile group.
///
/// Equality and ordering are lexicographic on `(block, offset)`; the null
/// value is `ItemPointer::NULL`, distinguishable from any real pointer
/// because block id `INVALID_OID` is never allocated to a real tile group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemPointer {
    pub block: Oid,
    pub offset: u32,
}

impl ItemPointer {
    pub const NULL: ItemPointer = ItemPointer {
        block: INVALID_OID,
        offset: u32::MAX,
    };

    pub fn new(block: Oid, offset: u32) -> Self {
        ItemPointer { block, offset }
    }

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }
}

impl Default for ItemPointer {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for ItemPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.block, self.offset)
    }
}

/// Tri-valued predicate result, per spec §3/§9's `Evaluate(tuple) ->
/// tri-valued bool` contract (NULL-handling comparisons yield `Unknown`
/// rather than coercing to `false`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriBool {
    True,
    False,
    Unknown,
}

impl TriBool {
    /// SQL semantics: only `True` counts as a predicate match.
    pub fn is_true(self) -> bool {
        matches!(self, TriBool::True)
    }

    pub fn and(self, other: TriBool) -> TriBool {
        use TriBool::*;
        match (self, other) {
            (False, _) | (_, False) => False,
            (True, True) => True,
            _ => Unknown,
        }
    }
}

/// Ordering direction for range scans (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDirection {
    Forward,
    Backward,
}

/// Comparator used to build a multi-column scan predicate against an
/// ordered index (spec §4.3's `scan_range(values, key_column_ids,
/// comparators, direction)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    pub fn matches(self, ord: Ordering) -> bool {
        match self {
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Lte => ord != Ordering::Greater,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Gte => ord != Ordering::Less,
        }
    }
}
