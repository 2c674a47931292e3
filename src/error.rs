//! Error kinds surfaced by the core, per spec §7.
//!
//! Same shape as the template's `core::block::BlockError`: a flat
//! `thiserror` enum, one variant per failure mode, propagated with `?`
//! rather than panicking except for genuine invariant violations.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// `perform_read` detected a conflict fatal to the current transaction.
    #[error("read conflict on item pointer {0}")]
    ReadConflict(crate::types::ItemPointer),

    /// CAS on a slot's `txn_id` failed; the caller should abort.
    #[error("write conflict on item pointer {0}")]
    WriteConflict(crate::types::ItemPointer),

    /// `conditional_insert`'s predicate rejected the insert.
    #[error("unique constraint violated for key")]
    UniqueViolation,

    /// Tile-group allocation exceeded the configured table-size bound.
    #[error("storage full: table size bound exceeded")]
    StorageFull,

    /// `delete` of a non-existent index entry.
    #[error("index entry not found")]
    NotFound,

    /// Invariant violation detected at runtime; panic-equivalent.
    #[error("internal invariant violation: {0}")]
    Internal(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
