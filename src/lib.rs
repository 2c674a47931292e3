//! Hybrid scan executor, online index builder, and MVCC core.
//!
//! Ties together a tile-group store, a multi-version concurrency-control
//! protocol, an index subsystem (ordered and hash variants), the online
//! builder that brings a fresh index up to date in the background, and the
//! scan executor that blends index lookups with sequential fallback over
//! the still-unindexed suffix of a table.

pub mod engine;
pub mod error;
pub mod execution;
pub mod index;
pub mod log;
pub mod storage;
pub mod types;
pub mod value;

pub mod concurrency;

pub use engine::{Engine, EngineConfig};
pub use error::{EngineError, EngineResult};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
