//! Hybrid scan executor (HSE) and its supporting predicate/output types
//! (spec §4.5, §6, §9).

pub mod hybrid_scan;
pub mod logical_tile;
pub mod predicate;

pub use hybrid_scan::{HybridScanExecutor, HybridScanPlan, IndexKeyDescriptor, KeyValue, ScanMode};
pub use logical_tile::LogicalTile;
pub use predicate::{Comparison, Conjunction, Predicate};
