//! Tile-group store (TGS): storage allocation, per-slot MVCC metadata, and
//! constant-time slot addressing (spec §4.1).

pub mod table;
pub mod tile_group;

pub use table::Table;
pub use tile_group::{SlotHeader, TileGroup, TileGroupHeader};
