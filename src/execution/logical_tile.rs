//! Logical tile: the executor's output unit (spec §6's emitted format).
//!
//! Grounded on the template's `categories/execution/` projection shape
//! (columns plus row indices rather than copied values), adapted to carry
//! a position list per tile group and a parallel visibility bitmap instead
//! of a single flat row vector, since a hybrid scan's seq side must also
//! report positions that failed the predicate but still needed
//! `perform_read` for conflict tracking (spec §4.5.2 step 2).

use crate::value::{Schema, Value};

#[derive(Debug, Clone)]
pub struct ColumnDescriptor {
    pub name: String,
    pub source_column: usize,
}

/// Projected columns plus position lists over one physical tile group.
/// `visibility_bitmap[i]` is `true` when `position_lists`'s i-th row is a
/// genuine match (vs. a conflict-tracking-only row); callers normally only
/// care about rows where the bitmap is set.
pub struct LogicalTile {
    pub tile_group_id: crate::types::Oid,
    pub columns: Vec<ColumnDescriptor>,
    pub position_lists: Vec<u32>,
    pub visibility_bitmap: Vec<bool>,
    pub rows: Vec<Vec<Value>>,
}

impl LogicalTile {
    pub fn new(tile_group_id: crate::types::Oid, columns: Vec<ColumnDescriptor>) -> Self {
        LogicalTile {
            tile_group_id,
            columns,
            position_lists: Vec::new(),
            visibility_bitmap: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, slot: u32, visible: bool, values: Vec<Value>) {
        self.position_lists.push(slot);
        self.visibility_bitmap.push(visible);
        self.rows.push(values);
    }

    pub fn is_empty(&self) -> bool {
        self.position_lists.is_empty()
    }

    pub fn visible_row_count(&self) -> usize {
        self.visibility_bitmap.iter().filter(|&&v| v).count()
    }

    pub fn get(&self, column: usize, row: usize) -> &Value {
        &self.rows[row][column]
    }
}

pub fn descriptors_from_schema(schema: &Schema, projection: &[usize]) -> Vec<ColumnDescriptor> {
    projection
        .iter()
        .map(|&c| ColumnDescriptor {
            name: schema.columns[c].name.clone(),
            source_column: c,
        })
        .collect()
}
