//! Tuple values and table schemas.
//!
//! Reuses `serde_json::Value` as the runtime value representation, the same
//! choice the template's `index/btree.rs` and `index/hash_index.rs` make for
//! key values (`cmp_json`). We generalize that single ad hoc comparator into
//! a column-type-aware one so the index subsystem can decide, per spec
//! §4.3, whether a key qualifies for the packed-integer fast path.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::cmp::Ordering;

pub type Value = JsonValue;

/// Column types relevant to key packing (spec §4.3). Anything not listed
/// here always falls back to the generic key representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    SmallInt,
    Integer,
    BigInt,
    Varchar,
    Boolean,
}

impl ColumnType {
    /// Byte width used for packed-integer key words; `None` for variable or
    /// non-integer types.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            ColumnType::SmallInt => Some(2),
            ColumnType::Integer => Some(4),
            ColumnType::BigInt => Some(8),
            ColumnType::Boolean => Some(1),
            ColumnType::Varchar => None,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ColumnType::SmallInt | ColumnType::Integer | ColumnType::BigInt | ColumnType::Boolean
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
    pub nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: ColumnType, nullable: bool) -> Self {
        Column {
            name: name.into(),
            ty,
            nullable,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Schema { columns }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// Compare two values for ordering. Numbers compare numerically, strings
/// lexicographically, booleans as 0/1 — generalized from the template's
/// `cmp_json`, which only handled the number/string cases.
pub fn cmp_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (JsonValue::Number(na), JsonValue::Number(nb)) => {
            if let (Some(ia), Some(ib)) = (na.as_i64(), nb.as_i64()) {
                return ia.cmp(&ib);
            }
            let fa = na.as_f64().unwrap_or(0.0);
            let fb = nb.as_f64().unwrap_or(0.0);
            fa.partial_cmp(&fb).unwrap_or(Ordering::Equal)
        }
        (JsonValue::String(sa), JsonValue::String(sb)) => sa.cmp(sb),
        (JsonValue::Bool(ba), JsonValue::Bool(bb)) => ba.cmp(bb),
        (JsonValue::Null, JsonValue::Null) => Ordering::Equal,
        (JsonValue::Null, _) => Ordering::Less,
        (_, JsonValue::Null) => Ordering::Greater,
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// A row of values, ordered according to a `Schema`.
#[derive(Debug, Clone, Default)]
pub struct Tuple {
    pub values: Vec<Value>,
}

impl Tuple {
    pub fn new(values: Vec<Value>) -> Self {
        Tuple { values }
    }

    pub fn get(&self, col: usize) -> &Value {
        &self.values[col]
    }
}
