//! Index key encoding: packed-integer keys for speed, generic keys for
//! everything else (spec §4.3).
//!
//! Grounded on `original_source/src/backend/index/index_key.h`'s
//! `IntsKey`/`GenericKey` split — signed columns are biased to unsigned and
//! packed big-endian so integer comparison and byte-lexicographic
//! comparison agree, exactly as Peloton's
//! `ConvertSignedValueToUnsignedValue` does, generalized here from
//! fixed-template `KeySize` to a schema-driven word count.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use crate::value::{ColumnType, Value};

/// Maximum total byte width eligible for the packed representation (spec
/// §4.3: "totalling <= 32 bytes").
pub const MAX_PACKED_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyColumn {
    pub source_column: usize,
    pub ty: ColumnType,
}

/// Describes which table columns make up an index key, and in what order.
#[derive(Debug, Clone)]
pub struct KeySchema {
    pub columns: Vec<KeyColumn>,
}

impl KeySchema {
    pub fn new(columns: Vec<KeyColumn>) -> Self {
        KeySchema { columns }
    }

    /// Whether every column is a fixed-width integer type whose combined
    /// width fits the packed representation.
    pub fn packable(&self) -> bool {
        if self.columns.is_empty() {
            return false;
        }
        let mut total = 0usize;
        for c in &self.columns {
            match c.ty.fixed_width() {
                Some(w) if c.ty.is_integer() => total += w,
                _ => return false,
            }
        }
        total <= MAX_PACKED_BYTES
    }

    /// Number of 64-bit words a packed key for this schema occupies.
    pub fn packed_word_count(&self) -> usize {
        let total: usize = self
            .columns
            .iter()
            .map(|c| c.ty.fixed_width().unwrap_or(0))
            .sum();
        (total + 7) / 8
    }
}

/// An encoded index key: either a small fixed-size packed integer key, or a
/// generic per-column comparison fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Packed(Vec<u64>),
    Generic(Vec<Value>),
}

impl Key {
    /// Encode `values` (already projected to the key columns, in schema
    /// order) according to `schema`.
    pub fn encode(schema: &KeySchema, values: &[Value]) -> Key {
        if schema.packable() {
            Key::Packed(pack_ints(schema, values))
        } else {
            Key::Generic(values.to_vec())
        }
    }
}

/// Bias a signed integer into the unsigned range its byte width covers, the
/// same transform as `ConvertSignedValueToUnsignedValue` in the original.
fn bias_unsigned(value: i64, width: usize) -> u64 {
    if width >= 8 {
        (value as i128 + (1i128 << 63)) as u64
    } else {
        let bias = 1i64 << (width * 8 - 1);
        (value + bias) as u64
    }
}

fn pack_ints(schema: &KeySchema, values: &[Value]) -> Vec<u64> {
    let mut bytes = Vec::with_capacity(MAX_PACKED_BYTES);
    for (col, value) in schema.columns.iter().zip(values.iter()) {
        let width = col.ty.fixed_width().unwrap_or(8);
        let raw = value.as_i64().unwrap_or(0);
        let biased = if matches!(col.ty, ColumnType::Boolean) {
            raw as u64
        } else {
            bias_unsigned(raw, width)
        };
        let full = biased.to_be_bytes();
        bytes.extend_from_slice(&full[8 - width..]);
    }
    // Zero-pad to a whole number of 64-bit words so every key for this
    // schema has the same word count and lexicographic word comparison
    // matches byte comparison.
    while bytes.len() % 8 != 0 {
        bytes.push(0);
    }
    bytes
        .chunks_exact(8)
        .map(|c| u64::from_be_bytes(c.try_into().unwrap()))
        .collect()
}

/// Inverse of [`Key::encode`] for packed keys: recover per-column values so
/// range-scan comparators can be evaluated against the original columns
/// (needed to check trailing, non-leading constraints once the B-tree
/// iterator is positioned by the leading-column bound).
pub fn decode(schema: &KeySchema, key: &Key) -> Vec<Value> {
    match key {
        Key::Generic(values) => values.clone(),
        Key::Packed(words) => {
            let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
            let mut out = Vec::with_capacity(schema.columns.len());
            let mut pos = 0usize;
            for col in &schema.columns {
                let width = col.ty.fixed_width().unwrap_or(8);
                let chunk = &bytes[pos..pos + width];
                pos += width;
                let unsigned = {
                    let mut buf = [0u8; 8];
                    buf[8 - width..].copy_from_slice(chunk);
                    u64::from_be_bytes(buf)
                };
                let signed = if matches!(col.ty, ColumnType::Boolean) {
                    unsigned as i64
                } else {
                    unbias_signed(unsigned, width)
                };
                out.push(Value::from(signed));
            }
            out
        }
    }
}

fn unbias_signed(biased: u64, width: usize) -> i64 {
    if width >= 8 {
        (biased as i128 - (1i128 << 63)) as i64
    } else {
        let bias = 1i64 << (width * 8 - 1);
        biased as i64 - bias
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Key::Packed(a), Key::Packed(b)) => a.cmp(b),
            (Key::Generic(a), Key::Generic(b)) => {
                for (va, vb) in a.iter().zip(b.iter()) {
                    let c = crate::value::cmp_values(va, vb);
                    if c != Ordering::Equal {
                        return c;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => panic!("comparing keys encoded with different schemes"),
        }
    }
}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Key::Packed(words) => {
                0u8.hash(state);
                words.hash(state);
            }
            Key::Generic(values) => {
                1u8.hash(state);
                for v in values {
                    v.to_string().hash(state);
                }
            }
        }
    }
}
