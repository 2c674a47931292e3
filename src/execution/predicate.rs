//! Predicate trees: the executor only ever needs an `Evaluate(tuple) ->
//! tri-valued bool` capability (spec §9), built here from comparisons and a
//! flat conjunction combinator.
//!
//! Grounded on the template's `core/constraint.rs` (a small trait object
//! tree evaluated per row) generalized from boolean results to the
//! tri-valued semantics NULL comparisons require.

use crate::types::{CompareOp, TriBool};
use crate::value::{cmp_values, Tuple, Value};

/// Evaluated against a projected or raw tuple during a scan.
pub trait Predicate: Send + Sync {
    fn evaluate(&self, tuple: &Tuple) -> TriBool;
}

/// `column <op> constant`. A `Value::Null` on either side yields `Unknown`,
/// matching SQL's three-valued comparison semantics.
pub struct Comparison {
    pub column: usize,
    pub op: CompareOp,
    pub rhs: Value,
}

impl Comparison {
    pub fn new(column: usize, op: CompareOp, rhs: Value) -> Self {
        Comparison { column, op, rhs }
    }
}

impl Predicate for Comparison {
    fn evaluate(&self, tuple: &Tuple) -> TriBool {
        let lhs = tuple.get(self.column);
        if lhs.is_null() || self.rhs.is_null() {
            return TriBool::Unknown;
        }
        if self.op.matches(cmp_values(lhs, &self.rhs)) {
            TriBool::True
        } else {
            TriBool::False
        }
    }
}

/// Flattened `AND` of sub-predicates (spec §9's "constructor that flattens
/// AND of comparisons as a conjunction variant").
pub struct Conjunction {
    pub terms: Vec<Box<dyn Predicate>>,
}

impl Conjunction {
    pub fn new(terms: Vec<Box<dyn Predicate>>) -> Self {
        Conjunction { terms }
    }
}

impl Predicate for Conjunction {
    fn evaluate(&self, tuple: &Tuple) -> TriBool {
        self.terms
            .iter()
            .fold(TriBool::True, |acc, term| acc.and(term.evaluate(tuple)))
    }
}
