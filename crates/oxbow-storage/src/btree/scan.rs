//! Range scan operators and per-scan state.

use crate::btree::node::LeafNode;

/// Comparison operator for a scan bound.
///
/// A scan takes a lower bound (`Gt` or `Gte`) and an upper bound
/// (`Lt` or `Lte`); any other combination is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Strictly less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Strictly greater than.
    Gt,
    /// Greater than or equal.
    Gte,
}

impl Operator {
    /// True for the operators valid as a lower bound.
    pub fn is_lower_bound(&self) -> bool {
        matches!(self, Operator::Gt | Operator::Gte)
    }

    /// True for the operators valid as an upper bound.
    pub fn is_upper_bound(&self) -> bool {
        matches!(self, Operator::Lt | Operator::Lte)
    }

    /// Whether `key` satisfies this operator as the scan's lower bound.
    pub(crate) fn admits_low(&self, key: i32, low: i32) -> bool {
        match self {
            Operator::Gt => key > low,
            Operator::Gte => key >= low,
            _ => false,
        }
    }

    /// Whether `key` satisfies this operator as the scan's upper bound.
    pub(crate) fn admits_high(&self, key: i32, high: i32) -> bool {
        match self {
            Operator::Lt => key < high,
            Operator::Lte => key <= high,
            _ => false,
        }
    }
}

/// Cursor value marking an exhausted scan.
pub(crate) const SCAN_EXHAUSTED: usize = usize::MAX;

/// State of one active range scan.
///
/// The leaf named by `leaf_page_no` stays pinned in the buffer pool for
/// the lifetime of the scan; `leaf` is its decoded image (nodes are never
/// mutated while a scan runs).
pub(crate) struct IndexScan {
    /// Lower bound; consumed when the scan is positioned.
    #[allow(dead_code)]
    pub low_val: i32,
    pub high_val: i32,
    /// Lower-bound operator; consumed when the scan is positioned.
    #[allow(dead_code)]
    pub low_op: Operator,
    pub high_op: Operator,
    /// Page number of the pinned leaf being scanned.
    pub leaf_page_no: u32,
    /// Decoded image of the pinned leaf.
    pub leaf: LeafNode,
    /// Next slot to emit, or `SCAN_EXHAUSTED`.
    pub next_entry: usize,
}
