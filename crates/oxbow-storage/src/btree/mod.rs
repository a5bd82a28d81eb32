//! Disk-resident B+ tree index.
//!
//! The tree maps `i32` keys to record ids of a heap relation. One index
//! file holds a metadata page (page 0) plus leaf and inner node pages;
//! leaves are chained through right-sibling links for range scans. All
//! page access goes through the buffer manager under a strict pin
//! protocol: every pinned page is unpinned exactly once, dirty iff it was
//! rewritten, and an active scan holds exactly one pinned leaf.
//!
//! Inserts descend recursively from the root; a full node splits and
//! pushes a separator key up to its parent, growing a new root when the
//! split cascades all the way up. Keys equal to a separator descend into
//! the right subtree, so duplicate keys are supported. There is no delete
//! and no rebalancing.

pub mod index;
pub mod meta;
pub mod node;
pub mod scan;

pub use index::BTreeIndex;
pub use meta::IndexMetaPage;
pub use node::{InnerNode, LeafNode, TreeGeometry, MAX_INNER_KEY_CAPACITY, MAX_LEAF_CAPACITY};
pub use scan::Operator;
