//! Page and record identifiers for Oxbow storage.

use serde::{Deserialize, Serialize};

/// Default page size in bytes (16 KB).
pub const PAGE_SIZE: usize = 16 * 1024;

/// Sentinel page number denoting "no page".
///
/// Page numbers stored inside index nodes (child pointers, sibling links)
/// are bare `u32` numbers within one file; this value marks unused slots.
pub const INVALID_PAGE_NO: u32 = u32::MAX;

/// Unique identifier for a page within a file.
///
/// PageId consists of a file ID and page number within that file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageId {
    /// File identifier assigned by the file manager.
    pub file_id: u32,
    /// Page number within the file (0-indexed).
    pub page_num: u32,
}

impl PageId {
    /// Creates a new PageId.
    pub fn new(file_id: u32, page_num: u32) -> Self {
        Self { file_id, page_num }
    }

    /// Returns the PageId as a single u64 for compact storage.
    pub fn as_u64(&self) -> u64 {
        ((self.file_id as u64) << 32) | (self.page_num as u64)
    }

    /// Creates a PageId from a u64 representation.
    pub fn from_u64(value: u64) -> Self {
        Self {
            file_id: (value >> 32) as u32,
            page_num: value as u32,
        }
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file_id, self.page_num)
    }
}

/// Location of a record in a heap relation: page number plus slot.
///
/// Leaf nodes of the index store these; a slot whose RecordId equals
/// `RecordId::INVALID` marks end-of-data within the leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId {
    /// Page number within the relation file.
    pub page_num: u32,
    /// Slot number within the page.
    pub slot_num: u16,
}

impl RecordId {
    /// Invalid record ID (both fields all-ones).
    pub const INVALID: RecordId = RecordId {
        page_num: u32::MAX,
        slot_num: u16::MAX,
    };

    /// Creates a new record ID.
    pub fn new(page_num: u32, slot_num: u16) -> Self {
        Self { page_num, slot_num }
    }

    /// Returns true if this is a valid record ID.
    pub fn is_valid(&self) -> bool {
        self.page_num != u32::MAX
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.page_num, self.slot_num)
    }
}
