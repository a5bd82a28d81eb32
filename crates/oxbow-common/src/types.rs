//! Attribute type tags stored in index metadata.

use serde::{Deserialize, Serialize};

/// Datatype of a relation attribute an index can be declared over.
///
/// The tag is persisted as a single byte in the index metadata page.
/// Only `Int32` is indexable; the other tags exist so the metadata
/// byte has a defined decoding for every attribute a relation can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AttrType {
    /// 32-bit signed integer, little-endian in the record.
    Int32 = 0,
    /// 64-bit IEEE float.
    Float64 = 1,
    /// Variable-length string.
    Varchar = 2,
}

impl AttrType {
    /// Decodes an attribute type from its metadata byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(AttrType::Int32),
            1 => Some(AttrType::Float64),
            2 => Some(AttrType::Varchar),
            _ => None,
        }
    }

    /// Returns the fixed byte size of the attribute, or None for
    /// variable-length types.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            AttrType::Int32 => Some(4),
            AttrType::Float64 => Some(8),
            AttrType::Varchar => None,
        }
    }
}
