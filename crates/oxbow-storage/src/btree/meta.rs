//! Index metadata page codec.
//!
//! Page 0 of every index file. Layout (little-endian):
//! - relation_name_len: 2 bytes, then up to 64 name bytes (zero padded)
//! - attr_byte_offset: 4 bytes
//! - attr_type: 1 byte, 1 reserved
//! - root_page_no: 4 bytes
//! - leaf_capacity: 4 bytes
//! - inner_key_capacity: 4 bytes

use crate::btree::node::TreeGeometry;
use oxbow_common::page::PAGE_SIZE;
use oxbow_common::{AttrType, OxbowError, Result};

/// Maximum stored relation name length in bytes.
pub const RELATION_NAME_MAX: usize = 64;

const OFFSET_AT: usize = 2 + RELATION_NAME_MAX;
const TYPE_AT: usize = OFFSET_AT + 4;
const ROOT_AT: usize = TYPE_AT + 2;
const LEAF_CAP_AT: usize = ROOT_AT + 4;
const INNER_CAP_AT: usize = LEAF_CAP_AT + 4;

/// Decoded image of an index metadata page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMetaPage {
    /// Name of the indexed relation.
    pub relation_name: String,
    /// Byte offset of the indexed attribute within a record.
    pub attr_byte_offset: u32,
    /// Datatype of the indexed attribute.
    pub attr_type: AttrType,
    /// Page number of the current root.
    pub root_page_no: u32,
    /// Node capacities of this tree.
    pub geometry: TreeGeometry,
}

impl IndexMetaPage {
    /// Creates a metadata image, validating the relation name length.
    pub fn new(
        relation_name: &str,
        attr_byte_offset: u32,
        attr_type: AttrType,
        root_page_no: u32,
        geometry: TreeGeometry,
    ) -> Result<Self> {
        if relation_name.is_empty() || relation_name.len() > RELATION_NAME_MAX {
            return Err(OxbowError::InvalidParameter {
                name: "relation_name".to_string(),
                value: relation_name.to_string(),
            });
        }
        Ok(Self {
            relation_name: relation_name.to_string(),
            attr_byte_offset,
            attr_type,
            root_page_no,
            geometry,
        })
    }

    /// Encodes the metadata into a fresh page image.
    pub fn to_bytes(&self) -> Box<[u8; PAGE_SIZE]> {
        let mut data = Box::new([0u8; PAGE_SIZE]);

        let name = self.relation_name.as_bytes();
        data[0..2].copy_from_slice(&(name.len() as u16).to_le_bytes());
        data[2..2 + name.len()].copy_from_slice(name);
        data[OFFSET_AT..OFFSET_AT + 4].copy_from_slice(&self.attr_byte_offset.to_le_bytes());
        data[TYPE_AT] = self.attr_type as u8;
        data[ROOT_AT..ROOT_AT + 4].copy_from_slice(&self.root_page_no.to_le_bytes());
        data[LEAF_CAP_AT..LEAF_CAP_AT + 4]
            .copy_from_slice(&(self.geometry.leaf_capacity as u32).to_le_bytes());
        data[INNER_CAP_AT..INNER_CAP_AT + 4]
            .copy_from_slice(&(self.geometry.inner_key_capacity as u32).to_le_bytes());

        data
    }

    /// Decodes a metadata page, rejecting images that do not parse.
    pub fn from_bytes(data: &[u8; PAGE_SIZE]) -> Result<Self> {
        let name_len = u16::from_le_bytes([data[0], data[1]]) as usize;
        if name_len == 0 || name_len > RELATION_NAME_MAX {
            return Err(OxbowError::Corrupted(format!(
                "metadata relation name length {name_len}"
            )));
        }
        let relation_name = std::str::from_utf8(&data[2..2 + name_len])
            .map_err(|_| OxbowError::Corrupted("metadata relation name not utf-8".to_string()))?
            .to_string();

        let attr_byte_offset = u32::from_le_bytes([
            data[OFFSET_AT],
            data[OFFSET_AT + 1],
            data[OFFSET_AT + 2],
            data[OFFSET_AT + 3],
        ]);
        let attr_type = AttrType::from_u8(data[TYPE_AT]).ok_or_else(|| {
            OxbowError::Corrupted(format!("unknown attribute type tag {}", data[TYPE_AT]))
        })?;
        let root_page_no = u32::from_le_bytes([
            data[ROOT_AT],
            data[ROOT_AT + 1],
            data[ROOT_AT + 2],
            data[ROOT_AT + 3],
        ]);
        let leaf_capacity = u32::from_le_bytes([
            data[LEAF_CAP_AT],
            data[LEAF_CAP_AT + 1],
            data[LEAF_CAP_AT + 2],
            data[LEAF_CAP_AT + 3],
        ]) as usize;
        let inner_key_capacity = u32::from_le_bytes([
            data[INNER_CAP_AT],
            data[INNER_CAP_AT + 1],
            data[INNER_CAP_AT + 2],
            data[INNER_CAP_AT + 3],
        ]) as usize;

        let geometry = TreeGeometry::new(leaf_capacity, inner_key_capacity)
            .map_err(|_| OxbowError::Corrupted("metadata node capacities".to_string()))?;

        Ok(Self {
            relation_name,
            attr_byte_offset,
            attr_type,
            root_page_no,
            geometry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_meta() -> IndexMetaPage {
        IndexMetaPage::new(
            "orders",
            8,
            AttrType::Int32,
            2,
            TreeGeometry::new(100, 200).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_meta_roundtrip() {
        let meta = sample_meta();
        let decoded = IndexMetaPage::from_bytes(&meta.to_bytes()).unwrap();
        assert_eq!(decoded, meta);
    }

    #[test]
    fn test_meta_name_validation() {
        let g = TreeGeometry::default();
        assert!(matches!(
            IndexMetaPage::new("", 0, AttrType::Int32, 1, g),
            Err(OxbowError::InvalidParameter { .. })
        ));
        let long = "x".repeat(RELATION_NAME_MAX + 1);
        assert!(matches!(
            IndexMetaPage::new(&long, 0, AttrType::Int32, 1, g),
            Err(OxbowError::InvalidParameter { .. })
        ));
        let max = "x".repeat(RELATION_NAME_MAX);
        assert!(IndexMetaPage::new(&max, 0, AttrType::Int32, 1, g).is_ok());
    }

    #[test]
    fn test_meta_rejects_zeroed_page() {
        let data = Box::new([0u8; PAGE_SIZE]);
        assert!(matches!(
            IndexMetaPage::from_bytes(&data),
            Err(OxbowError::Corrupted(_))
        ));
    }

    #[test]
    fn test_meta_rejects_bad_type_tag() {
        let meta = sample_meta();
        let mut data = meta.to_bytes();
        data[TYPE_AT] = 99;
        assert!(matches!(
            IndexMetaPage::from_bytes(&data),
            Err(OxbowError::Corrupted(_))
        ));
    }

    #[test]
    fn test_meta_rejects_bad_geometry() {
        let meta = sample_meta();
        let mut data = meta.to_bytes();
        data[LEAF_CAP_AT..LEAF_CAP_AT + 4].copy_from_slice(&0u32.to_le_bytes());
        assert!(matches!(
            IndexMetaPage::from_bytes(&data),
            Err(OxbowError::Corrupted(_))
        ));
    }

    #[test]
    fn test_meta_root_update_roundtrip() {
        let mut meta = sample_meta();
        meta.root_page_no = 17;
        let decoded = IndexMetaPage::from_bytes(&meta.to_bytes()).unwrap();
        assert_eq!(decoded.root_page_no, 17);
    }
}
