//! Disk-resident B+ tree index over one integer attribute of a relation.
//!
//! The index file is named `"<relation>.<attr_byte_offset>"`. Page 0 holds
//! the metadata; the remaining pages are leaf and inner nodes. Opening a
//! missing index creates it and bulk-loads every record of the base
//! relation; opening an existing one validates the stored metadata against
//! the caller's parameters.
//!
//! Every page is pinned through the buffer manager while in use and
//! unpinned exactly once on each control path, dirty iff its image was
//! rewritten. An active scan keeps exactly one leaf pinned between calls.

use crate::btree::meta::IndexMetaPage;
use crate::btree::node::{InnerNode, LeafNode, TreeGeometry};
use crate::btree::scan::{IndexScan, Operator, SCAN_EXHAUSTED};
use crate::bufmgr::BufferManager;
use crate::heap::RelationFile;
use oxbow_common::page::{PageId, INVALID_PAGE_NO};
use oxbow_common::{AttrType, OxbowError, RecordId, Result};
use std::sync::Arc;

/// Key and right page a node split pushes up to its parent.
type SplitResult = Option<(i32, u32)>;

/// A B+ tree index handle.
///
/// Single-threaded: callers must not issue concurrent operations.
pub struct BTreeIndex {
    /// Buffer manager for all page access.
    bufmgr: Arc<BufferManager>,
    /// File id of the open index file.
    file_id: u32,
    /// Index file name (`"<relation>.<offset>"`).
    index_name: String,
    /// Page number of the metadata page.
    header_page_no: u32,
    /// Page number of the current root; mirrored in the metadata page.
    root_page_no: u32,
    /// Node capacities of this tree.
    geometry: TreeGeometry,
    /// Active range scan, if any.
    scan: Option<IndexScan>,
}

impl BTreeIndex {
    /// Opens the index for `relation_name` over the integer attribute at
    /// `attr_byte_offset`, building it from the relation if it does not
    /// exist yet.
    pub fn open(
        bufmgr: Arc<BufferManager>,
        relation_name: &str,
        attr_byte_offset: u32,
        attr_type: AttrType,
    ) -> Result<Self> {
        Self::open_with_geometry(
            bufmgr,
            relation_name,
            attr_byte_offset,
            attr_type,
            TreeGeometry::default(),
        )
    }

    /// Like [`BTreeIndex::open`] with explicit node capacities for a newly
    /// created index. Reopening an existing index uses the capacities
    /// stored in its metadata page.
    pub fn open_with_geometry(
        bufmgr: Arc<BufferManager>,
        relation_name: &str,
        attr_byte_offset: u32,
        attr_type: AttrType,
        geometry: TreeGeometry,
    ) -> Result<Self> {
        if attr_type != AttrType::Int32 {
            return Err(OxbowError::UnsupportedType(format!(
                "{attr_type:?} index keys"
            )));
        }

        let index_name = format!("{relation_name}.{attr_byte_offset}");
        match bufmgr.file_manager().open(&index_name, false) {
            Ok(file_id) => Self::open_existing(
                bufmgr,
                file_id,
                index_name,
                relation_name,
                attr_byte_offset,
                attr_type,
            ),
            Err(OxbowError::FileNotFound(_)) => Self::create(
                bufmgr,
                index_name,
                relation_name,
                attr_byte_offset,
                attr_type,
                geometry,
            ),
            Err(e) => Err(e),
        }
    }

    /// Returns the index file name.
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Returns the page number of the current root.
    pub fn root_page_no(&self) -> u32 {
        self.root_page_no
    }

    /// Returns the node capacities of this tree.
    pub fn geometry(&self) -> TreeGeometry {
        self.geometry
    }

    /// Number of levels from the root down to the leaves, inclusive.
    pub fn height(&self) -> Result<u32> {
        let mut page_no = self.root_page_no;
        let mut inner_levels = 1u32;

        loop {
            let page_id = PageId::new(self.file_id, page_no);
            let data = self.bufmgr.read_page(page_id)?;
            let node = InnerNode::from_bytes(&data, &self.geometry);
            self.bufmgr.unpin_page(page_id, false)?;

            if node.level == 1 {
                return Ok(inner_levels + 1);
            }
            page_no = node.children[0];
            inner_levels += 1;
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    fn open_existing(
        bufmgr: Arc<BufferManager>,
        file_id: u32,
        index_name: String,
        relation_name: &str,
        attr_byte_offset: u32,
        attr_type: AttrType,
    ) -> Result<Self> {
        let header_page_no = bufmgr.file_manager().first_page_no(file_id);
        let header_id = PageId::new(file_id, header_page_no);

        let data = bufmgr.read_page(header_id)?;
        let parsed = IndexMetaPage::from_bytes(&data);
        unpin_clean(&bufmgr, header_id, parsed.is_ok())?;
        let meta = parsed?;

        if meta.relation_name != relation_name
            || meta.attr_byte_offset != attr_byte_offset
            || meta.attr_type != attr_type
        {
            return Err(OxbowError::MetadataMismatch(format!(
                "stored {}/{}/{:?}, requested {}/{}/{:?}",
                meta.relation_name,
                meta.attr_byte_offset,
                meta.attr_type,
                relation_name,
                attr_byte_offset,
                attr_type
            )));
        }

        Ok(Self {
            bufmgr,
            file_id,
            index_name,
            header_page_no,
            root_page_no: meta.root_page_no,
            geometry: meta.geometry,
            scan: None,
        })
    }

    fn create(
        bufmgr: Arc<BufferManager>,
        index_name: String,
        relation_name: &str,
        attr_byte_offset: u32,
        attr_type: AttrType,
        geometry: TreeGeometry,
    ) -> Result<Self> {
        let file_id = bufmgr.file_manager().open(&index_name, true)?;

        // Metadata page first so it lands on page 0.
        let header_id = bufmgr.alloc_page(file_id)?;
        let outcome = Self::initialize_file(
            &bufmgr,
            file_id,
            header_id,
            relation_name,
            attr_byte_offset,
            attr_type,
            geometry,
        );
        let unpinned = bufmgr.unpin_page(header_id, outcome.is_ok());
        let root_page_no = outcome?;
        unpinned?;

        let mut index = Self {
            bufmgr,
            file_id,
            index_name,
            header_page_no: header_id.page_num,
            root_page_no,
            geometry,
            scan: None,
        };
        index.build_from_relation(relation_name, attr_byte_offset)?;
        Ok(index)
    }

    /// Lays out a fresh index file: an empty leaf, a level-1 root pointing
    /// at it, and the metadata page. Runs with the header page pinned;
    /// returns the root page number.
    fn initialize_file(
        bufmgr: &BufferManager,
        file_id: u32,
        header_id: PageId,
        relation_name: &str,
        attr_byte_offset: u32,
        attr_type: AttrType,
        geometry: TreeGeometry,
    ) -> Result<u32> {
        let leaf_id = bufmgr.alloc_page(file_id)?;
        let wrote = bufmgr.write_page(leaf_id, &LeafNode::new(&geometry).to_bytes());
        let unpinned = bufmgr.unpin_page(leaf_id, wrote.is_ok());
        wrote?;
        unpinned?;

        let root_id = bufmgr.alloc_page(file_id)?;
        let mut root = InnerNode::new(&geometry, 1);
        root.children[0] = leaf_id.page_num;
        let wrote = bufmgr.write_page(root_id, &root.to_bytes());
        let unpinned = bufmgr.unpin_page(root_id, wrote.is_ok());
        wrote?;
        unpinned?;

        let meta = IndexMetaPage::new(
            relation_name,
            attr_byte_offset,
            attr_type,
            root_id.page_num,
            geometry,
        )?;
        bufmgr.write_page(header_id, &meta.to_bytes())?;

        Ok(root_id.page_num)
    }

    /// Streams every record of the base relation into the index.
    fn build_from_relation(&mut self, relation_name: &str, attr_byte_offset: u32) -> Result<()> {
        let relation = RelationFile::open(Arc::clone(&self.bufmgr), relation_name)?;
        let mut scan = relation.scan()?;

        loop {
            match scan.next_record() {
                Ok((rid, payload)) => {
                    let key = key_at(&payload, attr_byte_offset)?;
                    self.insert_entry(key, rid)?;
                }
                Err(OxbowError::EndOfFile) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    // =========================================================================
    // Insert
    // =========================================================================

    /// Inserts a `(key, rid)` pair. Duplicate keys are permitted.
    pub fn insert_entry(&mut self, key: i32, rid: RecordId) -> Result<()> {
        if let Some((push_up_key, new_right)) = self.insert_into_inner(self.root_page_no, key, rid)?
        {
            self.grow_root(push_up_key, new_right)?;
        }
        Ok(())
    }

    /// Installs a new level-0 root over the split halves of the old root
    /// and persists the new root page number in the metadata page.
    fn grow_root(&mut self, push_up_key: i32, new_right: u32) -> Result<()> {
        let new_root_id = self.bufmgr.alloc_page(self.file_id)?;

        let mut root = InnerNode::new(&self.geometry, 0);
        root.keys[0] = push_up_key;
        root.children[0] = self.root_page_no;
        root.children[1] = new_right;

        let wrote = self.bufmgr.write_page(new_root_id, &root.to_bytes());
        let unpinned = self.bufmgr.unpin_page(new_root_id, wrote.is_ok());
        wrote?;
        unpinned?;

        self.root_page_no = new_root_id.page_num;
        self.rewrite_meta_root()
    }

    /// Re-reads the metadata page, updates its root pointer, and unpins it
    /// dirty so a reopen after flush sees the current root.
    fn rewrite_meta_root(&self) -> Result<()> {
        let header_id = PageId::new(self.file_id, self.header_page_no);
        let data = self.bufmgr.read_page(header_id)?;

        let outcome = IndexMetaPage::from_bytes(&data).and_then(|mut meta| {
            meta.root_page_no = self.root_page_no;
            self.bufmgr.write_page(header_id, &meta.to_bytes())
        });
        let unpinned = self.bufmgr.unpin_page(header_id, outcome.is_ok());
        outcome?;
        unpinned
    }

    /// Descends into the inner node at `page_no`, pinning it for the
    /// duration and unpinning exactly once on every path.
    fn insert_into_inner(&self, page_no: u32, key: i32, rid: RecordId) -> Result<SplitResult> {
        let page_id = PageId::new(self.file_id, page_no);
        let data = self.bufmgr.read_page(page_id)?;
        let node = InnerNode::from_bytes(&data, &self.geometry);

        match self.inner_insert_pinned(page_id, node, key, rid) {
            Ok((dirty, split)) => {
                self.bufmgr.unpin_page(page_id, dirty)?;
                Ok(split)
            }
            Err(e) => {
                let _ = self.bufmgr.unpin_page(page_id, false);
                Err(e)
            }
        }
    }

    /// Body of the inner-node descent; runs while `page_id` is pinned.
    /// Returns whether the page image was rewritten plus any split to
    /// push up.
    fn inner_insert_pinned(
        &self,
        page_id: PageId,
        node: InnerNode,
        key: i32,
        rid: RecordId,
    ) -> Result<(bool, SplitResult)> {
        let pivot = node.pivot_index(key);
        let child = node.children[pivot];
        if child == INVALID_PAGE_NO {
            return Err(OxbowError::Corrupted(format!(
                "inner page {page_id} has no child at pivot {pivot}"
            )));
        }

        let split = if node.level == 1 {
            self.insert_into_leaf(child, key, rid)?
        } else {
            self.insert_into_inner(child, key, rid)?
        };

        let Some((push_up_key, new_right)) = split else {
            return Ok((false, None));
        };

        // Working copies with the pushed-up pair spliced in at the pivot:
        // the new child goes right of the child it split from.
        let mut child_work = node.children.clone();
        let mut key_work = node.keys.clone();
        child_work.insert(pivot + 1, new_right);
        key_work.insert(pivot, push_up_key);

        let cap = node.key_capacity();
        if child_work[cap + 1] == INVALID_PAGE_NO {
            // Room left: the spliced copy still ends in an unused slot.
            let mut updated = node;
            updated.children.copy_from_slice(&child_work[..cap + 1]);
            updated.keys.copy_from_slice(&key_work[..cap]);
            self.bufmgr.write_page(page_id, &updated.to_bytes())?;
            return Ok((true, None));
        }

        // Split: distribute the cap + 2 children across two nodes at the
        // same level. The key at mid - 1 is lifted out for the parent and
        // stored in neither half.
        let new_page_id = self.bufmgr.alloc_page(self.file_id)?;
        let outcome: Result<i32> = (|| {
            let total = child_work.len();
            let mid = total / 2;

            let mut left = InnerNode::new(&self.geometry, node.level);
            let mut right = InnerNode::new(&self.geometry, node.level);
            for j in 0..mid {
                left.children[j] = child_work[j];
                if j != mid - 1 {
                    left.keys[j] = key_work[j];
                }
            }
            for j in mid..total {
                right.children[j - mid] = child_work[j];
                if j != total - 1 {
                    right.keys[j - mid] = key_work[j];
                }
            }

            self.bufmgr.write_page(page_id, &left.to_bytes())?;
            self.bufmgr.write_page(new_page_id, &right.to_bytes())?;
            Ok(key_work[mid - 1])
        })();
        let unpinned = self.bufmgr.unpin_page(new_page_id, outcome.is_ok());
        let push_up = outcome?;
        unpinned?;

        Ok((true, Some((push_up, new_page_id.page_num))))
    }

    /// Inserts into the leaf at `page_no`, pinning it for the duration.
    fn insert_into_leaf(&self, page_no: u32, key: i32, rid: RecordId) -> Result<SplitResult> {
        let page_id = PageId::new(self.file_id, page_no);
        let data = self.bufmgr.read_page(page_id)?;
        let node = LeafNode::from_bytes(&data, &self.geometry);

        match self.leaf_insert_pinned(page_id, node, key, rid) {
            Ok(split) => {
                // The leaf image is rewritten on both outcomes.
                self.bufmgr.unpin_page(page_id, true)?;
                Ok(split)
            }
            Err(e) => {
                let _ = self.bufmgr.unpin_page(page_id, false);
                Err(e)
            }
        }
    }

    /// Body of the leaf insert; runs while `page_id` is pinned.
    fn leaf_insert_pinned(
        &self,
        page_id: PageId,
        node: LeafNode,
        key: i32,
        rid: RecordId,
    ) -> Result<SplitResult> {
        let pos = node.insert_position(key);

        // Working copies of capacity + 1 with the new entry spliced in.
        let mut key_work = node.keys.clone();
        let mut rid_work = node.rids.clone();
        key_work.insert(pos, key);
        rid_work.insert(pos, rid);

        let cap = node.capacity();
        if !rid_work[cap].is_valid() {
            // The leaf had room: the working copy still ends in an empty slot.
            let mut updated = node;
            updated.keys.copy_from_slice(&key_work[..cap]);
            updated.rids.copy_from_slice(&rid_work[..cap]);
            self.bufmgr.write_page(page_id, &updated.to_bytes())?;
            return Ok(None);
        }

        // Split: the left leaf keeps the first half of the working copy,
        // the new right leaf takes the rest and is spliced into the
        // sibling chain. The first right key is pushed up.
        let new_page_id = self.bufmgr.alloc_page(self.file_id)?;
        let outcome: Result<i32> = (|| {
            let total = rid_work.len();
            let mid = total / 2;

            let mut left = LeafNode::new(&self.geometry);
            let mut right = LeafNode::new(&self.geometry);
            for j in 0..mid {
                left.keys[j] = key_work[j];
                left.rids[j] = rid_work[j];
            }
            for j in mid..total {
                right.keys[j - mid] = key_work[j];
                right.rids[j - mid] = rid_work[j];
            }
            right.right_sibling = node.right_sibling;
            left.right_sibling = new_page_id.page_num;

            self.bufmgr.write_page(page_id, &left.to_bytes())?;
            self.bufmgr.write_page(new_page_id, &right.to_bytes())?;
            Ok(key_work[mid])
        })();
        let unpinned = self.bufmgr.unpin_page(new_page_id, outcome.is_ok());
        let push_up = outcome?;
        unpinned?;

        Ok(Some((push_up, new_page_id.page_num)))
    }

    // =========================================================================
    // Scan
    // =========================================================================

    /// Begins a range scan over the half-open interval described by the
    /// two bounds. Any scan already active is ended first.
    ///
    /// On success exactly one leaf is left pinned for the scan; when no
    /// entry satisfies the lower bound the scan is not started and
    /// `NoSuchKeyFound` is returned with nothing pinned.
    pub fn start_scan(
        &mut self,
        low_val: i32,
        low_op: Operator,
        high_val: i32,
        high_op: Operator,
    ) -> Result<()> {
        if self.scan.is_some() {
            self.end_scan()?;
        }

        if !low_op.is_lower_bound() || !high_op.is_upper_bound() {
            return Err(OxbowError::BadOperator);
        }
        if low_val > high_val {
            return Err(OxbowError::BadScanRange {
                low: low_val,
                high: high_val,
            });
        }

        let (leaf_page_no, leaf, next_entry) =
            self.find_scan_start(self.root_page_no, low_val, low_op)?;

        self.scan = Some(IndexScan {
            low_val,
            high_val,
            low_op,
            high_op,
            leaf_page_no,
            leaf,
            next_entry,
        });
        Ok(())
    }

    /// Descends from the inner node at `page_no` toward the leaf where the
    /// lower bound falls. Each inner page is unpinned before returning; on
    /// success the leaf holding the first qualifying entry is left pinned.
    fn find_scan_start(
        &self,
        page_no: u32,
        low_val: i32,
        low_op: Operator,
    ) -> Result<(u32, LeafNode, usize)> {
        let page_id = PageId::new(self.file_id, page_no);
        let data = self.bufmgr.read_page(page_id)?;
        let node = InnerNode::from_bytes(&data, &self.geometry);

        let outcome = (|| {
            let pivot = node.pivot_index(low_val);
            let child = node.children[pivot];
            if child == INVALID_PAGE_NO {
                return Err(OxbowError::Corrupted(format!(
                    "inner page {page_id} has no child at pivot {pivot}"
                )));
            }

            if node.level == 1 {
                self.first_leaf_entry(child, low_val, low_op)
            } else {
                self.find_scan_start(child, low_val, low_op)
            }
        })();

        match outcome {
            Ok(found) => {
                self.bufmgr.unpin_page(page_id, false)?;
                Ok(found)
            }
            Err(e) => {
                let _ = self.bufmgr.unpin_page(page_id, false);
                Err(e)
            }
        }
    }

    /// Starting at the leaf the descent chose, finds the first slot whose
    /// key satisfies the lower bound. A bound falling in the gap between
    /// one leaf's last key and the next leaf's first routes the descent
    /// left of the answer, so the search follows right-sibling links until
    /// a slot qualifies or the chain ends. The qualifying leaf is left
    /// pinned; every other leaf visited is released, as is the last one
    /// before `NoSuchKeyFound`.
    fn first_leaf_entry(
        &self,
        leaf_page_no: u32,
        low_val: i32,
        low_op: Operator,
    ) -> Result<(u32, LeafNode, usize)> {
        let mut page_no = leaf_page_no;

        while page_no != INVALID_PAGE_NO {
            let page_id = PageId::new(self.file_id, page_no);
            let data = self.bufmgr.read_page(page_id)?;
            let leaf = LeafNode::from_bytes(&data, &self.geometry);

            // Keys are sorted along the chain, so the first admitted slot
            // is the globally first qualifying entry.
            for slot in 0..leaf.capacity() {
                if !leaf.rids[slot].is_valid() {
                    break;
                }
                if low_op.admits_low(leaf.keys[slot], low_val) {
                    return Ok((page_no, leaf, slot));
                }
            }

            let next = leaf.right_sibling;
            self.bufmgr.unpin_page(page_id, false)?;
            page_no = next;
        }

        Err(OxbowError::NoSuchKeyFound)
    }

    /// Returns the record id of the next entry matching the scan criteria.
    ///
    /// Fails with `ScanNotInitialized` when no scan is active and with
    /// `IndexScanCompleted` once the high bound or the end of the leaf
    /// chain is reached; the scan stays active (and its leaf pinned) until
    /// `end_scan`.
    pub fn scan_next(&mut self) -> Result<RecordId> {
        let file_id = self.file_id;
        let geometry = self.geometry;
        let bufmgr = Arc::clone(&self.bufmgr);

        let scan = self.scan.as_mut().ok_or(OxbowError::ScanNotInitialized)?;

        if scan.next_entry == SCAN_EXHAUSTED || !scan.leaf.rids[scan.next_entry].is_valid() {
            return Err(OxbowError::IndexScanCompleted);
        }
        if !scan
            .high_op
            .admits_high(scan.leaf.keys[scan.next_entry], scan.high_val)
        {
            return Err(OxbowError::IndexScanCompleted);
        }
        let rid = scan.leaf.rids[scan.next_entry];

        // Advance: next slot in this leaf, else the right sibling, else done.
        if scan.next_entry + 1 < scan.leaf.capacity() && scan.leaf.rids[scan.next_entry + 1].is_valid()
        {
            scan.next_entry += 1;
        } else if scan.leaf.right_sibling != INVALID_PAGE_NO {
            let next_id = PageId::new(file_id, scan.leaf.right_sibling);
            let old_id = PageId::new(file_id, scan.leaf_page_no);

            // Pin the sibling before releasing the current leaf; on failure
            // the cursor is left on the emitted entry.
            let data = bufmgr.read_page(next_id)?;
            if let Err(e) = bufmgr.unpin_page(old_id, false) {
                let _ = bufmgr.unpin_page(next_id, false);
                return Err(e);
            }

            scan.leaf_page_no = next_id.page_num;
            scan.leaf = LeafNode::from_bytes(&data, &geometry);
            scan.next_entry = 0;
        } else {
            scan.next_entry = SCAN_EXHAUSTED;
        }

        Ok(rid)
    }

    /// Ends the active scan, releasing its pinned leaf.
    pub fn end_scan(&mut self) -> Result<()> {
        let scan = self.scan.take().ok_or(OxbowError::ScanNotInitialized)?;
        self.bufmgr
            .unpin_page(PageId::new(self.file_id, scan.leaf_page_no), false)
    }
}

impl Drop for BTreeIndex {
    /// Ends any active scan, flushes the index file, and closes it.
    /// Never propagates errors.
    fn drop(&mut self) {
        if self.scan.is_some() {
            let _ = self.end_scan();
        }
        let _ = self.bufmgr.flush_file(self.file_id);
        let _ = self.bufmgr.file_manager().close_file(self.file_id);
    }
}

/// Reads the little-endian i32 attribute at `offset` within a record.
fn key_at(record: &[u8], offset: u32) -> Result<i32> {
    let at = offset as usize;
    let bytes = record.get(at..at + 4).ok_or_else(|| {
        OxbowError::Corrupted(format!(
            "record of {} bytes has no attribute at byte {at}",
            record.len()
        ))
    })?;
    Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Unpins a page clean, preserving a prior error if unpinning also fails.
fn unpin_clean(bufmgr: &BufferManager, page_id: PageId, prior_ok: bool) -> Result<()> {
    let unpinned = bufmgr.unpin_page(page_id, false);
    if prior_ok {
        unpinned
    } else {
        // The caller is already failing; swallow the unpin outcome.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::{FileManager, FileManagerConfig};
    use oxbow_buffer::{BufferPool, BufferPoolConfig};
    use tempfile::tempdir;

    fn create_test_bufmgr() -> (Arc<BufferManager>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let files = Arc::new(
            FileManager::new(FileManagerConfig {
                data_dir: dir.path().to_path_buf(),
                fsync_enabled: false,
            })
            .unwrap(),
        );
        let pool = Arc::new(BufferPool::new(BufferPoolConfig { num_frames: 128 }));
        (Arc::new(BufferManager::new(files, pool)), dir)
    }

    fn empty_relation(bufmgr: &Arc<BufferManager>, name: &str) -> RelationFile {
        RelationFile::create(Arc::clone(bufmgr), name).unwrap()
    }

    #[test]
    fn test_key_at() {
        let record = [0u8, 0, 42, 0, 0, 0, 7];
        assert_eq!(key_at(&record, 2).unwrap(), 42);
        assert!(matches!(
            key_at(&record, 4),
            Err(OxbowError::Corrupted(_))
        ));
    }

    #[test]
    fn test_open_creates_named_file() {
        let (bufmgr, dir) = create_test_bufmgr();
        empty_relation(&bufmgr, "orders");

        let index = BTreeIndex::open(Arc::clone(&bufmgr), "orders", 8, AttrType::Int32).unwrap();
        assert_eq!(index.index_name(), "orders.8");
        drop(index);

        assert!(dir.path().join("orders.8").exists());
    }

    #[test]
    fn test_open_rejects_non_integer_attr() {
        let (bufmgr, _dir) = create_test_bufmgr();
        empty_relation(&bufmgr, "orders");

        let result = BTreeIndex::open(bufmgr, "orders", 0, AttrType::Varchar);
        assert!(matches!(result, Err(OxbowError::UnsupportedType(_))));
    }

    #[test]
    fn test_fresh_index_shape() {
        let (bufmgr, _dir) = create_test_bufmgr();
        empty_relation(&bufmgr, "orders");

        let mut index =
            BTreeIndex::open(Arc::clone(&bufmgr), "orders", 0, AttrType::Int32).unwrap();
        // Meta on page 0, leaf on 1, root on 2; two levels.
        assert_eq!(index.root_page_no(), 2);
        assert_eq!(index.height().unwrap(), 2);

        // Empty tree: every scan fails to position.
        let result = index.start_scan(i32::MIN, Operator::Gte, i32::MAX, Operator::Lte);
        assert!(matches!(result, Err(OxbowError::NoSuchKeyFound)));
        assert_eq!(bufmgr.pinned_page_count(), 0);
    }

    #[test]
    fn test_root_change_survives_reopen() {
        let (bufmgr, _dir) = create_test_bufmgr();
        empty_relation(&bufmgr, "orders");
        let geometry = TreeGeometry::new(4, 4).unwrap();

        let old_root;
        let new_root;
        {
            let mut index = BTreeIndex::open_with_geometry(
                Arc::clone(&bufmgr),
                "orders",
                0,
                AttrType::Int32,
                geometry,
            )
            .unwrap();
            old_root = index.root_page_no();

            // Enough inserts to split the root at least once.
            for key in 0..64 {
                index.insert_entry(key, RecordId::new(0, key as u16)).unwrap();
            }
            new_root = index.root_page_no();
            assert_ne!(old_root, new_root);
        }

        let index =
            BTreeIndex::open(Arc::clone(&bufmgr), "orders", 0, AttrType::Int32).unwrap();
        assert_eq!(index.root_page_no(), new_root);
        // Stored geometry wins over the default the second open passed.
        assert_eq!(index.geometry(), geometry);
    }

    #[test]
    fn test_reopen_mismatched_metadata() {
        let (bufmgr, dir) = create_test_bufmgr();
        empty_relation(&bufmgr, "orders");

        drop(BTreeIndex::open(Arc::clone(&bufmgr), "orders", 8, AttrType::Int32).unwrap());

        // Masquerade the offset-8 index file as an offset-12 one.
        std::fs::copy(dir.path().join("orders.8"), dir.path().join("orders.12")).unwrap();

        let result = BTreeIndex::open(Arc::clone(&bufmgr), "orders", 12, AttrType::Int32);
        assert!(matches!(result, Err(OxbowError::MetadataMismatch(_))));
        assert_eq!(bufmgr.pinned_page_count(), 0);
    }
}
