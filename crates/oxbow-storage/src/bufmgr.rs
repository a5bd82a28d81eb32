//! Buffer manager: the pinning page-access layer over pool and files.
//!
//! Every page handed out by `read_page` or `alloc_page` is pinned in the
//! buffer pool and stays pinned until the caller's matching `unpin_page`,
//! which also declares whether the bytes were changed. Callers mutate a
//! page by writing a full image back with `write_page` while the pin is
//! held; dirty pages reach disk on eviction or `flush_file`.

use crate::file::FileManager;
use oxbow_buffer::{BufferPool, EvictedPage};
use oxbow_common::page::{PageId, PAGE_SIZE};
use oxbow_common::{OxbowError, Result};
use std::sync::Arc;

/// Buffer manager combining a file manager with a buffer pool.
pub struct BufferManager {
    /// Named paged files on disk.
    files: Arc<FileManager>,
    /// Page cache with pin counts.
    pool: Arc<BufferPool>,
}

impl BufferManager {
    /// Creates a new buffer manager.
    pub fn new(files: Arc<FileManager>, pool: Arc<BufferPool>) -> Self {
        Self { files, pool }
    }

    /// Returns the underlying file manager.
    pub fn file_manager(&self) -> &Arc<FileManager> {
        &self.files
    }

    /// Number of distinct pages currently pinned; test hook for the
    /// pin discipline.
    pub fn pinned_page_count(&self) -> usize {
        self.pool.stats().pinned_frames
    }

    /// Writes an evicted dirty page back to its file.
    fn write_back(&self, evicted: Option<EvictedPage>) -> Result<()> {
        if let Some(page) = evicted {
            self.files.write_page(page.page_id, &page.data)?;
        }
        Ok(())
    }

    /// Reads a page, pinning it, and returns a snapshot of its bytes.
    ///
    /// Loads from disk on a pool miss. The pin is held until the caller's
    /// `unpin_page`.
    pub fn read_page(&self, page_id: PageId) -> Result<Box<[u8; PAGE_SIZE]>> {
        if let Some(frame) = self.pool.fetch_page(page_id) {
            let guard = frame.read_data();
            let mut data = Box::new([0u8; PAGE_SIZE]);
            data.copy_from_slice(&**guard);
            return Ok(data);
        }

        let disk_data = self.files.read_page(page_id)?;
        let (frame, evicted) = self.pool.load_page(page_id, &disk_data[..])?;

        // The frame is pinned from here on: release it if the eviction
        // write-back fails.
        if let Err(e) = self.write_back(evicted) {
            self.pool.unpin_page(page_id, false);
            return Err(e);
        }

        let guard = frame.read_data();
        let mut data = Box::new([0u8; PAGE_SIZE]);
        data.copy_from_slice(&**guard);
        Ok(data)
    }

    /// Allocates a new page at the end of a file and pins it.
    ///
    /// The frame starts zeroed; the caller writes an initial image with
    /// `write_page` and releases with `unpin_page(.., true)`.
    pub fn alloc_page(&self, file_id: u32) -> Result<PageId> {
        let page_id = self.files.allocate_page(file_id)?;
        let (_frame, evicted) = self.pool.new_page(page_id)?;

        if let Err(e) = self.write_back(evicted) {
            self.pool.unpin_page(page_id, false);
            return Err(e);
        }

        Ok(page_id)
    }

    /// Replaces the in-pool image of a pinned page.
    ///
    /// Does not change the pin count; dirtiness is declared at unpin time.
    pub fn write_page(&self, page_id: PageId, data: &[u8; PAGE_SIZE]) -> Result<()> {
        let frame = self
            .pool
            .fetch_page(page_id)
            .ok_or(OxbowError::PageNotPinned { page_id })?;
        frame.copy_from(data);
        self.pool.unpin_page(page_id, false);
        Ok(())
    }

    /// Releases one pin on a page, marking it dirty if its bytes changed.
    pub fn unpin_page(&self, page_id: PageId, dirty: bool) -> Result<()> {
        if self.pool.unpin_page(page_id, dirty) {
            Ok(())
        } else {
            Err(OxbowError::PageNotPinned { page_id })
        }
    }

    /// Writes all dirty resident pages of a file to disk and syncs it.
    pub fn flush_file(&self, file_id: u32) -> Result<()> {
        for page_id in self.pool.resident_pages() {
            if page_id.file_id != file_id {
                continue;
            }
            self.pool.flush_page(page_id, |pid, data| {
                let image: &[u8; PAGE_SIZE] = data
                    .try_into()
                    .map_err(|_| OxbowError::Corrupted("short page image".to_string()))?;
                self.files.write_page(pid, image)
            })?;
        }
        self.files.flush_file(file_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::FileManagerConfig;
    use oxbow_buffer::BufferPoolConfig;
    use tempfile::tempdir;

    fn create_test_bufmgr(num_frames: usize) -> (BufferManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let files = Arc::new(
            FileManager::new(FileManagerConfig {
                data_dir: dir.path().to_path_buf(),
                fsync_enabled: false,
            })
            .unwrap(),
        );
        let pool = Arc::new(BufferPool::new(BufferPoolConfig { num_frames }));
        (BufferManager::new(files, pool), dir)
    }

    #[test]
    fn test_bufmgr_alloc_read_write() {
        let (bm, _dir) = create_test_bufmgr(8);
        let file_id = bm.file_manager().open("data", true).unwrap();

        let page_id = bm.alloc_page(file_id).unwrap();
        assert_eq!(bm.pinned_page_count(), 1);

        let mut image = [0u8; PAGE_SIZE];
        image[0] = 0x42;
        bm.write_page(page_id, &image).unwrap();
        bm.unpin_page(page_id, true).unwrap();
        assert_eq!(bm.pinned_page_count(), 0);

        let data = bm.read_page(page_id).unwrap();
        assert_eq!(data[0], 0x42);
        bm.unpin_page(page_id, false).unwrap();
    }

    #[test]
    fn test_bufmgr_pin_balance() {
        let (bm, _dir) = create_test_bufmgr(8);
        let file_id = bm.file_manager().open("data", true).unwrap();
        let page_id = bm.alloc_page(file_id).unwrap();
        bm.unpin_page(page_id, true).unwrap();

        // Two reads, two unpins.
        bm.read_page(page_id).unwrap();
        bm.read_page(page_id).unwrap();
        assert_eq!(bm.pinned_page_count(), 1);
        bm.unpin_page(page_id, false).unwrap();
        assert_eq!(bm.pinned_page_count(), 1);
        bm.unpin_page(page_id, false).unwrap();
        assert_eq!(bm.pinned_page_count(), 0);
    }

    #[test]
    fn test_bufmgr_unpin_nonresident() {
        let (bm, _dir) = create_test_bufmgr(8);
        let result = bm.unpin_page(PageId::new(0, 77), false);
        assert!(matches!(result, Err(OxbowError::PageNotPinned { .. })));
    }

    #[test]
    fn test_bufmgr_eviction_writes_back_dirty_pages() {
        let (bm, _dir) = create_test_bufmgr(2);
        let file_id = bm.file_manager().open("data", true).unwrap();

        // More dirty pages than frames forces eviction write-back.
        let mut page_ids = Vec::new();
        for i in 0..6u8 {
            let page_id = bm.alloc_page(file_id).unwrap();
            let mut image = [0u8; PAGE_SIZE];
            image[0] = i;
            bm.write_page(page_id, &image).unwrap();
            bm.unpin_page(page_id, true).unwrap();
            page_ids.push(page_id);
        }

        for (i, &page_id) in page_ids.iter().enumerate() {
            let data = bm.read_page(page_id).unwrap();
            assert_eq!(data[0], i as u8);
            bm.unpin_page(page_id, false).unwrap();
        }
    }

    #[test]
    fn test_bufmgr_flush_file_persists() {
        let dir = tempdir().unwrap();
        let page_num;

        {
            let files = Arc::new(
                FileManager::new(FileManagerConfig {
                    data_dir: dir.path().to_path_buf(),
                    fsync_enabled: false,
                })
                .unwrap(),
            );
            let pool = Arc::new(BufferPool::new(BufferPoolConfig { num_frames: 8 }));
            let bm = BufferManager::new(files, pool);

            let file_id = bm.file_manager().open("data", true).unwrap();
            let page_id = bm.alloc_page(file_id).unwrap();
            page_num = page_id.page_num;

            let mut image = [0u8; PAGE_SIZE];
            image[10] = 0x99;
            bm.write_page(page_id, &image).unwrap();
            bm.unpin_page(page_id, true).unwrap();
            bm.flush_file(file_id).unwrap();
        }

        {
            let files = Arc::new(
                FileManager::new(FileManagerConfig {
                    data_dir: dir.path().to_path_buf(),
                    fsync_enabled: false,
                })
                .unwrap(),
            );
            let file_id = files.open("data", false).unwrap();
            let data = files.read_page(PageId::new(file_id, page_num)).unwrap();
            assert_eq!(data[10], 0x99);
        }
    }

    #[test]
    fn test_bufmgr_flush_file_ignores_other_files() {
        let (bm, _dir) = create_test_bufmgr(8);
        let a = bm.file_manager().open("a", true).unwrap();
        let b = bm.file_manager().open("b", true).unwrap();

        let page_a = bm.alloc_page(a).unwrap();
        let page_b = bm.alloc_page(b).unwrap();
        bm.unpin_page(page_a, true).unwrap();
        bm.unpin_page(page_b, true).unwrap();

        // Flushing file a must not touch b's dirty page.
        bm.flush_file(a).unwrap();
        bm.flush_file(b).unwrap();
    }
}
