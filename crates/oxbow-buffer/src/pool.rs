//! Buffer pool manager.

use crate::frame::{BufferFrame, FrameId};
use crate::replacer::{ClockReplacer, Replacer};
use oxbow_common::page::{PageId, PAGE_SIZE};
use oxbow_common::{OxbowError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;

/// A dirty page that was evicted from the buffer pool.
/// The caller must write it to disk to prevent data loss.
#[derive(Debug)]
pub struct EvictedPage {
    pub page_id: PageId,
    pub data: Box<[u8; PAGE_SIZE]>,
}

/// Configuration for the buffer pool.
#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    /// Number of frames in the pool.
    pub num_frames: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self { num_frames: 1024 }
    }
}

/// Statistics about the buffer pool.
#[derive(Debug, Clone)]
pub struct BufferPoolStats {
    /// Total number of frames.
    pub total_frames: usize,
    /// Number of free frames.
    pub free_frames: usize,
    /// Number of frames holding a page.
    pub used_frames: usize,
    /// Number of pinned frames.
    pub pinned_frames: usize,
    /// Number of dirty frames.
    pub dirty_frames: usize,
}

/// Buffer pool manager.
///
/// Manages a fixed-size pool of page frames with a page-to-frame map,
/// a free list, clock replacement for eviction, and per-frame pin counts.
/// A pinned frame is never evicted; an evicted dirty page is handed back
/// to the caller for write-back.
pub struct BufferPool {
    /// Configuration.
    config: BufferPoolConfig,
    /// Array of buffer frames.
    frames: Vec<BufferFrame>,
    /// Page ID to frame ID mapping.
    page_table: Mutex<HashMap<PageId, FrameId>>,
    /// List of free frame IDs.
    free_list: Mutex<Vec<FrameId>>,
    /// Page replacement policy.
    replacer: ClockReplacer,
}

impl BufferPool {
    /// Creates a new buffer pool.
    pub fn new(config: BufferPoolConfig) -> Self {
        let num_frames = config.num_frames;

        let frames: Vec<_> = (0..num_frames)
            .map(|i| BufferFrame::new(FrameId(i as u32)))
            .collect();
        let free_list: Vec<_> = (0..num_frames).map(|i| FrameId(i as u32)).collect();

        Self {
            config,
            frames,
            page_table: Mutex::new(HashMap::with_capacity(num_frames)),
            free_list: Mutex::new(free_list),
            replacer: ClockReplacer::new(num_frames),
        }
    }

    /// Returns the number of frames in the pool.
    pub fn num_frames(&self) -> usize {
        self.config.num_frames
    }

    /// Returns the number of free frames.
    pub fn free_count(&self) -> usize {
        self.free_list.lock().len()
    }

    /// Returns the number of pages currently resident.
    pub fn page_count(&self) -> usize {
        self.page_table.lock().len()
    }

    /// Checks whether a page is resident in the pool.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.page_table.lock().contains_key(&page_id)
    }

    /// Fetches a resident page, pinning it.
    ///
    /// Returns None if the page is not in the pool.
    pub fn fetch_page(&self, page_id: PageId) -> Option<&BufferFrame> {
        let frame_id = *self.page_table.lock().get(&page_id)?;
        let frame = &self.frames[frame_id.0 as usize];
        frame.pin();
        self.replacer.record_access(frame_id);
        Some(frame)
    }

    /// Allocates a frame for a new page.
    ///
    /// Tries the free list first, then evicts an unpinned frame.
    /// Returns the frame ID and any evicted dirty page.
    fn allocate_frame(&self) -> Result<(FrameId, Option<EvictedPage>)> {
        if let Some(frame_id) = self.free_list.lock().pop() {
            return Ok((frame_id, None));
        }

        let victim_id = self
            .replacer
            .evict(&|fid| self.frames[fid.0 as usize].pin_count() == 0)
            .ok_or(OxbowError::BufferPoolFull)?;

        let frame = &self.frames[victim_id.0 as usize];

        // Capture the evicted page for write-back if it is dirty.
        let evicted = match (frame.is_dirty(), frame.page_id()) {
            (true, Some(page_id)) => {
                let guard = frame.read_data();
                let mut data = Box::new([0u8; PAGE_SIZE]);
                data.copy_from_slice(&**guard);
                Some(EvictedPage { page_id, data })
            }
            _ => None,
        };

        if let Some(old_page_id) = frame.page_id() {
            self.page_table.lock().remove(&old_page_id);
        }

        Ok((victim_id, evicted))
    }

    /// Inserts a new page into the buffer pool, pinning it.
    ///
    /// If the page is already resident the existing frame is pinned and
    /// returned. Otherwise a frame is allocated (evicting if necessary)
    /// and reset to zeroes; any evicted dirty page is returned for the
    /// caller to write back.
    pub fn new_page(&self, page_id: PageId) -> Result<(&BufferFrame, Option<EvictedPage>)> {
        if let Some(frame) = self.fetch_page(page_id) {
            return Ok((frame, None));
        }

        let (frame_id, evicted) = self.allocate_frame()?;

        let frame = &self.frames[frame_id.0 as usize];
        frame.reset();
        frame.set_page_id(Some(page_id));
        frame.pin();
        self.replacer.record_access(frame_id);

        self.page_table.lock().insert(page_id, frame_id);

        Ok((frame, evicted))
    }

    /// Loads page data into the buffer pool, pinning the frame.
    ///
    /// Used when reading a page from disk.
    pub fn load_page(
        &self,
        page_id: PageId,
        data: &[u8],
    ) -> Result<(&BufferFrame, Option<EvictedPage>)> {
        let (frame, evicted) = self.new_page(page_id)?;
        frame.copy_from(data);
        Ok((frame, evicted))
    }

    /// Unpins a page, optionally marking it dirty.
    ///
    /// Returns false if the page is not resident.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let frame_id = match self.page_table.lock().get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return false,
        };
        let frame = &self.frames[frame_id.0 as usize];

        if is_dirty {
            frame.set_dirty(true);
        }
        frame.unpin();
        true
    }

    /// Flushes a page through the provided callback if it is dirty.
    ///
    /// Returns true if the page was flushed; the dirty bit is cleared.
    pub fn flush_page<F>(&self, page_id: PageId, mut flush_fn: F) -> Result<bool>
    where
        F: FnMut(PageId, &[u8]) -> Result<()>,
    {
        let frame_id = match self.page_table.lock().get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return Ok(false),
        };
        let frame = &self.frames[frame_id.0 as usize];

        if !frame.is_dirty() {
            return Ok(false);
        }

        let data = frame.read_data();
        flush_fn(page_id, &**data)?;
        drop(data);
        frame.set_dirty(false);
        Ok(true)
    }

    /// Returns the page IDs currently resident in the pool.
    pub fn resident_pages(&self) -> Vec<PageId> {
        self.page_table.lock().keys().copied().collect()
    }

    /// Returns statistics about the buffer pool.
    pub fn stats(&self) -> BufferPoolStats {
        let mut pinned_frames = 0;
        let mut dirty_frames = 0;

        let page_table = self.page_table.lock();
        for frame_id in page_table.values() {
            let frame = &self.frames[frame_id.0 as usize];
            if frame.is_pinned() {
                pinned_frames += 1;
            }
            if frame.is_dirty() {
                dirty_frames += 1;
            }
        }

        BufferPoolStats {
            total_frames: self.config.num_frames,
            free_frames: self.free_list.lock().len(),
            used_frames: page_table.len(),
            pinned_frames,
            dirty_frames,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_pool(num_frames: usize) -> BufferPool {
        BufferPool::new(BufferPoolConfig { num_frames })
    }

    #[test]
    fn test_buffer_pool_new() {
        let pool = create_test_pool(10);

        assert_eq!(pool.num_frames(), 10);
        assert_eq!(pool.free_count(), 10);
        assert_eq!(pool.page_count(), 0);
    }

    #[test]
    fn test_buffer_pool_new_page() {
        let pool = create_test_pool(10);
        let page_id = PageId::new(0, 1);

        let (frame, evicted) = pool.new_page(page_id).unwrap();

        assert!(evicted.is_none());
        assert_eq!(frame.page_id(), Some(page_id));
        assert!(frame.is_pinned());
        assert_eq!(pool.free_count(), 9);
        assert!(pool.contains(page_id));
    }

    #[test]
    fn test_buffer_pool_fetch_existing() {
        let pool = create_test_pool(10);
        let page_id = PageId::new(0, 1);

        pool.new_page(page_id).unwrap();
        pool.unpin_page(page_id, false);

        let frame = pool.fetch_page(page_id).unwrap();
        assert_eq!(frame.page_id(), Some(page_id));
        assert!(frame.is_pinned());
    }

    #[test]
    fn test_buffer_pool_fetch_nonexistent() {
        let pool = create_test_pool(10);
        assert!(pool.fetch_page(PageId::new(0, 1)).is_none());
    }

    #[test]
    fn test_buffer_pool_unpin() {
        let pool = create_test_pool(10);
        let page_id = PageId::new(0, 1);

        let (frame, _) = pool.new_page(page_id).unwrap();
        assert!(frame.is_pinned());

        assert!(pool.unpin_page(page_id, false));
        assert!(!frame.is_pinned());
    }

    #[test]
    fn test_buffer_pool_unpin_nonresident() {
        let pool = create_test_pool(10);
        assert!(!pool.unpin_page(PageId::new(0, 9), false));
    }

    #[test]
    fn test_buffer_pool_dirty_tracking() {
        let pool = create_test_pool(10);
        let page_id = PageId::new(0, 1);

        pool.new_page(page_id).unwrap();
        pool.unpin_page(page_id, true);

        let frame = pool.fetch_page(page_id).unwrap();
        assert!(frame.is_dirty());
    }

    #[test]
    fn test_buffer_pool_eviction_clean() {
        let pool = create_test_pool(3);

        for i in 0..3 {
            let page_id = PageId::new(0, i);
            pool.new_page(page_id).unwrap();
            pool.unpin_page(page_id, false);
        }
        assert_eq!(pool.free_count(), 0);

        // One more page evicts a clean victim: nothing to write back.
        let (_, evicted) = pool.new_page(PageId::new(0, 99)).unwrap();
        assert!(evicted.is_none());
        assert_eq!(pool.page_count(), 3);
        assert!(pool.contains(PageId::new(0, 99)));
    }

    #[test]
    fn test_buffer_pool_eviction_dirty() {
        let pool = create_test_pool(1);
        let page_id1 = PageId::new(0, 1);

        let (frame, _) = pool.new_page(page_id1).unwrap();
        frame.write_data()[0] = 0xAB;
        pool.unpin_page(page_id1, true);

        let (_, evicted) = pool.new_page(PageId::new(0, 2)).unwrap();

        let evicted = evicted.expect("dirty page should be returned on eviction");
        assert_eq!(evicted.page_id, page_id1);
        assert_eq!(evicted.data[0], 0xAB);
    }

    #[test]
    fn test_buffer_pool_full_all_pinned() {
        let pool = create_test_pool(2);

        pool.new_page(PageId::new(0, 1)).unwrap();
        pool.new_page(PageId::new(0, 2)).unwrap();

        let result = pool.new_page(PageId::new(0, 3));
        assert!(matches!(result, Err(OxbowError::BufferPoolFull)));
    }

    #[test]
    fn test_buffer_pool_load_page() {
        let pool = create_test_pool(10);
        let page_id = PageId::new(0, 1);
        let data = [0xABu8; PAGE_SIZE];

        let (frame, _) = pool.load_page(page_id, &data).unwrap();

        let frame_data = frame.read_data();
        assert_eq!(frame_data[0], 0xAB);
        assert_eq!(frame_data[PAGE_SIZE - 1], 0xAB);
    }

    #[test]
    fn test_buffer_pool_flush_page() {
        let pool = create_test_pool(10);
        let page_id = PageId::new(0, 1);

        pool.new_page(page_id).unwrap();
        pool.unpin_page(page_id, true);

        let mut flushed = vec![];
        let result = pool.flush_page(page_id, |pid, _data| {
            flushed.push(pid);
            Ok(())
        });

        assert!(result.unwrap());
        assert_eq!(flushed, vec![page_id]);

        // Dirty bit cleared: a second flush is a no-op.
        let result = pool.flush_page(page_id, |_, _| panic!("should not flush"));
        assert!(!result.unwrap());
    }

    #[test]
    fn test_buffer_pool_flush_clean_page() {
        let pool = create_test_pool(10);
        let page_id = PageId::new(0, 1);

        pool.new_page(page_id).unwrap();
        pool.unpin_page(page_id, false);

        let result = pool.flush_page(page_id, |_, _| panic!("should not flush"));
        assert!(!result.unwrap());
    }

    #[test]
    fn test_buffer_pool_resident_pages() {
        let pool = create_test_pool(10);

        for i in 0..4 {
            let page_id = PageId::new(2, i);
            pool.new_page(page_id).unwrap();
            pool.unpin_page(page_id, false);
        }

        let mut resident = pool.resident_pages();
        resident.sort_by_key(|p| p.page_num);
        assert_eq!(resident.len(), 4);
        assert_eq!(resident[0], PageId::new(2, 0));
        assert_eq!(resident[3], PageId::new(2, 3));
    }

    #[test]
    fn test_buffer_pool_duplicate_new_page() {
        let pool = create_test_pool(10);
        let page_id = PageId::new(0, 1);

        pool.new_page(page_id).unwrap();
        pool.unpin_page(page_id, false);

        let (frame, evicted) = pool.new_page(page_id).unwrap();

        assert!(evicted.is_none());
        assert_eq!(frame.page_id(), Some(page_id));
        assert_eq!(pool.page_count(), 1);
    }

    #[test]
    fn test_buffer_pool_stats() {
        let pool = create_test_pool(10);

        for i in 0..5 {
            let page_id = PageId::new(0, i);
            pool.new_page(page_id).unwrap();
            if i % 2 == 0 {
                pool.unpin_page(page_id, true);
            }
            // Odd pages stay pinned
        }

        let stats = pool.stats();
        assert_eq!(stats.total_frames, 10);
        assert_eq!(stats.free_frames, 5);
        assert_eq!(stats.used_frames, 5);
        assert_eq!(stats.pinned_frames, 2);
        assert_eq!(stats.dirty_frames, 3);
    }
}
