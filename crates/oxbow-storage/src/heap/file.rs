//! Heap relation files and the record scanner used for index builds.

use crate::bufmgr::BufferManager;
use crate::heap::page::HeapPage;
use bytes::Bytes;
use oxbow_common::page::PageId;
use oxbow_common::{OxbowError, RecordId, Result};
use std::sync::Arc;

/// An append-only heap relation stored in a named paged file.
///
/// Records are variable-length byte strings addressed by `RecordId`
/// (page number plus slot). All page access goes through the buffer
/// manager; pages touched by an operation are unpinned before it returns.
pub struct RelationFile {
    /// Buffer manager for page access.
    bufmgr: Arc<BufferManager>,
    /// File id of the relation file.
    file_id: u32,
    /// Relation name (also the file name).
    name: String,
}

impl RelationFile {
    /// Creates a relation file, or opens it if it already exists.
    pub fn create(bufmgr: Arc<BufferManager>, name: &str) -> Result<Self> {
        let file_id = bufmgr.file_manager().open(name, true)?;
        Ok(Self {
            bufmgr,
            file_id,
            name: name.to_string(),
        })
    }

    /// Opens an existing relation file.
    pub fn open(bufmgr: Arc<BufferManager>, name: &str) -> Result<Self> {
        let file_id = bufmgr.file_manager().open(name, false)?;
        Ok(Self {
            bufmgr,
            file_id,
            name: name.to_string(),
        })
    }

    /// Returns the relation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the file id of the relation.
    pub fn file_id(&self) -> u32 {
        self.file_id
    }

    /// Returns the number of pages in the relation.
    pub fn num_pages(&self) -> Result<u32> {
        self.bufmgr.file_manager().num_pages(self.file_id)
    }

    /// Appends a record, returning its RecordId.
    ///
    /// Tries the last page first and allocates a new page when it is full.
    pub fn insert_record(&self, payload: &[u8]) -> Result<RecordId> {
        let num_pages = self.num_pages()?;

        if num_pages > 0 {
            let page_id = PageId::new(self.file_id, num_pages - 1);
            let mut page = HeapPage::from_bytes(self.bufmgr.read_page(page_id)?);

            match page.insert_record(payload) {
                Ok(slot_num) => {
                    let outcome = self.bufmgr.write_page(page_id, page.as_bytes());
                    let unpinned = self.bufmgr.unpin_page(page_id, outcome.is_ok());
                    outcome?;
                    unpinned?;
                    return Ok(RecordId::new(page_id.page_num, slot_num));
                }
                Err(OxbowError::PageFull) => {
                    self.bufmgr.unpin_page(page_id, false)?;
                }
                Err(e) => {
                    self.bufmgr.unpin_page(page_id, false)?;
                    return Err(e);
                }
            }
        }

        let page_id = self.bufmgr.alloc_page(self.file_id)?;
        let mut page = HeapPage::new();

        let outcome = page
            .insert_record(payload)
            .and_then(|slot_num| {
                self.bufmgr.write_page(page_id, page.as_bytes())?;
                Ok(slot_num)
            });
        let unpinned = self.bufmgr.unpin_page(page_id, outcome.is_ok());
        let slot_num = outcome?;
        unpinned?;

        Ok(RecordId::new(page_id.page_num, slot_num))
    }

    /// Fetches one record by id, or None if the id does not resolve.
    pub fn record(&self, rid: RecordId) -> Result<Option<Bytes>> {
        if rid.page_num >= self.num_pages()? {
            return Ok(None);
        }

        let page_id = PageId::new(self.file_id, rid.page_num);
        let page = HeapPage::from_bytes(self.bufmgr.read_page(page_id)?);
        self.bufmgr.unpin_page(page_id, false)?;

        Ok(page.record(rid.slot_num))
    }

    /// Starts a full scan of the relation.
    pub fn scan(&self) -> Result<RelationScan> {
        Ok(RelationScan {
            bufmgr: Arc::clone(&self.bufmgr),
            file_id: self.file_id,
            num_pages: self.num_pages()?,
            next_page: 0,
            current: None,
        })
    }
}

/// Sequential scanner over a relation's records.
///
/// Yields `(RecordId, payload)` pairs in storage order; exhaustion is
/// signalled with `EndOfFile`, which index bulk loading catches.
pub struct RelationScan {
    bufmgr: Arc<BufferManager>,
    file_id: u32,
    num_pages: u32,
    next_page: u32,
    /// Snapshot of the page being scanned plus the cursor into it.
    current: Option<(HeapPage, u32, u16)>,
}

impl RelationScan {
    /// Returns the next record, or `EndOfFile` when the relation is done.
    pub fn next_record(&mut self) -> Result<(RecordId, Bytes)> {
        loop {
            if let Some((page, page_num, next_slot)) = self.current.as_mut() {
                if *next_slot < page.slot_count() {
                    let slot_num = *next_slot;
                    *next_slot += 1;
                    if let Some(payload) = page.record(slot_num) {
                        return Ok((RecordId::new(*page_num, slot_num), payload));
                    }
                    continue;
                }
                self.current = None;
            }

            if self.next_page >= self.num_pages {
                return Err(OxbowError::EndOfFile);
            }

            let page_id = PageId::new(self.file_id, self.next_page);
            let data = self.bufmgr.read_page(page_id)?;
            self.bufmgr.unpin_page(page_id, false)?;

            self.current = Some((HeapPage::from_bytes(data), self.next_page, 0));
            self.next_page += 1;
        }
    }
}
