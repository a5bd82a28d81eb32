//! File manager for page-level I/O over named data files.

use oxbow_common::page::{PageId, PAGE_SIZE};
use oxbow_common::{OxbowError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Configuration for the file manager.
#[derive(Debug, Clone)]
pub struct FileManagerConfig {
    /// Base directory for data files.
    pub data_dir: PathBuf,
    /// Enable fsync after writes.
    pub fsync_enabled: bool,
}

impl Default for FileManagerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            fsync_enabled: true,
        }
    }
}

/// Handle for an open data file.
struct FileHandle {
    /// The OS file handle.
    file: File,
    /// File name within the data directory.
    name: String,
    /// Number of pages in the file.
    num_pages: u32,
}

/// Open-file registry guarded by one mutex.
struct Registry {
    by_name: HashMap<String, u32>,
    files: HashMap<u32, FileHandle>,
    next_file_id: u32,
}

/// Manages reading and writing pages of named files in a data directory.
///
/// Files are addressed by name (a relation is `"orders"`, its index over
/// the attribute at byte offset 4 is `"orders.4"`). Each open file gets a
/// numeric id used in `PageId`s; reopening an open name returns the same
/// id. Opening a missing file without `create` fails with `FileNotFound`.
pub struct FileManager {
    /// Configuration.
    config: FileManagerConfig,
    /// Open file registry.
    inner: Mutex<Registry>,
}

impl FileManager {
    /// Creates a new file manager, creating the data directory if needed.
    pub fn new(config: FileManagerConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        Ok(Self {
            config,
            inner: Mutex::new(Registry {
                by_name: HashMap::new(),
                files: HashMap::new(),
                next_file_id: 0,
            }),
        })
    }

    /// Returns the data directory path.
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Returns the path of a named file within the data directory.
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.config.data_dir.join(name)
    }

    /// Opens a data file by name, returning its file id.
    ///
    /// A missing file is created when `create` is true and reported as
    /// `FileNotFound` otherwise.
    pub fn open(&self, name: &str, create: bool) -> Result<u32> {
        let mut inner = self.inner.lock();

        if let Some(&file_id) = inner.by_name.get(name) {
            return Ok(file_id);
        }

        let path = self.file_path(name);
        if !create && !path.exists() {
            return Err(OxbowError::FileNotFound(name.to_string()));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(create)
            .open(&path)?;

        let file_size = file.metadata()?.len();
        let num_pages = (file_size / PAGE_SIZE as u64) as u32;

        let file_id = inner.next_file_id;
        inner.next_file_id += 1;
        inner.by_name.insert(name.to_string(), file_id);
        inner.files.insert(
            file_id,
            FileHandle {
                file,
                name: name.to_string(),
                num_pages,
            },
        );

        Ok(file_id)
    }

    /// Returns the page number of the first page of a file.
    ///
    /// For index files this is the metadata page.
    pub fn first_page_no(&self, _file_id: u32) -> u32 {
        0
    }

    /// Reads a page from disk.
    pub fn read_page(&self, page_id: PageId) -> Result<Box<[u8; PAGE_SIZE]>> {
        let mut inner = self.inner.lock();
        let handle = inner
            .files
            .get_mut(&page_id.file_id)
            .ok_or(OxbowError::FileNotOpen {
                file_id: page_id.file_id,
            })?;

        if page_id.page_num >= handle.num_pages {
            return Err(OxbowError::PageNotFound { page_id });
        }

        let offset = (page_id.page_num as u64) * (PAGE_SIZE as u64);
        handle.file.seek(SeekFrom::Start(offset))?;

        let mut buffer = Box::new([0u8; PAGE_SIZE]);
        handle.file.read_exact(&mut buffer[..])?;

        Ok(buffer)
    }

    /// Writes a page to disk.
    pub fn write_page(&self, page_id: PageId, data: &[u8; PAGE_SIZE]) -> Result<()> {
        let mut inner = self.inner.lock();
        let handle = inner
            .files
            .get_mut(&page_id.file_id)
            .ok_or(OxbowError::FileNotOpen {
                file_id: page_id.file_id,
            })?;

        let offset = (page_id.page_num as u64) * (PAGE_SIZE as u64);
        handle.file.seek(SeekFrom::Start(offset))?;
        handle.file.write_all(data)?;

        if self.config.fsync_enabled {
            handle.file.sync_all()?;
        }

        if page_id.page_num >= handle.num_pages {
            handle.num_pages = page_id.page_num + 1;
        }

        Ok(())
    }

    /// Allocates a new zeroed page at the end of the file.
    ///
    /// Returns the PageId of the newly allocated page.
    pub fn allocate_page(&self, file_id: u32) -> Result<PageId> {
        let mut inner = self.inner.lock();
        let handle = inner
            .files
            .get_mut(&file_id)
            .ok_or(OxbowError::FileNotOpen { file_id })?;

        let page_num = handle.num_pages;
        let offset = (page_num as u64) * (PAGE_SIZE as u64);
        handle.file.seek(SeekFrom::Start(offset))?;
        handle.file.write_all(&[0u8; PAGE_SIZE])?;

        if self.config.fsync_enabled {
            handle.file.sync_all()?;
        }

        handle.num_pages = page_num + 1;

        Ok(PageId::new(file_id, page_num))
    }

    /// Returns the number of pages in a file.
    pub fn num_pages(&self, file_id: u32) -> Result<u32> {
        let inner = self.inner.lock();
        let handle = inner
            .files
            .get(&file_id)
            .ok_or(OxbowError::FileNotOpen { file_id })?;
        Ok(handle.num_pages)
    }

    /// Flushes pending writes of one file to disk.
    pub fn flush_file(&self, file_id: u32) -> Result<()> {
        let inner = self.inner.lock();
        let handle = inner
            .files
            .get(&file_id)
            .ok_or(OxbowError::FileNotOpen { file_id })?;
        handle.file.sync_all()?;
        Ok(())
    }

    /// Closes a file, syncing it first. Closing an unknown id is a no-op.
    pub fn close_file(&self, file_id: u32) -> Result<()> {
        let mut inner = self.inner.lock();
        if let Some(handle) = inner.files.remove(&file_id) {
            inner.by_name.remove(&handle.name);
            handle.file.sync_all()?;
        }
        Ok(())
    }

    /// Deletes a data file by name, closing it first if open.
    pub fn delete_file(&self, name: &str) -> Result<()> {
        let file_id = self.inner.lock().by_name.get(name).copied();
        if let Some(file_id) = file_id {
            self.close_file(file_id)?;
        }

        let path = self.file_path(name);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

impl Drop for FileManager {
    fn drop(&mut self) {
        let inner = self.inner.lock();
        for handle in inner.files.values() {
            let _ = handle.file.sync_all();
        }
    }
}
