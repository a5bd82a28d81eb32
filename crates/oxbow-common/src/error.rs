//! Error types for OxbowDB.

use crate::page::PageId;
use thiserror::Error;

/// Result type alias using OxbowError.
pub type Result<T> = std::result::Result<T, OxbowError>;

/// Errors that can occur in Oxbow storage operations.
#[derive(Debug, Error)]
pub enum OxbowError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // File manager errors
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("File not open: {file_id}")]
    FileNotOpen { file_id: u32 },

    #[error("Page not found: {page_id}")]
    PageNotFound { page_id: PageId },

    // Buffer pool errors
    #[error("Buffer pool full, unable to allocate frame")]
    BufferPoolFull,

    #[error("Page not pinned: {page_id}")]
    PageNotPinned { page_id: PageId },

    // Heap errors
    #[error("Page full, unable to insert record")]
    PageFull,

    #[error("End of file")]
    EndOfFile,

    // Index errors
    #[error("Index metadata mismatch: {0}")]
    MetadataMismatch(String),

    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    #[error("Bad scan operator")]
    BadOperator,

    #[error("Bad scan range: low {low} > high {high}")]
    BadScanRange { low: i32, high: i32 },

    #[error("No key in range satisfies the scan criteria")]
    NoSuchKeyFound,

    #[error("Scan not initialized")]
    ScanNotInitialized,

    #[error("Index scan completed")]
    IndexScanCompleted,

    // Configuration errors
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter { name: String, value: String },

    // Internal errors
    #[error("Storage corrupted: {0}")]
    Corrupted(String),
}
