//! Error types for file-backed flash images

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// File backend errors
#[derive(Debug, Error)]
pub enum FileBackendError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Image file could not be opened
    #[error("Failed to open image '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Image file is empty
    #[error("Image '{0}' is empty")]
    EmptyImage(PathBuf),

    /// Image size is not a whole number of sectors
    #[error("Image size {size} is not a multiple of the {sector_size} byte sector size")]
    PartialSector { size: u64, sector_size: u32 },

    /// Image is larger than the 32-bit address space
    #[error("Image size {0} exceeds the 4 GiB address space")]
    TooLarge(u64),

    /// Sector size is not a power of two
    #[error("Sector size {0} is not a power of 2")]
    InvalidSectorSize(u32),

    /// Missing required parameter
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    /// Invalid parameter value
    #[error("Invalid parameter '{name}': {message}")]
    InvalidParameter { name: &'static str, message: String },
}

/// Result type for file backend operations
pub type Result<T> = std::result::Result<T, FileBackendError>;
