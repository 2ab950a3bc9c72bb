//! am5flash-file - File-backed flash images
//!
//! This crate exposes a raw flash image file as a sector-addressed
//! [`StorageBackend`](am5flash_core::backend::StorageBackend), so the
//! region manager can be exercised against a dump taken from a real board.
//!
//! # Usage with the am5flash CLI
//!
//! ```bash
//! # Show the region table for a 16 MiB dump
//! am5flash -b file:path=bios.bin status
//!
//! # Work on a fresh erased image
//! am5flash -b file:path=scratch.bin,create=16M write -a 0x10000 -i fw.bin
//! ```

pub mod device;
pub mod error;

// Re-exports
pub use device::{parse_options, FileBackend, FileBackendConfig};
pub use error::{FileBackendError, Result};

/// Open a flash image and return a boxed backend
///
/// This is a convenience function for use in the CLI backend dispatch.
///
/// # Example Options
///
/// - `path=bios.bin` - Required: image file
pub fn open_file_backend(
    options: &[(&str, &str)],
) -> std::result::Result<Box<dyn am5flash_core::backend::StorageBackend>, Box<dyn std::error::Error>> {
    let config = parse_options(options)?;
    let backend = FileBackend::open(&config)?;
    Ok(Box::new(backend))
}
