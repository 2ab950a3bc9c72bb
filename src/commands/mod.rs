//! CLI command implementations
//!
//! Every command runs against an initialized [`FlashManager`], so region
//! policy and bounds checks apply the same way they do in firmware.
//! Commands are generic over the backend so tests can drive them with the
//! in-memory emulator.

pub mod erase;
pub mod info;
mod list;
pub mod read;
pub mod verify;
pub mod write;

pub use list::list_backends;

use am5flash_core::backend::StorageBackend;
use am5flash_core::FlashManager;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Chunk size for reads and writes reported to the progress bar
pub(crate) const CHUNK_SIZE: usize = 64 * 1024;

/// Print flash size information
fn print_flash_size<B: StorageBackend>(manager: &FlashManager<B>) -> Result<u64, Box<dyn std::error::Error>> {
    let info = manager.device_info()?;
    println!(
        "Flash size: {} bytes ({} KiB)",
        info.total_size,
        info.total_size / 1024
    );
    Ok(info.total_size)
}

/// Read file contents into a Vec
fn read_file(path: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut file = File::open(path)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    println!("Read {} bytes from {:?}", data.len(), path);
    Ok(data)
}

/// Create a progress bar with a phase label
fn progress_bar(total: u64, phase: &str) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
                phase
            ))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Format a size as a human readable string
pub fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 && bytes % (1024 * 1024) == 0 {
        format!("{} MiB", bytes / (1024 * 1024))
    } else if bytes >= 1024 && bytes % 1024 == 0 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Read `len` bytes starting at `addr` with a progress bar
fn read_range<B: StorageBackend>(
    manager: &mut FlashManager<B>,
    addr: u32,
    len: usize,
    phase: &str,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut data = vec![0u8; len];
    let pb = progress_bar(len as u64, phase)?;

    let mut offset = 0usize;
    while offset < len {
        let step = CHUNK_SIZE.min(len - offset);
        let chunk_addr = addr
            .checked_add(offset as u32)
            .ok_or("Read range runs past the 32-bit address space")?;
        manager.read(chunk_addr, &mut data[offset..offset + step])?;
        offset += step;
        pb.set_position(offset as u64);
    }

    pb.finish_and_clear();
    Ok(data)
}

#[cfg(all(test, feature = "dummy"))]
pub(crate) mod test_support {
    use am5flash_dummy::{DummyConfig, DummyFlash};
    use am5flash_core::FlashManager;

    /// Initialized manager over a 1 MiB emulated part
    pub fn manager() -> FlashManager<DummyFlash> {
        let config = DummyConfig {
            size: 1024 * 1024,
            ..DummyConfig::default()
        };
        let mut manager = FlashManager::new(DummyFlash::new(config));
        manager.init().unwrap();
        manager
    }
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(16 * 1024 * 1024), "16 MiB");
        assert_eq!(format_size(64 * 1024), "64 KiB");
        assert_eq!(format_size(1500), "1500 bytes");
    }

    #[test]
    fn test_read_range_spans_chunks() {
        let mut manager = test_support::manager();
        manager.write(0x10000, &[0x42; 8]).unwrap();
        let data = read_range(&mut manager, 0x10000, CHUNK_SIZE + 16, "Reading").unwrap();
        assert_eq!(data.len(), CHUNK_SIZE + 16);
        assert_eq!(&data[..8], &[0x42; 8]);
        assert!(data[8..].iter().all(|&b| b == 0xFF));
    }
}
