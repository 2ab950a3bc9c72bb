//! Read and backup commands

use am5flash_core::backend::StorageBackend;
use am5flash_core::{checksum32, FlashManager};
use std::fs;
use std::path::Path;

use super::{format_size, print_flash_size, read_range};

/// Read `size` bytes at `address` into `output`
pub fn run_read<B: StorageBackend>(
    manager: &mut FlashManager<B>,
    address: u32,
    size: u32,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    if size == 0 {
        return Err("Read size must be non-zero".into());
    }

    println!(
        "Reading {} from address 0x{:08X}",
        format_size(size as u64),
        address
    );
    let data = read_range(manager, address, size as usize, "Reading")?;
    fs::write(output, &data)?;

    println!(
        "Wrote {} bytes to {:?} (checksum 0x{:08X})",
        data.len(),
        output,
        checksum32(&data)
    );
    Ok(())
}

/// Read the whole device into `output`
pub fn run_backup<B: StorageBackend>(
    manager: &mut FlashManager<B>,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let total_size = print_flash_size(manager)?;
    let len = usize::try_from(total_size)?;

    println!("Creating full backup of flash device");
    let data = read_range(manager, 0, len, "Reading")?;
    fs::write(output, &data)?;

    println!(
        "Backup complete: {} bytes written to {:?} (checksum 0x{:08X})",
        data.len(),
        output,
        checksum32(&data)
    );
    Ok(())
}
