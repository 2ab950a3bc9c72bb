//! Erase command implementation

use am5flash_core::backend::StorageBackend;
use am5flash_core::FlashManager;

use super::{format_size, progress_bar};

/// Sector-aligned start addresses of every sector touched by a range
pub fn sectors_in_range(sector_size: u32, address: u32, size: u32) -> impl Iterator<Item = u32> {
    let sector_size = sector_size as u64;
    let first = address as u64 / sector_size;
    let end = address as u64 + size.max(1) as u64;
    let last = (end - 1) / sector_size;
    // Sectors past the 32-bit address space are not addressable
    (first..=last).map_while(move |s| u32::try_from(s * sector_size).ok())
}

/// Erase every sector touched by `[address, address + size)`
///
/// Each sector goes through the manager's erase check separately, so the
/// first sector that is refused stops the command.
pub fn run_erase<B: StorageBackend>(
    manager: &mut FlashManager<B>,
    address: u32,
    size: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let info = manager.device_info()?;
    let size = size.unwrap_or(info.sector_size);
    if !info.contains_range(address, size.max(1) as usize) {
        return Err(format!(
            "0x{:08X} + {} bytes is beyond the {} byte flash",
            address, size, info.total_size
        )
        .into());
    }
    let sectors: Vec<u32> = sectors_in_range(info.sector_size, address, size).collect();

    println!(
        "Erasing {} sector(s) ({}) starting at address 0x{:08X}",
        sectors.len(),
        format_size(size as u64),
        address
    );

    let pb = progress_bar(sectors.len() as u64 * info.sector_size as u64, "Erasing")?;
    for (i, sector_addr) in sectors.iter().enumerate() {
        manager.erase_sector(*sector_addr).map_err(|e| {
            pb.abandon();
            e
        })?;
        pb.set_position((i as u64 + 1) * info.sector_size as u64);
    }
    pb.finish_and_clear();

    println!("Erased {} sector(s) successfully", sectors.len());
    Ok(())
}
