//! Device and region table display

use am5flash_core::backend::StorageBackend;
use am5flash_core::status::write_region;
use am5flash_core::FlashManager;

use super::format_size;

/// Show the device descriptor
pub fn cmd_info<B: StorageBackend>(manager: &FlashManager<B>) -> Result<(), Box<dyn std::error::Error>> {
    let info = manager.device_info()?;

    println!("Flash Device Information:");
    println!("  Name:            {}", info.device_name);
    println!(
        "  Total Size:      {} ({} bytes)",
        format_size(info.total_size),
        info.total_size
    );
    println!(
        "  Sector Size:     {} ({} bytes)",
        format_size(info.sector_size as u64),
        info.sector_size
    );
    println!("  Device ID:       0x{:08X}", info.device_id);
    println!("  Vendor ID:       0x{:04X}", info.vendor_id);
    println!(
        "  Write Protected: {}",
        if info.write_protected { "YES" } else { "NO" }
    );
    println!("  Sector Count:    {}", info.block_count);
    Ok(())
}

/// Show the descriptor and region table
pub fn cmd_status<B: StorageBackend>(manager: &FlashManager<B>) -> Result<(), Box<dyn std::error::Error>> {
    print!("{}", manager.status()?);
    Ok(())
}

/// Show the region table
pub fn cmd_regions<B: StorageBackend>(manager: &FlashManager<B>) -> Result<(), Box<dyn std::error::Error>> {
    let regions = manager.regions()?;
    let mut out = String::new();
    for (i, region) in regions.iter().enumerate() {
        write_region(&mut out, i + 1, region)?;
    }

    println!("Flash Regions ({}):", regions.len());
    print!("{}", out);
    Ok(())
}
