//! Write and restore commands

use am5flash_core::backend::StorageBackend;
use am5flash_core::policy::{check_erase_allowed, check_write_allowed, PolicyViolation};
use am5flash_core::FlashManager;
use std::path::Path;

use super::erase::sectors_in_range;
use super::verify::verify_data;
use super::{format_size, print_flash_size, progress_bar, read_file, read_range, CHUNK_SIZE};

/// Check a whole write against bounds and region policy before touching flash
///
/// The manager checks each call on its own; the CLI writes in chunks, so
/// the full range is checked up front to keep a rejected image from being
/// partially programmed.
fn preflight<B: StorageBackend>(
    manager: &FlashManager<B>,
    address: u32,
    len: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let info = manager.device_info()?;
    if !info.contains_range(address, len) {
        return Err(format!(
            "0x{:08X} + {} bytes is beyond the {} byte flash",
            address, len, info.total_size
        )
        .into());
    }
    if info.write_protected {
        return Err("Flash is write protected".into());
    }
    if let Err(PolicyViolation::WriteProtected { region }) =
        check_write_allowed(manager.regions()?, address, len)
    {
        return Err(format!("Cannot write to protected region '{}'", region).into());
    }
    Ok(())
}

/// Program `data` at `address` in chunks with a progress bar
fn write_chunks<B: StorageBackend>(
    manager: &mut FlashManager<B>,
    address: u32,
    data: &[u8],
    phase: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let pb = progress_bar(data.len() as u64, phase)?;
    let mut offset = 0usize;
    for chunk in data.chunks(CHUNK_SIZE) {
        manager
            .write(address + offset as u32, chunk)
            .map_err(|e| {
                pb.abandon();
                e
            })?;
        offset += chunk.len();
        pb.set_position(offset as u64);
    }
    pb.finish_and_clear();
    Ok(())
}

/// Write `input` to flash at `address`
pub fn run_write<B: StorageBackend>(
    manager: &mut FlashManager<B>,
    address: u32,
    input: &Path,
    erase: bool,
    verify: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = read_file(input)?;
    if data.is_empty() {
        return Err(format!("{:?} is empty", input).into());
    }
    preflight(manager, address, data.len())?;

    if erase {
        let sector_size = manager.device_info()?.sector_size;
        let sectors: Vec<u32> =
            sectors_in_range(sector_size, address, data.len() as u32).collect();
        println!("Erasing {} sector(s)", sectors.len());
        for sector_addr in sectors {
            manager.erase_sector(sector_addr)?;
        }
    }

    println!(
        "Writing {} to address 0x{:08X}",
        format_size(data.len() as u64),
        address
    );
    write_chunks(manager, address, &data, "Writing")?;
    println!("Wrote {} bytes successfully", data.len());

    if verify {
        println!("Verifying written data...");
        if !verify_data(manager, address, &data)?.passed() {
            return Err("Verification failed".into());
        }
        println!("Verification passed!");
    }
    Ok(())
}

/// What restore does with one sector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectorAction {
    /// Sector touches a protected region
    Skip,
    /// Program without erasing (erase not permitted here)
    Write,
    /// Erase, then program
    EraseWrite,
}

/// Write a full image back to the device
///
/// Sectors that touch a protected region are left alone. Sectors in
/// erasable regions are erased before programming.
pub fn run_restore<B: StorageBackend>(
    manager: &mut FlashManager<B>,
    input: &Path,
    verify: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let total_size = print_flash_size(manager)?;
    let image = read_file(input)?;
    if image.len() as u64 != total_size {
        return Err(format!(
            "Image size ({} bytes) does not match flash size ({} bytes)",
            image.len(),
            total_size
        )
        .into());
    }
    if manager.device_info()?.write_protected {
        return Err("Flash is write protected".into());
    }

    let sector_size = manager.device_info()?.sector_size;
    let plan = plan_restore(manager, sector_size, total_size)?;

    for region in manager.regions()? {
        if region.write_protected {
            println!(
                "Skipping protected region '{}' (0x{:08X} - 0x{:08X})",
                region.name,
                region.start_address,
                region.last_address()
            );
        }
    }

    println!("Restoring flash from backup");
    let pb = progress_bar(total_size, "Restoring")?;
    let sector_len = sector_size as usize;
    let mut skipped = 0usize;
    for (i, (addr, action)) in plan.iter().enumerate() {
        let start = *addr as usize;
        let chunk = &image[start..start + sector_len];
        match action {
            SectorAction::Skip => skipped += 1,
            SectorAction::EraseWrite => {
                manager.erase_sector(*addr)?;
                // Erased sectors already hold 0xFF
                if chunk.iter().any(|&b| b != 0xFF) {
                    manager.write(*addr, chunk)?;
                }
            }
            SectorAction::Write => manager.write(*addr, chunk)?,
        }
        pb.set_position((i as u64 + 1) * sector_size as u64);
    }
    pb.finish_and_clear();

    println!(
        "Restored {} sector(s), skipped {} protected sector(s)",
        plan.len() - skipped,
        skipped
    );

    if verify {
        println!("Verifying restored data...");
        let actual = read_range(manager, 0, image.len(), "Verifying")?;
        let mut expected = image;
        for (addr, action) in &plan {
            if *action == SectorAction::Skip {
                let start = *addr as usize;
                expected[start..start + sector_len]
                    .copy_from_slice(&actual[start..start + sector_len]);
            }
        }
        let report = super::verify::compare(0, &expected, &actual);
        if !report.passed() {
            if let Some((addr, e, a)) = report.first_mismatch {
                println!(
                    "First mismatch at 0x{:08X}: expected 0x{:02X}, got 0x{:02X}",
                    addr, e, a
                );
            }
            return Err("Verification failed".into());
        }
        println!("Verification passed!");
    }
    Ok(())
}

fn plan_restore<B: StorageBackend>(
    manager: &FlashManager<B>,
    sector_size: u32,
    total_size: u64,
) -> Result<Vec<(u32, SectorAction)>, Box<dyn std::error::Error>> {
    let regions = manager.regions()?;
    let plan = (0..total_size)
        .step_by(sector_size as usize)
        .map(|addr| {
            let addr = addr as u32;
            let action = if check_write_allowed(regions, addr, sector_size as usize).is_err() {
                SectorAction::Skip
            } else if check_erase_allowed(regions, addr).is_ok() {
                SectorAction::EraseWrite
            } else {
                SectorAction::Write
            };
            (addr, action)
        })
        .collect();
    Ok(plan)
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::commands::test_support;
    use std::fs;
    use tempfile::TempDir;

    const MIB: usize = 1024 * 1024;

    #[test]
    fn test_write_file_with_verify() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fw.bin");
        let data: Vec<u8> = (0..70_000u32).map(|i| (i % 253) as u8).collect();
        fs::write(&path, &data).unwrap();

        let mut manager = test_support::manager();
        run_write(&mut manager, 0x10000, &path, false, true).unwrap();
        assert_eq!(&manager.backend().data()[0x10000..0x10000 + data.len()], &data[..]);
    }

    #[test]
    fn test_write_needs_erase_on_programmed_flash() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fw.bin");
        fs::write(&path, [0xF0u8; 32]).unwrap();

        let mut manager = test_support::manager();
        manager.write(0x10000, &[0x0F; 32]).unwrap();

        // NOR programming only clears bits, so verify catches the stale data
        assert!(run_write(&mut manager, 0x10000, &path, false, true).is_err());
        run_write(&mut manager, 0x10000, &path, true, true).unwrap();
    }

    #[test]
    fn test_write_into_protected_region_is_atomic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fw.bin");
        fs::write(&path, vec![0u8; 0x20000]).unwrap();

        let mut manager = test_support::manager();
        // Runs from NVRAM into the flash descriptor
        let err = run_write(&mut manager, 0xE0000, &path, false, false).unwrap_err();
        assert!(err.to_string().contains("Flash Descriptor"));
        assert_eq!(manager.backend().counters().writes, 0);
    }

    #[test]
    fn test_restore_skips_protected_regions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("backup.bin");
        fs::write(&path, vec![0x11u8; MIB]).unwrap();

        let mut manager = test_support::manager();
        manager.write(0x20000, &[0x00; 16]).unwrap();
        run_restore(&mut manager, &path, true).unwrap();

        let data = manager.backend().data();
        // Boot block and descriptor untouched
        assert!(data[..0x10000].iter().all(|&b| b == 0xFF));
        assert!(data[0xF0000..].iter().all(|&b| b == 0xFF));
        // Main firmware and NVRAM restored, including previously programmed bytes
        assert!(data[0x10000..0xF0000].iter().all(|&b| b == 0x11));
    }

    #[test]
    fn test_restore_size_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("short.bin");
        fs::write(&path, vec![0u8; 4096]).unwrap();

        let mut manager = test_support::manager();
        assert!(run_restore(&mut manager, &path, false).is_err());
        assert_eq!(manager.backend().counters().erases, 0);
    }

    #[test]
    fn test_restore_plan() {
        let manager = test_support::manager();
        let plan = plan_restore(&manager, 4096, MIB as u64).unwrap();
        assert_eq!(plan.len(), 256);
        assert_eq!(plan[0], (0, SectorAction::Skip));
        assert_eq!(plan[16], (0x10000, SectorAction::EraseWrite));
        assert_eq!(plan[255], (0xFF000, SectorAction::Skip));
    }
}
