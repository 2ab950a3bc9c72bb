//! Region policy evaluation
//!
//! Pure functions over a region slice. Writes examine every region that
//! intersects the requested range, so an overlay can protect part of a
//! larger writable region. Erase looks only at the first region containing
//! the address and therefore assumes regions do not overlap.

use crate::region::{FlashRegion, RegionName};

/// Why a region rule blocked an otherwise in-bounds operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyViolation {
    /// The range touches a write-protected region
    WriteProtected {
        /// Name of the first protected region in table order
        region: RegionName,
    },
    /// The address is not covered by any region
    NotFound {
        /// Requested address
        addr: u32,
    },
    /// The containing region does not permit erase
    Unsupported {
        /// Name of the containing region
        region: RegionName,
    },
}

/// Check that `[addr, addr + size)` does not touch a protected region
pub fn check_write_allowed(regions: &[FlashRegion], addr: u32, size: usize) -> Result<(), PolicyViolation> {
    match regions
        .iter()
        .find(|r| r.write_protected && r.intersects(addr, size))
    {
        Some(region) => Err(PolicyViolation::WriteProtected {
            region: region.name.clone(),
        }),
        None => Ok(()),
    }
}

/// Check that the sector at `addr` may be erased
pub fn check_erase_allowed(regions: &[FlashRegion], addr: u32) -> Result<(), PolicyViolation> {
    let region = regions
        .iter()
        .find(|r| r.contains(addr))
        .ok_or(PolicyViolation::NotFound { addr })?;

    if !region.erase_required {
        return Err(PolicyViolation::Unsupported {
            region: region.name.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::RegionType;

    fn regions() -> [FlashRegion; 4] {
        [
            FlashRegion::new(RegionType::BootBlock, "Boot Block", 0, 0x10000).protected(true),
            FlashRegion::new(RegionType::MainFirmware, "Main Firmware", 0x10000, 0xC0000),
            FlashRegion::new(RegionType::Nvram, "NVRAM", 0xD0000, 0x20000),
            FlashRegion::new(RegionType::Descriptor, "Flash Descriptor", 0xF0000, 0x10000)
                .protected(true)
                .erasable(false),
        ]
    }

    #[test]
    fn test_write_into_protected_region() {
        let regions = regions();
        assert_eq!(
            check_write_allowed(&regions, 0, 512),
            Err(PolicyViolation::WriteProtected {
                region: crate::region::region_name("Boot Block")
            })
        );
        assert!(check_write_allowed(&regions, 0xF0000, 1).is_err());
    }

    #[test]
    fn test_write_into_writable_region() {
        let regions = regions();
        assert_eq!(check_write_allowed(&regions, 0x10000, 0x1000), Ok(()));
        assert_eq!(check_write_allowed(&regions, 0xD0000, 0x20000), Ok(()));
    }

    #[test]
    fn test_write_straddling_boundary() {
        let regions = regions();
        // Last byte of the boot block plus first byte of main firmware
        assert!(matches!(
            check_write_allowed(&regions, 0xFFFF, 2),
            Err(PolicyViolation::WriteProtected { ref region }) if region == "Boot Block"
        ));
        // Last byte of NVRAM into the descriptor
        assert!(matches!(
            check_write_allowed(&regions, 0xEFFFF, 2),
            Err(PolicyViolation::WriteProtected { ref region }) if region == "Flash Descriptor"
        ));
    }

    #[test]
    fn test_write_with_huge_size_does_not_overflow() {
        let regions = regions();
        // Starts in main firmware and runs over everything after it
        assert!(matches!(
            check_write_allowed(&regions, 0x20000, usize::MAX),
            Err(PolicyViolation::WriteProtected { ref region }) if region == "Flash Descriptor"
        ));
        assert!(check_write_allowed(&regions[1..3], 0x20000, usize::MAX).is_ok());
    }

    #[test]
    fn test_write_outside_all_regions() {
        assert_eq!(check_write_allowed(&[], 0x1234, 16), Ok(()));
    }

    #[test]
    fn test_erase_rules() {
        let regions = regions();
        assert_eq!(check_erase_allowed(&regions, 0x0), Ok(()));
        assert_eq!(check_erase_allowed(&regions, 0x10000), Ok(()));
        assert_eq!(check_erase_allowed(&regions, 0xD0000), Ok(()));
        assert!(matches!(
            check_erase_allowed(&regions, 0xF0000),
            Err(PolicyViolation::Unsupported { ref region }) if region == "Flash Descriptor"
        ));
    }

    #[test]
    fn test_erase_unmapped() {
        let regions = regions();
        assert_eq!(
            check_erase_allowed(&regions, 0x10_0000),
            Err(PolicyViolation::NotFound { addr: 0x10_0000 })
        );
    }

    #[test]
    fn test_overlay_asymmetry() {
        let mut table: heapless::Vec<FlashRegion, 8> = regions().into_iter().collect();
        table
            .push(
                FlashRegion::new(RegionType::Custom, "Capsule", 0x20000, 0x1000)
                    .protected(true)
                    .erasable(false),
            )
            .unwrap();

        // Writes see the overlay
        assert!(matches!(
            check_write_allowed(&table, 0x20000, 16),
            Err(PolicyViolation::WriteProtected { ref region }) if region == "Capsule"
        ));
        // Erase stops at Main Firmware, which comes first
        assert_eq!(check_erase_allowed(&table, 0x20000), Ok(()));
    }
}
