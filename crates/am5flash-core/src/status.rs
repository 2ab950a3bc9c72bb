//! Human-readable status dump

use core::fmt;

use crate::device::DeviceDescriptor;
use crate::region::FlashRegion;

/// Descriptor and region table, formatted for display
///
/// Borrowed from an initialized [`FlashManager`](crate::FlashManager) via
/// `status()`.
#[derive(Debug, Clone, Copy)]
pub struct Status<'a> {
    descriptor: &'a DeviceDescriptor,
    regions: &'a [FlashRegion],
}

impl<'a> Status<'a> {
    pub(crate) fn new(descriptor: &'a DeviceDescriptor, regions: &'a [FlashRegion]) -> Self {
        Self {
            descriptor,
            regions,
        }
    }

    /// Device descriptor
    pub fn descriptor(&self) -> &'a DeviceDescriptor {
        self.descriptor
    }

    /// Regions in table order
    pub fn regions(&self) -> &'a [FlashRegion] {
        self.regions
    }
}

impl fmt::Display for Status<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let desc = self.descriptor;
        writeln!(f, "Flash Manager Status:")?;
        writeln!(f, "  Device: {}", desc.device_name)?;
        writeln!(f, "  Device ID: 0x{:08X}", desc.device_id)?;
        writeln!(f, "  Vendor ID: 0x{:04X}", desc.vendor_id)?;
        writeln!(f, "  Total Size: {} KB", desc.total_size / 1024)?;
        writeln!(f, "  Sector Size: {} bytes", desc.sector_size)?;
        writeln!(f, "  Block Count: {}", desc.block_count)?;
        writeln!(
            f,
            "  Write Protected: {}",
            if desc.write_protected { "YES" } else { "NO" }
        )?;
        writeln!(f)?;
        writeln!(f, "Flash Regions ({}):", self.regions.len())?;
        for (i, region) in self.regions.iter().enumerate() {
            write_region(f, i + 1, region)?;
        }
        Ok(())
    }
}

/// One region line: `N. Name: 0xSTART - 0xLAST (K KB) [RO|RW] [E]`
pub fn write_region(f: &mut impl fmt::Write, index: usize, region: &FlashRegion) -> fmt::Result {
    write!(
        f,
        "  {}. {}: 0x{:08X} - 0x{:08X} ({} KB) {}",
        index,
        region.name,
        region.start_address,
        region.last_address(),
        region.size / 1024,
        if region.write_protected { "[RO]" } else { "[RW]" },
    )?;
    if region.erase_required {
        write!(f, " [E]")?;
    }
    writeln!(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceIdentity;
    use crate::region::build_regions;
    use std::string::String;
    use core::fmt::Write;

    #[test]
    fn test_status_format() {
        let desc = DeviceDescriptor::from_geometry(&DeviceIdentity::default(), 4096, 256).unwrap();
        let table = build_regions(&desc).unwrap();

        let mut out = String::new();
        write!(out, "{}", Status::new(&desc, table.as_slice())).unwrap();

        assert!(out.starts_with("Flash Manager Status:\n"));
        assert!(out.contains("  Device: Generic SPI Flash\n"));
        assert!(out.contains("  Total Size: 1024 KB\n"));
        assert!(out.contains("  Write Protected: NO\n"));
        assert!(out.contains("Flash Regions (4):\n"));
        assert!(out.contains("  1. Boot Block: 0x00000000 - 0x0000FFFF (64 KB) [RO] [E]\n"));
        assert!(out.contains("  2. Main Firmware: 0x00010000 - 0x000CFFFF (768 KB) [RW] [E]\n"));
        assert!(out.contains("  3. NVRAM: 0x000D0000 - 0x000EFFFF (128 KB) [RW] [E]\n"));
        assert!(out.contains("  4. Flash Descriptor: 0x000F0000 - 0x000FFFFF (64 KB) [RO]\n"));
    }
}
