//! Region types and default layout construction

use core::fmt;

use log::{debug, info};

use crate::device::{DeviceDescriptor, MAX_ADDRESSABLE_SIZE};
use crate::error::{Error, InvalidReason, Operation, Result};

/// Maximum number of regions in a table
pub const MAX_FLASH_REGIONS: usize = 16;

/// Maximum length of a region name in bytes
pub const MAX_REGION_NAME_LEN: usize = 64;

/// Region display name
pub type RegionName = heapless::String<MAX_REGION_NAME_LEN>;

const KIB: u32 = 1024;

/// Size of the boot block at the bottom of flash
pub const BOOT_BLOCK_SIZE: u32 = 64 * KIB;
/// Bytes reserved outside Main Firmware (boot block, NVRAM, descriptor)
pub const MAIN_FIRMWARE_RESERVED: u32 = 256 * KIB;
/// Distance of the NVRAM start from the top of flash
pub const NVRAM_OFFSET_FROM_END: u32 = 192 * KIB;
/// Size of the NVRAM region
pub const NVRAM_SIZE: u32 = 128 * KIB;
/// Size of the flash descriptor at the top of flash
pub const DESCRIPTOR_SIZE: u32 = 64 * KIB;
/// Smallest device the default layout fits in
pub const MIN_DEVICE_SIZE: u64 = (MAIN_FIRMWARE_RESERVED + BOOT_BLOCK_SIZE) as u64;

/// Name of the boot block region
pub const BOOT_BLOCK_NAME: &str = "Boot Block";
/// Name of the main firmware region
pub const MAIN_FIRMWARE_NAME: &str = "Main Firmware";
/// Name of the NVRAM region
pub const NVRAM_NAME: &str = "NVRAM";
/// Name of the flash descriptor region
pub const DESCRIPTOR_NAME: &str = "Flash Descriptor";

/// Build a region name, truncating at a character boundary if needed
pub fn region_name(name: &str) -> RegionName {
    let mut out = RegionName::new();
    for c in name.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// Kind of flash region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "std",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum RegionType {
    /// Reset vector and early boot code
    BootBlock,
    /// Main UEFI firmware volume
    MainFirmware,
    /// Variable store
    Nvram,
    /// Flash descriptor
    Descriptor,
    /// Caller-defined region
    #[default]
    Custom,
}

impl fmt::Display for RegionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionType::BootBlock => write!(f, "boot-block"),
            RegionType::MainFirmware => write!(f, "main-firmware"),
            RegionType::Nvram => write!(f, "nvram"),
            RegionType::Descriptor => write!(f, "descriptor"),
            RegionType::Custom => write!(f, "custom"),
        }
    }
}

/// A named region within the flash address space
///
/// The range is half-open: `[start_address, start_address + size)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashRegion {
    /// Kind of region
    pub region_type: RegionType,
    /// Display name
    pub name: RegionName,
    /// Start address (inclusive)
    pub start_address: u32,
    /// Size in bytes
    pub size: u32,
    /// Forbids writes that intersect this region; erase is governed by `erase_required`
    pub write_protected: bool,
    /// Whether erase is a legal operation within this region
    pub erase_required: bool,
}

impl FlashRegion {
    /// Create a writable, erasable region
    pub fn new(region_type: RegionType, name: &str, start_address: u32, size: u32) -> Self {
        Self {
            region_type,
            name: region_name(name),
            start_address,
            size,
            write_protected: false,
            erase_required: true,
        }
    }

    /// Set the write-protect flag
    pub fn protected(mut self, write_protected: bool) -> Self {
        self.write_protected = write_protected;
        self
    }

    /// Set whether erase is permitted
    pub fn erasable(mut self, erase_required: bool) -> Self {
        self.erase_required = erase_required;
        self
    }

    /// End address (exclusive), widened so it cannot wrap
    pub fn end(&self) -> u64 {
        self.start_address as u64 + self.size as u64
    }

    /// Last address covered (inclusive), for display
    pub fn last_address(&self) -> u64 {
        self.end().saturating_sub(1)
    }

    /// Check if an address is within this region
    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.start_address && (addr as u64) < self.end()
    }

    /// Check if `[addr, addr + len)` shares at least one byte with this region
    pub fn intersects(&self, addr: u32, len: usize) -> bool {
        let start = addr as u64;
        let end = start.saturating_add(len as u64);
        start < self.end() && end > self.start_address as u64
    }

    /// Check if this region overlaps with another
    pub fn overlaps(&self, other: &FlashRegion) -> bool {
        self.intersects(other.start_address, other.size as usize)
    }
}

/// Ordered, fixed-capacity collection of regions
#[derive(Debug, Clone, Default)]
pub struct RegionTable {
    regions: heapless::Vec<FlashRegion, MAX_FLASH_REGIONS>,
}

impl RegionTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            regions: heapless::Vec::new(),
        }
    }

    /// Append a region
    pub fn push(&mut self, region: FlashRegion) -> Result<()> {
        self.regions
            .push(region)
            .map_err(|_| Error::CapacityExceeded {
                capacity: MAX_FLASH_REGIONS,
            })
    }

    /// Regions in table order
    pub fn as_slice(&self) -> &[FlashRegion] {
        &self.regions
    }

    /// Iterate over regions in table order
    pub fn iter(&self) -> core::slice::Iter<'_, FlashRegion> {
        self.regions.iter()
    }

    /// Number of regions
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Find a region by name (case-insensitive)
    pub fn find(&self, name: &str) -> Option<&FlashRegion> {
        self.regions
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
    }

    /// First region in table order containing `addr`
    pub fn region_at(&self, addr: u32) -> Option<&FlashRegion> {
        self.regions.iter().find(|r| r.contains(addr))
    }

    /// Remove every region
    pub fn clear(&mut self) {
        self.regions.clear();
    }
}

impl<'a> IntoIterator for &'a RegionTable {
    type Item = &'a FlashRegion;
    type IntoIter = core::slice::Iter<'a, FlashRegion>;

    fn into_iter(self) -> Self::IntoIter {
        self.regions.iter()
    }
}

/// Build the default region table for a device
pub fn build_regions(descriptor: &DeviceDescriptor) -> Result<RegionTable> {
    build_regions_with(descriptor, &[])
}

/// Build the default region table and append overlay regions
///
/// The four default regions come first, in the order Boot Block, Main
/// Firmware, NVRAM, Flash Descriptor. Overlays follow in the order given.
pub fn build_regions_with(descriptor: &DeviceDescriptor, overlays: &[FlashRegion]) -> Result<RegionTable> {
    let total_size = descriptor.total_size;
    if total_size > MAX_ADDRESSABLE_SIZE {
        return Err(Error::InvalidParameter {
            op: Operation::BuildRegions,
            reason: InvalidReason::Unaddressable { total_size },
        });
    }
    if total_size < MIN_DEVICE_SIZE {
        return Err(Error::InvalidParameter {
            op: Operation::BuildRegions,
            reason: InvalidReason::DeviceTooSmall {
                total_size,
                min_size: MIN_DEVICE_SIZE,
            },
        });
    }

    // total_size is in [MIN_DEVICE_SIZE, 4 GiB], so every offset below fits
    // in a u32 without wrapping.
    let main_size = (total_size - MAIN_FIRMWARE_RESERVED as u64) as u32;
    let nvram_start = (total_size - NVRAM_OFFSET_FROM_END as u64) as u32;
    let descriptor_start = (total_size - DESCRIPTOR_SIZE as u64) as u32;

    let mut table = RegionTable::new();
    table.push(
        FlashRegion::new(RegionType::BootBlock, BOOT_BLOCK_NAME, 0, BOOT_BLOCK_SIZE)
            .protected(true)
            .erasable(true),
    )?;
    table.push(
        FlashRegion::new(
            RegionType::MainFirmware,
            MAIN_FIRMWARE_NAME,
            BOOT_BLOCK_SIZE,
            main_size,
        )
        .protected(false)
        .erasable(true),
    )?;
    table.push(
        FlashRegion::new(RegionType::Nvram, NVRAM_NAME, nvram_start, NVRAM_SIZE)
            .protected(false)
            .erasable(true),
    )?;
    table.push(
        FlashRegion::new(
            RegionType::Descriptor,
            DESCRIPTOR_NAME,
            descriptor_start,
            DESCRIPTOR_SIZE,
        )
        .protected(true)
        .erasable(false),
    )?;

    for overlay in overlays {
        if overlay.size == 0 {
            return Err(Error::InvalidParameter {
                op: Operation::BuildRegions,
                reason: InvalidReason::EmptyRegion,
            });
        }
        if overlay.end() > total_size {
            return Err(Error::InvalidParameter {
                op: Operation::BuildRegions,
                reason: InvalidReason::RegionOutOfBounds {
                    start: overlay.start_address,
                    size: overlay.size,
                    total_size,
                },
            });
        }
        debug!(
            "Adding overlay region '{}' at 0x{:08X} ({} bytes)",
            overlay.name, overlay.start_address, overlay.size
        );
        table.push(overlay.clone())?;
    }

    info!("Initialized {} flash regions", table.len());
    Ok(table)
}
