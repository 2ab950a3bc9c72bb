//! Manager configuration
//!
//! Holds the fallback geometry used when the backend cannot report its
//! own, the placeholder identity, and any overlay regions appended after
//! the default layout.

use crate::device::{DeviceDescriptor, DeviceIdentity, DEFAULT_SECTOR_SIZE, DEFAULT_TOTAL_SIZE, MAX_ADDRESSABLE_SIZE};
use crate::error::{Error, InvalidReason, Operation, Result};
use crate::region::{FlashRegion, MAX_FLASH_REGIONS};

/// Flash manager configuration
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    fallback_total_size: u64,
    fallback_sector_size: u32,
    fallback_identity: DeviceIdentity,
    overlays: heapless::Vec<FlashRegion, MAX_FLASH_REGIONS>,
}

impl ManagerConfig {
    /// Create the default configuration (16 MiB, 4 KiB sectors, no overlays)
    pub fn new() -> Self {
        Self {
            fallback_total_size: DEFAULT_TOTAL_SIZE,
            fallback_sector_size: DEFAULT_SECTOR_SIZE,
            fallback_identity: DeviceIdentity::default(),
            overlays: heapless::Vec::new(),
        }
    }

    /// Set the geometry assumed when the backend does not report one
    ///
    /// `sector_size` must be a power of two that divides `total_size`
    /// exactly, and the size must fit the 32-bit address space.
    pub fn with_fallback_geometry(mut self, total_size: u64, sector_size: u32) -> Result<Self> {
        let invalid = Error::InvalidParameter {
            op: Operation::Configure,
            reason: InvalidReason::InvalidGeometry {
                total_size,
                sector_size,
            },
        };
        if sector_size == 0 || !sector_size.is_power_of_two() || total_size == 0 {
            return Err(invalid);
        }
        if total_size % sector_size as u64 != 0 {
            return Err(invalid);
        }
        if total_size > MAX_ADDRESSABLE_SIZE {
            return Err(Error::InvalidParameter {
                op: Operation::Configure,
                reason: InvalidReason::Unaddressable { total_size },
            });
        }
        self.fallback_total_size = total_size;
        self.fallback_sector_size = sector_size;
        Ok(self)
    }

    /// Set the identity assumed when the backend cannot identify the part
    pub fn with_fallback_identity(mut self, identity: DeviceIdentity) -> Self {
        self.fallback_identity = identity;
        self
    }

    /// Append an overlay region
    ///
    /// Overlays are validated against the device when the region table is
    /// built, since the device size is not known until then.
    pub fn add_overlay(&mut self, region: FlashRegion) -> Result<()> {
        self.overlays
            .push(region)
            .map_err(|_| Error::CapacityExceeded {
                capacity: MAX_FLASH_REGIONS,
            })
    }

    /// Overlay regions, in the order they will be appended
    pub fn overlays(&self) -> &[FlashRegion] {
        &self.overlays
    }

    /// Fallback device size in bytes
    pub fn fallback_total_size(&self) -> u64 {
        self.fallback_total_size
    }

    /// Fallback sector size in bytes
    pub fn fallback_sector_size(&self) -> u32 {
        self.fallback_sector_size
    }

    pub(crate) fn fallback_descriptor(&self) -> DeviceDescriptor {
        let block_count = (self.fallback_total_size / self.fallback_sector_size as u64) as u32;
        DeviceDescriptor {
            device_name: self.fallback_identity.name.clone(),
            device_id: self.fallback_identity.device_id,
            vendor_id: self.fallback_identity.vendor_id,
            total_size: self.fallback_total_size,
            sector_size: self.fallback_sector_size,
            block_count,
            write_protected: false,
        }
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::new()
    }
}
