//! Flash device descriptor and detection

use log::{debug, info, warn};

use crate::backend::StorageBackend;
use crate::config::ManagerConfig;

/// Maximum length of a device display name in bytes
pub const MAX_DEVICE_NAME_LEN: usize = 128;

/// Device display name
pub type DeviceName = heapless::String<MAX_DEVICE_NAME_LEN>;

/// Default device name when the backend cannot identify the part
pub const DEFAULT_DEVICE_NAME: &str = "Generic SPI Flash";
/// Placeholder device ID
pub const DEFAULT_DEVICE_ID: u32 = 0x1234_5678;
/// Placeholder vendor ID
pub const DEFAULT_VENDOR_ID: u16 = 0xABCD;
/// Default flash size (16 MiB)
pub const DEFAULT_TOTAL_SIZE: u64 = 16 * 1024 * 1024;
/// Default sector size (4 KiB)
pub const DEFAULT_SECTOR_SIZE: u32 = 4096;

/// Largest device the 32-bit linear address space can cover
pub const MAX_ADDRESSABLE_SIZE: u64 = 1 << 32;

/// Build a device name, truncating at a character boundary if needed
pub fn device_name(name: &str) -> DeviceName {
    let mut out = DeviceName::new();
    for c in name.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// Part identification reported by a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Display name
    pub name: DeviceName,
    /// Device ID
    pub device_id: u32,
    /// Vendor ID
    pub vendor_id: u16,
}

impl DeviceIdentity {
    /// Create a new identity
    pub fn new(name: &str, device_id: u32, vendor_id: u16) -> Self {
        Self {
            name: device_name(name),
            device_id,
            vendor_id,
        }
    }
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self::new(DEFAULT_DEVICE_NAME, DEFAULT_DEVICE_ID, DEFAULT_VENDOR_ID)
    }
}

/// Physical flash geometry and identification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Display name
    pub device_name: DeviceName,
    /// Device ID (placeholder if the backend could not identify the part)
    pub device_id: u32,
    /// Vendor ID (placeholder if the backend could not identify the part)
    pub vendor_id: u16,
    /// Total addressable bytes
    pub total_size: u64,
    /// Erase/write granularity in bytes (power of two)
    pub sector_size: u32,
    /// `total_size / sector_size`
    pub block_count: u32,
    /// Device-global write protect flag
    pub write_protected: bool,
}

impl DeviceDescriptor {
    /// Create a descriptor from sector geometry
    ///
    /// Returns `None` unless `sector_size` is a non-zero power of two,
    /// `block_count` is non-zero, and the device fits the 32-bit address
    /// space.
    pub fn from_geometry(identity: &DeviceIdentity, sector_size: u32, block_count: u32) -> Option<Self> {
        let total_size = checked_total_size(sector_size, block_count)?;
        Some(Self {
            device_name: identity.name.clone(),
            device_id: identity.device_id,
            vendor_id: identity.vendor_id,
            total_size,
            sector_size,
            block_count,
            write_protected: false,
        })
    }

    /// Whether `[addr, addr + len)` lies inside the device
    pub fn contains_range(&self, addr: u32, len: usize) -> bool {
        // len is usize, so the u64 sum can still overflow on 64-bit hosts
        match (addr as u64).checked_add(len as u64) {
            Some(end) => end <= self.total_size,
            None => false,
        }
    }

    /// Whether `addr` lies inside the device
    pub fn contains_address(&self, addr: u32) -> bool {
        (addr as u64) < self.total_size
    }

    /// Translate a linear address to `(sector_index, sector_offset)`
    pub fn sector_of(&self, addr: u32) -> (u64, usize) {
        let sector_size = self.sector_size as u64;
        let addr = addr as u64;
        (addr / sector_size, (addr % sector_size) as usize)
    }

    fn apply_identity(&mut self, identity: &DeviceIdentity) {
        self.device_name = identity.name.clone();
        self.device_id = identity.device_id;
        self.vendor_id = identity.vendor_id;
    }

    fn apply_geometry(&mut self, sector_size: u32, block_count: u32) -> bool {
        match checked_total_size(sector_size, block_count) {
            Some(total_size) => {
                self.sector_size = sector_size;
                self.block_count = block_count;
                self.total_size = total_size;
                true
            }
            None => false,
        }
    }
}

fn checked_total_size(sector_size: u32, block_count: u32) -> Option<u64> {
    if sector_size == 0 || !sector_size.is_power_of_two() || block_count == 0 {
        return None;
    }
    let total_size = sector_size as u64 * block_count as u64;
    if total_size > MAX_ADDRESSABLE_SIZE {
        return None;
    }
    Some(total_size)
}

/// Build the device descriptor for a backend
///
/// Starts from the configured fallback and refines it with whatever the
/// backend is able to report. Every query is optional; a backend that
/// answers nothing yields the fallback descriptor. This never fails.
pub fn detect_device<B: StorageBackend + ?Sized>(backend: &B, config: &ManagerConfig) -> DeviceDescriptor {
    let mut desc = config.fallback_descriptor();

    match backend.identity() {
        Some(identity) => desc.apply_identity(&identity),
        None => debug!("Backend did not identify the flash part, using placeholder IDs"),
    }

    match backend.get_attributes() {
        Some(attrs) => {
            debug!("Flash attributes: {:?}", attrs);
            desc.write_protected = attrs.is_write_protected();
        }
        None => warn!("Flash attributes unavailable, assuming not write protected"),
    }

    match backend.get_geometry() {
        Some((sector_size, block_count)) => {
            if !desc.apply_geometry(sector_size, block_count) {
                warn!(
                    "Ignoring invalid flash geometry ({} sectors of {} bytes), using defaults",
                    block_count, sector_size
                );
            }
        }
        None => warn!(
            "Flash geometry unavailable, using default {} KB with {} byte sectors",
            desc.total_size / 1024,
            desc.sector_size
        ),
    }

    info!("Flash Device Information:");
    info!("  Name: {}", desc.device_name);
    info!("  Device ID: 0x{:08X}", desc.device_id);
    info!("  Vendor ID: 0x{:04X}", desc.vendor_id);
    info!("  Total Size: {} KB", desc.total_size / 1024);
    info!("  Sector Size: {} bytes", desc.sector_size);
    info!("  Block Count: {}", desc.block_count);
    info!(
        "  Write Protected: {}",
        if desc.write_protected { "YES" } else { "NO" }
    );

    desc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendAttributes;
    use crate::testing::MemBackend;

    #[test]
    fn test_defaults_when_backend_reports_nothing() {
        let backend = MemBackend::silent(DEFAULT_TOTAL_SIZE as usize);
        let desc = detect_device(&backend, &ManagerConfig::default());

        assert_eq!(desc.device_name.as_str(), DEFAULT_DEVICE_NAME);
        assert_eq!(desc.device_id, DEFAULT_DEVICE_ID);
        assert_eq!(desc.vendor_id, DEFAULT_VENDOR_ID);
        assert_eq!(desc.total_size, 16 * 1024 * 1024);
        assert_eq!(desc.sector_size, 4096);
        assert_eq!(desc.block_count, 4096);
        assert!(!desc.write_protected);
    }

    #[test]
    fn test_geometry_from_backend() {
        let backend = MemBackend::new(1024 * 1024, 4096);
        let desc = detect_device(&backend, &ManagerConfig::default());

        assert_eq!(desc.total_size, 1024 * 1024);
        assert_eq!(desc.sector_size, 4096);
        assert_eq!(desc.block_count, 256);
    }

    #[test]
    fn test_invalid_geometry_falls_back() {
        let mut backend = MemBackend::new(1024 * 1024, 4096);
        backend.geometry = Some((3000, 10));
        let desc = detect_device(&backend, &ManagerConfig::default());
        assert_eq!(desc.total_size, DEFAULT_TOTAL_SIZE);
        assert_eq!(desc.sector_size, DEFAULT_SECTOR_SIZE);

        backend.geometry = Some((4096, 0));
        let desc = detect_device(&backend, &ManagerConfig::default());
        assert_eq!(desc.total_size, DEFAULT_TOTAL_SIZE);
    }

    #[test]
    fn test_unaddressable_geometry_falls_back() {
        let mut backend = MemBackend::new(1024 * 1024, 4096);
        backend.geometry = Some((65536, 65537));
        let desc = detect_device(&backend, &ManagerConfig::default());
        assert_eq!(desc.total_size, DEFAULT_TOTAL_SIZE);
    }

    #[test]
    fn test_write_protect_from_attributes() {
        let mut backend = MemBackend::new(1024 * 1024, 4096);
        backend.attributes = Some(BackendAttributes::READ_STATUS);
        let desc = detect_device(&backend, &ManagerConfig::default());
        assert!(desc.write_protected);
    }

    #[test]
    fn test_identity_from_backend() {
        let mut backend = MemBackend::new(1024 * 1024, 4096);
        backend.identity = Some(DeviceIdentity::new("W25Q128JV", 0x00EF_4018, 0x00EF));
        let desc = detect_device(&backend, &ManagerConfig::default());
        assert_eq!(desc.device_name.as_str(), "W25Q128JV");
        assert_eq!(desc.device_id, 0x00EF_4018);
        assert_eq!(desc.vendor_id, 0x00EF);
    }

    #[test]
    fn test_address_translation() {
        let desc = DeviceDescriptor::from_geometry(&DeviceIdentity::default(), 4096, 256).unwrap();
        assert_eq!(desc.sector_of(0), (0, 0));
        assert_eq!(desc.sector_of(0x1001), (1, 1));
        assert_eq!(desc.sector_of(0x0001_0000), (16, 0));
        assert_eq!(desc.sector_of(0x000F_FFFF), (255, 4095));
    }

    #[test]
    fn test_contains_range_at_boundary() {
        let desc = DeviceDescriptor::from_geometry(&DeviceIdentity::default(), 4096, 256).unwrap();
        let total = desc.total_size as u32;
        assert!(desc.contains_range(total - 1, 1));
        assert!(!desc.contains_range(total - 1, 2));
        assert!(!desc.contains_range(total, 1));
        assert!(!desc.contains_range(u32::MAX, usize::MAX));
    }

    #[test]
    fn test_device_name_truncates() {
        let long = [b'x'; 200];
        let long = core::str::from_utf8(&long).unwrap();
        assert_eq!(device_name(long).len(), MAX_DEVICE_NAME_LEN);
    }
}
