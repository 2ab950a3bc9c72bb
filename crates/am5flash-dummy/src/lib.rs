//! am5flash-dummy - In-memory flash emulator for testing
//!
//! This crate provides a storage backend that emulates a NOR flash part in
//! memory. Erased bytes read as `0xFF` and programming can only clear bits,
//! so a write without a preceding erase behaves like it would on hardware.
//! It's useful for testing and development without real hardware.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
use alloc::vec;
#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use am5flash_core::backend::{BackendAttributes, BackendError, StorageBackend};
use am5flash_core::device::DeviceIdentity;

/// Configuration for the dummy flash
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Part identification reported to the manager
    pub identity: DeviceIdentity,
    /// Flash size in bytes
    pub size: usize,
    /// Sector size (power of two)
    pub sector_size: usize,
    /// Report the device as write protected
    pub write_protected: bool,
    /// Answer geometry queries
    pub report_geometry: bool,
    /// Answer attribute queries
    pub report_attributes: bool,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            identity: DeviceIdentity::new("Emulated SPI Flash", 0x00EF_4018, 0x00EF),
            size: 16 * 1024 * 1024,
            sector_size: 4096,
            write_protected: false,
            report_geometry: true,
            report_attributes: true,
        }
    }
}

/// Operations performed on a dummy flash
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpCounters {
    /// Successful `read` calls
    pub reads: usize,
    /// Successful `write` calls
    pub writes: usize,
    /// Successful `erase` calls
    pub erases: usize,
    /// `release` calls
    pub releases: usize,
}

/// Dummy flash backend
///
/// Emulates a flash part in memory for testing purposes.
#[cfg(feature = "alloc")]
pub struct DummyFlash {
    config: DummyConfig,
    data: Vec<u8>,
    counters: OpCounters,
    fail_sector: Option<u64>,
}

#[cfg(feature = "alloc")]
impl DummyFlash {
    /// Create a new dummy flash with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let data = vec![0xFF; config.size];
        Self {
            config,
            data,
            counters: OpCounters::default(),
            fail_sector: None,
        }
    }

    /// Create a new dummy flash with default configuration (16 MiB)
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create a dummy flash with pre-filled data
    pub fn with_data(config: DummyConfig, initial_data: &[u8]) -> Self {
        let mut flash = Self::new(config);
        let len = core::cmp::min(initial_data.len(), flash.data.len());
        flash.data[..len].copy_from_slice(&initial_data[..len]);
        flash
    }

    /// Get a reference to the flash data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the flash data
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Operation counters
    pub fn counters(&self) -> OpCounters {
        self.counters
    }

    /// Make every transfer touching `sector` fail
    pub fn fail_on_sector(&mut self, sector: Option<u64>) {
        self.fail_sector = sector;
    }

    /// Set the write-protect state reported through the attributes
    pub fn set_write_protected(&mut self, write_protected: bool) {
        self.config.write_protected = write_protected;
    }

    fn byte_range(&self, sector: u64, offset: usize, len: usize) -> Result<core::ops::Range<usize>, BackendError> {
        let out_of_range = BackendError::OutOfRange {
            sector,
            offset,
            len,
        };
        if offset.checked_add(len).map_or(true, |end| end > self.config.sector_size) {
            return Err(out_of_range);
        }
        let start = usize::try_from(sector)
            .ok()
            .and_then(|s| s.checked_mul(self.config.sector_size))
            .and_then(|s| s.checked_add(offset))
            .ok_or(out_of_range)?;
        if start + len > self.data.len() {
            return Err(out_of_range);
        }
        Ok(start..start + len)
    }

    fn injected_failure(&self, sector: u64) -> bool {
        self.fail_sector == Some(sector)
    }
}

#[cfg(feature = "alloc")]
impl StorageBackend for DummyFlash {
    fn get_attributes(&self) -> Option<BackendAttributes> {
        if !self.config.report_attributes {
            return None;
        }
        let mut attrs = BackendAttributes::READ_WRITE;
        if self.config.write_protected {
            attrs.remove(BackendAttributes::WRITE_STATUS);
        }
        Some(attrs)
    }

    fn get_geometry(&self) -> Option<(u32, u32)> {
        if !self.config.report_geometry {
            return None;
        }
        let sector_size = u32::try_from(self.config.sector_size).ok()?;
        let block_count = u32::try_from(self.data.len() / self.config.sector_size).ok()?;
        Some((sector_size, block_count))
    }

    fn identity(&self) -> Option<DeviceIdentity> {
        Some(self.config.identity.clone())
    }

    fn read(&mut self, sector: u64, offset: usize, buf: &mut [u8]) -> Result<(), BackendError> {
        if self.injected_failure(sector) {
            return Err(BackendError::ReadFailed { sector });
        }
        let range = self.byte_range(sector, offset, buf.len())?;
        buf.copy_from_slice(&self.data[range]);
        self.counters.reads += 1;
        Ok(())
    }

    fn write(&mut self, sector: u64, offset: usize, data: &[u8]) -> Result<(), BackendError> {
        if self.config.write_protected {
            return Err(BackendError::WriteProtected);
        }
        if self.injected_failure(sector) {
            return Err(BackendError::WriteFailed { sector });
        }
        let range = self.byte_range(sector, offset, data.len())?;

        // Flash programming: can only change 1 -> 0
        for (dst, &src) in self.data[range].iter_mut().zip(data) {
            *dst &= src;
        }

        self.counters.writes += 1;
        Ok(())
    }

    fn erase(&mut self, sector: u64) -> Result<(), BackendError> {
        if self.config.write_protected {
            return Err(BackendError::WriteProtected);
        }
        if self.injected_failure(sector) {
            return Err(BackendError::EraseFailed { sector });
        }
        let range = self.byte_range(sector, 0, self.config.sector_size)?;

        // Erase sets all bytes to 0xFF
        self.data[range].fill(0xFF);

        self.counters.erases += 1;
        log::trace!("dummy: erased sector {}", sector);
        Ok(())
    }

    fn release(&mut self) {
        self.counters.releases += 1;
    }
}
