//! In-memory backend for unit tests

use std::vec;
use std::vec::Vec;

use crate::backend::{BackendAttributes, BackendError, StorageBackend};
use crate::device::DeviceIdentity;

/// Flat memory with sector addressing and call counters
pub struct MemBackend {
    pub data: Vec<u8>,
    pub sector_size: usize,
    pub geometry: Option<(u32, u32)>,
    pub attributes: Option<BackendAttributes>,
    pub identity: Option<DeviceIdentity>,
    pub reads: usize,
    pub writes: usize,
    pub erases: usize,
    pub releases: usize,
    pub fail_reads: bool,
    pub fail_writes: bool,
    pub fail_erases: bool,
    /// Largest single transfer seen, to check sector splitting
    pub max_transfer: usize,
}

impl MemBackend {
    /// Erased memory that reports its geometry and a writable state
    pub fn new(size: usize, sector_size: u32) -> Self {
        Self {
            data: vec![0xFF; size],
            sector_size: sector_size as usize,
            geometry: Some((sector_size, (size / sector_size as usize) as u32)),
            attributes: Some(BackendAttributes::READ_WRITE),
            identity: None,
            reads: 0,
            writes: 0,
            erases: 0,
            releases: 0,
            fail_reads: false,
            fail_writes: false,
            fail_erases: false,
            max_transfer: 0,
        }
    }

    /// Memory that answers no capability queries
    pub fn silent(size: usize) -> Self {
        let mut backend = Self::new(size, 4096);
        backend.geometry = None;
        backend.attributes = None;
        backend
    }

    fn range(&self, sector: u64, offset: usize, len: usize) -> Result<core::ops::Range<usize>, BackendError> {
        let out_of_range = BackendError::OutOfRange {
            sector,
            offset,
            len,
        };
        if offset + len > self.sector_size {
            return Err(out_of_range);
        }
        let start = sector as usize * self.sector_size + offset;
        if start + len > self.data.len() {
            return Err(out_of_range);
        }
        Ok(start..start + len)
    }
}

impl StorageBackend for MemBackend {
    fn get_attributes(&self) -> Option<BackendAttributes> {
        self.attributes
    }

    fn get_geometry(&self) -> Option<(u32, u32)> {
        self.geometry
    }

    fn identity(&self) -> Option<DeviceIdentity> {
        self.identity.clone()
    }

    fn read(&mut self, sector: u64, offset: usize, buf: &mut [u8]) -> Result<(), BackendError> {
        if self.fail_reads {
            return Err(BackendError::ReadFailed { sector });
        }
        let range = self.range(sector, offset, buf.len())?;
        buf.copy_from_slice(&self.data[range]);
        self.reads += 1;
        self.max_transfer = self.max_transfer.max(buf.len());
        Ok(())
    }

    fn write(&mut self, sector: u64, offset: usize, data: &[u8]) -> Result<(), BackendError> {
        if self.fail_writes {
            return Err(BackendError::WriteFailed { sector });
        }
        let range = self.range(sector, offset, data.len())?;
        self.data[range].copy_from_slice(data);
        self.writes += 1;
        self.max_transfer = self.max_transfer.max(data.len());
        Ok(())
    }

    fn erase(&mut self, sector: u64) -> Result<(), BackendError> {
        if self.fail_erases {
            return Err(BackendError::EraseFailed { sector });
        }
        let range = self.range(sector, 0, self.sector_size)?;
        self.data[range].fill(0xFF);
        self.erases += 1;
        Ok(())
    }

    fn release(&mut self) {
        self.releases += 1;
    }
}
