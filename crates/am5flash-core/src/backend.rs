//! Storage backend abstraction
//!
//! The manager never touches hardware itself. Everything that moves bytes
//! goes through a [`StorageBackend`], which addresses flash in sectors.
//! The sector size a backend uses for `(sector, offset)` coordinates is the
//! one it reports from [`StorageBackend::get_geometry`].

use core::fmt;

use bitflags::bitflags;

use crate::device::DeviceIdentity;

bitflags! {
    /// Flash access attributes reported by a backend
    ///
    /// Bit positions follow the firmware volume block attribute word so a
    /// backend sitting on top of firmware services can pass the raw value
    /// through with `from_bits_truncate`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BackendAttributes: u32 {
        /// Reads can be disabled
        const READ_DISABLED_CAP  = 0x0000_0001;
        /// Reads can be enabled
        const READ_ENABLED_CAP   = 0x0000_0002;
        /// Reads are currently enabled
        const READ_STATUS        = 0x0000_0004;
        /// Writes can be disabled
        const WRITE_DISABLED_CAP = 0x0000_0008;
        /// Writes can be enabled
        const WRITE_ENABLED_CAP  = 0x0000_0010;
        /// Writes are currently enabled
        const WRITE_STATUS       = 0x0000_0020;
        /// Attributes can be locked
        const LOCK_CAP           = 0x0000_0040;
        /// Attributes are locked
        const LOCK_STATUS        = 0x0000_0080;
        /// Erased bits read as 1
        const ERASE_POLARITY     = 0x0000_0800;

        /// Typical attributes of a readable, writable NOR part
        const READ_WRITE = Self::READ_ENABLED_CAP.bits()
            | Self::READ_STATUS.bits()
            | Self::WRITE_ENABLED_CAP.bits()
            | Self::WRITE_STATUS.bits()
            | Self::ERASE_POLARITY.bits();
    }
}

impl BackendAttributes {
    /// Whether these attributes mean the device rejects writes
    pub fn is_write_protected(&self) -> bool {
        !self.contains(Self::WRITE_STATUS)
    }
}

/// Error reported by a storage backend
///
/// The manager wraps these in [`Error::BackendFailure`](crate::Error)
/// without reinterpreting them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendError {
    /// Sector read failed
    ReadFailed {
        /// Sector index
        sector: u64,
    },
    /// Sector program failed
    WriteFailed {
        /// Sector index
        sector: u64,
    },
    /// Sector erase failed
    EraseFailed {
        /// Sector index
        sector: u64,
    },
    /// Coordinates lie outside the backing storage
    OutOfRange {
        /// Sector index
        sector: u64,
        /// Offset within the sector
        offset: usize,
        /// Transfer length in bytes
        len: usize,
    },
    /// Backend refuses to modify the device
    WriteProtected,
    /// Backend has been released or is otherwise unusable
    Unavailable,
    /// Underlying I/O error
    Io,
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailed { sector } => write!(f, "read of sector {} failed", sector),
            Self::WriteFailed { sector } => write!(f, "write of sector {} failed", sector),
            Self::EraseFailed { sector } => write!(f, "erase of sector {} failed", sector),
            Self::OutOfRange {
                sector,
                offset,
                len,
            } => write!(
                f,
                "sector {} offset {} length {} is outside the device",
                sector, offset, len
            ),
            Self::WriteProtected => write!(f, "device is write protected"),
            Self::Unavailable => write!(f, "backend unavailable"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BackendError {}

/// Sector-addressed flash storage
///
/// Implementations perform the physical transfer. They may assume the
/// manager has already validated bounds and policy, and that a single
/// `read`/`write` never crosses a sector boundary.
pub trait StorageBackend {
    /// Query access attributes (optional capability)
    fn get_attributes(&self) -> Option<BackendAttributes>;

    /// Query geometry as `(sector_size, block_count)` (optional capability)
    fn get_geometry(&self) -> Option<(u32, u32)>;

    /// Query part identification (optional capability)
    fn identity(&self) -> Option<DeviceIdentity> {
        None
    }

    /// Read `buf.len()` bytes starting at `offset` within `sector`
    fn read(&mut self, sector: u64, offset: usize, buf: &mut [u8]) -> Result<(), BackendError>;

    /// Program `data` starting at `offset` within `sector`
    fn write(&mut self, sector: u64, offset: usize, data: &[u8]) -> Result<(), BackendError>;

    /// Erase one full sector
    fn erase(&mut self, sector: u64) -> Result<(), BackendError>;

    /// Release any handle held on the device
    ///
    /// Called by the manager's `cleanup`. A released backend must still
    /// answer the capability queries so the manager can be initialized
    /// again.
    fn release(&mut self) {}
}

impl<B: StorageBackend + ?Sized> StorageBackend for &mut B {
    fn get_attributes(&self) -> Option<BackendAttributes> {
        (**self).get_attributes()
    }

    fn get_geometry(&self) -> Option<(u32, u32)> {
        (**self).get_geometry()
    }

    fn identity(&self) -> Option<DeviceIdentity> {
        (**self).identity()
    }

    fn read(&mut self, sector: u64, offset: usize, buf: &mut [u8]) -> Result<(), BackendError> {
        (**self).read(sector, offset, buf)
    }

    fn write(&mut self, sector: u64, offset: usize, data: &[u8]) -> Result<(), BackendError> {
        (**self).write(sector, offset, data)
    }

    fn erase(&mut self, sector: u64) -> Result<(), BackendError> {
        (**self).erase(sector)
    }

    fn release(&mut self) {
        (**self).release()
    }
}

#[cfg(feature = "alloc")]
impl<B: StorageBackend + ?Sized> StorageBackend for alloc::boxed::Box<B> {
    fn get_attributes(&self) -> Option<BackendAttributes> {
        (**self).get_attributes()
    }

    fn get_geometry(&self) -> Option<(u32, u32)> {
        (**self).get_geometry()
    }

    fn identity(&self) -> Option<DeviceIdentity> {
        (**self).identity()
    }

    fn read(&mut self, sector: u64, offset: usize, buf: &mut [u8]) -> Result<(), BackendError> {
        (**self).read(sector, offset, buf)
    }

    fn write(&mut self, sector: u64, offset: usize, data: &[u8]) -> Result<(), BackendError> {
        (**self).write(sector, offset, data)
    }

    fn erase(&mut self, sector: u64) -> Result<(), BackendError> {
        (**self).erase(sector)
    }

    fn release(&mut self) {
        (**self).release()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_protect_from_attributes() {
        assert!(!BackendAttributes::READ_WRITE.is_write_protected());
        assert!(BackendAttributes::empty().is_write_protected());

        let read_only = BackendAttributes::READ_ENABLED_CAP | BackendAttributes::READ_STATUS;
        assert!(read_only.is_write_protected());
    }

    #[test]
    fn test_raw_attribute_word() {
        let attrs = BackendAttributes::from_bits_truncate(0x0000_0836);
        assert!(attrs.contains(BackendAttributes::WRITE_STATUS));
        assert!(attrs.contains(BackendAttributes::ERASE_POLARITY));
        assert!(!attrs.is_write_protected());
    }
}
