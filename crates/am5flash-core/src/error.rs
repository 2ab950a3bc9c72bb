//! Error types for am5flash-core
//!
//! This module provides a no_std compatible error type. Every variant
//! carries enough context (operation, address, region name) to print a
//! one-line diagnostic.

use core::fmt;

use crate::backend::BackendError;
use crate::region::RegionName;

/// Manager operation an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Manager initialization
    Init,
    /// Flash read
    Read,
    /// Flash write
    Write,
    /// Sector erase
    Erase,
    /// Device descriptor query
    DeviceInfo,
    /// Status dump
    Status,
    /// Region table query
    Regions,
    /// Manager cleanup
    Cleanup,
    /// Region table construction
    BuildRegions,
    /// Manager configuration
    Configure,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Read => "read",
            Self::Write => "write",
            Self::Erase => "erase",
            Self::DeviceInfo => "device info",
            Self::Status => "status",
            Self::Regions => "regions",
            Self::Cleanup => "cleanup",
            Self::BuildRegions => "build regions",
            Self::Configure => "configure",
        };
        f.write_str(name)
    }
}

/// Why a parameter was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// Buffer or data slice is empty
    EmptyBuffer,
    /// `addr + len` runs past the end of the device
    OutOfBounds {
        /// Requested start address
        addr: u32,
        /// Requested length in bytes
        len: usize,
        /// Device size in bytes
        total_size: u64,
    },
    /// Device is too small for the default region layout
    DeviceTooSmall {
        /// Device size in bytes
        total_size: u64,
        /// Smallest size the layout fits in
        min_size: u64,
    },
    /// Device is larger than the 32-bit address space
    Unaddressable {
        /// Device size in bytes
        total_size: u64,
    },
    /// Sector size is zero, not a power of two, or does not divide the size
    InvalidGeometry {
        /// Device size in bytes
        total_size: u64,
        /// Sector size in bytes
        sector_size: u32,
    },
    /// Region has zero size
    EmptyRegion,
    /// Region extends beyond the device
    RegionOutOfBounds {
        /// Region start address
        start: u32,
        /// Region size in bytes
        size: u32,
        /// Device size in bytes
        total_size: u64,
    },
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyBuffer => write!(f, "empty buffer"),
            Self::OutOfBounds {
                addr,
                len,
                total_size,
            } => write!(
                f,
                "0x{:08X} + {} bytes is beyond flash boundary 0x{:08X}",
                addr, len, total_size
            ),
            Self::DeviceTooSmall {
                total_size,
                min_size,
            } => write!(
                f,
                "flash size {} bytes is below the {} byte minimum for the region layout",
                total_size, min_size
            ),
            Self::Unaddressable { total_size } => {
                write!(f, "flash size {} bytes exceeds 32-bit addressing", total_size)
            }
            Self::InvalidGeometry {
                total_size,
                sector_size,
            } => write!(
                f,
                "invalid geometry: {} bytes with {} byte sectors",
                total_size, sector_size
            ),
            Self::EmptyRegion => write!(f, "region has zero size"),
            Self::RegionOutOfBounds {
                start,
                size,
                total_size,
            } => write!(
                f,
                "region 0x{:08X} + {} bytes extends beyond flash size 0x{:08X}",
                start, size, total_size
            ),
        }
    }
}

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A parameter failed validation
    InvalidParameter {
        /// Operation that rejected the parameter
        op: Operation,
        /// What was wrong with it
        reason: InvalidReason,
    },
    /// Manager is not initialized
    NotReady {
        /// Operation that was attempted
        op: Operation,
    },
    /// `init` was called on an initialized manager
    AlreadyStarted,
    /// Write or erase blocked by write protection
    WriteProtected {
        /// Operation that was blocked
        op: Operation,
        /// Requested address
        addr: u32,
        /// Protected region, or `None` for the device-global flag
        region: Option<RegionName>,
    },
    /// Erase address is not covered by any region
    NotFound {
        /// Requested address
        addr: u32,
    },
    /// Erase requested in a region that cannot be erased
    Unsupported {
        /// Requested address
        addr: u32,
        /// Region that forbids erase
        region: RegionName,
    },
    /// Storage backend rejected the transfer
    BackendFailure {
        /// Operation that was dispatched
        op: Operation,
        /// Linear address of the failing chunk
        addr: u32,
        /// Error reported by the backend, unchanged
        source: BackendError,
    },
    /// Region table is full
    CapacityExceeded {
        /// Maximum number of regions
        capacity: usize,
    },
}

impl Error {
    /// Name of the region involved in this error, if any
    pub fn region_name(&self) -> Option<&str> {
        match self {
            Self::WriteProtected {
                region: Some(region),
                ..
            } => Some(region.as_str()),
            Self::Unsupported { region, .. } => Some(region.as_str()),
            _ => None,
        }
    }

    /// Whether the error was produced by the backend rather than by policy
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, Self::BackendFailure { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameter { op, reason } => {
                write!(f, "{}: invalid parameter: {}", op, reason)
            }
            Self::NotReady { op } => write!(f, "{}: flash manager not initialized", op),
            Self::AlreadyStarted => write!(f, "flash manager already initialized"),
            Self::WriteProtected {
                op,
                addr,
                region: Some(region),
            } => write!(
                f,
                "{} at 0x{:08X}: region '{}' is write protected",
                op, addr, region
            ),
            Self::WriteProtected {
                op,
                addr,
                region: None,
            } => write!(f, "{} at 0x{:08X}: flash is write protected", op, addr),
            Self::NotFound { addr } => {
                write!(f, "erase at 0x{:08X}: address not found in any region", addr)
            }
            Self::Unsupported { addr, region } => write!(
                f,
                "erase at 0x{:08X}: erase not supported in region '{}'",
                addr, region
            ),
            Self::BackendFailure { op, addr, source } => {
                write!(f, "{} at 0x{:08X}: backend failure: {}", op, addr, source)
            }
            Self::CapacityExceeded { capacity } => {
                write!(f, "region table full ({} regions)", capacity)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
