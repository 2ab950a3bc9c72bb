//! Flash manager
//!
//! [`FlashManager`] owns a backend and mediates every read, write and erase
//! against the device boundaries, the global write-protect flag and the
//! region table. All validation happens before the backend is touched, so
//! a rejected request leaves the flash unchanged.

use log::{debug, error, info};

use crate::backend::StorageBackend;
use crate::config::ManagerConfig;
use crate::device::{detect_device, DeviceDescriptor};
use crate::error::{Error, InvalidReason, Operation, Result};
use crate::policy::{check_erase_allowed, check_write_allowed, PolicyViolation};
use crate::region::{build_regions_with, FlashRegion, RegionTable};
use crate::status::Status;

/// State held between `init` and `cleanup`
#[derive(Debug)]
struct Session {
    descriptor: DeviceDescriptor,
    regions: RegionTable,
}

/// Region-aware front end over a storage backend
///
/// A manager starts uninitialized. [`init`](Self::init) detects the device
/// and builds the region table; [`cleanup`](Self::cleanup) releases the
/// backend and returns to the uninitialized state. Every other operation
/// requires an initialized manager.
pub struct FlashManager<B> {
    backend: B,
    config: ManagerConfig,
    session: Option<Session>,
}

impl<B: StorageBackend> FlashManager<B> {
    /// Create an uninitialized manager with the default configuration
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, ManagerConfig::default())
    }

    /// Create an uninitialized manager
    pub fn with_config(backend: B, config: ManagerConfig) -> Self {
        Self {
            backend,
            config,
            session: None,
        }
    }

    /// Whether `init` has succeeded and `cleanup` has not been called since
    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    /// Configuration the manager was created with
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Borrow the backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutably borrow the backend
    ///
    /// Transfers made through this reference bypass region policy.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Consume the manager and return the backend
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Detect the device and build the region table
    pub fn init(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Err(Error::AlreadyStarted);
        }

        info!("Initializing flash manager");
        let descriptor = detect_device(&self.backend, &self.config);
        let regions = build_regions_with(&descriptor, self.config.overlays()).map_err(|e| {
            error!("Failed to initialize flash regions: {}", e);
            e
        })?;

        self.session = Some(Session {
            descriptor,
            regions,
        });
        info!("Flash manager initialized successfully");
        Ok(())
    }

    /// Read `buf.len()` bytes starting at `addr`
    ///
    /// Reads are not subject to region policy.
    pub fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        let session = self.session(Operation::Read)?;
        check_range(&session.descriptor, Operation::Read, addr, buf.len())?;

        let descriptor = &session.descriptor;
        let mut pos = 0;
        for chunk in SectorChunks::new(descriptor.sector_size, addr, buf.len()) {
            let out = &mut buf[pos..pos + chunk.len];
            self.backend
                .read(chunk.sector, chunk.offset, out)
                .map_err(|source| {
                    error!("Flash read failed at 0x{:08X}: {}", chunk.addr, source);
                    Error::BackendFailure {
                        op: Operation::Read,
                        addr: chunk.addr,
                        source,
                    }
                })?;
            pos += chunk.len;
        }

        debug!("Flash read: 0x{:08X}, {} bytes", addr, buf.len());
        Ok(())
    }

    /// Write `data` starting at `addr`
    ///
    /// The whole range is checked against the global write-protect flag and
    /// every intersecting region before anything is written. A backend
    /// failure part-way through may leave earlier sectors programmed.
    pub fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        let session = self.session(Operation::Write)?;
        check_range(&session.descriptor, Operation::Write, addr, data.len())?;

        if session.descriptor.write_protected {
            error!("Flash is write protected");
            return Err(Error::WriteProtected {
                op: Operation::Write,
                addr,
                region: None,
            });
        }

        if let Err(PolicyViolation::WriteProtected { region }) =
            check_write_allowed(session.regions.as_slice(), addr, data.len())
        {
            error!("Write to protected region: {}", region);
            return Err(Error::WriteProtected {
                op: Operation::Write,
                addr,
                region: Some(region),
            });
        }

        let sector_size = session.descriptor.sector_size;
        let mut pos = 0;
        for chunk in SectorChunks::new(sector_size, addr, data.len()) {
            self.backend
                .write(chunk.sector, chunk.offset, &data[pos..pos + chunk.len])
                .map_err(|source| {
                    error!("Flash write failed at 0x{:08X}: {}", chunk.addr, source);
                    Error::BackendFailure {
                        op: Operation::Write,
                        addr: chunk.addr,
                        source,
                    }
                })?;
            pos += chunk.len;
        }

        info!("Flash write: 0x{:08X}, {} bytes", addr, data.len());
        Ok(())
    }

    /// Erase the sector containing `addr`
    ///
    /// Only the first region containing `addr` decides whether erase is
    /// permitted; overlays later in the table are not consulted.
    pub fn erase_sector(&mut self, addr: u32) -> Result<()> {
        let session = self.session(Operation::Erase)?;
        let descriptor = &session.descriptor;

        if !descriptor.contains_address(addr) {
            error!(
                "Erase address beyond flash boundary: 0x{:08X} >= 0x{:08X}",
                addr, descriptor.total_size
            );
            return Err(Error::InvalidParameter {
                op: Operation::Erase,
                reason: InvalidReason::OutOfBounds {
                    addr,
                    len: 1,
                    total_size: descriptor.total_size,
                },
            });
        }

        if descriptor.write_protected {
            error!("Flash is write protected");
            return Err(Error::WriteProtected {
                op: Operation::Erase,
                addr,
                region: None,
            });
        }

        check_erase_allowed(session.regions.as_slice(), addr).map_err(|violation| {
            let err = match violation {
                PolicyViolation::NotFound { addr } => Error::NotFound { addr },
                PolicyViolation::Unsupported { region } => Error::Unsupported { addr, region },
                PolicyViolation::WriteProtected { region } => Error::WriteProtected {
                    op: Operation::Erase,
                    addr,
                    region: Some(region),
                },
            };
            error!("{}", err);
            err
        })?;

        let (sector, _) = descriptor.sector_of(addr);
        self.backend.erase(sector).map_err(|source| {
            error!("Flash erase failed at 0x{:08X}: {}", addr, source);
            Error::BackendFailure {
                op: Operation::Erase,
                addr,
                source,
            }
        })?;

        info!("Flash sector erased: 0x{:08X}", addr);
        Ok(())
    }

    /// Copy of the device descriptor
    pub fn device_info(&self) -> Result<DeviceDescriptor> {
        Ok(self.session(Operation::DeviceInfo)?.descriptor.clone())
    }

    /// Region table in table order
    pub fn regions(&self) -> Result<&[FlashRegion]> {
        Ok(self.session(Operation::Regions)?.regions.as_slice())
    }

    /// Descriptor and region table as a displayable value
    pub fn status(&self) -> Result<Status<'_>> {
        let session = self.session(Operation::Status)?;
        Ok(Status::new(&session.descriptor, session.regions.as_slice()))
    }

    /// Release the backend and return to the uninitialized state
    pub fn cleanup(&mut self) -> Result<()> {
        if self.session.take().is_none() {
            return Err(Error::NotReady {
                op: Operation::Cleanup,
            });
        }

        self.backend.release();
        info!("Flash manager cleanup complete");
        Ok(())
    }

    fn session(&self, op: Operation) -> Result<&Session> {
        self.session.as_ref().ok_or(Error::NotReady { op })
    }
}

fn check_range(descriptor: &DeviceDescriptor, op: Operation, addr: u32, len: usize) -> Result<()> {
    if len == 0 {
        return Err(Error::InvalidParameter {
            op,
            reason: InvalidReason::EmptyBuffer,
        });
    }
    if !descriptor.contains_range(addr, len) {
        error!(
            "{} beyond flash boundary: 0x{:08X} + {} > 0x{:08X}",
            op, addr, len, descriptor.total_size
        );
        return Err(Error::InvalidParameter {
            op,
            reason: InvalidReason::OutOfBounds {
                addr,
                len,
                total_size: descriptor.total_size,
            },
        });
    }
    Ok(())
}

/// One sector-bounded piece of a linear transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Chunk {
    addr: u32,
    sector: u64,
    offset: usize,
    len: usize,
}

/// Splits `[addr, addr + len)` at sector boundaries
///
/// The range must already be bounds-checked against the device.
struct SectorChunks {
    sector_size: u64,
    pos: u64,
    end: u64,
}

impl SectorChunks {
    fn new(sector_size: u32, addr: u32, len: usize) -> Self {
        Self {
            sector_size: sector_size as u64,
            pos: addr as u64,
            end: addr as u64 + len as u64,
        }
    }
}

impl Iterator for SectorChunks {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.pos >= self.end {
            return None;
        }
        let sector = self.pos / self.sector_size;
        let offset = self.pos % self.sector_size;
        let len = (self.sector_size - offset).min(self.end - self.pos);
        let chunk = Chunk {
            addr: self.pos as u32,
            sector,
            offset: offset as usize,
            len: len as usize,
        };
        self.pos += len;
        Some(chunk)
    }
}
