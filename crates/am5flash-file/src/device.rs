//! File-backed flash image implementation

use crate::error::{FileBackendError, Result};
use am5flash_core::backend::{BackendAttributes, BackendError, StorageBackend};
use am5flash_core::device::{DeviceIdentity, MAX_ADDRESSABLE_SIZE};
use log::{debug, error, info, warn};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Default sector size for image files
pub const DEFAULT_SECTOR_SIZE: u32 = 4096;

/// Configuration for opening a flash image file
#[derive(Debug, Clone)]
pub struct FileBackendConfig {
    /// Path to the image file
    pub path: PathBuf,
    /// Sector size used to address the image
    pub sector_size: u32,
    /// Report the image as write protected and refuse modifications
    pub write_protected: bool,
    /// Create an erased image of this size if the file does not exist
    pub create_size: Option<u64>,
}

impl FileBackendConfig {
    /// Create a configuration for an existing image with 4 KiB sectors
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sector_size: DEFAULT_SECTOR_SIZE,
            write_protected: false,
            create_size: None,
        }
    }
}

/// Flash image file handle
///
/// Sector `n` covers bytes `[n * sector_size, (n + 1) * sector_size)` of
/// the file. Erase fills a sector with `0xFF`. Writes overwrite bytes
/// directly; no NOR bit-clearing is emulated.
pub struct FileBackend {
    file: File,
    path: PathBuf,
    size: u64,
    sector_size: u32,
    write_protected: bool,
}

impl FileBackend {
    /// Open (or create) a flash image
    ///
    /// # Errors
    /// Returns an error if:
    /// - The sector size is not a power of two
    /// - The file cannot be opened or created
    /// - The image is empty, larger than 4 GiB, or not a whole number of
    ///   sectors
    pub fn open(config: &FileBackendConfig) -> Result<Self> {
        let sector_size = config.sector_size;
        if sector_size == 0 || !sector_size.is_power_of_two() {
            return Err(FileBackendError::InvalidSectorSize(sector_size));
        }

        if let Some(size) = config.create_size {
            if !config.path.exists() {
                create_erased_image(&config.path, size)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(!config.write_protected)
            .open(&config.path)
            .map_err(|source| FileBackendError::Open {
                path: config.path.clone(),
                source,
            })?;

        let size = file.metadata()?.len();
        if size == 0 {
            return Err(FileBackendError::EmptyImage(config.path.clone()));
        }
        if size > MAX_ADDRESSABLE_SIZE {
            return Err(FileBackendError::TooLarge(size));
        }
        if size % sector_size as u64 != 0 {
            return Err(FileBackendError::PartialSector { size, sector_size });
        }

        info!(
            "Opened image {} ({} bytes, {} byte sectors{})",
            config.path.display(),
            size,
            sector_size,
            if config.write_protected {
                ", read-only"
            } else {
                ""
            }
        );

        Ok(Self {
            file,
            path: config.path.clone(),
            size,
            sector_size,
            write_protected: config.write_protected,
        })
    }

    /// Path of the image file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Image size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Sector size in bytes
    pub fn sector_size(&self) -> u32 {
        self.sector_size
    }

    fn position(&self, sector: u64, offset: usize, len: usize) -> std::result::Result<u64, BackendError> {
        let out_of_range = BackendError::OutOfRange {
            sector,
            offset,
            len,
        };
        let sector_size = self.sector_size as u64;
        let in_sector = (offset as u64)
            .checked_add(len as u64)
            .is_some_and(|end| end <= sector_size);
        if !in_sector {
            return Err(out_of_range);
        }
        let pos = sector
            .checked_mul(sector_size)
            .and_then(|p| p.checked_add(offset as u64))
            .ok_or(out_of_range)?;
        if pos.checked_add(len as u64).map_or(true, |end| end > self.size) {
            return Err(out_of_range);
        }
        Ok(pos)
    }

    fn transfer_error(&self, what: &str, pos: u64, err: io::Error, mapped: BackendError) -> BackendError {
        error!(
            "{}: {} at offset {:#x} failed: {}",
            self.path.display(),
            what,
            pos,
            err
        );
        mapped
    }
}

fn create_erased_image(path: &Path, size: u64) -> Result<()> {
    if size == 0 {
        return Err(FileBackendError::EmptyImage(path.to_path_buf()));
    }
    if size > MAX_ADDRESSABLE_SIZE {
        return Err(FileBackendError::TooLarge(size));
    }

    info!("Creating erased image {} ({} bytes)", path.display(), size);
    let mut file = File::create(path).map_err(|source| FileBackendError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let chunk = vec![0xFFu8; 64 * 1024];
    let mut remaining = size;
    while remaining > 0 {
        let step = remaining.min(chunk.len() as u64) as usize;
        file.write_all(&chunk[..step])?;
        remaining -= step as u64;
    }
    file.sync_all()?;
    Ok(())
}

impl StorageBackend for FileBackend {
    fn get_attributes(&self) -> Option<BackendAttributes> {
        let mut attrs = BackendAttributes::READ_WRITE;
        if self.write_protected {
            attrs.remove(BackendAttributes::WRITE_STATUS);
        }
        Some(attrs)
    }

    fn get_geometry(&self) -> Option<(u32, u32)> {
        let block_count = u32::try_from(self.size / self.sector_size as u64).ok()?;
        Some((self.sector_size, block_count))
    }

    fn identity(&self) -> Option<DeviceIdentity> {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Flash Image".to_string());
        Some(DeviceIdentity {
            name: am5flash_core::device::device_name(&name),
            ..DeviceIdentity::default()
        })
    }

    fn read(&mut self, sector: u64, offset: usize, buf: &mut [u8]) -> std::result::Result<(), BackendError> {
        let pos = self.position(sector, offset, buf.len())?;
        let result = self
            .file
            .seek(SeekFrom::Start(pos))
            .and_then(|_| self.file.read_exact(buf));
        result.map_err(|e| self.transfer_error("read", pos, e, BackendError::ReadFailed { sector }))
    }

    fn write(&mut self, sector: u64, offset: usize, data: &[u8]) -> std::result::Result<(), BackendError> {
        if self.write_protected {
            return Err(BackendError::WriteProtected);
        }
        let pos = self.position(sector, offset, data.len())?;
        let result = self
            .file
            .seek(SeekFrom::Start(pos))
            .and_then(|_| self.file.write_all(data));
        result.map_err(|e| self.transfer_error("write", pos, e, BackendError::WriteFailed { sector }))
    }

    fn erase(&mut self, sector: u64) -> std::result::Result<(), BackendError> {
        if self.write_protected {
            return Err(BackendError::WriteProtected);
        }
        let pos = self.position(sector, 0, self.sector_size as usize)?;
        let erased = vec![0xFFu8; self.sector_size as usize];
        let result = self
            .file
            .seek(SeekFrom::Start(pos))
            .and_then(|_| self.file.write_all(&erased));
        result.map_err(|e| self.transfer_error("erase", pos, e, BackendError::EraseFailed { sector }))?;
        debug!("{}: erased sector {}", self.path.display(), sector);
        Ok(())
    }

    fn release(&mut self) {
        if self.write_protected {
            return;
        }
        match self.file.sync_all() {
            Ok(()) => debug!("{}: synced", self.path.display()),
            Err(e) => warn!("{}: sync failed: {}", self.path.display(), e),
        }
    }
}

/// Parse a size like `4096`, `0x1000`, `64K` or `16M`
fn parse_size(s: &str) -> Option<u64> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).ok();
    }
    let upper = s.to_ascii_uppercase();
    let (num, multiplier) = if let Some(n) = upper.strip_suffix("MIB").or_else(|| upper.strip_suffix('M')) {
        (n.trim().to_string(), 1024 * 1024)
    } else if let Some(n) = upper.strip_suffix("KIB").or_else(|| upper.strip_suffix('K')) {
        (n.trim().to_string(), 1024)
    } else {
        (upper.clone(), 1)
    };
    num.parse::<u64>().ok()?.checked_mul(multiplier)
}

/// Parse backend options from key-value pairs
///
/// # Supported options
/// - `path=FILE` - Image file (required)
/// - `sector=SIZE` - Sector size (default 4096)
/// - `wp=yes|no` - Open read-only and report write protection
/// - `create=SIZE` - Create an erased image of SIZE bytes if missing
///
/// # Example
/// ```ignore
/// let options = &[("path", "bios.bin"), ("sector", "64K")];
/// let config = parse_options(options)?;
/// ```
pub fn parse_options(options: &[(&str, &str)]) -> Result<FileBackendConfig> {
    let mut path: Option<PathBuf> = None;
    let mut sector_size = DEFAULT_SECTOR_SIZE;
    let mut write_protected = false;
    let mut create_size = None;

    for (key, value) in options {
        match *key {
            "path" => path = Some(PathBuf::from(value)),
            "sector" => {
                sector_size = parse_size(value)
                    .and_then(|s| u32::try_from(s).ok())
                    .ok_or_else(|| FileBackendError::InvalidParameter {
                        name: "sector",
                        message: format!("'{}' is not a valid sector size", value),
                    })?;
            }
            "wp" => {
                write_protected = match *value {
                    "1" | "yes" | "on" | "true" => true,
                    "0" | "no" | "off" | "false" => false,
                    _ => {
                        return Err(FileBackendError::InvalidParameter {
                            name: "wp",
                            message: format!("'{}' is not yes/no", value),
                        })
                    }
                };
            }
            "create" => {
                create_size = Some(parse_size(value).ok_or_else(|| {
                    FileBackendError::InvalidParameter {
                        name: "create",
                        message: format!("'{}' is not a valid size", value),
                    }
                })?);
            }
            _ => {
                warn!("Unknown file backend option: {}={}", key, value);
            }
        }
    }

    let path = path.ok_or(FileBackendError::MissingParameter("path"))?;

    Ok(FileBackendConfig {
        path,
        sector_size,
        write_protected,
        create_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use am5flash_core::{Error, FlashManager};
    use tempfile::TempDir;

    const MIB: u64 = 1024 * 1024;

    fn image(dir: &TempDir, size: u64) -> FileBackendConfig {
        let path = dir.path().join("flash.bin");
        std::fs::write(&path, vec![0xFFu8; size as usize]).unwrap();
        FileBackendConfig::new(path)
    }

    #[test]
    fn test_parse_options() {
        let config = parse_options(&[("path", "bios.bin"), ("sector", "64K"), ("wp", "yes")]).unwrap();
        assert_eq!(config.path, PathBuf::from("bios.bin"));
        assert_eq!(config.sector_size, 65536);
        assert!(config.write_protected);
        assert_eq!(config.create_size, None);

        let config = parse_options(&[("path", "x.bin"), ("create", "16M")]).unwrap();
        assert_eq!(config.create_size, Some(16 * MIB));
        assert_eq!(config.sector_size, DEFAULT_SECTOR_SIZE);
    }

    #[test]
    fn test_parse_options_errors() {
        assert!(matches!(
            parse_options(&[("sector", "4096")]),
            Err(FileBackendError::MissingParameter("path"))
        ));
        assert!(matches!(
            parse_options(&[("path", "x"), ("wp", "maybe")]),
            Err(FileBackendError::InvalidParameter { name: "wp", .. })
        ));
        assert!(matches!(
            parse_options(&[("path", "x"), ("sector", "big")]),
            Err(FileBackendError::InvalidParameter { name: "sector", .. })
        ));
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("4096"), Some(4096));
        assert_eq!(parse_size("0x1000"), Some(4096));
        assert_eq!(parse_size("64k"), Some(65536));
        assert_eq!(parse_size("1MiB"), Some(MIB));
        assert_eq!(parse_size("nope"), None);
    }

    #[test]
    fn test_open_validation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("odd.bin");
        std::fs::write(&path, vec![0u8; 5000]).unwrap();
        assert!(matches!(
            FileBackend::open(&FileBackendConfig::new(&path)),
            Err(FileBackendError::PartialSector { size: 5000, .. })
        ));

        std::fs::write(&path, b"").unwrap();
        assert!(matches!(
            FileBackend::open(&FileBackendConfig::new(&path)),
            Err(FileBackendError::EmptyImage(_))
        ));

        let mut config = FileBackendConfig::new(dir.path().join("missing.bin"));
        assert!(matches!(
            FileBackend::open(&config),
            Err(FileBackendError::Open { .. })
        ));

        config.sector_size = 3000;
        assert!(matches!(
            FileBackend::open(&config),
            Err(FileBackendError::InvalidSectorSize(3000))
        ));
    }

    #[test]
    fn test_create_erased_image() {
        let dir = TempDir::new().unwrap();
        let mut config = FileBackendConfig::new(dir.path().join("new.bin"));
        config.create_size = Some(MIB);

        let backend = FileBackend::open(&config).unwrap();
        assert_eq!(backend.size(), MIB);
        assert_eq!(backend.get_geometry(), Some((4096, 256)));

        let contents = std::fs::read(&config.path).unwrap();
        assert!(contents.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_sector_io() {
        let dir = TempDir::new().unwrap();
        let config = image(&dir, MIB);
        let mut backend = FileBackend::open(&config).unwrap();

        backend.write(3, 16, &[1, 2, 3, 4]).unwrap();
        let mut buf = [0u8; 4];
        backend.read(3, 16, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);

        backend.erase(3).unwrap();
        backend.read(3, 16, &mut buf).unwrap();
        assert_eq!(buf, [0xFF; 4]);

        assert!(matches!(
            backend.read(256, 0, &mut buf),
            Err(BackendError::OutOfRange { .. })
        ));
        assert!(matches!(
            backend.write(0, 4094, &[0; 4]),
            Err(BackendError::OutOfRange { .. })
        ));
        assert!(matches!(
            backend.read(0, usize::MAX, &mut buf),
            Err(BackendError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_write_protected_image() {
        let dir = TempDir::new().unwrap();
        let mut config = image(&dir, MIB);
        config.write_protected = true;
        let mut backend = FileBackend::open(&config).unwrap();

        assert!(backend.get_attributes().unwrap().is_write_protected());
        assert_eq!(backend.write(0, 0, &[0]), Err(BackendError::WriteProtected));
        assert_eq!(backend.erase(0), Err(BackendError::WriteProtected));
    }

    #[test]
    fn test_manager_over_file() {
        let dir = TempDir::new().unwrap();
        let config = image(&dir, MIB);
        let backend = FileBackend::open(&config).unwrap();

        let mut manager = FlashManager::new(backend);
        manager.init().unwrap();
        assert_eq!(
            manager.device_info().unwrap().device_name.as_str(),
            "flash.bin"
        );

        manager.write(0x10FF0, &[0x5A; 64]).unwrap();
        assert!(manager.write(0, &[0; 1]).is_err());
        manager.cleanup().unwrap();

        let contents = std::fs::read(&config.path).unwrap();
        assert_eq!(&contents[0x10FF0..0x11030], &[0x5A; 64]);
        assert_eq!(contents[0x11030], 0xFF);
    }

    #[test]
    fn test_manager_write_protected_file() {
        let dir = TempDir::new().unwrap();
        let mut config = image(&dir, MIB);
        config.write_protected = true;

        let mut manager = FlashManager::new(FileBackend::open(&config).unwrap());
        manager.init().unwrap();
        assert!(matches!(
            manager.write(0x10000, &[0; 4]),
            Err(Error::WriteProtected { region: None, .. })
        ));
    }
}
