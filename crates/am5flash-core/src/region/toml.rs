//! TOML overlay file parsing
//!
//! Overlay files add regions on top of the default layout:
//!
//! ```toml
//! [[region]]
//! name = "Capsule"
//! start = 0x200000
//! size = "64 KiB"
//! readonly = true
//!
//! [[region]]
//! name = "Scratch"
//! type = "custom"
//! start = "0x300000"
//! size = 0x10000
//! erasable = false
//! ```

use std::fs;
use std::path::Path;
use std::string::String;
use std::vec::Vec;
use std::format;

use super::{FlashRegion, RegionType, MAX_FLASH_REGIONS, MAX_REGION_NAME_LEN};

/// Error loading an overlay file
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    /// File could not be read
    #[error("failed to read overlay file: {0}")]
    Io(#[from] std::io::Error),
    /// File is not valid overlay TOML
    #[error("failed to parse overlay file: {0}")]
    Parse(#[from] toml::de::Error),
    /// A region entry is unusable
    #[error("overlay region '{name}': {reason}")]
    InvalidRegion {
        /// Region name as written in the file
        name: String,
        /// What is wrong with it
        reason: String,
    },
    /// More regions than a table can hold
    #[error("overlay file defines {count} regions, at most {max} are allowed")]
    TooManyRegions {
        /// Regions in the file
        count: usize,
        /// Capacity limit
        max: usize,
    },
}

#[derive(Debug, serde::Deserialize)]
struct TomlOverlayFile {
    #[serde(default)]
    region: Vec<TomlRegion>,
}

#[derive(Debug, serde::Deserialize)]
struct TomlRegion {
    name: String,
    #[serde(default, rename = "type")]
    region_type: RegionType,
    #[serde(deserialize_with = "deserialize_number")]
    start: u32,
    #[serde(deserialize_with = "deserialize_size")]
    size: u32,
    #[serde(default)]
    readonly: bool,
    #[serde(default = "default_erasable")]
    erasable: bool,
}

fn default_erasable() -> bool {
    true
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Int(u32),
    Str(String),
}

fn deserialize_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Int(n) => Ok(n),
        NumberOrString::Str(s) => parse_number(&s).map_err(serde::de::Error::custom),
    }
}

fn deserialize_size<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Int(n) => Ok(n),
        NumberOrString::Str(s) => parse_size(&s).map_err(serde::de::Error::custom),
    }
}

/// Parse a number that can be hex (0x...) or decimal
fn parse_number(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("invalid hex: {}", e))
    } else {
        s.parse().map_err(|e| format!("invalid number: {}", e))
    }
}

/// Parse a size string like "64 KiB", "0x10000" or "4096"
fn parse_size(s: &str) -> Result<u32, String> {
    let s = s.trim();

    if let Ok(n) = parse_number(s) {
        return Ok(n);
    }

    let lower = s.to_lowercase();
    let (num_str, multiplier) = if let Some(n) = lower.strip_suffix("mib") {
        (n, 1024 * 1024)
    } else if let Some(n) = lower.strip_suffix("m") {
        (n, 1024 * 1024)
    } else if let Some(n) = lower.strip_suffix("kib") {
        (n, 1024)
    } else if let Some(n) = lower.strip_suffix("k") {
        (n, 1024)
    } else {
        return Err(format!("invalid size: {}", s));
    };

    let num: u32 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("invalid size: {}", s))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size too large: {}", s))
}

/// Parse overlay regions from a TOML string
///
/// Regions are returned in file order. Bounds against the device are
/// checked later, when the table is built.
pub fn overlays_from_toml_str(content: &str) -> Result<Vec<FlashRegion>, OverlayError> {
    let file: TomlOverlayFile = toml::from_str(content)?;

    if file.region.len() > MAX_FLASH_REGIONS {
        return Err(OverlayError::TooManyRegions {
            count: file.region.len(),
            max: MAX_FLASH_REGIONS,
        });
    }

    let mut regions = Vec::with_capacity(file.region.len());
    for entry in file.region {
        if entry.name.is_empty() {
            return Err(OverlayError::InvalidRegion {
                name: entry.name,
                reason: "name is empty".into(),
            });
        }
        if entry.name.len() > MAX_REGION_NAME_LEN {
            return Err(OverlayError::InvalidRegion {
                reason: format!("name is longer than {} bytes", MAX_REGION_NAME_LEN),
                name: entry.name,
            });
        }
        if entry.size == 0 {
            return Err(OverlayError::InvalidRegion {
                name: entry.name,
                reason: "size is zero".into(),
            });
        }
        if entry.start as u64 + entry.size as u64 > 1 << 32 {
            return Err(OverlayError::InvalidRegion {
                name: entry.name,
                reason: "region runs past the 32-bit address space".into(),
            });
        }

        regions.push(
            FlashRegion::new(entry.region_type, &entry.name, entry.start, entry.size)
                .protected(entry.readonly)
                .erasable(entry.erasable),
        );
    }

    log::debug!("Parsed {} overlay regions", regions.len());
    Ok(regions)
}

/// Load overlay regions from a TOML file
pub fn overlays_from_toml_file(path: impl AsRef<Path>) -> Result<Vec<FlashRegion>, OverlayError> {
    let content = fs::read_to_string(path)?;
    overlays_from_toml_str(&content)
}
