//! Flash region table
//!
//! Regions are named, typed slices of the flash address space, each with
//! its own write-protect and erase policy. The table is built from the
//! device geometry at initialization:
//!
//! | Region           | Range                               | Protected | Erasable |
//! |------------------|-------------------------------------|-----------|----------|
//! | Boot Block       | `[0, 64K)`                          | yes       | yes      |
//! | Main Firmware    | `[64K, total - 192K)`               | no        | yes      |
//! | NVRAM            | `[total - 192K, total - 64K)`       | no        | yes      |
//! | Flash Descriptor | `[total - 64K, total)`              | yes       | no       |
//!
//! Overlay regions may be appended after these, for example a `Custom`
//! region layered over Main Firmware to protect a sub-range:
//!
//! ```ignore
//! let capsule = FlashRegion::new(RegionType::Custom, "Capsule", 0x20_0000, 0x1_0000)
//!     .protected(true);
//! let table = build_regions_with(&descriptor, &[capsule])?;
//! ```

mod types;

#[cfg(feature = "std")]
mod toml;

pub use types::*;

#[cfg(feature = "std")]
pub use self::toml::{overlays_from_toml_file, overlays_from_toml_str, OverlayError};
