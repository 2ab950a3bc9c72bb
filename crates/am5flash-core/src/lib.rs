//! am5flash-core - Flash region manager for AM5 firmware updates
//!
//! This crate models a physical flash device as a set of named, typed
//! address regions, each with its own write-protection and erase policy,
//! and mediates every read, write and erase against those regions and the
//! device boundaries. The physical transfer itself is delegated to a
//! [`StorageBackend`](backend::StorageBackend).
//!
//! It is `no_std` so it can run inside a boot-time firmware application.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`), TOML
//!   overlay files and `std::error::Error` impls
//! - `alloc` - Enable `Box<dyn StorageBackend>` support
//!
//! # Example
//!
//! ```ignore
//! use am5flash_core::FlashManager;
//!
//! fn dump_boot_block<B: am5flash_core::backend::StorageBackend>(backend: B) {
//!     let mut manager = FlashManager::new(backend);
//!     manager.init().unwrap();
//!
//!     let mut buf = [0u8; 4096];
//!     manager.read(0, &mut buf).unwrap();
//!     println!("{}", manager.status().unwrap());
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod backend;
pub mod config;
pub mod device;
pub mod error;
pub mod manager;
pub mod policy;
pub mod region;
pub mod status;

#[cfg(test)]
mod testing;

pub use config::ManagerConfig;
pub use error::{Error, Result};
pub use manager::FlashManager;

/// Wrapping byte sum used to fingerprint flash contents
///
/// This is the same additive checksum the update tooling prints next to
/// verify results, so a dump and an image can be compared by eye.
pub fn checksum32(data: &[u8]) -> u32 {
    data.iter()
        .fold(0u32, |acc, &b| acc.wrapping_add(u32::from(b)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum32() {
        assert_eq!(checksum32(&[]), 0);
        assert_eq!(checksum32(&[1, 2, 3]), 6);
        assert_eq!(checksum32(&[0xFF; 4]), 0x3FC);
    }
}
