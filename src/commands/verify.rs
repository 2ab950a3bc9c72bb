//! Verify command implementation

use am5flash_core::backend::StorageBackend;
use am5flash_core::{checksum32, FlashManager};
use std::path::Path;

use super::{read_file, read_range};

/// Result of comparing flash contents with expected data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    /// Address of the first differing byte, with expected and actual values
    pub first_mismatch: Option<(u32, u8, u8)>,
    /// Number of differing bytes
    pub mismatch_count: usize,
    /// Checksum of the expected data
    pub expected_checksum: u32,
    /// Checksum of the flash contents
    pub actual_checksum: u32,
}

impl VerifyReport {
    /// Whether flash matched exactly
    pub fn passed(&self) -> bool {
        self.mismatch_count == 0
    }
}

/// Compare `actual` (read from `address`) with `expected`
pub fn compare(address: u32, expected: &[u8], actual: &[u8]) -> VerifyReport {
    let mut first_mismatch = None;
    let mut mismatch_count = 0;
    for (i, (&e, &a)) in expected.iter().zip(actual).enumerate() {
        if e != a {
            if first_mismatch.is_none() {
                first_mismatch = Some((address + i as u32, e, a));
            }
            mismatch_count += 1;
        }
    }

    VerifyReport {
        first_mismatch,
        mismatch_count,
        expected_checksum: checksum32(expected),
        actual_checksum: checksum32(actual),
    }
}

/// Read back `expected.len()` bytes at `address` and compare
pub fn verify_data<B: StorageBackend>(
    manager: &mut FlashManager<B>,
    address: u32,
    expected: &[u8],
) -> Result<VerifyReport, Box<dyn std::error::Error>> {
    let actual = read_range(manager, address, expected.len(), "Verifying")?;
    let report = compare(address, expected, &actual);

    println!(
        "Checksum: expected 0x{:08X}, flash 0x{:08X}",
        report.expected_checksum, report.actual_checksum
    );
    if let Some((addr, e, a)) = report.first_mismatch {
        println!(
            "First mismatch at 0x{:08X}: expected 0x{:02X}, got 0x{:02X} ({} byte(s) differ)",
            addr, e, a, report.mismatch_count
        );
    }
    Ok(report)
}

/// Verify flash contents at `address` against a file
pub fn run_verify<B: StorageBackend>(
    manager: &mut FlashManager<B>,
    address: u32,
    input: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let expected = read_file(input)?;
    if expected.is_empty() {
        return Err(format!("{:?} is empty", input).into());
    }

    println!("Verifying flash at 0x{:08X} against {:?}", address, input);
    let report = verify_data(manager, address, &expected)?;
    if !report.passed() {
        return Err("Verification failed".into());
    }

    println!("Verification passed!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_identical() {
        let report = compare(0x1000, &[1, 2, 3], &[1, 2, 3]);
        assert!(report.passed());
        assert_eq!(report.first_mismatch, None);
        assert_eq!(report.expected_checksum, 6);
        assert_eq!(report.actual_checksum, 6);
    }

    #[test]
    fn test_compare_reports_first_mismatch() {
        let report = compare(0x1000, &[1, 2, 3, 4], &[1, 9, 3, 8]);
        assert!(!report.passed());
        assert_eq!(report.first_mismatch, Some((0x1001, 2, 9)));
        assert_eq!(report.mismatch_count, 2);
        assert_eq!(report.actual_checksum, 21);
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_verify_against_file() {
        use crate::commands::test_support;

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("expected.bin");
        std::fs::write(&path, [0xA5u8; 100]).unwrap();

        let mut manager = test_support::manager();
        assert!(run_verify(&mut manager, 0x10000, &path).is_err());

        manager.write(0x10000, &[0xA5; 100]).unwrap();
        run_verify(&mut manager, 0x10000, &path).unwrap();
    }
}
