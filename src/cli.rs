//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
pub fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a size such as `4096`, `0x1000`, `64K`, `64KiB`, `16M` or `16MiB`
pub fn parse_size(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if let Ok(n) = parse_hex_u32(s) {
        return Ok(n);
    }

    let upper = s.to_ascii_uppercase();
    let (num, multiplier) = if let Some(n) = upper
        .strip_suffix("MIB")
        .or_else(|| upper.strip_suffix("MB"))
        .or_else(|| upper.strip_suffix('M'))
    {
        (n, 1024 * 1024)
    } else if let Some(n) = upper
        .strip_suffix("KIB")
        .or_else(|| upper.strip_suffix("KB"))
        .or_else(|| upper.strip_suffix('K'))
    {
        (n, 1024)
    } else {
        return Err(format!("Invalid size: {}", s));
    };

    let num: u32 = num
        .trim()
        .parse()
        .map_err(|_| format!("Invalid size: {}", s))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("Size too large: {}", s))
}

const BACKEND_HELP: &str = "Storage backend: dummy[:size=..,sector=..,wp=yes] \
    or file:path=<image>[,sector=..,wp=yes,create=<size>]";

#[derive(Parser)]
#[command(name = "am5flash")]
#[command(author, version, about = "AM5 firmware flash region manager", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short, long, global = true, default_value = "dummy", help = BACKEND_HELP)]
    pub backend: String,

    /// Overlay regions file (TOML format)
    #[arg(long, global = true)]
    pub overlay: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show flash device information
    Info,

    /// Show device information and the region table
    Status,

    /// Show the region table
    Regions,

    /// Read a range of flash to a file
    Read {
        /// Start address (hex or decimal)
        #[arg(short, long, value_parser = parse_hex_u32)]
        address: u32,

        /// Number of bytes to read (e.g. 4096, 0x1000, 64K)
        #[arg(short, long, value_parser = parse_size)]
        size: u32,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write a file to flash
    Write {
        /// Start address (hex or decimal)
        #[arg(short, long, value_parser = parse_hex_u32)]
        address: u32,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Erase the touched sectors before writing
        #[arg(long)]
        erase: bool,

        /// Verify after writing
        #[arg(long)]
        verify: bool,
    },

    /// Erase the sectors covering a range
    Erase {
        /// Start address (hex or decimal)
        #[arg(short, long, value_parser = parse_hex_u32)]
        address: u32,

        /// Number of bytes to erase (defaults to one sector)
        #[arg(short, long, value_parser = parse_size)]
        size: Option<u32>,
    },

    /// Verify flash contents against a file
    Verify {
        /// Start address (hex or decimal)
        #[arg(short, long, value_parser = parse_hex_u32, default_value = "0")]
        address: u32,

        /// Input file path to verify against
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Read the whole device to a file
    Backup {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write a full image back, skipping protected regions
    Restore {
        /// Input file path (must match the device size)
        #[arg(short, long)]
        input: PathBuf,

        /// Verify after writing
        #[arg(long)]
        verify: bool,
    },

    /// List supported backends
    ListBackends,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_parse_hex_u32() {
        assert_eq!(parse_hex_u32("0x10000"), Ok(0x10000));
        assert_eq!(parse_hex_u32("0XFF"), Ok(0xFF));
        assert_eq!(parse_hex_u32("4096"), Ok(4096));
        assert!(parse_hex_u32("0x").is_err());
        assert!(parse_hex_u32("0x1_0000_0000").is_err());
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("4096"), Ok(4096));
        assert_eq!(parse_size("0x1000"), Ok(4096));
        assert_eq!(parse_size("64K"), Ok(65536));
        assert_eq!(parse_size("64k"), Ok(65536));
        assert_eq!(parse_size("64KiB"), Ok(65536));
        assert_eq!(parse_size("16M"), Ok(16 * 1024 * 1024));
        assert_eq!(parse_size("16 MiB"), Ok(16 * 1024 * 1024));
        assert!(parse_size("4096M").is_err());
        assert!(parse_size("K").is_err());
        assert!(parse_size("ten").is_err());
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_write_command() {
        let cli = Cli::try_parse_from([
            "am5flash", "-b", "file:path=bios.bin", "write", "-a", "0x10000", "-i", "fw.bin", "--verify",
        ])
        .unwrap();
        assert_eq!(cli.backend, "file:path=bios.bin");
        match cli.command {
            Commands::Write {
                address,
                input,
                erase,
                verify,
            } => {
                assert_eq!(address, 0x10000);
                assert_eq!(input, PathBuf::from("fw.bin"));
                assert!(!erase);
                assert!(verify);
            }
            _ => panic!("expected write command"),
        }
    }

    #[test]
    fn test_default_backend() {
        let cli = Cli::try_parse_from(["am5flash", "status"]).unwrap();
        assert_eq!(cli.backend, "dummy");
        assert!(cli.overlay.is_none());
    }
}
