//! Backend registration and dispatch
//!
//! A backend is selected with a string of the form `name` or
//! `name:option1=value1,option2=value2`.

use am5flash_core::backend::StorageBackend;

/// Information about a backend
pub struct BackendInfo {
    /// Name used in the backend string
    pub name: &'static str,
    /// Short description
    pub description: &'static str,
}

/// Get information about all backends enabled at compile time
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_backends() -> Vec<BackendInfo> {
    let mut backends = Vec::new();

    #[cfg(feature = "dummy")]
    backends.push(BackendInfo {
        name: "dummy",
        description: "In-memory flash emulator (size=<size>,sector=<size>,wp=yes|no)",
    });

    #[cfg(feature = "file")]
    backends.push(BackendInfo {
        name: "file",
        description: "Flash image file (path=<file>,sector=<size>,wp=yes|no,create=<size>)",
    });

    backends
}

/// Generate help text listing all available backends
pub fn backend_help() -> String {
    let backends = available_backends();

    if backends.is_empty() {
        return "No backends available (recompile with backend features enabled)".to_string();
    }

    let mut help = String::from("Available backends:\n");
    for b in &backends {
        help.push_str(&format!("  {:8} - {}\n", b.name, b.description));
    }
    help
}

/// Parse a backend string into name and options
///
/// Format: "name" or "name:option1=value1,option2=value2"
pub fn parse_backend_string(s: &str) -> (&str, Vec<(&str, &str)>) {
    if let Some((name, opts)) = s.split_once(':') {
        let options: Vec<_> = opts
            .split(',')
            .filter_map(|opt| opt.split_once('='))
            .collect();
        (name, options)
    } else {
        (s, Vec::new())
    }
}

/// Open the backend named by a backend string
pub fn open_backend(spec: &str) -> Result<Box<dyn StorageBackend>, Box<dyn std::error::Error>> {
    let (name, options) = parse_backend_string(spec);
    log::debug!("Opening backend '{}' with {} option(s)", name, options.len());

    match name {
        #[cfg(feature = "dummy")]
        "dummy" => open_dummy(&options),

        #[cfg(feature = "file")]
        "file" => am5flash_file::open_file_backend(&options),

        _ => Err(unknown_backend_error(name)),
    }
}

#[cfg(feature = "dummy")]
fn dummy_config(options: &[(&str, &str)]) -> Result<am5flash_dummy::DummyConfig, Box<dyn std::error::Error>> {
    use crate::cli::parse_size;

    let mut config = am5flash_dummy::DummyConfig::default();
    for (key, value) in options {
        match *key {
            "size" => config.size = parse_size(value)? as usize,
            "sector" => config.sector_size = parse_size(value)? as usize,
            "wp" => config.write_protected = parse_bool(value)?,
            _ => log::warn!("Unknown dummy option: {}={}", key, value),
        }
    }

    if config.sector_size == 0 || !config.sector_size.is_power_of_two() {
        return Err(format!("Sector size {} is not a power of 2", config.sector_size).into());
    }
    if config.size == 0 || config.size % config.sector_size != 0 {
        return Err(format!(
            "Flash size {} is not a multiple of the {} byte sector size",
            config.size, config.sector_size
        )
        .into());
    }
    Ok(config)
}

#[cfg(feature = "dummy")]
fn open_dummy(options: &[(&str, &str)]) -> Result<Box<dyn StorageBackend>, Box<dyn std::error::Error>> {
    let config = dummy_config(options)?;
    log::info!(
        "Using dummy flash ({} bytes, {} byte sectors)",
        config.size,
        config.sector_size
    );
    Ok(Box::new(am5flash_dummy::DummyFlash::new(config)))
}

#[cfg_attr(not(feature = "dummy"), allow(dead_code))]
fn parse_bool(value: &str) -> Result<bool, String> {
    match value {
        "1" | "yes" | "on" | "true" => Ok(true),
        "0" | "no" | "off" | "false" => Ok(false),
        _ => Err(format!("Invalid boolean '{}' (expected yes/no)", value)),
    }
}

fn unknown_backend_error(name: &str) -> Box<dyn std::error::Error> {
    let mut msg = format!("Unknown backend: {}\n\n", name);
    msg.push_str(&backend_help());
    msg.push_str("\nUse 'am5flash list-backends' for more details");
    msg.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backend_string() {
        let (name, options) = parse_backend_string("dummy");
        assert_eq!(name, "dummy");
        assert!(options.is_empty());

        let (name, options) = parse_backend_string("file:path=bios.bin,sector=64K");
        assert_eq!(name, "file");
        assert_eq!(options, vec![("path", "bios.bin"), ("sector", "64K")]);
    }

    #[test]
    fn test_unknown_backend() {
        let err = open_backend("spi:dev=0").err().unwrap();
        assert!(err.to_string().starts_with("Unknown backend: spi"));
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_dummy_options() {
        let config = dummy_config(&[("size", "1M"), ("sector", "4K"), ("wp", "yes")]).unwrap();
        assert_eq!(config.size, 1024 * 1024);
        assert_eq!(config.sector_size, 4096);
        assert!(config.write_protected);

        assert!(dummy_config(&[("sector", "3000")]).is_err());
        assert!(dummy_config(&[("size", "5000")]).is_err());
        assert!(dummy_config(&[("wp", "sometimes")]).is_err());
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_open_dummy() {
        let backend = open_backend("dummy:size=1M").unwrap();
        assert_eq!(backend.get_geometry(), Some((4096, 256)));
    }
}
