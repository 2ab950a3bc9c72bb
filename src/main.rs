//! am5flash - Flash region manager for AMD AM5 firmware updates
//!
//! Debug front end for the region manager. Every command opens a storage
//! backend, initializes a [`FlashManager`] over it (detecting the device and
//! building the region table), runs, and cleans the manager up again.
//!
//! Region policy is enforced by the manager exactly as it is in firmware:
//! reads go anywhere on the device, writes and erases are checked against
//! the write-protected and non-erasable regions.

mod backends;
mod cli;
mod commands;

use am5flash_core::backend::StorageBackend;
use am5flash_core::region::overlays_from_toml_file;
use am5flash_core::{FlashManager, ManagerConfig};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    if let Commands::ListBackends = cli.command {
        commands::list_backends();
        return Ok(());
    }

    let config = load_config(cli.overlay.as_deref())?;
    let backend = backends::open_backend(&cli.backend)?;
    let mut manager = FlashManager::with_config(backend, config);
    manager.init()?;

    let result = run_command(&mut manager, cli.command);

    if let Err(e) = manager.cleanup() {
        log::warn!("Cleanup failed: {}", e);
    }
    result
}

/// Build the manager configuration, loading overlay regions if given
fn load_config(overlay: Option<&Path>) -> Result<ManagerConfig, Box<dyn std::error::Error>> {
    let mut config = ManagerConfig::default();
    if let Some(path) = overlay {
        let regions = overlays_from_toml_file(path)?;
        log::info!("Loaded {} overlay region(s) from {:?}", regions.len(), path);
        for region in regions {
            config.add_overlay(region)?;
        }
    }
    Ok(config)
}

fn run_command<B: StorageBackend>(
    manager: &mut FlashManager<B>,
    command: Commands,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Info => commands::info::cmd_info(manager),
        Commands::Status => commands::info::cmd_status(manager),
        Commands::Regions => commands::info::cmd_regions(manager),
        Commands::Read {
            address,
            size,
            output,
        } => commands::read::run_read(manager, address, size, &output),
        Commands::Write {
            address,
            input,
            erase,
            verify,
        } => commands::write::run_write(manager, address, &input, erase, verify),
        Commands::Erase { address, size } => commands::erase::run_erase(manager, address, size),
        Commands::Verify { address, input } => {
            commands::verify::run_verify(manager, address, &input)
        }
        Commands::Backup { output } => commands::read::run_backup(manager, &output),
        Commands::Restore { input, verify } => {
            commands::write::run_restore(manager, &input, verify)
        }
        Commands::ListBackends => {
            commands::list_backends();
            Ok(())
        }
    }
}
