//! hidflash - Firmware updater for HID feature-report bootloaders
//!
//! Streams a raw firmware image to a keyboard (or other HID device) whose
//! bootloader accepts commands and data as 64-byte feature reports.
//!
//! # Architecture
//!
//! - `hidflash-core` - protocol engine, knows nothing about USB
//! - `hidflash-hid` - opens the device and moves feature reports over USB
//! - this binary - argument parsing, file loading, progress display

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};

/// Log level selected by the `-v` count
fn log_level(verbose: u8) -> log::LevelFilter {
    match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

/// Logger for the given verbosity; `RUST_LOG` still takes precedence
fn logger(verbose: u8) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(log_level(verbose));
    builder.parse_env(env_logger::Env::default());
    builder
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    logger(cli.verbose).init();

    match cli.command {
        Commands::Flash { input, device } => commands::flash::run_flash(&input, &device),
        Commands::Probe { device } => commands::probe::run_probe(&device),
        Commands::WriteCodeOption {
            device,
            words,
            i_understand_this_may_erase_the_chip,
        } => commands::code_option::run_write_code_option(
            &device,
            &words,
            i_understand_this_may_erase_the_chip,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(log_level(0), log::LevelFilter::Info);
        assert_eq!(log_level(1), log::LevelFilter::Debug);
        assert_eq!(log_level(2), log::LevelFilter::Trace);
        assert_eq!(log_level(5), log::LevelFilter::Trace);
    }

    #[test]
    fn test_verbose_logger_passes_debug_records() {
        let logger = logger(1).build();
        let debug = log::Metadata::builder()
            .level(log::Level::Debug)
            .target("hidflash_core::engine")
            .build();
        let trace = log::Metadata::builder()
            .level(log::Level::Trace)
            .target("hidflash_core::engine")
            .build();

        if std::env::var_os("RUST_LOG").is_none() {
            assert!(log::Log::enabled(&logger, &debug));
            assert!(!log::Log::enabled(&logger, &trace));
            assert_eq!(logger.filter(), log::LevelFilter::Debug);
        }
    }
}
