//! CLI argument parsing

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex u16, with or without a `0x` prefix
fn parse_hex_u16(s: &str) -> Result<u16, String> {
    let hex = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u16::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
}

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

#[derive(Parser)]
#[command(name = "hidflash")]
#[command(author, version, about = "Firmware updater for HID feature-report bootloaders", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Device selection and transfer options shared across commands
#[derive(Args, Debug, Clone)]
pub struct DeviceArgs {
    /// USB vendor ID (hex, e.g. 0c45)
    #[arg(long, value_parser = parse_hex_u16)]
    pub vid: u16,

    /// USB product ID (hex, e.g. 7040)
    #[arg(long, value_parser = parse_hex_u16)]
    pub pid: u16,

    /// HID interface number (default: first HID interface)
    #[arg(long)]
    pub interface: Option<u8>,

    /// Feature report ID
    #[arg(long, default_value_t = 0)]
    pub report_id: u8,

    /// Timeout for each USB transfer in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub timeout_ms: u64,

    /// Delay before reading each device response in milliseconds
    #[arg(long, default_value_t = 50)]
    pub response_delay_ms: u32,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a firmware image and reboot the device into it
    Flash {
        /// Firmware file (raw binary, size must be a multiple of 64 bytes)
        input: PathBuf,

        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Check that the device answers the bootloader handshake
    Probe {
        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Write the code option words (may erase the whole chip)
    WriteCodeOption {
        #[command(flatten)]
        device: DeviceArgs,

        /// Code option words (hex with 0x prefix, or decimal)
        #[arg(required = true, value_parser = parse_hex_u32)]
        words: Vec<u32>,

        /// Confirm that the effect of this command is unverified
        #[arg(long)]
        i_understand_this_may_erase_the_chip: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_hex_u16() {
        assert_eq!(parse_hex_u16("0x0c45"), Ok(0x0C45));
        assert_eq!(parse_hex_u16("7040"), Ok(0x7040));
        assert_eq!(parse_hex_u16("0XFFFF"), Ok(0xFFFF));
        assert!(parse_hex_u16("10000").is_err());
        assert!(parse_hex_u16("xyz").is_err());
    }

    #[test]
    fn test_parse_hex_u32() {
        assert_eq!(parse_hex_u32("0xFAFAFAFA"), Ok(0xFAFA_FAFA));
        assert_eq!(parse_hex_u32("42"), Ok(42));
        assert!(parse_hex_u32("0x").is_err());
    }

    #[test]
    fn test_flash_args() {
        let cli = Cli::try_parse_from([
            "hidflash", "-v", "flash", "fw.bin", "--vid", "0c45", "--pid", "0x7040",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Flash { input, device } => {
                assert_eq!(input, PathBuf::from("fw.bin"));
                assert_eq!(device.vid, 0x0C45);
                assert_eq!(device.pid, 0x7040);
                assert_eq!(device.interface, None);
                assert_eq!(device.response_delay_ms, 50);
            }
            _ => panic!("expected flash command"),
        }
    }

    #[test]
    fn test_code_option_requires_words() {
        let result = Cli::try_parse_from([
            "hidflash",
            "write-code-option",
            "--vid",
            "1",
            "--pid",
            "2",
        ]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from([
            "hidflash",
            "write-code-option",
            "--vid",
            "1",
            "--pid",
            "2",
            "0x10",
            "7",
        ])
        .unwrap();
        match cli.command {
            Commands::WriteCodeOption {
                words,
                i_understand_this_may_erase_the_chip,
                ..
            } => {
                assert_eq!(words, vec![0x10, 7]);
                assert!(!i_understand_this_may_erase_the_chip);
            }
            _ => panic!("expected write-code-option command"),
        }
    }
}
