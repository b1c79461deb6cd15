//! CLI command implementations
//!
//! Every command opens the device named by [`DeviceArgs`] and drives it with
//! the protocol engine from `hidflash-core`. Inputs that can be checked
//! without the device (firmware size, confirmation flags) are checked before
//! the device is opened.

pub mod code_option;
pub mod flash;
pub mod probe;

use std::path::PathBuf;
use std::time::Duration;

use hidflash_core::FlashConfig;
use hidflash_hid::{HidConfig, HidError, HidFeatureDevice};

use crate::cli::DeviceArgs;

/// Errors raised by the CLI itself, before the engine runs
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Firmware file could not be read
    #[error("failed to read {}: {source}", path.display())]
    ReadFirmware {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Code option write requested without the confirmation flag
    #[error("refusing to write the code option without --i-understand-this-may-erase-the-chip")]
    CodeOptionNotConfirmed,
}

fn hid_config(args: &DeviceArgs) -> HidConfig {
    HidConfig {
        interface: args.interface,
        report_id: args.report_id,
        timeout: Duration::from_millis(args.timeout_ms),
        ..HidConfig::new(args.vid, args.pid)
    }
}

fn flash_config(args: &DeviceArgs) -> FlashConfig {
    FlashConfig {
        response_delay_ms: args.response_delay_ms,
        ..FlashConfig::default()
    }
}

fn open_device(args: &DeviceArgs) -> Result<HidFeatureDevice, HidError> {
    let dev = HidFeatureDevice::open(&hid_config(args))?;
    log::debug!("Using HID interface {}", dev.interface_number());
    Ok(dev)
}
