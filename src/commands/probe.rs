//! Probe command implementation

use hidflash_core::handshake;

use super::{flash_config, open_device};
use crate::cli::DeviceArgs;

/// Open the device and run the bootloader handshake only
///
/// The device stays in flash mode afterwards and needs a power cycle (or a
/// full flash run) to return to its application.
pub fn run_probe(device: &DeviceArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut dev = open_device(device)?;

    match handshake(&mut dev, &flash_config(device)) {
        Ok(()) => {
            println!(
                "Device {:04x}:{:04x} accepted the bootloader handshake",
                device.vid, device.pid
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("Probe failed: {}", e);
            Err(Box::new(e))
        }
    }
}
