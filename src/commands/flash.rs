//! Flash command implementation

use indicatif::{ProgressBar, ProgressStyle};
use hidflash_core::{flash_with, validate_image, FlashProgress};
use std::path::Path;

use super::{flash_config, open_device, CommandError};
use crate::cli::DeviceArgs;

/// Progress reporter using an indicatif progress bar
struct IndicatifProgress {
    bar: Option<ProgressBar>,
}

impl IndicatifProgress {
    fn new() -> Self {
        Self { bar: None }
    }

    fn finish(&mut self, message: &str) {
        if let Some(pb) = self.bar.take() {
            pb.finish_with_message(message.to_string());
        }
    }

    fn abandon(&mut self) {
        if let Some(pb) = self.bar.take() {
            pb.abandon_with_message("Transfer interrupted!");
        }
    }
}

impl FlashProgress for IndicatifProgress {
    fn handshake_ok(&mut self) {
        println!("Handshake accepted");
    }

    fn transfer_started(&mut self, total_chunks: u32, total_bytes: usize) {
        log::debug!("Streaming {} chunks", total_chunks);
        let pb = ProgressBar::new(total_bytes as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message("Flashing");
        self.bar = Some(pb);
    }

    fn chunk_sent(&mut self, _index: u32, bytes_sent: usize) {
        if let Some(pb) = &self.bar {
            pb.set_position(bytes_sent as u64);
        }
    }

    fn rebooting(&mut self) {
        self.finish("Transfer complete");
    }
}

/// Read the firmware file and check its size
fn load_firmware(input: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let image = std::fs::read(input).map_err(|source| CommandError::ReadFirmware {
        path: input.to_path_buf(),
        source,
    })?;
    println!("Read {} bytes from {:?}", image.len(), input);

    let chunks = validate_image(&image)?;
    log::info!("Firmware is {} chunks", chunks);
    Ok(image)
}

/// Run the flash command
pub fn run_flash(input: &Path, device: &DeviceArgs) -> Result<(), Box<dyn std::error::Error>> {
    // Reject bad images before touching the device
    let image = load_firmware(input)?;

    let mut dev = open_device(device)?;
    let mut progress = IndicatifProgress::new();

    match flash_with(&mut dev, &image, &flash_config(device), &mut progress) {
        Ok(summary) => {
            println!(
                "Flashed {} bytes ({} chunks), device is rebooting",
                summary.bytes, summary.chunks
            );
            Ok(())
        }
        Err(e) => {
            progress.abandon();
            if let Some(step) = e.step() {
                eprintln!("Flashing failed at {}", step);
            }
            Err(Box::new(e))
        }
    }
}
