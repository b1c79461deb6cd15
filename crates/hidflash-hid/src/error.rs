//! Error types for the HID transport

use hidflash_core::TransportError;
use nusb::transfer::TransferError;
use thiserror::Error;

/// Errors that can occur while opening the HID device
#[derive(Debug, Error)]
pub enum HidError {
    /// No device with the requested VID/PID is connected
    #[error("device {vid:04x}:{pid:04x} not found")]
    DeviceNotFound { vid: u16, pid: u16 },

    /// Device has no interface of the HID class
    #[error("device {vid:04x}:{pid:04x} has no HID interface")]
    NoHidInterface { vid: u16, pid: u16 },

    /// Enumerating or opening the device failed
    #[error("failed to open device: {0}")]
    OpenFailed(String),

    /// Detaching the kernel driver or claiming the interface failed
    #[error("failed to claim interface {interface}: {message}")]
    ClaimFailed { interface: u8, message: String },
}

/// Result type for HID transport operations
pub type Result<T> = std::result::Result<T, HidError>;

/// Collapse a USB transfer error into the engine's transport error
///
/// Control transfers that hit their timeout are cancelled by nusb, so a
/// cancellation is reported as a timeout.
pub(crate) fn transport_error(e: &TransferError) -> TransportError {
    match e {
        TransferError::Stall => TransportError::Stall,
        TransferError::Disconnected => TransportError::Disconnected,
        TransferError::Cancelled => TransportError::Timeout,
        _ => TransportError::Io,
    }
}
