//! Error types for hidflash-core
//!
//! This module provides no_std compatible error types. Every error is
//! terminal for a flash run; the engine never retries or re-handshakes.

use core::fmt;

use crate::frame::{REPORT_SIZE, STATUS_ACCEPTED};

/// Protocol step an error is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Handshake command and its acknowledgement
    Handshake,
    /// Code option write and its acknowledgement
    WriteCodeOption,
    /// Prepare-transfer command and its acknowledgement
    PrepareTransfer,
    /// Raw firmware chunk
    Chunk {
        /// Zero-based chunk index
        index: u32,
    },
    /// Reboot command
    Reboot,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handshake => write!(f, "handshake"),
            Self::WriteCodeOption => write!(f, "code option write"),
            Self::PrepareTransfer => write!(f, "prepare transfer"),
            Self::Chunk { index } => write!(f, "chunk {}", index),
            Self::Reboot => write!(f, "reboot"),
        }
    }
}

/// Input rejected before any device I/O
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreconditionError {
    /// Firmware length is not a multiple of the chunk size
    ImageMisaligned {
        /// Image length in bytes
        len: usize,
    },
    /// Chunk count does not fit in the 32-bit prepare-transfer argument
    ImageTooLarge {
        /// Image length in bytes
        len: usize,
    },
    /// Command header and arguments would not fit in one report
    FrameTooLong {
        /// Encoded length in bytes
        len: usize,
    },
}

impl fmt::Display for PreconditionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImageMisaligned { len } => write!(
                f,
                "firmware size {} is not divisible by {}",
                len, REPORT_SIZE
            ),
            Self::ImageTooLarge { len } => {
                write!(f, "firmware size {} exceeds the protocol chunk count", len)
            }
            Self::FrameTooLong { len } => write!(
                f,
                "command frame of {} bytes exceeds the {}-byte report",
                len, REPORT_SIZE
            ),
        }
    }
}

/// Failure reported by a transport implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// Device went away
    Disconnected,
    /// Transfer or read did not complete in time
    Timeout,
    /// Device stalled the request
    Stall,
    /// Any other I/O failure
    Io,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "device disconnected"),
            Self::Timeout => write!(f, "transfer timed out"),
            Self::Stall => write!(f, "request stalled by device"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Input rejected before touching the device
    Precondition(PreconditionError),
    /// Underlying send or receive failed
    Transport {
        /// Step during which the transfer failed
        step: Step,
        /// Transport failure
        source: TransportError,
    },
    /// Device answered with an unexpected header or status
    ProtocolMismatch {
        /// Step whose acknowledgement was rejected
        step: Step,
        /// Header that was sent
        expected_header: u32,
        /// Header echoed by the device
        actual_header: u32,
        /// Status returned by the device
        actual_status: u32,
    },
    /// Device answered with fewer bytes than a header and status
    ShortResponse {
        /// Step whose acknowledgement was truncated
        step: Step,
        /// Number of bytes received
        len: usize,
    },
}

impl Error {
    /// Step the error occurred at, `None` for precondition failures
    pub fn step(&self) -> Option<Step> {
        match self {
            Self::Precondition(_) => None,
            Self::Transport { step, .. }
            | Self::ProtocolMismatch { step, .. }
            | Self::ShortResponse { step, .. } => Some(*step),
        }
    }

    /// Whether the error was raised before any device I/O
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition(_))
    }
}

impl From<PreconditionError> for Error {
    fn from(e: PreconditionError) -> Self {
        Self::Precondition(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Precondition(e) => write!(f, "{}", e),
            Self::Transport { step, source } => write!(f, "{} failed: {}", step, source),
            Self::ProtocolMismatch {
                step,
                expected_header,
                actual_header,
                actual_status,
            } => write!(
                f,
                "{} rejected: got header 0x{:08X} status 0x{:08X}, expected header 0x{:08X} status 0x{:08X}",
                step, actual_header, actual_status, expected_header, STATUS_ACCEPTED
            ),
            Self::ShortResponse { step, len } => {
                write!(f, "{} response too short ({} bytes)", step, len)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PreconditionError {}

#[cfg(feature = "std")]
impl std::error::Error for TransportError {}

#[cfg(feature = "std")]
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Precondition(e) => Some(e),
            Self::Transport { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
