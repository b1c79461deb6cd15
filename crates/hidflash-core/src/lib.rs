//! hidflash-core - Flash protocol engine for HID feature-report bootloaders
//!
//! This crate implements the command/response protocol spoken by keyboard
//! bootloaders that accept firmware over 64-byte HID feature reports. It is
//! designed to be `no_std` compatible and never allocates: the firmware image
//! is borrowed for the duration of a run and every frame lives on the stack.
//!
//! The engine talks to the device through the [`FeatureReportTransport`]
//! trait. Opening the device, detaching kernel drivers and reading the
//! firmware file are left to the caller.
//!
//! # Features
//!
//! - `std` - Implement `std::error::Error` for the error types
//!
//! # Protocol Overview
//!
//! ```text
//! host                                   device
//!  |  handshake (0x55AA01)          ----->  |
//!  |  <-----  0x55AA01, 0xFAFAFAFA          |
//!  |  prepare (0x55AA05, 0, chunks) ----->  |
//!  |  <-----  0x55AA05, 0xFAFAFAFA          |
//!  |  chunk 0 (64 raw bytes)        ----->  |
//!  |  ...                                   |
//!  |  chunk N-1                     ----->  |
//!  |  reboot (0x55AA07)             ----->  |
//! ```
//!
//! Chunks are not acknowledged and the device may disconnect as soon as it
//! receives the reboot command, so no response is read for either.
//!
//! # Example
//!
//! ```ignore
//! use hidflash_core::flash;
//!
//! fn update<T: hidflash_core::FeatureReportTransport>(dev: &mut T, image: &[u8]) {
//!     match flash(dev, image) {
//!         Ok(summary) => println!("Wrote {} chunks", summary.chunks),
//!         Err(e) => println!("Flashing failed: {}", e),
//!     }
//! }
//! ```

#![cfg_attr(not(any(feature = "std", test)), no_std)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod engine;
pub mod error;
pub mod frame;
pub mod progress;
pub mod transport;

pub use engine::{
    flash, flash_with, handshake, validate_image, write_code_option, CodeOptionConsent,
    FlashConfig, FlashSummary,
};
pub use error::{Error, PreconditionError, Result, Step, TransportError};
pub use frame::{CommandFrame, Opcode, ResponseFrame, CHUNK_SIZE, REPORT_SIZE};
pub use progress::{FlashProgress, NoProgress};
pub use transport::FeatureReportTransport;
