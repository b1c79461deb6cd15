//! hidflash-hid - USB HID feature report transport
//!
//! This crate opens a USB HID device by vendor and product ID and moves
//! 64-byte feature reports with HID class control transfers:
//!
//! - **SET_REPORT** (`bmRequestType 0x21`, `bRequest 0x09`) to send
//! - **GET_REPORT** (`bmRequestType 0xA1`, `bRequest 0x01`) to receive
//!
//! with `wValue = 0x0300 | report_id` (feature report) and `wIndex` set to
//! the HID interface number. Any kernel driver bound to the interface is
//! detached when it is claimed.
//!
//! # Example
//!
//! ```no_run
//! use hidflash_hid::{HidConfig, HidFeatureDevice};
//!
//! let mut dev = HidFeatureDevice::open(&HidConfig::new(0x0C45, 0x7040))?;
//! let summary = hidflash_core::flash(&mut dev, &[0u8; 1024])?;
//! println!("Wrote {} chunks", summary.chunks);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod device;
mod error;
mod protocol;

pub use device::{HidConfig, HidFeatureDevice};
pub use error::{HidError, Result};
