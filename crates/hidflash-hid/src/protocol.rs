//! USB HID class constants for feature report transfers
//!
//! Defined in the Device Class Definition for HID 1.11, section 7.2.

#![allow(dead_code)]

// ===========================================================================
// Interface class
// ===========================================================================

/// USB interface class code for HID
pub const USB_CLASS_HID: u8 = 0x03;

// ===========================================================================
// Class requests
// ===========================================================================

/// GET_REPORT class request
pub const HID_GET_REPORT: u8 = 0x01;

/// SET_REPORT class request
pub const HID_SET_REPORT: u8 = 0x09;

/// bmRequestType for SET_REPORT: host-to-device, class, interface
pub const REQUEST_TYPE_OUT: u8 = 0x21;

/// bmRequestType for GET_REPORT: device-to-host, class, interface
pub const REQUEST_TYPE_IN: u8 = 0xA1;

/// Report type carried in the high byte of wValue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReportType {
    /// Input report
    Input = 0x01,
    /// Output report
    Output = 0x02,
    /// Feature report
    Feature = 0x03,
}

// ===========================================================================
// Transfer parameters
// ===========================================================================

/// Default timeout for a single control transfer in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// wValue for a GET_REPORT/SET_REPORT request
pub fn report_value(report_type: ReportType, report_id: u8) -> u16 {
    (u16::from(report_type as u8) << 8) | u16::from(report_id)
}
