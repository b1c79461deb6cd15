//! HID feature report device implementation
//!
//! This module provides the `HidFeatureDevice` struct that opens a USB HID
//! interface and implements the `FeatureReportTransport` trait with class
//! control transfers.

use std::time::Duration;

use hidflash_core::frame::REPORT_SIZE;
use hidflash_core::{FeatureReportTransport, TransportError};
use nusb::transfer::{ControlIn, ControlOut, ControlType, Recipient};
use nusb::{Interface, MaybeFuture};

use crate::error::{self, transport_error, HidError};
use crate::protocol::*;

/// Configuration options for opening a HID device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HidConfig {
    /// USB vendor ID
    pub vid: u16,
    /// USB product ID
    pub pid: u16,
    /// Interface number (None = first HID-class interface)
    pub interface: Option<u8>,
    /// Feature report ID (0 = device does not use report IDs)
    pub report_id: u8,
    /// Timeout for each control transfer
    pub timeout: Duration,
}

impl HidConfig {
    /// Configuration for the device with the given IDs and default options
    pub fn new(vid: u16, pid: u16) -> Self {
        Self {
            vid,
            pid,
            interface: None,
            report_id: 0,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

/// HID device exchanging 64-byte feature reports
pub struct HidFeatureDevice {
    /// Claimed HID interface
    interface: Interface,
    /// Interface number (wIndex of every request)
    interface_num: u8,
    /// wValue of every request
    report_value: u16,
    /// Per-transfer timeout
    timeout: Duration,
}

impl HidFeatureDevice {
    /// Open the first device matching the configured VID/PID
    pub fn open(config: &HidConfig) -> error::Result<Self> {
        let device_info = nusb::list_devices()
            .wait()
            .map_err(|e| HidError::OpenFailed(e.to_string()))?
            .find(|d| d.vendor_id() == config.vid && d.product_id() == config.pid)
            .ok_or(HidError::DeviceNotFound {
                vid: config.vid,
                pid: config.pid,
            })?;

        let interface_num = match config.interface {
            Some(num) => num,
            None => device_info
                .interfaces()
                .find(|iface| iface.class() == USB_CLASS_HID)
                .map(|iface| iface.interface_number())
                .ok_or(HidError::NoHidInterface {
                    vid: config.vid,
                    pid: config.pid,
                })?,
        };

        log::info!(
            "Opening {:04x}:{:04x} at bus {} address {} (interface {})",
            config.vid,
            config.pid,
            device_info.bus_id(),
            device_info.device_address(),
            interface_num
        );

        let device = device_info
            .open()
            .wait()
            .map_err(|e| HidError::OpenFailed(e.to_string()))?;

        let interface = device
            .detach_and_claim_interface(interface_num)
            .wait()
            .map_err(|e| HidError::ClaimFailed {
                interface: interface_num,
                message: e.to_string(),
            })?;

        Ok(Self {
            interface,
            interface_num,
            report_value: report_value(ReportType::Feature, config.report_id),
            timeout: config.timeout,
        })
    }

    /// Interface number in use
    pub fn interface_number(&self) -> u8 {
        self.interface_num
    }
}

impl FeatureReportTransport for HidFeatureDevice {
    fn send_feature_report(&mut self, report: &[u8; REPORT_SIZE]) -> Result<(), TransportError> {
        self.interface
            .control_out(
                ControlOut {
                    control_type: ControlType::Class,
                    recipient: Recipient::Interface,
                    request: HID_SET_REPORT,
                    value: self.report_value,
                    index: u16::from(self.interface_num),
                    data: report,
                },
                self.timeout,
            )
            .wait()
            .map_err(|e| {
                log::error!("SET_REPORT failed: {}", e);
                transport_error(&e)
            })?;

        log::trace!("SET_REPORT {} bytes", report.len());
        Ok(())
    }

    fn receive_feature_report(
        &mut self,
        buf: &mut [u8; REPORT_SIZE],
    ) -> Result<usize, TransportError> {
        let data = self
            .interface
            .control_in(
                ControlIn {
                    control_type: ControlType::Class,
                    recipient: Recipient::Interface,
                    request: HID_GET_REPORT,
                    value: self.report_value,
                    index: u16::from(self.interface_num),
                    length: REPORT_SIZE as u16,
                },
                self.timeout,
            )
            .wait()
            .map_err(|e| {
                log::error!("GET_REPORT failed: {}", e);
                transport_error(&e)
            })?;

        let len = data.len().min(REPORT_SIZE);
        buf[..len].copy_from_slice(&data[..len]);
        log::trace!("GET_REPORT {} bytes", len);
        Ok(len)
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}
