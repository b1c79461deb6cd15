//! Transport trait definition
//!
//! A transport moves whole 64-byte feature reports to and from the device.
//! Any device-specific framing (report IDs, control setup packets) is the
//! transport's business; the engine only ever sees report payloads.

use crate::error::TransportError;
use crate::frame::REPORT_SIZE;

/// Feature report transport
///
/// Implementations must be blocking: when a call returns, the report has
/// been handed to the device (send) or the device's answer is in the buffer
/// (receive). Timeouts are the transport's responsibility.
pub trait FeatureReportTransport {
    /// Send one feature report
    fn send_feature_report(&mut self, report: &[u8; REPORT_SIZE]) -> Result<(), TransportError>;

    /// Receive one feature report
    ///
    /// Returns the number of bytes the device provided. Zero means the
    /// device had nothing to report yet; the engine will wait and ask again.
    fn receive_feature_report(
        &mut self,
        buf: &mut [u8; REPORT_SIZE],
    ) -> Result<usize, TransportError>;

    /// Block for the specified number of milliseconds
    fn delay_ms(&mut self, ms: u32);
}
