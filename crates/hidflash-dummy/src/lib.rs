//! hidflash-dummy - In-memory bootloader emulator for testing
//!
//! This crate provides a dummy device that speaks the bootloader side of the
//! feature-report protocol. It's useful for testing the flash engine without
//! real hardware, including the failure modes real hardware only produces
//! occasionally (stalls, wrong echoes, empty reads, disconnects).

use hidflash_core::frame::{read_u32_le, Opcode, ResponseFrame, CHUNK_SIZE, REPORT_SIZE};
use hidflash_core::{FeatureReportTransport, TransportError};

/// Status the emulator returns for commands it does not accept
pub const STATUS_REJECTED: u32 = 0x0000_0000;

/// Configuration for the dummy bootloader
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Flash size in bytes
    pub size: usize,
    /// Return this status instead of accepting the given opcode
    pub reject: Option<(Opcode, u32)>,
    /// Echo this header instead of the one received for the given opcode
    pub echo_override: Option<(Opcode, u32)>,
    /// Fail the send with this zero-based index (counting every report)
    pub fail_send_at: Option<(usize, TransportError)>,
    /// Number of empty reads returned before each response
    pub empty_reads: usize,
    /// Truncate responses to this many bytes
    pub response_len: Option<usize>,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            size: 64 * 1024,
            reject: None,
            echo_override: None,
            fail_send_at: None,
            empty_reads: 0,
            response_len: None,
        }
    }
}

/// Bootloader state as seen from the device side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Running the application, waiting for a handshake
    Idle,
    /// Handshake accepted
    FlashMode,
    /// Prepare-transfer accepted, chunks are written as they arrive
    Receiving {
        /// Chunks announced by prepare-transfer
        expected: u32,
        /// Chunks written so far
        received: u32,
    },
    /// Reboot received, device is gone from the bus
    Rebooted,
}

/// Dummy bootloader
///
/// Emulates the device side of the protocol in memory.
pub struct DummyBootloader {
    config: DummyConfig,
    data: Vec<u8>,
    state: DeviceState,
    code_option: Option<Vec<u32>>,
    pending: Option<Vec<u8>>,
    empty_reads_left: usize,
    sent: Vec<[u8; REPORT_SIZE]>,
    receive_calls: usize,
    total_delay_ms: u64,
}

impl DummyBootloader {
    /// Create a new dummy bootloader with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let data = vec![0xFF; config.size];
        Self {
            config,
            data,
            state: DeviceState::Idle,
            code_option: None,
            pending: None,
            empty_reads_left: 0,
            sent: Vec::new(),
            receive_calls: 0,
            total_delay_ms: 0,
        }
    }

    /// Create a new dummy bootloader with default configuration
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Get a reference to the flash data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Current device state
    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Whether the reboot command was received
    pub fn is_rebooted(&self) -> bool {
        self.state == DeviceState::Rebooted
    }

    /// Code option words written by opcode 3, if any
    pub fn code_option(&self) -> Option<&[u32]> {
        self.code_option.as_deref()
    }

    /// Every report successfully sent to the device, in order
    pub fn sent_reports(&self) -> &[[u8; REPORT_SIZE]] {
        &self.sent
    }

    /// Number of receive calls made by the host
    pub fn receive_calls(&self) -> usize {
        self.receive_calls
    }

    /// Sum of all delays requested by the host
    pub fn total_delay_ms(&self) -> u64 {
        self.total_delay_ms
    }

    fn respond(&mut self, opcode: Opcode, accepted: bool) {
        let mut header = opcode.header();
        let mut status = if accepted {
            hidflash_core::frame::STATUS_ACCEPTED
        } else {
            STATUS_REJECTED
        };

        if let Some((op, value)) = self.config.reject {
            if op == opcode {
                status = value;
            }
        }
        if let Some((op, value)) = self.config.echo_override {
            if op == opcode {
                header = value;
            }
        }

        let mut rsp = ResponseFrame { header, status }.to_bytes().to_vec();
        if let Some(len) = self.config.response_len {
            rsp.truncate(len);
        }
        self.pending = Some(rsp);
        self.empty_reads_left = self.config.empty_reads;
    }

    fn handle_chunk(&mut self, report: &[u8; REPORT_SIZE], expected: u32, received: u32) {
        let offset = received as usize * CHUNK_SIZE;
        self.data[offset..offset + CHUNK_SIZE].copy_from_slice(report);

        let received = received + 1;
        log::trace!("dummy: chunk {}/{} written", received, expected);
        self.state = if received == expected {
            log::debug!("dummy: transfer complete");
            DeviceState::FlashMode
        } else {
            DeviceState::Receiving { expected, received }
        };
    }

    fn handle_command(&mut self, report: &[u8; REPORT_SIZE]) {
        let header = read_u32_le(report, 0).unwrap_or(0);
        let Some(opcode) = Opcode::from_header(header) else {
            log::debug!("dummy: ignoring unknown header 0x{:08X}", header);
            return;
        };
        let in_flash_mode = self.state == DeviceState::FlashMode;

        match opcode {
            Opcode::Handshake => {
                self.state = DeviceState::FlashMode;
                self.respond(opcode, true);
            }
            Opcode::WriteCodeOption => {
                if in_flash_mode {
                    let words = (4..REPORT_SIZE)
                        .step_by(4)
                        .filter_map(|offset| read_u32_le(report, offset))
                        .collect();
                    self.code_option = Some(words);
                }
                self.respond(opcode, in_flash_mode);
            }
            Opcode::PrepareTransfer => {
                let expected = read_u32_le(report, 8).unwrap_or(0);
                let len = (expected as usize)
                    .checked_mul(CHUNK_SIZE)
                    .filter(|&len| len <= self.data.len());
                let accepted = in_flash_mode && len.is_some();
                self.respond(opcode, accepted);
                if let Some(len) = len {
                    if accepted && self.config.reject.map(|(op, _)| op) != Some(opcode) {
                        self.data[..len].fill(0xFF);
                        // A zero-chunk transfer stays in flash mode
                        if expected > 0 {
                            self.state = DeviceState::Receiving {
                                expected,
                                received: 0,
                            };
                        }
                    }
                }
            }
            Opcode::Reboot => {
                if in_flash_mode {
                    self.state = DeviceState::Rebooted;
                }
            }
        }
    }
}

impl FeatureReportTransport for DummyBootloader {
    fn send_feature_report(&mut self, report: &[u8; REPORT_SIZE]) -> Result<(), TransportError> {
        if let Some((at, err)) = self.config.fail_send_at {
            if self.sent.len() == at {
                return Err(err);
            }
        }
        if self.state == DeviceState::Rebooted {
            return Err(TransportError::Disconnected);
        }
        self.sent.push(*report);

        match self.state {
            DeviceState::Receiving { expected, received } => {
                self.handle_chunk(report, expected, received)
            }
            _ => self.handle_command(report),
        }
        Ok(())
    }

    fn receive_feature_report(
        &mut self,
        buf: &mut [u8; REPORT_SIZE],
    ) -> Result<usize, TransportError> {
        self.receive_calls += 1;
        if self.state == DeviceState::Rebooted {
            return Err(TransportError::Disconnected);
        }
        if self.empty_reads_left > 0 {
            self.empty_reads_left -= 1;
            return Ok(0);
        }
        match self.pending.take() {
            Some(rsp) => {
                buf[..rsp.len()].copy_from_slice(&rsp);
                Ok(rsp.len())
            }
            None => Ok(0),
        }
    }

    fn delay_ms(&mut self, ms: u32) {
        // No delay needed for in-memory operations
        self.total_delay_ms += u64::from(ms);
    }
}
