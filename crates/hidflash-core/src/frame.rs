//! Wire format of the bootloader protocol
//!
//! Every message is a single 64-byte HID feature report:
//!
//! | Field   | Offset | Size | Encoding                         |
//! |---------|--------|------|----------------------------------|
//! | Header  | 0      | 4    | LE u32, `COMMAND_BASE + opcode`  |
//! | Args    | 4      | 4×n  | LE u32 each, in declared order   |
//! | Padding | rest   | -    | zero                             |
//!
//! Responses echo the header in bytes 0..4 and carry a status word in bytes
//! 4..8. The remaining 56 bytes are ignored.

use core::fmt;

use crate::error::PreconditionError;

// ===========================================================================
// Protocol constants
// ===========================================================================

/// Size of every feature report exchanged with the device
pub const REPORT_SIZE: usize = 64;

/// Size of one firmware chunk (one raw report)
pub const CHUNK_SIZE: usize = REPORT_SIZE;

/// Base value of every command header
pub const COMMAND_BASE: u32 = 0x55AA00;

/// Status word returned when the device accepted a command
pub const STATUS_ACCEPTED: u32 = 0xFAFA_FAFA;

/// Size of the command header
pub const HEADER_SIZE: usize = 4;

/// Maximum number of u32 arguments after the header
pub const MAX_ARGS: usize = (REPORT_SIZE - HEADER_SIZE) / 4;

/// Number of meaningful bytes in a response (echoed header + status)
pub const RESPONSE_SIZE: usize = 8;

// ===========================================================================
// Opcodes
// ===========================================================================

/// Command opcodes (low byte of the header)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Enter flash mode
    Handshake = 0x01,
    /// Write the code option words; may trigger a mass erase
    WriteCodeOption = 0x03,
    /// Declare the number of chunks that follow
    PrepareTransfer = 0x05,
    /// Reboot into the new firmware
    Reboot = 0x07,
}

impl Opcode {
    /// Create an Opcode from a raw u8 value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Opcode::Handshake),
            0x03 => Some(Opcode::WriteCodeOption),
            0x05 => Some(Opcode::PrepareTransfer),
            0x07 => Some(Opcode::Reboot),
            _ => None,
        }
    }

    /// Decode the opcode from a full command header
    pub fn from_header(header: u32) -> Option<Self> {
        if header & !0xFF != COMMAND_BASE {
            return None;
        }
        Self::from_u8((header & 0xFF) as u8)
    }

    /// Command header carrying this opcode
    pub const fn header(self) -> u32 {
        COMMAND_BASE + self as u32
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Opcode::Handshake => write!(f, "handshake"),
            Opcode::WriteCodeOption => write!(f, "write code option"),
            Opcode::PrepareTransfer => write!(f, "prepare transfer"),
            Opcode::Reboot => write!(f, "reboot"),
        }
    }
}

// ===========================================================================
// Frames
// ===========================================================================

/// Read a little-endian u32 at `offset`, `None` if out of range
pub fn read_u32_le(buf: &[u8], offset: usize) -> Option<u32> {
    let bytes = buf.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// A command ready to be sent as one feature report
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame {
    opcode: Opcode,
    bytes: [u8; REPORT_SIZE],
}

impl CommandFrame {
    /// Encode a command with arbitrary arguments
    ///
    /// Fails with [`PreconditionError::FrameTooLong`] if the header and
    /// arguments do not fit in one report.
    pub fn new(opcode: Opcode, args: &[u32]) -> Result<Self, PreconditionError> {
        let len = HEADER_SIZE + args.len() * 4;
        if len > REPORT_SIZE {
            return Err(PreconditionError::FrameTooLong { len });
        }
        Ok(Self::encode(opcode, args))
    }

    /// Handshake command (no arguments)
    pub fn handshake() -> Self {
        Self::encode(Opcode::Handshake, &[])
    }

    /// Prepare-transfer command announcing `chunk_count` chunks
    pub fn prepare_transfer(chunk_count: u32) -> Self {
        Self::encode(Opcode::PrepareTransfer, &[0, chunk_count])
    }

    /// Code option write carrying `words`
    pub fn code_option(words: &[u32]) -> Result<Self, PreconditionError> {
        Self::new(Opcode::WriteCodeOption, words)
    }

    /// Reboot command (no arguments)
    pub fn reboot() -> Self {
        Self::encode(Opcode::Reboot, &[])
    }

    // Callers guarantee `args.len() <= MAX_ARGS`.
    fn encode(opcode: Opcode, args: &[u32]) -> Self {
        let mut bytes = [0u8; REPORT_SIZE];
        bytes[..HEADER_SIZE].copy_from_slice(&opcode.header().to_le_bytes());
        for (slot, arg) in bytes[HEADER_SIZE..].chunks_exact_mut(4).zip(args) {
            slot.copy_from_slice(&arg.to_le_bytes());
        }
        Self { opcode, bytes }
    }

    /// Opcode of this command
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Header the device is expected to echo
    pub fn header(&self) -> u32 {
        self.opcode.header()
    }

    /// Raw report bytes
    pub fn as_bytes(&self) -> &[u8; REPORT_SIZE] {
        &self.bytes
    }
}

impl fmt::Debug for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandFrame")
            .field("opcode", &self.opcode)
            .field("header", &format_args!("0x{:08X}", self.header()))
            .finish()
    }
}

/// Decoded device reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseFrame {
    /// Header echoed by the device
    pub header: u32,
    /// Status word
    pub status: u32,
}

impl ResponseFrame {
    /// Parse the leading header and status, `None` if fewer than 8 bytes
    pub fn parse(buf: &[u8]) -> Option<Self> {
        Some(Self {
            header: read_u32_le(buf, 0)?,
            status: read_u32_le(buf, 4)?,
        })
    }

    /// Reply the device sends when it accepts the command with `header`
    pub fn accepted(header: u32) -> Self {
        Self {
            header,
            status: STATUS_ACCEPTED,
        }
    }

    /// Check the reply against the header that was sent
    pub fn is_accepted_for(&self, expected_header: u32) -> bool {
        self.header == expected_header && self.status == STATUS_ACCEPTED
    }

    /// Serialize to a full report (trailing bytes zeroed)
    pub fn to_bytes(&self) -> [u8; REPORT_SIZE] {
        let mut buf = [0u8; REPORT_SIZE];
        buf[0..4].copy_from_slice(&self.header.to_le_bytes());
        buf[4..8].copy_from_slice(&self.status.to_le_bytes());
        buf
    }
}

/// Split an image into chunk reports, paired with their index
///
/// Trailing bytes that do not fill a whole chunk are skipped; images are
/// validated before they get here.
pub fn chunks(image: &[u8]) -> impl Iterator<Item = (u32, &[u8; CHUNK_SIZE])> + '_ {
    image
        .chunks_exact(CHUNK_SIZE)
        .filter_map(|chunk| <&[u8; CHUNK_SIZE]>::try_from(chunk).ok())
        .zip(0u32..)
        .map(|(chunk, index)| (index, chunk))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_encoding() {
        let frame = CommandFrame::handshake();
        let bytes = frame.as_bytes();
        assert_eq!(&bytes[..4], &[0x01, 0xAA, 0x55, 0x00]);
        assert!(bytes[4..].iter().all(|&b| b == 0));
        assert_eq!(frame.header(), 0x55AA01);
    }

    #[test]
    fn test_prepare_transfer_encoding() {
        let frame = CommandFrame::prepare_transfer(0x0102_0304);
        let bytes = frame.as_bytes();
        assert_eq!(&bytes[0..4], &[0x05, 0xAA, 0x55, 0x00]);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 0]);
        assert_eq!(&bytes[8..12], &[0x04, 0x03, 0x02, 0x01]);
        assert!(bytes[12..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_reboot_encoding() {
        let frame = CommandFrame::reboot();
        assert_eq!(&frame.as_bytes()[..4], &[0x07, 0xAA, 0x55, 0x00]);
        assert_eq!(frame.opcode(), Opcode::Reboot);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        assert_eq!(
            CommandFrame::prepare_transfer(512).as_bytes(),
            CommandFrame::prepare_transfer(512).as_bytes()
        );
        assert_eq!(CommandFrame::handshake(), CommandFrame::handshake());
    }

    #[test]
    fn test_frame_length_limit() {
        let words = [0xFFFF_FFFFu32; MAX_ARGS];
        let frame = CommandFrame::code_option(&words).unwrap();
        assert_eq!(&frame.as_bytes()[60..64], &[0xFF; 4]);

        let too_many = [0u32; MAX_ARGS + 1];
        assert_eq!(
            CommandFrame::code_option(&too_many),
            Err(PreconditionError::FrameTooLong { len: 68 })
        );
    }

    #[test]
    fn test_opcode_from_header() {
        assert_eq!(Opcode::from_header(0x55AA05), Some(Opcode::PrepareTransfer));
        assert_eq!(Opcode::from_header(0x55AA02), None);
        assert_eq!(Opcode::from_header(0x66AA01), None);
    }

    #[test]
    fn test_response_parse() {
        let mut buf = [0u8; REPORT_SIZE];
        buf[..8].copy_from_slice(&[0x01, 0xAA, 0x55, 0x00, 0xFA, 0xFA, 0xFA, 0xFA]);
        buf[8..].fill(0x5A);
        let rsp = ResponseFrame::parse(&buf).unwrap();
        assert_eq!(rsp, ResponseFrame::accepted(0x55AA01));
        assert!(rsp.is_accepted_for(0x55AA01));
        assert!(!rsp.is_accepted_for(0x55AA05));

        assert_eq!(ResponseFrame::parse(&buf[..7]), None);
    }

    #[test]
    fn test_rejected_status() {
        let rsp = ResponseFrame {
            header: 0x55AA01,
            status: 0xFAFA_FAFB,
        };
        assert!(!rsp.is_accepted_for(0x55AA01));
    }

    #[test]
    fn test_chunks() {
        let image: Vec<u8> = (0..192u32).map(|i| i as u8).collect();
        let chunks: Vec<_> = chunks(&image).collect();
        assert_eq!(chunks.len(), 3);
        for (index, chunk) in chunks {
            let start = index as usize * CHUNK_SIZE;
            assert_eq!(&chunk[..], &image[start..start + CHUNK_SIZE]);
        }
    }
}
