//! Flash protocol state machine
//!
//! A run walks the device through a fixed sequence and aborts on the first
//! unexpected answer:
//!
//! ```text
//! Idle -> AwaitingHandshakeAck -> Ready -> AwaitingPrepareAck
//!      -> Transferring(0..N) -> Transferred -> Done
//! ```
//!
//! Any failure moves the session to `Failed`. Nothing is retried: a header
//! that does not echo back means host and device disagree about framing, and
//! every byte sent after that point could be written to flash as garbage.
//!
//! Once the prepare-transfer command is acknowledged the run must not be
//! interrupted until the reboot command is sent. A device left between those
//! points holds a partially written image.

use crate::error::{Error, PreconditionError, Result, Step, TransportError};
use crate::frame::{self, CommandFrame, ResponseFrame, CHUNK_SIZE, REPORT_SIZE};
use crate::progress::{FlashProgress, NoProgress};
use crate::transport::FeatureReportTransport;

/// Delay before each response read, giving the device time to process
pub const DEFAULT_RESPONSE_DELAY_MS: u32 = 50;

/// Empty reads tolerated before a response read is considered timed out
pub const DEFAULT_MAX_EMPTY_READS: u32 = 20;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashConfig {
    /// Delay before every response read, in milliseconds
    pub response_delay_ms: u32,
    /// Number of empty reads retried before giving up on a response
    pub max_empty_reads: u32,
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            response_delay_ms: DEFAULT_RESPONSE_DELAY_MS,
            max_empty_reads: DEFAULT_MAX_EMPTY_READS,
        }
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashSummary {
    /// Number of chunks streamed to the device
    pub chunks: u32,
    /// Number of firmware bytes streamed to the device
    pub bytes: usize,
}

/// Explicit opt-in for [`write_code_option`]
///
/// The effect of the code option command on the device is unverified and may
/// include a full-chip erase. This token cannot be created by accident.
#[derive(Debug)]
pub struct CodeOptionConsent {
    _private: (),
}

impl CodeOptionConsent {
    /// Acknowledge that writing the code option may erase the whole chip
    pub fn i_understand_this_may_erase_the_chip() -> Self {
        Self { _private: () }
    }
}

/// Session states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    AwaitingHandshakeAck,
    Ready,
    AwaitingCodeOptionAck,
    AwaitingPrepareAck,
    Transferring { next_chunk: u32 },
    Transferred,
    Done,
    Failed,
}

/// Check the firmware image and return its chunk count
pub fn validate_image(image: &[u8]) -> core::result::Result<u32, PreconditionError> {
    let len = image.len();
    if len % CHUNK_SIZE != 0 {
        return Err(PreconditionError::ImageMisaligned { len });
    }
    u32::try_from(len / CHUNK_SIZE).map_err(|_| PreconditionError::ImageTooLarge { len })
}

/// Flash `image` with the default configuration
pub fn flash<T: FeatureReportTransport + ?Sized>(
    transport: &mut T,
    image: &[u8],
) -> Result<FlashSummary> {
    flash_with(transport, image, &FlashConfig::default(), &mut NoProgress)
}

/// Flash `image`, reporting progress
///
/// Runs handshake, prepare-transfer, chunk streaming and reboot. The image is
/// validated before the first report is sent.
pub fn flash_with<T, P>(
    transport: &mut T,
    image: &[u8],
    config: &FlashConfig,
    progress: &mut P,
) -> Result<FlashSummary>
where
    T: FeatureReportTransport + ?Sized,
    P: FlashProgress + ?Sized,
{
    let chunk_count = validate_image(image)?;

    let mut session = Session::new(transport, config);
    let result = session.run(image, chunk_count, progress);
    session.finish(result)
}

/// Run only the handshake
///
/// Leaves the device in flash mode, waiting for a prepare-transfer command.
pub fn handshake<T: FeatureReportTransport + ?Sized>(
    transport: &mut T,
    config: &FlashConfig,
) -> Result<()> {
    let mut session = Session::new(transport, config);
    let result = session.handshake();
    session.finish(result)
}

/// Handshake, then write the code option words
///
/// Never part of [`flash`]. Leaves the device in flash mode without
/// rebooting it.
pub fn write_code_option<T: FeatureReportTransport + ?Sized>(
    transport: &mut T,
    words: &[u32],
    _consent: CodeOptionConsent,
    config: &FlashConfig,
) -> Result<()> {
    let frame = CommandFrame::code_option(words)?;

    let mut session = Session::new(transport, config);
    let result = session.handshake().and_then(|()| {
        log::warn!("Writing code option ({} words)", words.len());
        session.send_command(&frame, Step::WriteCodeOption)?;
        session.transition(State::AwaitingCodeOptionAck);
        session.expect_ack(&frame, Step::WriteCodeOption)?;
        session.transition(State::Ready);
        Ok(())
    });
    session.finish(result)
}

/// One pass through the state machine against a single device
struct Session<'a, T: ?Sized> {
    transport: &'a mut T,
    config: &'a FlashConfig,
    state: State,
}

impl<'a, T: FeatureReportTransport + ?Sized> Session<'a, T> {
    fn new(transport: &'a mut T, config: &'a FlashConfig) -> Self {
        Self {
            transport,
            config,
            state: State::Idle,
        }
    }

    fn transition(&mut self, next: State) {
        log::debug!("flash: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn finish<R>(&mut self, result: Result<R>) -> Result<R> {
        if let Err(e) = &result {
            log::error!("flash: aborted in state {:?}: {}", self.state, e);
            self.transition(State::Failed);
        }
        result
    }

    fn run<P: FlashProgress + ?Sized>(
        &mut self,
        image: &[u8],
        chunk_count: u32,
        progress: &mut P,
    ) -> Result<FlashSummary> {
        self.handshake()?;
        progress.handshake_ok();

        self.prepare_transfer(chunk_count)?;
        progress.transfer_started(chunk_count, image.len());

        self.transfer(image, progress)?;

        progress.rebooting();
        self.reboot()?;

        Ok(FlashSummary {
            chunks: chunk_count,
            bytes: image.len(),
        })
    }

    fn handshake(&mut self) -> Result<()> {
        log::info!("Initialize");
        let frame = CommandFrame::handshake();
        self.send_command(&frame, Step::Handshake)?;
        self.transition(State::AwaitingHandshakeAck);
        self.expect_ack(&frame, Step::Handshake)?;
        self.transition(State::Ready);
        Ok(())
    }

    fn prepare_transfer(&mut self, chunk_count: u32) -> Result<()> {
        log::info!("Prepare for flash ({} chunks)", chunk_count);
        let frame = CommandFrame::prepare_transfer(chunk_count);
        self.send_command(&frame, Step::PrepareTransfer)?;
        self.transition(State::AwaitingPrepareAck);
        self.expect_ack(&frame, Step::PrepareTransfer)?;
        self.transition(State::Transferring { next_chunk: 0 });
        Ok(())
    }

    // Chunks are not acknowledged; the chunk count sent in prepare-transfer
    // is the only bound the device has on the stream.
    fn transfer<P: FlashProgress + ?Sized>(
        &mut self,
        image: &[u8],
        progress: &mut P,
    ) -> Result<()> {
        for (index, chunk) in frame::chunks(image) {
            if let State::Transferring { next_chunk } = self.state {
                debug_assert_eq!(next_chunk, index);
            }
            self.transport
                .send_feature_report(chunk)
                .map_err(|source| Error::Transport {
                    step: Step::Chunk { index },
                    source,
                })?;
            log::trace!("flash: chunk {} sent", index);

            let next_chunk = index + 1;
            self.state = State::Transferring { next_chunk };
            progress.chunk_sent(index, next_chunk as usize * CHUNK_SIZE);
        }
        self.transition(State::Transferred);
        Ok(())
    }

    // The device may drop off the bus as soon as it starts rebooting, so no
    // response is read.
    fn reboot(&mut self) -> Result<()> {
        log::info!("Reboot");
        self.send_command(&CommandFrame::reboot(), Step::Reboot)?;
        self.transition(State::Done);
        Ok(())
    }

    fn send_command(&mut self, frame: &CommandFrame, step: Step) -> Result<()> {
        log::debug!("flash: sending {:?}", frame);
        self.transport
            .send_feature_report(frame.as_bytes())
            .map_err(|source| Error::Transport { step, source })
    }

    fn expect_ack(&mut self, frame: &CommandFrame, step: Step) -> Result<()> {
        let rsp = self.read_response(step)?;
        log::debug!(
            "flash: {} response header 0x{:08X} status 0x{:08X}",
            step,
            rsp.header,
            rsp.status
        );

        if !rsp.is_accepted_for(frame.header()) {
            return Err(Error::ProtocolMismatch {
                step,
                expected_header: frame.header(),
                actual_header: rsp.header,
                actual_status: rsp.status,
            });
        }
        Ok(())
    }

    /// Delay, read, and retry while the device returns nothing
    fn read_response(&mut self, step: Step) -> Result<ResponseFrame> {
        let mut buf = [0u8; REPORT_SIZE];
        let mut empty_reads = 0u32;

        loop {
            self.transport.delay_ms(self.config.response_delay_ms);

            let len = self
                .transport
                .receive_feature_report(&mut buf)
                .map_err(|source| Error::Transport { step, source })?;

            if len > 0 {
                return ResponseFrame::parse(&buf[..len.min(REPORT_SIZE)])
                    .ok_or(Error::ShortResponse { step, len });
            }

            empty_reads += 1;
            if empty_reads > self.config.max_empty_reads {
                log::warn!("flash: no {} response after {} reads", step, empty_reads);
                return Err(Error::Transport {
                    step,
                    source: TransportError::Timeout,
                });
            }
            log::trace!("flash: empty {} response, retrying", step);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Opcode, STATUS_ACCEPTED};
    use std::collections::VecDeque;

    /// Transport that replays scripted responses and records everything
    #[derive(Default)]
    struct ScriptedTransport {
        responses: VecDeque<Vec<u8>>,
        sent: Vec<[u8; REPORT_SIZE]>,
        fail_send_at: Option<(usize, TransportError)>,
        receive_calls: usize,
        delays: Vec<u32>,
    }

    impl ScriptedTransport {
        fn accepting() -> Self {
            let mut t = Self::default();
            t.push_response(0x55AA01, STATUS_ACCEPTED);
            t.push_response(0x55AA05, STATUS_ACCEPTED);
            t
        }

        fn push_response(&mut self, header: u32, status: u32) {
            let rsp = ResponseFrame { header, status };
            self.responses.push_back(rsp.to_bytes().to_vec());
        }

        fn calls(&self) -> usize {
            self.sent.len() + self.receive_calls
        }
    }

    impl FeatureReportTransport for ScriptedTransport {
        fn send_feature_report(
            &mut self,
            report: &[u8; REPORT_SIZE],
        ) -> core::result::Result<(), TransportError> {
            if let Some((at, err)) = self.fail_send_at {
                if self.sent.len() == at {
                    return Err(err);
                }
            }
            self.sent.push(*report);
            Ok(())
        }

        fn receive_feature_report(
            &mut self,
            buf: &mut [u8; REPORT_SIZE],
        ) -> core::result::Result<usize, TransportError> {
            self.receive_calls += 1;
            match self.responses.pop_front() {
                Some(rsp) => {
                    buf[..rsp.len()].copy_from_slice(&rsp);
                    Ok(rsp.len())
                }
                None => Err(TransportError::Timeout),
            }
        }

        fn delay_ms(&mut self, ms: u32) {
            self.delays.push(ms);
        }
    }

    fn image(chunks: usize) -> Vec<u8> {
        (0..chunks * CHUNK_SIZE).map(|i| (i * 7) as u8).collect()
    }

    #[test]
    fn test_full_flash_sequence() {
        let mut t = ScriptedTransport::accepting();
        let image = image(3);

        let summary = flash(&mut t, &image).unwrap();
        assert_eq!(summary, FlashSummary { chunks: 3, bytes: 192 });

        // handshake, prepare, 3 chunks, reboot
        assert_eq!(t.sent.len(), 6);
        assert_eq!(t.sent[0], *CommandFrame::handshake().as_bytes());
        assert_eq!(t.sent[1], *CommandFrame::prepare_transfer(3).as_bytes());
        for i in 0..3 {
            assert_eq!(&t.sent[2 + i][..], &image[i * 64..(i + 1) * 64]);
        }
        assert_eq!(t.sent[5], *CommandFrame::reboot().as_bytes());

        // one read per acknowledged command, each preceded by the delay
        assert_eq!(t.receive_calls, 2);
        assert_eq!(t.delays, vec![DEFAULT_RESPONSE_DELAY_MS; 2]);
    }

    #[test]
    fn test_misaligned_image_touches_nothing() {
        let mut t = ScriptedTransport::accepting();
        let err = flash(&mut t, &[0u8; 65]).unwrap_err();
        assert_eq!(
            err,
            Error::Precondition(PreconditionError::ImageMisaligned { len: 65 })
        );
        assert_eq!(t.calls(), 0);
    }

    #[test]
    fn test_empty_image_sends_zero_chunks() {
        let mut t = ScriptedTransport::accepting();
        let summary = flash(&mut t, &[]).unwrap();
        assert_eq!(summary, FlashSummary { chunks: 0, bytes: 0 });

        // handshake, prepare(0, 0), reboot
        assert_eq!(t.sent.len(), 3);
        assert_eq!(t.sent[0], *CommandFrame::handshake().as_bytes());
        assert_eq!(t.sent[1], *CommandFrame::prepare_transfer(0).as_bytes());
        assert_eq!(t.sent[2], *CommandFrame::reboot().as_bytes());
        assert_eq!(t.receive_calls, 2);
    }

    #[test]
    fn test_handshake_bad_status_stops_before_prepare() {
        let mut t = ScriptedTransport::default();
        t.push_response(0x55AA01, 0x0000_0001);

        let err = flash(&mut t, &image(2)).unwrap_err();
        assert_eq!(
            err,
            Error::ProtocolMismatch {
                step: Step::Handshake,
                expected_header: 0x55AA01,
                actual_header: 0x55AA01,
                actual_status: 0x0000_0001,
            }
        );
        assert_eq!(t.sent.len(), 1);
    }

    #[test]
    fn test_handshake_bad_header_stops_before_prepare() {
        let mut t = ScriptedTransport::default();
        t.push_response(0x55AA05, STATUS_ACCEPTED);

        let err = flash(&mut t, &image(1)).unwrap_err();
        assert!(matches!(
            err,
            Error::ProtocolMismatch {
                step: Step::Handshake,
                actual_header: 0x55AA05,
                ..
            }
        ));
        assert_eq!(t.sent.len(), 1);
    }

    #[test]
    fn test_prepare_rejected_sends_no_chunks() {
        let mut t = ScriptedTransport::default();
        t.push_response(0x55AA01, STATUS_ACCEPTED);
        t.push_response(0x55AA05, 0xDEAD_BEEF);

        let err = flash(&mut t, &image(4)).unwrap_err();
        assert_eq!(err.step(), Some(Step::PrepareTransfer));
        assert_eq!(t.sent.len(), 2);
    }

    #[test]
    fn test_chunk_send_failure_skips_reboot() {
        let mut t = ScriptedTransport::accepting();
        // handshake=0, prepare=1, chunk0=2, chunk1=3
        t.fail_send_at = Some((3, TransportError::Disconnected));

        let err = flash(&mut t, &image(2)).unwrap_err();
        assert_eq!(
            err,
            Error::Transport {
                step: Step::Chunk { index: 1 },
                source: TransportError::Disconnected,
            }
        );
        assert_eq!(t.sent.len(), 3);
        let reboot = *CommandFrame::reboot().as_bytes();
        assert!(t.sent.iter().all(|r| *r != reboot));
    }

    #[test]
    fn test_empty_reads_are_retried() {
        let mut t = ScriptedTransport::default();
        t.responses.push_back(Vec::new());
        t.responses.push_back(Vec::new());
        t.push_response(0x55AA01, STATUS_ACCEPTED);

        let config = FlashConfig {
            response_delay_ms: 5,
            max_empty_reads: 2,
        };
        handshake(&mut t, &config).unwrap();
        assert_eq!(t.receive_calls, 3);
        assert_eq!(t.delays, vec![5, 5, 5]);
    }

    #[test]
    fn test_empty_reads_exhausted() {
        let mut t = ScriptedTransport::default();
        for _ in 0..3 {
            t.responses.push_back(Vec::new());
        }

        let config = FlashConfig {
            response_delay_ms: 0,
            max_empty_reads: 2,
        };
        let err = handshake(&mut t, &config).unwrap_err();
        assert_eq!(
            err,
            Error::Transport {
                step: Step::Handshake,
                source: TransportError::Timeout,
            }
        );
        assert_eq!(t.receive_calls, 3);
    }

    #[test]
    fn test_short_response() {
        let mut t = ScriptedTransport::default();
        t.responses.push_back(vec![0x01, 0xAA, 0x55, 0x00, 0xFA]);

        let err = handshake(&mut t, &FlashConfig::default()).unwrap_err();
        assert_eq!(
            err,
            Error::ShortResponse {
                step: Step::Handshake,
                len: 5,
            }
        );
    }

    #[test]
    fn test_receive_failure_is_transport_error() {
        let mut t = ScriptedTransport::default();
        let err = flash(&mut t, &image(1)).unwrap_err();
        assert_eq!(
            err,
            Error::Transport {
                step: Step::Handshake,
                source: TransportError::Timeout,
            }
        );
    }

    #[test]
    fn test_code_option() {
        let mut t = ScriptedTransport::default();
        t.push_response(0x55AA01, STATUS_ACCEPTED);
        t.push_response(0x55AA03, STATUS_ACCEPTED);

        let consent = CodeOptionConsent::i_understand_this_may_erase_the_chip();
        write_code_option(&mut t, &[0x1234_5678, 0], consent, &FlashConfig::default()).unwrap();

        assert_eq!(t.sent.len(), 2);
        assert_eq!(&t.sent[1][0..4], &[0x03, 0xAA, 0x55, 0x00]);
        assert_eq!(&t.sent[1][4..8], &[0x78, 0x56, 0x34, 0x12]);
    }

    #[test]
    fn test_code_option_too_long_touches_nothing() {
        let mut t = ScriptedTransport::accepting();
        let consent = CodeOptionConsent::i_understand_this_may_erase_the_chip();
        let err =
            write_code_option(&mut t, &[0u32; 16], consent, &FlashConfig::default()).unwrap_err();
        assert_eq!(
            err,
            Error::Precondition(PreconditionError::FrameTooLong { len: 68 })
        );
        assert_eq!(t.calls(), 0);
    }

    #[test]
    fn test_flash_never_writes_code_option() {
        let mut t = ScriptedTransport::accepting();
        flash(&mut t, &image(2)).unwrap();
        let commands = [0, 1, t.sent.len() - 1];
        for i in commands {
            let header = frame::read_u32_le(&t.sent[i], 0).unwrap();
            assert_ne!(Opcode::from_header(header), Some(Opcode::WriteCodeOption));
        }
    }

    #[test]
    fn test_progress_events() {
        #[derive(Default)]
        struct Recorder {
            handshake: bool,
            started: Option<(u32, usize)>,
            sent: Vec<(u32, usize)>,
            rebooting: bool,
        }

        impl FlashProgress for Recorder {
            fn handshake_ok(&mut self) {
                self.handshake = true;
            }
            fn transfer_started(&mut self, total_chunks: u32, total_bytes: usize) {
                self.started = Some((total_chunks, total_bytes));
            }
            fn chunk_sent(&mut self, index: u32, bytes_sent: usize) {
                self.sent.push((index, bytes_sent));
            }
            fn rebooting(&mut self) {
                self.rebooting = true;
            }
        }

        let mut t = ScriptedTransport::accepting();
        let mut rec = Recorder::default();
        flash_with(&mut t, &image(2), &FlashConfig::default(), &mut rec).unwrap();

        assert!(rec.handshake);
        assert_eq!(rec.started, Some((2, 128)));
        assert_eq!(rec.sent, vec![(0, 64), (1, 128)]);
        assert!(rec.rebooting);
    }

    #[test]
    fn test_validate_image() {
        assert_eq!(validate_image(&[0u8; 128]), Ok(2));
        assert_eq!(validate_image(&[]), Ok(0));
        assert_eq!(
            validate_image(&[0u8; 100]),
            Err(PreconditionError::ImageMisaligned { len: 100 })
        );
    }
}
