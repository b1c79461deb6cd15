//! Progress reporting for flash runs

/// Progress callbacks invoked by the engine
///
/// All methods have empty default implementations so reporters only
/// override what they display.
pub trait FlashProgress {
    /// The device accepted the handshake
    fn handshake_ok(&mut self) {}

    /// The device accepted the transfer size, chunks are about to stream
    fn transfer_started(&mut self, _total_chunks: u32, _total_bytes: usize) {}

    /// Chunk `index` was sent; `bytes_sent` counts all chunks so far
    fn chunk_sent(&mut self, _index: u32, _bytes_sent: usize) {}

    /// All chunks were sent, reboot command is next
    fn rebooting(&mut self) {}
}

/// Progress reporter that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl FlashProgress for NoProgress {}
