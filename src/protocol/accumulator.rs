//! Frame accumulator
//!
//! Turns an arbitrary sequence of received chunks into one complete frame.
//! The header is checked as soon as its three bytes are present, so a
//! desynchronised stream is detected after 3 bytes instead of 625.

use tracing::trace;

use super::format::{FRAME_SIZE, HEADER, HEADER_OFFSET};
use crate::FrameError;

/// Fixed-capacity frame buffer plus a received-bytes cursor.
///
/// Bytes past the cursor are stale and never interpreted. The buffer is
/// allocated once and reused for every frame of a connection.
pub struct FrameAccumulator {
    buffer: Box<[u8; FRAME_SIZE]>,
    received: usize,
}

impl Default for FrameAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAccumulator {
    pub fn new() -> Self {
        Self { buffer: Box::new([0u8; FRAME_SIZE]), received: 0 }
    }

    /// Copy `chunk` into the frame at the cursor.
    ///
    /// An empty chunk, or one larger than [`outstanding`](Self::outstanding),
    /// is rejected without touching the buffer. Once three or more bytes are
    /// buffered the header must match; on mismatch the bytes stay buffered for
    /// diagnostics but the frame must be discarded with [`reset`](Self::reset).
    pub fn append(&mut self, chunk: &[u8]) -> Result<(), FrameError> {
        if chunk.is_empty() {
            return Err(FrameError::EmptyChunk);
        }

        let outstanding = self.outstanding();
        if chunk.len() > outstanding {
            return Err(FrameError::Overflow { chunk: chunk.len(), outstanding });
        }

        self.buffer[self.received..self.received + chunk.len()].copy_from_slice(chunk);
        self.received += chunk.len();
        trace!(chunk = chunk.len(), received = self.received, "Appended chunk");

        if self.has_header() {
            self.check_header()?;
        }

        Ok(())
    }

    /// True once all [`FRAME_SIZE`] bytes have been received.
    pub fn is_complete(&self) -> bool {
        self.received >= FRAME_SIZE
    }

    /// True when nothing of the current frame has arrived.
    pub fn is_empty(&self) -> bool {
        self.received == 0
    }

    /// Bytes still needed to complete the frame.
    pub fn outstanding(&self) -> usize {
        FRAME_SIZE - self.received
    }

    /// Bytes of the current frame received so far.
    pub fn received(&self) -> usize {
        self.received
    }

    /// The received portion of the frame.
    pub fn bytes(&self) -> &[u8] {
        &self.buffer[..self.received]
    }

    /// The whole frame, once complete.
    pub fn frame(&self) -> Option<&[u8; FRAME_SIZE]> {
        if self.is_complete() { Some(&self.buffer) } else { None }
    }

    /// Discard the current frame and start over.
    pub fn reset(&mut self) {
        self.buffer.fill(0);
        self.received = 0;
    }

    fn has_header(&self) -> bool {
        self.received >= HEADER.len()
    }

    fn check_header(&self) -> Result<(), FrameError> {
        let found = &self.buffer[HEADER_OFFSET..HEADER_OFFSET + HEADER.len()];
        if found == HEADER {
            Ok(())
        } else {
            Err(FrameError::HeaderMismatch { found: [found[0], found[1], found[2]] })
        }
    }
}

impl std::fmt::Debug for FrameAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameAccumulator")
            .field("received", &self.received)
            .field("outstanding", &self.outstanding())
            .finish()
    }
}
