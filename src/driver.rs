//! Connection protocol driver
//!
//! Sequences the accumulator and decoder over the lifetime of one connection
//! and turns every frame failure into a single bad-frame event per
//! contiguous failure run.
//!
//! ```text
//!  Idle ──bytes──▶ Accumulating ──full──▶ decode ──ok──▶ Reading, reset ──▶ Idle
//!                      │                     │
//!                      └──append error───────┴──error──▶ report once, reset ──▶ Idle
//! ```
//!
//! The failure latch is cleared by the next successful append, so a failure
//! after recovery is reported again. Closing the connection mid-frame is a
//! failure; closing between frames is not.

use std::fmt;
use tracing::{debug, trace};

use crate::protocol::{FrameAccumulator, decode};
use crate::{FrameError, PacketCounts, Reading};

/// Maximum number of frame bytes kept in a [`BadFrame`] preview.
pub const PREVIEW_LEN: usize = 64;

/// Diagnostic snapshot of an abandoned frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadFrame {
    /// Why the frame was abandoned
    pub error: FrameError,
    /// Bytes buffered when it was abandoned
    pub received: usize,
    /// Bytes that were still missing
    pub outstanding: usize,
    /// Leading bytes of the partial frame, at most [`PREVIEW_LEN`]
    pub preview: Vec<u8>,
}

impl BadFrame {
    /// Preview bytes as `FE-FF-05-...`.
    pub fn preview_hex(&self) -> String {
        self.preview.iter().map(|b| format!("{:02X}", b)).collect::<Vec<_>>().join("-")
    }
}

impl fmt::Display for BadFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (received {}, outstanding {}, data {}{})",
            self.error,
            self.received,
            self.outstanding,
            self.preview_hex(),
            if self.received > self.preview.len() { " ..." } else { "" }
        )
    }
}

/// Receives driver outcomes.
///
/// `counts` is the connection's running tally including the event being
/// reported.
pub trait FrameObserver: Send {
    /// Called once per contiguous run of frame failures.
    fn on_bad_frame(&mut self, bad: &BadFrame, counts: PacketCounts);

    /// Called for every decoded frame.
    fn on_reading(&mut self, _reading: &Reading, _counts: PacketCounts) {}
}

impl FrameObserver for () {
    fn on_bad_frame(&mut self, _bad: &BadFrame, _counts: PacketCounts) {}
}

/// Coarse driver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// No bytes of the next frame yet
    Idle,
    /// Part of a frame is buffered
    Accumulating,
}

/// Per-connection protocol state machine.
pub struct ConnectionDriver<O = ()> {
    accumulator: FrameAccumulator,
    failed: bool,
    counts: PacketCounts,
    observer: O,
}

impl Default for ConnectionDriver<()> {
    fn default() -> Self {
        Self::new(())
    }
}

impl<O: FrameObserver> ConnectionDriver<O> {
    pub fn new(observer: O) -> Self {
        Self {
            accumulator: FrameAccumulator::new(),
            failed: false,
            counts: PacketCounts::default(),
            observer,
        }
    }

    /// Feed one received chunk.
    ///
    /// Returns the reading when this chunk completes a valid frame. Any
    /// failure discards the current frame; only the first failure of a run
    /// reaches [`FrameObserver::on_bad_frame`].
    pub fn on_bytes_received(&mut self, chunk: &[u8]) -> Option<Reading> {
        if let Err(error) = self.accumulator.append(chunk) {
            self.fail(error);
            return None;
        }
        self.failed = false;

        if !self.accumulator.is_complete() {
            return None;
        }

        match decode(self.accumulator.bytes()) {
            Ok(reading) => {
                self.accumulator.reset();
                self.counts.good += 1;
                debug!(device = %reading.device_id, good = self.counts.good, "Frame complete");
                self.observer.on_reading(&reading, self.counts);
                Some(reading)
            }
            Err(error) => {
                self.fail(error);
                None
            }
        }
    }

    /// Finalise the connection. A partially received frame counts as bad.
    pub fn on_connection_closed(&mut self) {
        if !self.accumulator.is_empty() && !self.accumulator.is_complete() {
            let received = self.accumulator.received();
            self.fail(FrameError::PrematureDisconnect { received });
        }
    }

    /// Bytes the current frame still needs.
    pub fn outstanding(&self) -> usize {
        self.accumulator.outstanding()
    }

    pub fn state(&self) -> DriverState {
        if self.accumulator.is_empty() { DriverState::Idle } else { DriverState::Accumulating }
    }

    /// True while inside a failure run whose event was already reported.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn counts(&self) -> PacketCounts {
        self.counts
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn into_observer(self) -> O {
        self.observer
    }

    fn fail(&mut self, error: FrameError) {
        if self.failed {
            trace!(%error, "Suppressed repeated frame failure");
        } else {
            self.failed = true;
            self.counts.bad += 1;
            let bytes = self.accumulator.bytes();
            let bad = BadFrame {
                error,
                received: self.accumulator.received(),
                outstanding: self.accumulator.outstanding(),
                preview: bytes[..bytes.len().min(PREVIEW_LEN)].to_vec(),
            };
            self.observer.on_bad_frame(&bad, self.counts);
        }
        self.accumulator.reset();
    }
}

impl<O> fmt::Debug for ConnectionDriver<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDriver")
            .field("accumulator", &self.accumulator)
            .field("failed", &self.failed)
            .field("counts", &self.counts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FrameErrorKind;
    use crate::protocol::FRAME_SIZE;
    use crate::test_utils::{frame_for, sample_frame, sample_reading};
    use proptest::prelude::*;

    #[derive(Default)]
    struct Recorder {
        bad: Vec<BadFrame>,
        readings: usize,
    }

    impl FrameObserver for Recorder {
        fn on_bad_frame(&mut self, bad: &BadFrame, _counts: PacketCounts) {
            self.bad.push(bad.clone());
        }

        fn on_reading(&mut self, _reading: &Reading, _counts: PacketCounts) {
            self.readings += 1;
        }
    }

    fn driver() -> ConnectionDriver<Recorder> {
        ConnectionDriver::new(Recorder::default())
    }

    #[test]
    fn whole_frame_yields_reading_and_resets() {
        let mut driver = driver();
        let reading = driver.on_bytes_received(&sample_frame()).unwrap();
        assert_eq!(reading, sample_reading());
        assert_eq!(driver.state(), DriverState::Idle);
        assert_eq!(driver.outstanding(), FRAME_SIZE);
        assert_eq!(driver.counts(), PacketCounts::new(1, 0));
        assert_eq!(driver.observer().readings, 1);
    }

    #[test]
    fn consecutive_frames_decode_independently() {
        let mut driver = driver();
        let first = driver.on_bytes_received(&frame_for(1, 100)).unwrap();
        let second = driver.on_bytes_received(&frame_for(2, 200)).unwrap();
        assert_eq!(first.device_id.to_string(), "0100100");
        assert_eq!(second.device_id.to_string(), "0200200");
    }

    #[test]
    fn partial_frame_stays_accumulating() {
        let mut driver = driver();
        assert!(driver.on_bytes_received(&sample_frame()[..300]).is_none());
        assert_eq!(driver.state(), DriverState::Accumulating);
        assert_eq!(driver.outstanding(), FRAME_SIZE - 300);
        assert!(driver.observer().bad.is_empty());
    }

    #[test]
    fn bad_header_reported_once_per_run() {
        let mut driver = driver();
        for _ in 0..5 {
            assert!(driver.on_bytes_received(&[0x00, 0x11, 0x22, 0x33]).is_none());
        }
        assert_eq!(driver.observer().bad.len(), 1);
        assert_eq!(driver.counts(), PacketCounts::new(0, 1));
        assert!(driver.is_failed());

        let bad = &driver.observer().bad[0];
        assert_eq!(bad.error.kind(), FrameErrorKind::Header);
        assert_eq!(bad.received, 4);
        assert_eq!(bad.preview, vec![0x00, 0x11, 0x22, 0x33]);
    }

    #[test]
    fn recovery_clears_latch_and_new_failure_is_reported() {
        let mut driver = driver();
        driver.on_bytes_received(&[0xAA; 10]);
        driver.on_bytes_received(&[0xAA; 10]);
        assert_eq!(driver.observer().bad.len(), 1);

        assert!(driver.on_bytes_received(&sample_frame()).is_some());
        assert!(!driver.is_failed());

        driver.on_bytes_received(&[0xAA; 10]);
        assert_eq!(driver.observer().bad.len(), 2);
        assert_eq!(driver.counts(), PacketCounts::new(1, 2));
    }

    #[test]
    fn corrupt_frame_does_not_poison_next_frame() {
        let mut driver = driver();
        let mut corrupt = sample_frame();
        corrupt[400] ^= 0x10;
        assert!(driver.on_bytes_received(&corrupt).is_none());
        assert_eq!(driver.observer().bad[0].error.kind(), FrameErrorKind::Structural);
        assert_eq!(driver.state(), DriverState::Idle);

        assert_eq!(driver.on_bytes_received(&sample_frame()), Some(sample_reading()));
    }

    #[test]
    fn overflowing_chunk_is_a_failure() {
        let mut driver = driver();
        let frame = sample_frame();
        driver.on_bytes_received(&frame[..600]);
        assert!(driver.on_bytes_received(&frame).is_none());
        assert!(matches!(
            driver.observer().bad[0].error,
            FrameError::Overflow { chunk: 625, outstanding: 25 }
        ));
        assert_eq!(driver.state(), DriverState::Idle);
    }

    #[test]
    fn empty_chunk_is_a_failure() {
        let mut driver = driver();
        assert!(driver.on_bytes_received(&[]).is_none());
        assert_eq!(driver.observer().bad[0].error, FrameError::EmptyChunk);
    }

    #[test]
    fn close_between_frames_is_clean() {
        let mut driver = driver();
        driver.on_bytes_received(&sample_frame());
        driver.on_connection_closed();
        assert!(driver.observer().bad.is_empty());
        assert_eq!(driver.counts(), PacketCounts::new(1, 0));
    }

    #[test]
    fn close_mid_frame_reported_once() {
        let mut driver = driver();
        driver.on_bytes_received(&sample_frame()[..100]);
        driver.on_connection_closed();
        driver.on_connection_closed();

        let recorder = driver.into_observer();
        assert_eq!(recorder.bad.len(), 1);
        assert_eq!(recorder.bad[0].error, FrameError::PrematureDisconnect { received: 100 });
        assert_eq!(recorder.bad[0].preview.len(), PREVIEW_LEN);
    }

    #[test]
    fn bad_frame_display_marks_truncated_preview() {
        let bad = BadFrame {
            error: FrameError::PrematureDisconnect { received: 100 },
            received: 100,
            outstanding: 525,
            preview: vec![0xFE, 0xFF, 0x05],
        };
        let text = bad.to_string();
        assert!(text.contains("FE-FF-05 ..."));
        assert!(text.contains("outstanding 525"));
    }

    proptest! {
        #[test]
        fn chunked_delivery_matches_single_chunk(
            cuts in prop::collection::btree_set(1usize..FRAME_SIZE, 0..64)
        ) {
            let frame = sample_frame();
            let mut driver = driver();
            let mut start = 0;
            let mut result = None;

            for end in cuts.into_iter().chain(std::iter::once(FRAME_SIZE)) {
                prop_assert!(result.is_none());
                result = driver.on_bytes_received(&frame[start..end]);
                start = end;
            }

            prop_assert_eq!(result, Some(sample_reading()));
            prop_assert!(driver.observer().bad.is_empty());
        }

        #[test]
        fn garbage_runs_report_once(
            chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 3..200), 1..20)
        ) {
            let mut driver = driver();
            for chunk in &chunks {
                // Keep every chunk off the header so each append fails
                let mut chunk = chunk.clone();
                chunk[0] = 0x00;
                prop_assert!(driver.on_bytes_received(&chunk).is_none());
            }
            prop_assert_eq!(driver.observer().bad.len(), 1);
        }
    }
}
