//! Bin48-Net-Time packet handling.
//!
//! The protocol core, independent of any transport:
//!
//! - [`format`] defines the fixed 625-byte layout and its constants
//! - [`FrameAccumulator`] reassembles frames from arbitrary chunks
//! - [`decode`] validates a complete frame and produces a [`Reading`](crate::Reading)
//! - [`encode`] writes a reading back into a sealed frame
//!
//! ## Example
//!
//! ```rust
//! use gemnet::protocol::{FrameAccumulator, decode};
//!
//! # fn frame_bytes() -> Vec<u8> { vec![0; 625] }
//! let bytes = frame_bytes();
//! let mut acc = FrameAccumulator::new();
//! for chunk in bytes.chunks(100) {
//!     if acc.append(chunk).is_err() {
//!         acc.reset();
//!         break;
//!     }
//! }
//! if acc.is_complete() {
//!     let _ = decode(acc.bytes());
//! }
//! ```

pub mod accumulator;
pub mod decoder;
pub mod encoder;
pub mod format;

pub use accumulator::FrameAccumulator;
pub use decoder::{decode, validate};
pub use encoder::{encode, seal};
pub use format::{FRAME_SIZE, Frame};
