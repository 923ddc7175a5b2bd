//! Core data types.
//!
//! - [`Reading`] is the decoded, immutable form of one valid frame
//! - [`DeviceId`] identifies the monitor that produced a reading
//! - [`PacketCounts`] tallies good and bad frames for observability

mod counts;
mod reading;

pub use counts::PacketCounts;
pub use reading::{DeviceId, Reading};
