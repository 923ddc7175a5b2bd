//! Passive TCP listener and decoder for GEM energy monitors.
//!
//! GEM devices push fixed-size Bin48-Net-Time packets over TCP. This crate
//! reassembles them from an arbitrarily chunked byte stream, validates and
//! decodes them into [`Reading`]s, and hands those to sinks, subscribers and
//! an in-memory store of the latest reading per device.
//!
//! # Layers
//!
//! - [`protocol`]: transport-independent frame accumulation, decoding, encoding
//! - [`driver`]: per-connection state machine with bad-frame reporting
//! - [`connection`] and [`server`]: tokio TCP listener, one task per device
//! - [`store`], [`counters`], [`sink`]: what happens to decoded readings
//!
//! # Example
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use gemnet::server::{GemServer, ServerSettings};
//!
//! #[tokio::main]
//! async fn main() -> gemnet::Result<()> {
//!     let addr = "0.0.0.0:8000".parse().unwrap();
//!     let server = GemServer::bind(addr, ServerSettings::default(), Vec::new()).await?;
//!     let mut readings = Box::pin(server.subscribe());
//!
//!     while let Some(reading) = readings.next().await {
//!         println!("{} {} V", reading.device_id, reading.voltage);
//!     }
//!     server.shutdown().await
//! }
//! ```

// Core types and error handling
mod error;
#[cfg(test)]
mod test_utils;
pub mod types;

// Protocol core
pub mod driver;
pub mod protocol;

// Listener
pub mod connection;
pub mod counters;
pub mod server;
pub mod sink;
pub mod store;

// Application
pub mod config;
pub mod logging;

pub use error::*;
pub use types::*;

pub use driver::{BadFrame, ConnectionDriver, FrameObserver};
pub use protocol::{FRAME_SIZE, FrameAccumulator, decode, encode};
pub use server::GemServer;
pub use store::ReadingStore;
