//! Error types for frame processing and the listener around it.
//!
//! Two layers of errors exist in this crate:
//!
//! - [`FrameError`] describes why a single frame attempt failed. These are
//!   data, not program defects: the connection driver recovers from every one
//!   of them locally by discarding the frame and waiting for the next header.
//! - [`GemError`] is the crate-level error for everything around the protocol
//!   core: sockets, configuration, output files, and frame encoding.
//!
//! ## Frame Error Categories
//!
//! | Kind | Variants | Detected |
//! |------|----------|----------|
//! | [`FrameErrorKind::Capacity`] | `EmptyChunk`, `Overflow` | on append, state untouched |
//! | [`FrameErrorKind::Header`] | `HeaderMismatch` | once 3 bytes are buffered |
//! | [`FrameErrorKind::Structural`] | `Incomplete`, `Oversized`, `FooterMismatch`, `ChecksumMismatch` | on decode |
//! | [`FrameErrorKind::FieldDecode`] | `InvalidTimestamp` | on decode |
//! | [`FrameErrorKind::Disconnect`] | `PrematureDisconnect` | on connection close |
//!
//! ```rust
//! use gemnet::{FrameError, FrameErrorKind};
//!
//! let error = FrameError::HeaderMismatch { found: [0x00, 0xFF, 0x05] };
//! assert_eq!(error.kind(), FrameErrorKind::Header);
//! assert!(error.to_string().contains("00 FF 05"));
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for crate operations.
pub type Result<T, E = GemError> = std::result::Result<T, E>;

/// Renders bytes as `FE FF 05`.
pub(crate) fn spaced_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect::<Vec<_>>().join(" ")
}

/// Why a single frame attempt was abandoned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FrameError {
    #[error("Rejected empty chunk")]
    EmptyChunk,

    #[error("Chunk of {chunk} bytes overflows frame ({outstanding} bytes outstanding)")]
    Overflow { chunk: usize, outstanding: usize },

    #[error("Header mismatch: found {}", spaced_hex(.found))]
    HeaderMismatch { found: [u8; 3] },

    #[error("Frame incomplete: {received} of {expected} bytes received")]
    Incomplete { received: usize, expected: usize },

    #[error("Frame too long: {received} bytes, expected {expected}")]
    Oversized { received: usize, expected: usize },

    #[error("Footer mismatch: found {}", spaced_hex(.found))]
    FooterMismatch { found: [u8; 2] },

    #[error("Checksum mismatch: computed {expected:#04x}, frame carries {found:#04x}")]
    ChecksumMismatch { expected: u8, found: u8 },

    #[error(
        "Invalid device timestamp: {year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"
    )]
    InvalidTimestamp { year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8 },

    #[error("Connection closed with {received} bytes of a partial frame buffered")]
    PrematureDisconnect { received: usize },
}

/// Coarse classification of [`FrameError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameErrorKind {
    /// Empty chunk or a chunk that would overflow the frame.
    Capacity,
    /// Stream desynchronisation detected from the first 3 bytes.
    Header,
    /// Footer or checksum failure, or decoding an unfinished buffer.
    Structural,
    /// A field value outside its representable range.
    FieldDecode,
    /// The peer went away mid-frame.
    Disconnect,
}

impl FrameError {
    /// Returns the category this error belongs to.
    pub fn kind(&self) -> FrameErrorKind {
        match self {
            FrameError::EmptyChunk | FrameError::Overflow { .. } => FrameErrorKind::Capacity,
            FrameError::HeaderMismatch { .. } => FrameErrorKind::Header,
            FrameError::Incomplete { .. }
            | FrameError::Oversized { .. }
            | FrameError::FooterMismatch { .. }
            | FrameError::ChecksumMismatch { .. } => FrameErrorKind::Structural,
            FrameError::InvalidTimestamp { .. } => FrameErrorKind::FieldDecode,
            FrameError::PrematureDisconnect { .. } => FrameErrorKind::Disconnect,
        }
    }
}

/// Crate-level error type.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GemError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("I/O error on {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {reason}")]
    Config {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("CSV output error")]
    Csv(#[from] csv::Error),

    #[error("Cannot encode {field}: {details}")]
    Encode { field: String, details: String },
}

impl GemError {
    /// Helper constructor for socket or stream errors.
    pub fn io_error(context: impl Into<String>, source: std::io::Error) -> Self {
        GemError::Io { context: context.into(), source }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GemError::File { path: path.into(), source }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(reason: impl Into<String>) -> Self {
        GemError::Config { reason: reason.into(), source: None }
    }

    /// Helper constructor for configuration errors with source.
    pub fn config_error_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        GemError::Config { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for values that do not fit their wire width.
    pub fn encode_error(field: impl Into<String>, details: impl Into<String>) -> Self {
        GemError::Encode { field: field.into(), details: details.into() }
    }
}
