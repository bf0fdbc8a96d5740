//! Error types for the token link.

use std::io;

use thiserror::Error;

/// Errors that can occur when decoding a frame.
///
/// Every variant drops the frame. Length and checksum failures are line
/// noise and go unreported; the rest mean a frame arrived intact but was
/// not understood, and are logged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Frame shorter than its message kind requires.
    #[error("frame too short: expected {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// Trailing checksum does not match the payload.
    #[error("checksum mismatch: computed {computed:#04x}, received {received:#04x}")]
    ChecksumMismatch {
        /// Checksum computed over the payload.
        computed: u8,
        /// Checksum byte carried by the frame.
        received: u8,
    },

    /// Request payload does not start with the request marker.
    #[error("bad request marker: {0:#04x}")]
    BadMarker(u8),

    /// Request kind the token does not serve.
    #[error("unknown request kind: {0:#04x}")]
    UnknownRequestKind(u8),
}

impl DecodeError {
    /// Check if this error is line noise, dropped without a report.
    pub fn is_silent_drop(&self) -> bool {
        matches!(self, DecodeError::TooShort { .. } | DecodeError::ChecksumMismatch { .. })
    }
}

/// Errors on the byte link to the token.
#[derive(Debug, Error)]
pub enum LinkError {
    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "serial")]
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The other end went away.
    #[error("link closed")]
    Closed,
}

/// Top-level token link errors.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Decode error.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Link error.
    #[error("link error: {0}")]
    Link(#[from] LinkError),

    /// Host error.
    #[error("host error: {0}")]
    Host(#[from] crate::host::HostError),
}
