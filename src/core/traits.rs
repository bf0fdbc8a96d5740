//! Core traits for the token link.
//!
//! These traits are the seam between the protocol and the byte transport,
//! so the same host runs over a real serial port or an in-memory pipe.

use std::io::Write;

use super::error::LinkError;

/// An open byte connection to a token.
///
/// # Requirements
///
/// - `read_byte` MUST return within a bounded time (the configured read
///   timeout) so the reader can observe stop requests
/// - `read_byte` returns `Ok(None)` on a read timeout, never on data
/// - `writer` handles MUST be usable from another thread while a read is
///   in progress
pub trait SerialLink: Send {
    /// Read one byte, or `None` if the read timed out.
    fn read_byte(&mut self) -> Result<Option<u8>, LinkError>;

    /// Create an independent write handle to the same connection.
    fn writer(&self) -> Result<Box<dyn Write + Send>, LinkError>;
}

/// Opens links to a token that may not be plugged in yet.
pub trait Connector: Send + 'static {
    /// Try to open the link.
    ///
    /// Returns `Ok(None)` when the device is not present; the caller polls
    /// again later. Errors are reported but are not fatal either.
    fn connect(&mut self) -> Result<Option<Box<dyn SerialLink>>, LinkError>;

    /// Human-readable description of the target, for logs.
    fn describe(&self) -> String;
}
