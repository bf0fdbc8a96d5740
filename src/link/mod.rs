//! Byte links to a token.
//!
//! - [`SerialConnector`]: a real serial device, opened by path
//! - [`memory::pair`]: an in-memory duplex pipe for tests and simulation

pub mod memory;
#[cfg(feature = "serial")]
mod serial;

pub use memory::{MemoryConnector, MemoryLink};
#[cfg(feature = "serial")]
pub use serial::{SerialConnector, SerialPortLink};
