//! # tokenlink
//!
//! Host side of the serial protocol spoken by contact-tracing tokens.
//!
//! A token streams its exposure log over a serial line as unframed bytes.
//! Frames end with a sync marker that may arrive corrupted; each carries a
//! one-byte checksum. The host collects blocks of contact identifiers,
//! re-requests the ones that went missing, and hands the complete log to
//! the caller exactly once.
//!
//! ## Feature Flags
//!
//! - `serial` (default): real serial ports via `serialport`
//! - `sim`: simulated token for integration tests
//! - `serde`: serialize [`ContactLog`](core::ContactLog) and [`DeviceId`](core::DeviceId)
//! - `cli`: the `tokenlink` download tool
//!
//! ## Modules
//!
//! - [`core`]: constants, domain types, link traits, and errors
//! - [`framing`]: fuzzy sync search, stream buffer, checksum codec
//! - [`message`]: response decoding, requests, block collection
//! - [`transport`]: missing-block re-requests and retry
//! - [`link`]: serial and in-memory byte links
//! - [`host`]: background units and the session API
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use tokenlink::prelude::*;
//!
//! # async fn run() -> Result<(), HostError> {
//! let session = start_session("/dev/ttyACM0", 115_200, |device_id, blocks| {
//!     println!("token {device_id}: {} blocks", blocks.len());
//! })?;
//!
//! // ... later
//! session.stop().await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod core;
pub mod framing;
pub mod host;
pub mod link;
pub mod message;
pub mod transport;

// Simulated token (feature-gated)
#[cfg(any(test, feature = "sim"))]
#[cfg_attr(docsrs, doc(cfg(feature = "sim")))]
pub mod sim;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::*;

    pub use crate::framing::{FrameBuffer, encode_frame, find_sync};
    pub use crate::host::{
        Host, HostConfig, HostError, SessionHandle, Timing, start_session_with, stop_session,
    };
    pub use crate::message::{Message, MessageProcessor, Request, RequestKind};
    pub use crate::transport::{Transport, TransportAction};

    #[cfg(feature = "serial")]
    pub use crate::host::start_session;
    #[cfg(feature = "serial")]
    pub use crate::link::SerialConnector;
}

pub use crate::core::{BlockMap, ContactLog, DeviceId, LinkError, TokenError};
pub use crate::host::{Host, HostConfig, HostError, SessionHandle};
