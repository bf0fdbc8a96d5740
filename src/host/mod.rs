//! Host layer.
//!
//! Runs the protocol against a live link:
//!
//! - **Reader**: blocking byte pump, polls for the device until it appears
//! - **Watchdog**: flushes the stream after 200 ms of silence
//! - **Retry timer**: resends a request unanswered for 500 ms
//! - **Dispatcher**: decodes frames and drives the transport
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            Caller (on_complete)         │
//! ├─────────────────────────────────────────┤
//! │         Host Layer                      │  ← This module
//! │   session lifecycle, background units   │
//! ├─────────────────────────────────────────┤
//! │         Transport / Message Layers      │
//! ├─────────────────────────────────────────┤
//! │         Framing / serial link           │
//! └─────────────────────────────────────────┘
//! ```

mod config;
mod runtime;
mod session;

pub use config::{HostConfig, HostConfigBuilder, Timing};
pub use runtime::{FrameSender, LinkEvent};
#[cfg(feature = "serial")]
pub use session::start_session;
pub use session::{Host, HostError, SessionHandle, start_session_with, stop_session};
