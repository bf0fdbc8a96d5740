//! Transport layer.
//!
//! Drives a token from "link ready" to a complete block set:
//!
//! - **Full sweep**: the first request asks for every block
//! - **Targeted re-requests**: after each batch, up to 32 missing blocks
//! - **Retry**: a single [`PendingRequest`] resent when its response is overdue
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            Host / caller                │
//! ├─────────────────────────────────────────┤
//! │         Transport Layer                 │  ← This module
//! │   requests, retry, missing blocks       │
//! ├─────────────────────────────────────────┤
//! │         Message Layer                   │
//! ├─────────────────────────────────────────┤
//! │         Framing / serial link           │
//! └─────────────────────────────────────────┘
//! ```

mod pending;
mod protocol;

pub use pending::PendingRequest;
pub use protocol::{Transport, TransportAction};
