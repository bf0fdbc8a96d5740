//! Request/retry protocol that drives block reassembly to completion.
//!
//! The transport is sans-IO: every operation takes the current time and
//! returns the request to write, leaving the actual write to the host.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::pending::PendingRequest;
use crate::core::constants::{MAX_REQUEST_BLOCKS, REQUEST_TIMEOUT};
use crate::core::{BlockBatch, BlockMap, ContactLog, DeviceId};
use crate::message::{Request, RequestKind};

/// What the host must do after a batch was handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportAction {
    /// Write this request to the token.
    Send(Request),
    /// Every block is present; hand the log to the caller.
    Complete(ContactLog),
    /// Nothing to do (round already finished).
    Idle,
}

/// Cumulative reassembly state plus the in-flight request.
#[derive(Debug, Clone)]
pub struct Transport {
    /// Resend an unanswered request after this long.
    request_timeout: Duration,
    /// Cap on block numbers per targeted request.
    max_request_blocks: usize,
    /// The in-flight request, if any.
    pending: Option<PendingRequest>,
    /// Token whose blocks are being collected.
    device_id: Option<DeviceId>,
    /// Block count announced by that token.
    expected_blocks: u32,
    /// Every block received so far.
    blocks: BlockMap,
    /// Whether the log was handed off.
    completed: bool,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport {
    /// Create a transport with the protocol defaults.
    pub fn new() -> Self {
        Self::with_limits(REQUEST_TIMEOUT, MAX_REQUEST_BLOCKS)
    }

    /// Create a transport with a custom retry timeout and request cap.
    pub fn with_limits(request_timeout: Duration, max_request_blocks: usize) -> Self {
        Self {
            request_timeout,
            max_request_blocks: max_request_blocks.max(1),
            pending: None,
            device_id: None,
            expected_blocks: 0,
            blocks: BlockMap::new(),
            completed: false,
        }
    }

    /// The in-flight request, if any.
    pub fn pending(&self) -> Option<&PendingRequest> {
        self.pending.as_ref()
    }

    /// Blocks collected so far.
    pub fn blocks(&self) -> &BlockMap {
        &self.blocks
    }

    /// Whether the log was handed off.
    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// The link came up: ask for everything.
    ///
    /// Returns `None` once the round has completed.
    pub fn on_ready(&mut self, now: Instant) -> Option<Request> {
        if self.completed {
            return None;
        }
        info!("link ready, requesting all contact data");
        Some(self.send_request(RequestKind::ContactData, Vec::new(), now))
    }

    /// Record `blocks` as the in-flight request and return it for writing.
    ///
    /// Replaces any earlier pending request.
    pub fn send_request(&mut self, kind: RequestKind, blocks: Vec<u32>, now: Instant) -> Request {
        debug!(?kind, ?blocks, "sending request");
        let request = Request::new(kind, blocks);
        self.pending = Some(PendingRequest::new(request.clone(), now));
        request
    }

    /// Merge a batch and decide whether to re-request or finish.
    pub fn on_blocks(&mut self, batch: BlockBatch, now: Instant) -> TransportAction {
        if self.completed {
            debug!(device_id = %batch.device_id, "round finished, ignoring batch");
            return TransportAction::Idle;
        }

        self.pending = None;

        if self.device_id.is_some_and(|id| id != batch.device_id) {
            warn!(device_id = %batch.device_id, "new token on the link, restarting collection");
            self.blocks.clear();
        }
        self.device_id = Some(batch.device_id);
        self.expected_blocks = batch.expected_blocks;

        for (block, contacts) in batch.blocks {
            debug!(block, "got block");
            self.blocks.insert(block, contacts);
        }
        let expected = self.expected_blocks;
        self.blocks.retain(|n, _| (1..=expected).contains(n));

        let missing = self.missing_blocks();
        if !missing.is_empty() {
            debug!(?missing, "re-requesting blocks");
            return TransportAction::Send(self.send_request(RequestKind::ContactData, missing, now));
        }

        self.completed = true;
        let log = ContactLog {
            device_id: batch.device_id,
            expected_blocks: self.expected_blocks,
            blocks: std::mem::take(&mut self.blocks),
        };
        info!(device_id = %log.device_id, blocks = log.blocks.len(), "all blocks received");
        TransportAction::Complete(log)
    }

    /// Announced blocks not yet received, ascending, capped per round.
    pub fn missing_blocks(&self) -> Vec<u32> {
        (1..=self.expected_blocks)
            .filter(|n| !self.blocks.contains_key(n))
            .take(self.max_request_blocks)
            .collect()
    }

    /// Resend the pending request if its response is overdue.
    pub fn poll_retry(&mut self, now: Instant) -> Option<Request> {
        let timeout = self.request_timeout;
        let pending = self.pending.as_mut()?;
        if !pending.is_overdue(now, timeout) {
            return None;
        }

        let request = pending.on_resend(now);
        debug!(
            blocks = ?request.blocks,
            resends = pending.resend_count(),
            "request timed out, resending"
        );
        Some(request)
    }

    /// End the round early and return whatever was collected.
    ///
    /// Returns `None` if the round already completed or no token ever
    /// announced itself.
    pub fn take_partial(&mut self) -> Option<ContactLog> {
        if self.completed {
            return None;
        }
        let device_id = self.device_id?;

        self.completed = true;
        self.pending = None;
        Some(ContactLog {
            device_id,
            expected_blocks: self.expected_blocks,
            blocks: std::mem::take(&mut self.blocks),
        })
    }
}
