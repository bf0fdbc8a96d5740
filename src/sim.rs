//! Simulated token: the device side of the protocol.
//!
//! Runs on its own thread over a [`MemoryLink`]. Sync markers are matched
//! exactly, as the firmware does, and the receive buffer is reset after
//! [`FRAME_TIMEOUT`] of silence. Faults can be injected to exercise the
//! host's recovery paths.
//!
//! ```ignore
//! let (host_end, token_end) = link::memory::pair(Duration::from_millis(20));
//! let token = SimToken::new(DeviceId::new(42), (1..=40).collect())
//!     .drop_on_first_send(2)
//!     .spawn(token_end);
//! ```

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{debug, trace};

use crate::core::constants::{CONTACTS_PER_BLOCK, FRAME_TIMEOUT, SYNC_PATTERN, SYNC_PATTERN_SIZE};
use crate::core::{ContactBlock, DeviceId, LinkError, SerialLink, lock};
use crate::framing::{encode_frame, verify_checksum};
use crate::link::MemoryLink;
use crate::message::{Message, Request, RequestKind};

/// Status byte sent in answer to a testing-results request.
const TEST_STATUS_OK: u8 = 0x00;

/// Offset of the byte flipped in a corrupted block (inside the contacts).
const CORRUPT_OFFSET: usize = 9;

/// A token holding a fixed contact list.
#[derive(Debug, Clone)]
pub struct SimToken {
    device_id: DeviceId,
    contacts: Vec<u64>,
    drop_first: BTreeSet<u32>,
    corrupt_first: BTreeSet<u32>,
    withheld: BTreeSet<u32>,
    silent_requests: u32,
}

impl SimToken {
    /// Create a token with the given identifier and contacts.
    pub fn new(device_id: DeviceId, contacts: Vec<u64>) -> Self {
        Self {
            device_id,
            contacts,
            drop_first: BTreeSet::new(),
            corrupt_first: BTreeSet::new(),
            withheld: BTreeSet::new(),
            silent_requests: 0,
        }
    }

    /// Skip `block` the first time it would be sent.
    pub fn drop_on_first_send(mut self, block: u32) -> Self {
        self.drop_first.insert(block);
        self
    }

    /// Flip one byte of `block` the first time it is sent.
    pub fn corrupt_on_first_send(mut self, block: u32) -> Self {
        self.corrupt_first.insert(block);
        self
    }

    /// Never send `block`.
    pub fn withhold(mut self, block: u32) -> Self {
        self.withheld.insert(block);
        self
    }

    /// Ignore the first `count` request frames.
    pub fn ignore_first_requests(mut self, count: u32) -> Self {
        self.silent_requests = count;
        self
    }

    /// Number of blocks the token announces.
    pub fn num_blocks(&self) -> u32 {
        self.contacts.len().div_ceil(CONTACTS_PER_BLOCK) as u32
    }

    /// Contents of block `n` (1-based), zero-padded.
    pub fn block(&self, n: u32) -> ContactBlock {
        let mut block = [0u64; CONTACTS_PER_BLOCK];
        let Some(start) = (n as usize)
            .checked_sub(1)
            .map(|i| i * CONTACTS_PER_BLOCK)
        else {
            return block;
        };
        if let Some(ids) = self.contacts.get(start..) {
            let len = ids.len().min(CONTACTS_PER_BLOCK);
            block[..len].copy_from_slice(&ids[..len]);
        }
        block
    }

    /// Start serving requests on `link`.
    ///
    /// The token stops when the handle is stopped or the host end closes.
    pub fn spawn(self, link: MemoryLink) -> SimHandle {
        let running = Arc::new(AtomicBool::new(true));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let device = Device {
            token: self,
            link,
            running: running.clone(),
            requests: requests.clone(),
            stream: Vec::new(),
            last_byte_at: None,
            sent: BTreeSet::new(),
        };
        let thread = thread::spawn(move || device.run());

        SimHandle {
            running,
            requests,
            thread: Some(thread),
        }
    }
}

/// Handle to a running simulated token.
#[derive(Debug)]
pub struct SimHandle {
    running: Arc<AtomicBool>,
    requests: Arc<Mutex<Vec<Request>>>,
    thread: Option<JoinHandle<()>>,
}

impl SimHandle {
    /// Every request frame received so far, silent ones included.
    pub fn requests(&self) -> Vec<Request> {
        lock(&self.requests).clone()
    }

    /// Stop the token and wait for its thread.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for SimHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Device {
    token: SimToken,
    link: MemoryLink,
    running: Arc<AtomicBool>,
    requests: Arc<Mutex<Vec<Request>>>,
    stream: Vec<u8>,
    last_byte_at: Option<Instant>,
    /// Blocks sent (or deliberately lost) at least once.
    sent: BTreeSet<u32>,
}

impl Device {
    fn run(mut self) {
        while self.running.load(Ordering::SeqCst) {
            let byte = match self.link.read_byte() {
                Ok(byte) => byte,
                Err(LinkError::Closed) => break,
                Err(e) => {
                    debug!(error = %e, "sim token read failed");
                    break;
                }
            };

            let now = Instant::now();
            if self
                .last_byte_at
                .is_some_and(|at| now.duration_since(at) > FRAME_TIMEOUT)
            {
                self.stream.clear();
            }

            let Some(byte) = byte else { continue };
            self.last_byte_at = Some(now);
            self.stream.push(byte);

            if let Some(frame) = self.take_frame() {
                self.on_frame(&frame);
            }
        }
        trace!("sim token stopped");
    }

    fn take_frame(&mut self) -> Option<Vec<u8>> {
        let pos = self
            .stream
            .windows(SYNC_PATTERN_SIZE)
            .position(|w| w == SYNC_PATTERN)?;
        let frame = self.stream[..pos].to_vec();
        self.stream.drain(..pos + SYNC_PATTERN_SIZE);
        Some(frame)
    }

    fn on_frame(&mut self, frame: &[u8]) {
        let request = match verify_checksum(frame).and_then(Request::decode) {
            Ok(request) => request,
            Err(e) if e.is_silent_drop() => {
                trace!(error = %e, "sim token dropped frame");
                return;
            }
            Err(e) => {
                debug!(error = %e, "sim token rejected request");
                return;
            }
        };
        lock(&self.requests).push(request.clone());

        if self.token.silent_requests > 0 {
            self.token.silent_requests -= 1;
            debug!(?request, "sim token ignoring request");
            return;
        }

        match request.kind {
            RequestKind::TestingResults => {
                self.send(&Message::TestStatus(vec![TEST_STATUS_OK]).encode());
            }
            RequestKind::ContactData if request.is_full_sweep() => {
                let count = self.token.num_blocks();
                self.send(
                    &Message::NumBlocks {
                        count,
                        device_id: self.token.device_id,
                    }
                    .encode(),
                );
                for n in 1..=count {
                    self.send_block(n);
                }
            }
            RequestKind::ContactData => {
                for &n in &request.blocks {
                    self.send_block(n);
                }
            }
        }
    }

    fn send_block(&mut self, n: u32) {
        let first = self.sent.insert(n);
        if self.token.withheld.contains(&n) || (first && self.token.drop_first.contains(&n)) {
            debug!(block = n, "sim token dropping block");
            return;
        }

        let payload = Message::ContactData {
            block: n,
            contacts: self.token.block(n),
        }
        .encode();
        let mut wire = encode_frame(&payload);
        if first && self.token.corrupt_first.contains(&n) {
            debug!(block = n, "sim token corrupting block");
            wire[CORRUPT_OFFSET] ^= 0x5A;
        }
        self.write(&wire);
    }

    fn send(&self, payload: &[u8]) {
        self.write(&encode_frame(payload));
    }

    fn write(&self, wire: &[u8]) {
        if let Err(e) = self.link.write_all(wire) {
            trace!(error = %e, "sim token write failed");
        }
    }
}
