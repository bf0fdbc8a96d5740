//! Background units of a running host.
//!
//! ```text
//!  reader (blocking) ──┐
//!                      ├─ LinkEvent ─▶ dispatcher ─▶ MessageProcessor ─▶ Transport
//!  watchdog ───────────┘                    │                               ▲
//!                                           ▼                               │
//!                                      FrameSender ◀──────────── retry timer
//! ```
//!
//! The reader and the watchdog share the [`FrameBuffer`] and send events
//! while holding its lock, so the dispatcher sees frames in stream order and
//! a flush's frame before its timeout.

use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use super::HostError;
use crate::core::{
    BlockBatch, BlockMap, Connector, ContactLog, DeviceId, LinkError, SerialLink, lock,
};
use crate::framing::{FrameBuffer, encode_frame};
use crate::message::{MessageProcessor, Request};
use crate::transport::{Transport, TransportAction};

/// Longest the reader sleeps before rechecking its stop flag.
const PAUSE_SLICE: Duration = Duration::from_millis(50);

/// Callback receiving the reassembled (or partial) log.
pub(crate) type CompletionFn = Box<dyn FnOnce(DeviceId, BlockMap) + Send>;

/// What the reader and watchdog report to the dispatcher.
#[derive(Debug)]
pub enum LinkEvent {
    /// A link opened; requests go out through this sender.
    Ready(FrameSender),
    /// A delimited frame (payload plus checksum).
    Frame(Vec<u8>),
    /// The stream stalled and was flushed.
    Timeout,
}

/// Cloneable write handle to the open link.
#[derive(Clone)]
pub struct FrameSender {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl fmt::Debug for FrameSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameSender").finish_non_exhaustive()
    }
}

impl FrameSender {
    /// Wrap a link writer.
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    /// Frame and write every payload of `request`, back to back.
    pub fn write_blocking(&self, request: &Request) -> Result<(), LinkError> {
        let mut writer = lock(&self.writer);
        for payload in request.encode_payloads() {
            writer.write_all(&encode_frame(&payload))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Write `request` from the blocking pool.
    pub async fn send(&self, request: Request) -> Result<(), HostError> {
        let sender = self.clone();
        let written = tokio::task::spawn_blocking(move || sender.write_blocking(&request))
            .await
            .map_err(|e| LinkError::Io(io::Error::other(e)))?;
        Ok(written?)
    }
}

/// State shared by the dispatcher, the retry timer and `stop()`.
pub(crate) struct Shared {
    pub(crate) transport: Mutex<Transport>,
    sender: Mutex<Option<FrameSender>>,
    completion: Mutex<Option<CompletionFn>>,
}

impl Shared {
    pub(crate) fn new(transport: Transport, on_complete: CompletionFn) -> Self {
        Self {
            transport: Mutex::new(transport),
            sender: Mutex::new(None),
            completion: Mutex::new(Some(on_complete)),
        }
    }

    /// Hand `log` to the caller, at most once per host.
    pub(crate) fn deliver(&self, log: ContactLog) {
        let callback = lock(&self.completion).take();
        match callback {
            Some(callback) => {
                info!(
                    device_id = %log.device_id,
                    blocks = log.blocks.len(),
                    complete = log.is_complete(),
                    "delivering contact log"
                );
                callback(log.device_id, log.blocks);
            }
            None => debug!("contact log already delivered"),
        }
    }

    async fn send(&self, request: Request) {
        let sender = lock(&self.sender).clone();
        let Some(sender) = sender else {
            debug!("no open link, request stays pending");
            return;
        };
        if let Err(e) = sender.send(request).await {
            warn!(error = %e, "failed to write request");
        }
    }

    async fn on_batch(&self, batch: BlockBatch) {
        debug!(
            device_id = %batch.device_id,
            blocks = batch.blocks.len(),
            expected = batch.expected_blocks,
            "batch received"
        );
        let action = lock(&self.transport).on_blocks(batch, Instant::now());
        match action {
            TransportAction::Send(request) => self.send(request).await,
            TransportAction::Complete(log) => self.deliver(log),
            TransportAction::Idle => {}
        }
    }
}

// =============================================================================
// READER
// =============================================================================

/// Blocking loop: wait for the device, then pump bytes into the buffer.
pub(crate) struct Reader {
    connector: Box<dyn Connector>,
    buffer: Arc<Mutex<FrameBuffer>>,
    events: mpsc::UnboundedSender<LinkEvent>,
    running: Arc<AtomicBool>,
    presence_poll: Duration,
}

impl Reader {
    pub(crate) fn new(
        connector: Box<dyn Connector>,
        buffer: Arc<Mutex<FrameBuffer>>,
        events: mpsc::UnboundedSender<LinkEvent>,
        running: Arc<AtomicBool>,
        presence_poll: Duration,
    ) -> Self {
        Self {
            connector,
            buffer,
            events,
            running,
            presence_poll,
        }
    }

    pub(crate) fn run(mut self) {
        while self.is_running() {
            let Some((mut link, writer)) = self.open() else {
                self.pause(self.presence_poll);
                continue;
            };

            info!(device = %self.connector.describe(), "link ready");
            if self
                .events
                .send(LinkEvent::Ready(FrameSender::new(writer)))
                .is_err()
            {
                break;
            }
            if !self.pump(link.as_mut()) {
                break;
            }
        }
        trace!("reader stopped");
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn open(&mut self) -> Option<(Box<dyn SerialLink>, Box<dyn Write + Send>)> {
        let link = match self.connector.connect() {
            Ok(Some(link)) => link,
            Ok(None) => {
                trace!(device = %self.connector.describe(), "device not present");
                return None;
            }
            Err(e) => {
                warn!(device = %self.connector.describe(), error = %e, "failed to open link");
                return None;
            }
        };

        match link.writer() {
            Ok(writer) => Some((link, writer)),
            Err(e) => {
                warn!(error = %e, "failed to get link writer");
                None
            }
        }
    }

    /// Read until stopped or the link fails. Returns `false` if the
    /// dispatcher is gone.
    fn pump(&self, link: &mut dyn SerialLink) -> bool {
        while self.is_running() {
            match link.read_byte() {
                Ok(Some(byte)) => {
                    let mut buffer = lock(&self.buffer);
                    if let Some(frame) = buffer.push(byte, Instant::now()) {
                        trace!(len = frame.len(), "frame delimited");
                        if self.events.send(LinkEvent::Frame(frame)).is_err() {
                            return false;
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "link lost, waiting for device");
                    return true;
                }
            }
        }
        true
    }

    fn pause(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while self.is_running() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            thread::sleep(remaining.min(PAUSE_SLICE));
        }
    }
}

// =============================================================================
// TASKS
// =============================================================================

/// Flush the stream whenever it stalls.
pub(crate) async fn watchdog(
    buffer: Arc<Mutex<FrameBuffer>>,
    events: mpsc::UnboundedSender<LinkEvent>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                if !check_stream(&buffer, &events) {
                    break;
                }
            }
        }
    }
    trace!("watchdog stopped");
}

/// One watchdog check. Returns `false` if the dispatcher is gone.
fn check_stream(buffer: &Mutex<FrameBuffer>, events: &mpsc::UnboundedSender<LinkEvent>) -> bool {
    let mut buffer = lock(buffer);
    let Some(flush) = buffer.check_inactivity(Instant::now()) else {
        return true;
    };

    if flush.discarded > 0 {
        trace!(discarded = flush.discarded, "stalled bytes discarded");
    }
    if let Some(frame) = flush.frame {
        trace!(len = frame.len(), "frame recovered from stalled stream");
        if events.send(LinkEvent::Frame(frame)).is_err() {
            return false;
        }
    }
    events.send(LinkEvent::Timeout).is_ok()
}

/// Resend the pending request when its response is overdue.
pub(crate) async fn retry_timer(
    shared: Arc<Shared>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                let resend = lock(&shared.transport).poll_retry(Instant::now());
                if let Some(request) = resend {
                    shared.send(request).await;
                }
            }
        }
    }
    trace!("retry timer stopped");
}

/// Own the message processor and feed the transport, one event at a time.
pub(crate) async fn dispatcher(
    shared: Arc<Shared>,
    mut events: mpsc::UnboundedReceiver<LinkEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut processor = MessageProcessor::new();

    loop {
        let event = tokio::select! {
            _ = shutdown.changed() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        match event {
            LinkEvent::Ready(sender) => {
                *lock(&shared.sender) = Some(sender);
                let sweep = lock(&shared.transport).on_ready(Instant::now());
                if let Some(request) = sweep {
                    shared.send(request).await;
                }
            }
            LinkEvent::Frame(frame) => {
                if let Some(batch) = processor.on_frame(&frame) {
                    shared.on_batch(batch).await;
                }
            }
            LinkEvent::Timeout => {
                if let Some(batch) = processor.on_timeout() {
                    shared.on_batch(batch).await;
                }
            }
        }
    }

    // Blocks still held by the processor count toward a partial log.
    if let Some(batch) = processor.on_timeout() {
        let action = lock(&shared.transport).on_blocks(batch, Instant::now());
        if let TransportAction::Complete(log) = action {
            shared.deliver(log);
        }
    }
    trace!("dispatcher stopped");
}
