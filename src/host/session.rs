//! Host session: wires the background units together and owns their
//! lifecycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::config::HostConfig;
use super::runtime::{Reader, Shared, dispatcher, retry_timer, watchdog};
use crate::core::{BlockMap, Connector, DeviceId, LinkError, lock};
use crate::framing::FrameBuffer;
use crate::transport::Transport;

/// Errors that can occur when running a host.
#[derive(Debug, Error)]
pub enum HostError {
    /// `start` was called on a host that is running or already ran.
    #[error("host already started")]
    AlreadyRunning,

    /// Configuration rejected by validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Link error.
    #[error("link error: {0}")]
    Link(#[from] LinkError),
}

struct Running {
    shared: Arc<Shared>,
    reader_running: Arc<AtomicBool>,
    shutdown: watch::Sender<bool>,
    reader: JoinHandle<()>,
    tasks: Vec<JoinHandle<()>>,
}

/// Downloads the contact log of one token.
///
/// A host runs once: after [`Host::stop`] it cannot be restarted.
///
/// # Example
///
/// ```ignore
/// let config = HostConfig::builder("/dev/ttyACM0").build()?;
/// let mut host = Host::new(SerialConnector::new(&config.path), config);
///
/// host.start(|device_id, blocks| {
///     println!("{device_id}: {} blocks", blocks.len());
/// })?;
/// // ...
/// host.stop().await;
/// ```
pub struct Host {
    config: HostConfig,
    connector: Option<Box<dyn Connector>>,
    running: Option<Running>,
}

impl Host {
    /// Create a host that opens its link through `connector`.
    pub fn new(connector: impl Connector, config: HostConfig) -> Self {
        Self {
            config,
            connector: Some(Box::new(connector)),
            running: None,
        }
    }

    /// Host configuration.
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Check if the background units are running.
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Launch the reader, watchdog, retry timer and dispatcher.
    ///
    /// `on_complete` is called exactly once: with the full block map when
    /// every announced block arrived, or from [`Host::stop`] with whatever
    /// was collected if a token announced itself but never completed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F>(&mut self, on_complete: F) -> Result<(), HostError>
    where
        F: FnOnce(DeviceId, BlockMap) + Send + 'static,
    {
        if self.running.is_some() {
            return Err(HostError::AlreadyRunning);
        }
        let connector = self.connector.take().ok_or(HostError::AlreadyRunning)?;
        let timing = self.config.timing;
        let device = connector.describe();

        let transport =
            Transport::with_limits(timing.request_timeout, self.config.max_request_blocks);
        let shared = Arc::new(Shared::new(transport, Box::new(on_complete)));
        let buffer = Arc::new(Mutex::new(FrameBuffer::with_timeout(timing.frame_timeout)));
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let reader_running = Arc::new(AtomicBool::new(true));

        let reader = Reader::new(
            connector,
            buffer.clone(),
            event_tx.clone(),
            reader_running.clone(),
            timing.presence_poll,
        );
        let reader = tokio::task::spawn_blocking(move || reader.run());

        let tasks = vec![
            tokio::spawn(watchdog(
                buffer,
                event_tx,
                timing.watchdog_interval,
                shutdown_rx.clone(),
            )),
            tokio::spawn(retry_timer(
                shared.clone(),
                timing.retry_interval,
                shutdown_rx.clone(),
            )),
            tokio::spawn(dispatcher(shared.clone(), event_rx, shutdown_rx)),
        ];

        info!(%device, "host started");
        self.running = Some(Running {
            shared,
            reader_running,
            shutdown: shutdown_tx,
            reader,
            tasks,
        });
        Ok(())
    }

    /// Stop every background unit and wait for it to finish.
    ///
    /// Delivers a partial log if the round had not completed.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        running.reader_running.store(false, Ordering::SeqCst);
        let _ = running.shutdown.send(true);

        for task in running.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "background task failed");
            }
        }
        if let Err(e) = running.reader.await {
            warn!(error = %e, "reader failed");
        }

        let partial = lock(&running.shared.transport).take_partial();
        if let Some(log) = partial {
            running.shared.deliver(log);
        }
        info!("host stopped");
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.reader_running.store(false, Ordering::SeqCst);
            let _ = running.shutdown.send(true);
        }
    }
}

/// Handle to a running session.
pub struct SessionHandle {
    host: Host,
}

impl SessionHandle {
    /// Check if the session is still running.
    pub fn is_running(&self) -> bool {
        self.host.is_running()
    }

    /// Halt all background activity.
    ///
    /// Delivers a partial log if a token announced itself but the round
    /// had not completed.
    pub async fn stop(mut self) {
        self.host.stop().await;
    }
}

/// Halt all background activity of `session`.
pub async fn stop_session(session: SessionHandle) {
    session.stop().await;
}

/// Start a session over any connector.
pub fn start_session_with<C, F>(
    connector: C,
    config: HostConfig,
    on_complete: F,
) -> Result<SessionHandle, HostError>
where
    C: Connector,
    F: FnOnce(DeviceId, BlockMap) + Send + 'static,
{
    config.validate()?;
    let mut host = Host::new(connector, config);
    host.start(on_complete)?;
    Ok(SessionHandle { host })
}

/// Start a session on the serial device at `descriptor`.
///
/// The device does not need to be present yet; the host polls for it.
#[cfg(feature = "serial")]
pub fn start_session<F>(
    descriptor: &str,
    baud_rate: u32,
    on_complete: F,
) -> Result<SessionHandle, HostError>
where
    F: FnOnce(DeviceId, BlockMap) + Send + 'static,
{
    let config = HostConfig::builder(descriptor)
        .baud_rate(baud_rate)
        .build()?;
    let connector = crate::link::SerialConnector::new(descriptor)
        .baud_rate(baud_rate)
        .read_timeout(config.timing.read_timeout);
    start_session_with(connector, config, on_complete)
}
