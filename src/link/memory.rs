//! In-memory byte link, for tests and the simulated token.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use crate::core::{Connector, LinkError, SerialLink};

/// One end of an in-memory duplex byte pipe.
#[derive(Debug)]
pub struct MemoryLink {
    rx: Receiver<u8>,
    tx: Sender<u8>,
    read_timeout: Duration,
}

/// Create two connected link ends.
///
/// Bytes written on one end are read from the other. Reads time out after
/// `read_timeout`; once every writer of the far end is gone, reads fail
/// with [`LinkError::Closed`].
pub fn pair(read_timeout: Duration) -> (MemoryLink, MemoryLink) {
    let (a_tx, a_rx) = mpsc::channel();
    let (b_tx, b_rx) = mpsc::channel();

    let a = MemoryLink {
        rx: a_rx,
        tx: b_tx,
        read_timeout,
    };
    let b = MemoryLink {
        rx: b_rx,
        tx: a_tx,
        read_timeout,
    };
    (a, b)
}

impl MemoryLink {
    /// Write bytes to the far end.
    pub fn write_all(&self, bytes: &[u8]) -> Result<(), LinkError> {
        MemoryWriter {
            tx: self.tx.clone(),
        }
        .write_all(bytes)?;
        Ok(())
    }
}

impl SerialLink for MemoryLink {
    fn read_byte(&mut self) -> Result<Option<u8>, LinkError> {
        match self.rx.recv_timeout(self.read_timeout) {
            Ok(byte) => Ok(Some(byte)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(LinkError::Closed),
        }
    }

    fn writer(&self) -> Result<Box<dyn Write + Send>, LinkError> {
        Ok(Box::new(MemoryWriter {
            tx: self.tx.clone(),
        }))
    }
}

struct MemoryWriter {
    tx: Sender<u8>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &byte in buf {
            self.tx
                .send(byte)
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "memory link closed"))?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Connector that hands out prepared [`MemoryLink`]s, one per successful
/// poll, in order.
///
/// Can report the device as absent for a number of polls first, to
/// exercise presence polling. Once every link is handed out the device
/// stays absent.
#[derive(Debug)]
pub struct MemoryConnector {
    links: VecDeque<MemoryLink>,
    absent_polls: u32,
}

impl MemoryConnector {
    /// Create a connector for `link`.
    pub fn new(link: MemoryLink) -> Self {
        Self::with_links(vec![link])
    }

    /// Create a connector that yields `links` one after the other, as if
    /// the device were unplugged and plugged in again.
    pub fn with_links(links: Vec<MemoryLink>) -> Self {
        Self {
            links: links.into(),
            absent_polls: 0,
        }
    }

    /// Report the device as absent for the first `polls` attempts.
    pub fn appear_after(mut self, polls: u32) -> Self {
        self.absent_polls = polls;
        self
    }
}

impl Connector for MemoryConnector {
    fn connect(&mut self) -> Result<Option<Box<dyn SerialLink>>, LinkError> {
        if self.absent_polls > 0 {
            self.absent_polls -= 1;
            return Ok(None);
        }
        Ok(self
            .links
            .pop_front()
            .map(|link| Box::new(link) as Box<dyn SerialLink>))
    }

    fn describe(&self) -> String {
        "memory link".to_string()
    }
}
