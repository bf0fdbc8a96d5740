//! Serial port link via the `serialport` crate.

use std::io::{self, Read, Write};
use std::path::Path;
use std::time::Duration;

use serialport::SerialPort;
use tracing::debug;

use crate::core::constants::{DEFAULT_BAUD_RATE, READ_TIMEOUT};
use crate::core::{Connector, LinkError, SerialLink};

/// Opens the token's serial device by path.
#[derive(Debug, Clone)]
pub struct SerialConnector {
    path: String,
    baud_rate: u32,
    read_timeout: Duration,
}

impl SerialConnector {
    /// Create a connector with the default baud rate and read timeout.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: READ_TIMEOUT,
        }
    }

    /// Set the baud rate.
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the per-read timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

impl Connector for SerialConnector {
    fn connect(&mut self) -> Result<Option<Box<dyn SerialLink>>, LinkError> {
        // Device nodes only exist while the token is plugged in.
        if cfg!(unix) && !Path::new(&self.path).exists() {
            return Ok(None);
        }

        let port = match serialport::new(&self.path, self.baud_rate)
            .timeout(self.read_timeout)
            .open()
        {
            Ok(port) => port,
            Err(e) if e.kind() == serialport::ErrorKind::NoDevice => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        debug!(path = %self.path, baud = self.baud_rate, "serial port opened");
        Ok(Some(Box::new(SerialPortLink { port })))
    }

    fn describe(&self) -> String {
        format!("{} @ {} baud", self.path, self.baud_rate)
    }
}

/// An open serial port.
pub struct SerialPortLink {
    port: Box<dyn SerialPort>,
}

impl std::fmt::Debug for SerialPortLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPortLink")
            .field("name", &self.port.name())
            .finish()
    }
}

impl SerialLink for SerialPortLink {
    fn read_byte(&mut self) -> Result<Option<u8>, LinkError> {
        let mut byte = [0u8; 1];
        match self.port.read(&mut byte) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(byte[0])),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn writer(&self) -> Result<Box<dyn Write + Send>, LinkError> {
        Ok(Box::new(self.port.try_clone()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_device_is_not_present() {
        let mut connector = SerialConnector::new("/dev/tokenlink-does-not-exist");
        if cfg!(unix) {
            assert!(connector.connect().unwrap().is_none());
        }
    }

    #[test]
    fn test_describe() {
        let connector = SerialConnector::new("/dev/ttyACM0").baud_rate(9600);
        assert_eq!(connector.describe(), "/dev/ttyACM0 @ 9600 baud");
    }
}
