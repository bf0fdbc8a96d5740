//! Host configuration.

use std::time::Duration;

use super::HostError;
use crate::core::constants::{
    DEFAULT_BAUD_RATE, DEVICE_POLL_INTERVAL, FRAME_TIMEOUT, MAX_REQUEST_BLOCKS, READ_TIMEOUT,
    REQUEST_TIMEOUT, RETRY_INTERVAL, WATCHDOG_INTERVAL,
};

/// Timers driving the background units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Byte inactivity after which the stream is flushed.
    pub frame_timeout: Duration,

    /// Watchdog check period.
    pub watchdog_interval: Duration,

    /// Time after which an unanswered request is resent.
    pub request_timeout: Duration,

    /// Retry timer check period.
    pub retry_interval: Duration,

    /// Delay between device-presence checks.
    pub presence_poll: Duration,

    /// Per-call serial read timeout.
    pub read_timeout: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            frame_timeout: FRAME_TIMEOUT,
            watchdog_interval: WATCHDOG_INTERVAL,
            request_timeout: REQUEST_TIMEOUT,
            retry_interval: RETRY_INTERVAL,
            presence_poll: DEVICE_POLL_INTERVAL,
            read_timeout: READ_TIMEOUT,
        }
    }
}

/// Host configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Serial device path (e.g. `/dev/ttyACM0`).
    pub path: String,

    /// Serial baud rate.
    pub baud_rate: u32,

    /// Timers.
    pub timing: Timing,

    /// Cap on block numbers per targeted re-request.
    pub max_request_blocks: usize,
}

impl HostConfig {
    /// Start building a configuration for the device at `path`.
    pub fn builder(path: impl Into<String>) -> HostConfigBuilder {
        HostConfigBuilder::new(path)
    }

    /// Check the configuration for values the host cannot run with.
    pub fn validate(&self) -> Result<(), HostError> {
        if self.baud_rate == 0 {
            return Err(HostError::InvalidConfig("baud rate must be non-zero".into()));
        }
        if self.max_request_blocks == 0 {
            return Err(HostError::InvalidConfig(
                "max request blocks must be non-zero".into(),
            ));
        }

        let t = &self.timing;
        let timers = [
            ("frame timeout", t.frame_timeout),
            ("watchdog interval", t.watchdog_interval),
            ("request timeout", t.request_timeout),
            ("retry interval", t.retry_interval),
            ("presence poll", t.presence_poll),
            ("read timeout", t.read_timeout),
        ];
        if let Some((name, _)) = timers.iter().find(|(_, d)| d.is_zero()) {
            return Err(HostError::InvalidConfig(format!("{name} must be non-zero")));
        }

        Ok(())
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            timing: Timing::default(),
            max_request_blocks: MAX_REQUEST_BLOCKS,
        }
    }
}

/// Builder for [`HostConfig`].
#[derive(Debug)]
pub struct HostConfigBuilder {
    config: HostConfig,
}

impl HostConfigBuilder {
    /// Create a builder with default settings for the device at `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            config: HostConfig {
                path: path.into(),
                ..HostConfig::default()
            },
        }
    }

    /// Set the baud rate.
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.config.baud_rate = baud_rate;
        self
    }

    /// Replace all timers.
    pub fn timing(mut self, timing: Timing) -> Self {
        self.config.timing = timing;
        self
    }

    /// Set the stream inactivity timeout.
    pub fn frame_timeout(mut self, timeout: Duration) -> Self {
        self.config.timing.frame_timeout = timeout;
        self
    }

    /// Set the request retry timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.timing.request_timeout = timeout;
        self
    }

    /// Set the device-presence poll interval.
    pub fn presence_poll(mut self, interval: Duration) -> Self {
        self.config.timing.presence_poll = interval;
        self
    }

    /// Set the per-call read timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.timing.read_timeout = timeout;
        self
    }

    /// Set the cap on block numbers per targeted re-request.
    pub fn max_request_blocks(mut self, max: usize) -> Self {
        self.config.max_request_blocks = max;
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> Result<HostConfig, HostError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_protocol() {
        let config = HostConfig::builder("/dev/ttyACM0").build().unwrap();

        assert_eq!(config.path, "/dev/ttyACM0");
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.max_request_blocks, 32);
        assert_eq!(config.timing.frame_timeout, Duration::from_millis(200));
        assert_eq!(config.timing.request_timeout, Duration::from_millis(500));
        assert_eq!(config.timing.presence_poll, Duration::from_secs(1));
    }

    #[test]
    fn test_builder_overrides() {
        let config = HostConfig::builder("COM3")
            .baud_rate(9600)
            .request_timeout(Duration::from_secs(2))
            .max_request_blocks(8)
            .build()
            .unwrap();

        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.timing.request_timeout, Duration::from_secs(2));
        assert_eq!(config.timing.frame_timeout, FRAME_TIMEOUT);
        assert_eq!(config.max_request_blocks, 8);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            HostConfig::builder("x").baud_rate(0).build(),
            Err(HostError::InvalidConfig(_))
        ));
        assert!(matches!(
            HostConfig::builder("x").max_request_blocks(0).build(),
            Err(HostError::InvalidConfig(_))
        ));

        let err = HostConfig::builder("x")
            .frame_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid configuration: frame timeout must be non-zero"
        );
    }
}
