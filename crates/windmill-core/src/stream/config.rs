//! Stream tuning.

use std::time::Duration;

use crate::error::{Error, Result};

/// Default per-subscriber queue capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10;

/// Default idle interval after which a keepalive frame is sent.
pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_secs(10);

/// Settings shared by every stream session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Queue capacity of each subscriber channel.
    pub channel_capacity: usize,
    /// How long a session waits for an event before sending a keepalive.
    pub idle_interval: Duration,
}

impl StreamConfig {
    /// Create a configuration with the default settings.
    pub fn new() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            idle_interval: DEFAULT_IDLE_INTERVAL,
        }
    }

    /// Set the channel capacity.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Set the idle interval.
    pub fn with_idle_interval(mut self, interval: Duration) -> Self {
        self.idle_interval = interval;
        self
    }

    /// Reject settings a session cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(Error::Config("channel capacity must be at least 1".to_string()));
        }
        if self.idle_interval.is_zero() {
            return Err(Error::Config("idle interval must be non-zero".to_string()));
        }
        Ok(())
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StreamConfig::default();
        assert_eq!(config.channel_capacity, 10);
        assert_eq!(config.idle_interval, Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        assert!(StreamConfig::new().with_channel_capacity(0).validate().is_err());
        assert!(StreamConfig::new()
            .with_idle_interval(Duration::ZERO)
            .validate()
            .is_err());
    }
}
