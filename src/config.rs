//! Channel and serial link configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::*;
use crate::error::{Result, RoverError};
use crate::types::PollingTier;

/// Timing for the writer loop, tier scheduler and request correlation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Writer loop period; exactly one frame is written per tick
    pub tick_interval_ms: u64,
    pub fast_interval_ms: u64,
    pub medium_interval_ms: u64,
    pub slow_interval_ms: u64,
    /// Deadline for `request_param`
    pub request_timeout_ms: u64,
    /// Abandon an incomplete report this long after it started; `None` waits forever
    pub report_timeout_ms: Option<u64>,
    pub event_capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: TICK_INTERVAL_MS,
            fast_interval_ms: FAST_INTERVAL_MS,
            medium_interval_ms: MEDIUM_INTERVAL_MS,
            slow_interval_ms: SLOW_INTERVAL_MS,
            request_timeout_ms: REQUEST_TIMEOUT_MS,
            report_timeout_ms: Some(REPORT_TIMEOUT_MS),
            event_capacity: EVENT_CAPACITY,
        }
    }
}

impl ChannelConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn report_timeout(&self) -> Option<Duration> {
        self.report_timeout_ms.map(Duration::from_millis)
    }

    /// Minimum spacing between two reports of `tier`
    pub fn tier_interval(&self, tier: PollingTier) -> Option<Duration> {
        let ms = match tier {
            PollingTier::Fast => self.fast_interval_ms,
            PollingTier::Medium => self.medium_interval_ms,
            PollingTier::Slow => self.slow_interval_ms,
            PollingTier::Aggregate => return None,
        };
        Some(Duration::from_millis(ms))
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(RoverError::InvalidConfig(
                "tick_interval_ms must be non-zero".to_string(),
            ));
        }
        if self.fast_interval_ms > self.medium_interval_ms
            || self.medium_interval_ms > self.slow_interval_ms
        {
            return Err(RoverError::InvalidConfig(format!(
                "tier intervals must satisfy fast <= medium <= slow, got {}/{}/{} ms",
                self.fast_interval_ms, self.medium_interval_ms, self.slow_interval_ms
            )));
        }
        if self.event_capacity == 0 {
            return Err(RoverError::InvalidConfig(
                "event_capacity must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Serial link settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub port_name: String,
    pub baud_rate: u32,
}

impl SerialConfig {
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate: BAUD_RATE,
        }
    }
}
