use std::time::Duration;

use serde::Deserialize;

/// Tunables for a stream instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Event timer period in milliseconds. Anything that is not a finite positive number
    /// disables the timer.
    pub event_tick_ms: f64,
    /// Capacity of the outbound notification channel.
    pub notification_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            event_tick_ms: 100.0,
            notification_capacity: 64,
        }
    }
}

impl StreamConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_event_tick_ms(mut self, ms: f64) -> Self {
        self.event_tick_ms = ms;
        self
    }

    /// The tick period, or `None` when the configured value is unusable.
    pub fn event_tick_period(&self) -> Option<Duration> {
        tick_period(self.event_tick_ms)
    }
}

pub(crate) fn tick_period(ms: f64) -> Option<Duration> {
    if ms.is_finite() && ms > 0.0 {
        Some(Duration::from_secs_f64(ms / 1000.0))
    } else {
        None
    }
}
