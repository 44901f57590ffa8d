//! Engine configuration

use std::time::Duration;

use bodyscale_core::constants::{
    DEFAULT_QUIET_PERIOD, DEFAULT_THROTTLE_WINDOW, DEFAULT_TICK_INTERVAL,
};

/// Timing and buffering of a [`ScaleEngine`](crate::ScaleEngine)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Bring-up liveness tick
    pub tick_interval: Duration,

    /// Silence after the last weight frame before the reading is announced
    pub quiet_period: Duration,

    /// Minimum spacing between two weight announcements
    pub throttle_window: Duration,

    /// Capacity of the outbound event channel
    pub event_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            quiet_period: DEFAULT_QUIET_PERIOD,
            throttle_window: DEFAULT_THROTTLE_WINDOW,
            event_buffer: 64,
        }
    }
}

impl EngineConfig {
    /// Set the bring-up tick interval
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Set the weight quiet period
    pub fn with_quiet_period(mut self, period: Duration) -> Self {
        self.quiet_period = period;
        self
    }

    /// Set the weight throttle window
    pub fn with_throttle_window(mut self, window: Duration) -> Self {
        self.throttle_window = window;
        self
    }

    /// Set the event channel capacity
    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }
}
