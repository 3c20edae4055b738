//! Runtime and tick configuration.

use std::time::Duration;

use engine_ecs::DEFAULT_MAX_EVENT_DEPTH;

/// Configuration for the process-scoped runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// How deep event publishes may nest before failing with
    /// `ReentrancyLimitExceeded`.
    pub max_event_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_event_depth: DEFAULT_MAX_EVENT_DEPTH,
        }
    }
}

impl RuntimeConfig {
    /// Cap on nested event publishes.
    #[must_use]
    pub fn with_max_event_depth(mut self, depth: usize) -> Self {
        self.max_event_depth = depth;
        self
    }
}

/// Configuration for the fixed-rate tick loop.
#[derive(Debug, Clone, PartialEq)]
pub struct TickConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 20.0,
            max_ticks: 0,
        }
    }
}

impl TickConfig {
    /// Target ticks per second; 0 runs ticks back to back.
    #[must_use]
    pub fn with_tick_rate(mut self, tick_rate: f64) -> Self {
        self.tick_rate = tick_rate;
        self
    }

    /// Stop after this many ticks; 0 runs without a limit.
    #[must_use]
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    /// Time budget of one tick. A non-positive rate means "as fast as
    /// possible".
    #[must_use]
    pub fn tick_duration(&self) -> Duration {
        if self.tick_rate > 0.0 && self.tick_rate.is_finite() {
            Duration::from_secs_f64(1.0 / self.tick_rate)
        } else {
            Duration::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(RuntimeConfig::default().max_event_depth, 64);
        let tick = TickConfig::default();
        assert_eq!(tick.max_ticks, 0);
        assert_eq!(tick.tick_duration(), Duration::from_millis(50));
    }

    #[test]
    fn test_builders() {
        let tick = TickConfig::default().with_tick_rate(0.0).with_max_ticks(3);
        assert_eq!(tick.max_ticks, 3);
        assert_eq!(tick.tick_duration(), Duration::ZERO);
        assert_eq!(
            RuntimeConfig::default().with_max_event_depth(8).max_event_depth,
            8
        );
    }
}
