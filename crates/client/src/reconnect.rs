//! Delays between relay connection attempts.
//!
//! The watcher asks a [`Backoff`] how long to wait after each failed
//! attempt and resets it once a connection is established.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Wait after the first failed attempt.
    pub initial_delay: Duration,
    /// Ceiling for the wait between attempts.
    pub max_delay: Duration,
    /// Growth factor applied after every failure.
    pub factor: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            factor: 2,
        }
    }
}

/// Delay sequence for consecutive failed connection attempts.
#[derive(Debug)]
pub(crate) struct Backoff {
    config: ReconnectConfig,
    upcoming: Duration,
    failures: u32,
}

impl Backoff {
    pub(crate) fn new(config: ReconnectConfig) -> Self {
        let upcoming = config.initial_delay;
        Self {
            config,
            upcoming,
            failures: 0,
        }
    }

    /// Record a failed attempt and return how long to wait before the next.
    pub(crate) fn fail(&mut self) -> Duration {
        let delay = self.upcoming.min(self.config.max_delay);
        self.upcoming = delay
            .saturating_mul(self.config.factor)
            .min(self.config.max_delay);
        self.failures += 1;
        delay
    }

    /// Failed attempts since the last successful connection.
    pub(crate) fn failures(&self) -> u32 {
        self.failures
    }

    pub(crate) fn reset(&mut self) {
        self.upcoming = self.config.initial_delay;
        self.failures = 0;
    }
}
