//! Run configuration.

use std::time::Duration;

/// How far [`RunContext::block_on`](super::RunContext::block_on) drives the
/// scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DrainPolicy {
    /// Stop once the awaited promise is settled and the microtask queue is
    /// empty. Timers nobody waits for stay queued.
    #[default]
    UntilSettled,
    /// Run until both queues are empty, so every queued timer fires.
    AllWork,
}

/// Configuration for a [`RunContext`](super::RunContext).
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// How far `block_on` drives the scheduler.
    pub drain_policy: DrainPolicy,
    /// Lower bound applied to every timer delay.
    pub min_timer_delay: Duration,
    /// Maximum number of jobs a single scheduler run may execute.
    pub max_steps: usize,
    /// Separator placed between `describe` prefixes and test names.
    pub name_separator: String,
    /// Initial virtual time.
    pub start_time: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            drain_policy: DrainPolicy::default(),
            min_timer_delay: Duration::from_millis(1),
            max_steps: 100_000,
            name_separator: " ".to_string(),
            start_time: Duration::ZERO,
        }
    }
}

impl RunConfig {
    /// Create a new default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the drain policy.
    #[must_use]
    pub fn with_drain_policy(mut self, policy: DrainPolicy) -> Self {
        self.drain_policy = policy;
        self
    }

    /// Drain all work, including timers nobody awaits.
    #[must_use]
    pub fn drain_all(self) -> Self {
        self.with_drain_policy(DrainPolicy::AllWork)
    }

    /// Set the minimum timer delay.
    #[must_use]
    pub fn with_min_timer_delay(mut self, delay: Duration) -> Self {
        self.min_timer_delay = delay;
        self
    }

    /// Set the step limit.
    #[must_use]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Set the test name separator.
    #[must_use]
    pub fn with_name_separator(mut self, separator: impl Into<String>) -> Self {
        self.name_separator = separator.into();
        self
    }

    /// Set the initial virtual time.
    #[must_use]
    pub fn with_start_time(mut self, time: Duration) -> Self {
        self.start_time = time;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_config_builder() {
        let config = RunConfig::new()
            .drain_all()
            .with_min_timer_delay(Duration::ZERO)
            .with_max_steps(50)
            .with_name_separator(" > ")
            .with_start_time(Duration::from_secs(100));

        assert_eq!(config.drain_policy, DrainPolicy::AllWork);
        assert_eq!(config.min_timer_delay, Duration::ZERO);
        assert_eq!(config.max_steps, 50);
        assert_eq!(config.name_separator, " > ");
        assert_eq!(config.start_time, Duration::from_secs(100));
    }

    #[test]
    fn test_run_config_default() {
        let config = RunConfig::default();

        assert_eq!(config.drain_policy, DrainPolicy::UntilSettled);
        assert_eq!(config.min_timer_delay, Duration::from_millis(1));
        assert_eq!(config.max_steps, 100_000);
        assert_eq!(config.name_separator, " ");
        assert_eq!(config.start_time, Duration::ZERO);
    }
}
