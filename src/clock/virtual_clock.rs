//! Virtual time owned by a scheduler.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

/// Virtual time, in whole milliseconds plus sub-millisecond remainder.
///
/// Only the scheduler moves it, and only forward: when a timer fires the
/// clock jumps to that timer's deadline. Clones observe the same time.
#[derive(Debug, Clone)]
pub struct VirtualClock {
    state: Arc<Mutex<ClockState>>,
}

#[derive(Debug)]
struct ClockState {
    now: Duration,
    /// Lower bound on every timer delay.
    min_delay: Duration,
}

impl VirtualClock {
    /// Creates a clock reading `start`, clamping timer delays to `min_delay`.
    #[must_use]
    pub fn new(start: Duration, min_delay: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(ClockState {
                now: start,
                min_delay,
            })),
        }
    }

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// The deadline of a timer armed now with `delay`.
    ///
    /// ```rust
    /// use microtick::clock::VirtualClock;
    /// use std::time::Duration;
    ///
    /// let clock = VirtualClock::new(Duration::ZERO, Duration::from_millis(1));
    /// assert_eq!(clock.deadline(Duration::ZERO), Duration::from_millis(1));
    /// assert_eq!(clock.deadline(Duration::from_millis(1)), Duration::from_millis(1));
    /// ```
    #[must_use]
    pub fn deadline(&self, delay: Duration) -> Duration {
        let state = self.state.lock();
        state.now + delay.max(state.min_delay)
    }

    /// Jumps to `deadline` if it lies ahead, returning the resulting time.
    pub(crate) fn jump_to(&self, deadline: Duration) -> Duration {
        let mut state = self.state.lock();
        if deadline > state.now {
            tracing::trace!(from = ?state.now, to = ?deadline, "clock moved");
            state.now = deadline;
        }
        state.now
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new(Duration::ZERO, Duration::from_millis(1))
    }
}
