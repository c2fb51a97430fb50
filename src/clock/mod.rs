//! Virtual time and the timer queue.
//!
//! [`VirtualClock`] is the time a scheduler reports and advances when it
//! fires a timer. Timers wait in a queue ordered by deadline, with ties
//! broken by insertion order.

mod timer;
mod virtual_clock;

pub use timer::TimerId;
pub use virtual_clock::VirtualClock;

pub(crate) use timer::{TimerCallback, TimerQueue};
