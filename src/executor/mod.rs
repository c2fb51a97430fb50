//! Deterministic two-queue scheduling.
//!
//! This module provides the [`Scheduler`]: a microtask FIFO and a timer queue
//! with a fixed drain order, plus the task cells that drive suspendable
//! routines. A routine's waker is its resumption token: waking it queues one
//! microtask that polls the routine again.
//!
//! # Example
//!
//! ```rust
//! use microtick::executor::Scheduler;
//! use std::time::Duration;
//!
//! let scheduler = Scheduler::new();
//! scheduler.enqueue_timer(Duration::from_millis(100), || {});
//! scheduler.enqueue_microtask(|| {});
//!
//! assert_eq!(scheduler.microtask_count(), 1);
//! assert_eq!(scheduler.timer_count(), 1);
//!
//! let stats = scheduler.run_to_quiescence().unwrap();
//! assert_eq!((stats.microtasks, stats.timers), (1, 1));
//! assert_eq!(scheduler.now(), Duration::from_millis(100));
//! ```

mod routine;
mod scheduler;
mod task;

pub(crate) use routine::Routine;
pub use scheduler::{DrainStats, Scheduler};
pub(crate) use scheduler::SchedulerInner;
pub use task::TaskId;
