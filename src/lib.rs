//! # microtick
//!
//! > A deterministic model of promises and the microtask scheduler
//!
//! **microtick** reproduces the ordering guarantees of a promise runtime on
//! virtual time: initializers that run inside the constructor, reactions that
//! always wait for a microtask, microtask queues that drain completely before
//! any timer fires, and first-call-wins settlement. Nothing runs on a real
//! event loop, so every interleaving is reproducible.
//!
//! ## Quick Start
//!
//! ```rust
//! use microtick::prelude::*;
//!
//! let ctx = RunContext::new();
//! let log = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
//!
//! let l = log.clone();
//! let tick = ctx.tick();
//! let routine: Promise<(), Error> = ctx.spawn(async move {
//!     tick.await;
//!     l.lock().push(1);
//!     Ok(())
//! });
//! log.lock().push(2);
//!
//! ctx.block_on(&routine).unwrap().unwrap();
//! assert_eq!(*log.lock(), vec![2, 1]);
//! ```
//!
//! ## Features
//!
//! - **Scheduler** - Microtask FIFO and timer queue on a virtual clock
//! - **Promises** - Single-assignment values with `then`/`catch`/`finally`
//! - **Routines** - `async` blocks resumed from microtasks
//! - **Harness** - `describe`/`test`/`expect` with a structured [`Report`](harness::Report)
//! - **Suite** - The ordering contract itself, as runnable tests

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Virtual clock and timer queue
pub mod clock;

pub mod assertions;
pub mod error;
pub mod executor;
pub mod harness;
pub mod promise;
pub mod runtime;
pub mod suite;

#[cfg(test)]
mod test_utils;

/// Prelude for convenient imports
///
/// ```rust
/// use microtick::prelude::*;
/// ```
pub mod prelude {
    pub use crate::assertions::{expect, matcher::Matcher, Expectation};
    pub use crate::clock::TimerId;
    pub use crate::error::{Error, Result};
    pub use crate::harness::{Report, TestOutput, TestResult};
    pub use crate::promise::{flip, Promise, PromiseState, Resolver};
    pub use crate::runtime::{DrainPolicy, RunConfig, RunContext};
}

// Re-exports
pub use error::{Error, Result};
