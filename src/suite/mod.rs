//! The ordering contract, written as harness tests.
//!
//! [`register`] adds every scenario to a [`RunContext`] under the `promise`
//! group. Each one pins down one guarantee of the model with literal
//! expected values: first-call-wins settlement, errors surfacing at the
//! await point, initializers running inside the constructor, and the exact
//! interleaving of microtasks and timers.
//!
//! # Example
//!
//! ```rust
//! use microtick::prelude::*;
//!
//! let ctx = RunContext::new();
//! microtick::suite::register(&ctx);
//! let report = ctx.run().unwrap();
//! assert!(report.is_success(), "{report}");
//! ```
//!
//! The ordering scenarios are also exposed as plain routines over a
//! [`Trace`], so they can be driven with other configurations.

mod async_fn;
mod constructor;
mod errors;
pub mod execution_order;
mod multitimes;
mod trace;

use crate::runtime::RunContext;

pub use async_fn::timer_race;
pub use trace::{Slot, Trace};

/// Registers the full scenario suite on `ctx`.
pub fn register(ctx: &RunContext) {
    ctx.describe("promise", || {
        ctx.describe("error catching", || errors::register_catching(ctx));
        ctx.describe("multitimes", || multitimes::register(ctx));
        ctx.describe("constructor", || {
            ctx.describe("sync", || constructor::register_sync(ctx));
            ctx.describe("error thrown synchronously in constructor", || {
                errors::register_constructor(ctx);
            });
            ctx.describe("duplicated operation", || errors::register_duplicated(ctx));
            ctx.describe("execution order", || execution_order::register(ctx));
        });
        ctx.describe("async function", || async_fn::register(ctx));
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_counts() {
        let ctx = RunContext::new();
        register(&ctx);
        assert_eq!(ctx.test_count(), 26);
    }

    #[test]
    fn test_suite_passes() {
        crate::test_utils::init_test_logging();
        let ctx = RunContext::new();
        register(&ctx);
        let report = ctx.run().unwrap();
        assert!(report.is_success(), "{report}");
        assert_eq!(report.passed(), 26);
    }
}
