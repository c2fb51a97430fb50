//! The run context: one scheduler, one test registry, one configuration.
//!
//! A [`RunContext`] replaces the process-wide event loop and test registry a
//! script host would provide. Everything that schedules work (promises,
//! routines, timers) is created from a context, and nothing runs until the
//! context is driven with [`RunContext::block_on`] or [`RunContext::run`].
//! Two contexts never share state, so running the same registrations on a
//! fresh context reproduces the same orderings.
//!
//! # Example
//!
//! ```rust
//! use microtick::prelude::*;
//! use std::time::Duration;
//!
//! let ctx = RunContext::new();
//! let timer_ctx = ctx.clone();
//! let routine: Promise<u32, Error> = ctx.spawn(async move {
//!     timer_ctx.sleep(Duration::from_millis(100)).await.ok();
//!     Ok(42)
//! });
//!
//! assert_eq!(ctx.block_on(&routine).unwrap(), Ok(42));
//! assert_eq!(ctx.now(), Duration::from_millis(100));
//! ```

mod config;

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::clock::TimerId;
use crate::error::{Error, Result};
use crate::executor::{Routine, Scheduler};
use crate::harness::{self, Registry, Report, TestOutput};
use crate::promise::{Promise, Tick};

pub use config::{DrainPolicy, RunConfig};

/// Handle to a deterministic run.
///
/// Cheap to clone; clones share the scheduler and the test registry.
#[derive(Clone)]
pub struct RunContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    scheduler: Scheduler,
    config: RunConfig,
    registry: Mutex<Registry>,
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        self.scheduler.shutdown();
    }
}

impl RunContext {
    /// Create a context with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RunConfig::default())
    }

    /// Create a context with the given configuration.
    #[must_use]
    pub fn with_config(config: RunConfig) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                scheduler: Scheduler::from_config(&config),
                config,
                registry: Mutex::new(Registry::default()),
            }),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.inner.config
    }

    /// Returns the scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    /// Returns the current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.inner.scheduler.now()
    }

    /// Starts a routine and returns a promise for its completion.
    ///
    /// The routine runs synchronously inside this call up to its first
    /// suspension point. Each later resumption happens in a microtask queued
    /// by the promise it was waiting on.
    pub fn spawn<T, E, F>(&self, routine: F) -> Promise<T, E>
    where
        T: Clone + Send + 'static,
        E: Clone + Send + 'static,
        F: Future<Output = std::result::Result<T, E>> + Send + 'static,
    {
        let (promise, resolver) = Promise::with_scheduler(&self.inner.scheduler);
        self.inner
            .scheduler
            .spawn_task(Box::pin(Routine::new(routine, resolver)));
        promise
    }

    /// Runs `callback` once `delay` of virtual time has passed.
    pub fn set_timeout<F>(&self, delay: Duration, callback: F) -> TimerId
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.scheduler.enqueue_timer(delay, callback)
    }

    /// Cancels a timer. Returns `false` if it already ran or was cancelled.
    pub fn clear_timeout(&self, id: TimerId) -> bool {
        self.inner.scheduler.cancel_timer(id)
    }

    /// Returns a promise fulfilled by a timer after `delay`.
    #[must_use]
    pub fn sleep(&self, delay: Duration) -> Promise<(), Infallible> {
        let (promise, resolver) = Promise::pending(self);
        self.set_timeout(delay, move || {
            resolver.fulfill(());
        });
        promise
    }

    /// Returns an already-fulfilled promise.
    ///
    /// Awaiting it is how a routine awaits a plain value: one microtask hop.
    #[must_use]
    pub fn resolve<T>(&self, value: T) -> Promise<T, Infallible>
    where
        T: Clone + Send + 'static,
    {
        Promise::resolved(self, value)
    }

    /// Returns a future that resumes after one microtask hop.
    #[must_use]
    pub fn tick(&self) -> Tick {
        Tick::new(self.resolve(()))
    }

    /// Drives the scheduler and returns `promise`'s outcome.
    ///
    /// How much work runs depends on the configured [`DrainPolicy`]. Must not
    /// be called from inside a job running on this context.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Stalled`] if the queues run dry while the promise is
    /// still pending (it reports how many routines are still suspended), and [`Error::StepLimitExceeded`] if the run does not
    /// finish within the configured budget.
    pub fn block_on<T, E>(&self, promise: &Promise<T, E>) -> Result<std::result::Result<T, E>>
    where
        T: Clone + Send + 'static,
        E: Clone + Send + 'static,
    {
        let scheduler = &self.inner.scheduler;
        let stats = match self.inner.config.drain_policy {
            DrainPolicy::UntilSettled => scheduler.run_until(|| promise.is_settled())?,
            DrainPolicy::AllWork => scheduler.run_to_quiescence()?,
        };
        tracing::debug!(
            policy = ?self.inner.config.drain_policy,
            jobs = stats.total(),
            now = ?scheduler.now(),
            "block_on finished"
        );

        promise.peek().ok_or_else(|| Error::Stalled {
            parked_routines: scheduler.parked_routines(),
        })
    }

    /// Groups the tests registered by `body` under `name`.
    ///
    /// `body` runs immediately. Groups nest; the full name of a test is every
    /// enclosing group name and the test name, joined with the configured
    /// separator.
    pub fn describe<F>(&self, name: &str, body: F)
    where
        F: FnOnce(),
    {
        self.inner.registry.lock().enter(name);
        body();
        self.inner.registry.lock().exit();
    }

    /// Registers a test.
    ///
    /// The body returns `Result<()>` for a synchronous test or a
    /// `Promise<(), Error>` for an asynchronous one.
    pub fn test<F, O>(&self, name: &str, body: F)
    where
        F: FnOnce(RunContext) -> O + Send + 'static,
        O: Into<TestOutput>,
    {
        let full_name = self.inner.registry.lock().register(
            name,
            &self.inner.config.name_separator,
            Box::new(move |ctx| body(ctx).into()),
        );
        tracing::trace!(test = %full_name, "test registered");
    }

    /// Registers a test whose body is a routine.
    pub fn test_async<F, Fut>(&self, name: &str, body: F)
    where
        F: FnOnce(RunContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.test(name, move |ctx| {
            let routine = body(ctx.clone());
            ctx.spawn(routine)
        });
    }

    /// Number of tests registered and not yet run.
    #[must_use]
    pub fn test_count(&self) -> usize {
        self.inner.registry.lock().len()
    }

    /// Runs every registered test in registration order.
    ///
    /// The registry is emptied. A failing test never stops the run; its
    /// failure is recorded in the [`Report`]. Work still outstanding when the
    /// run ends, such as timers nobody awaited, is discarded with
    /// [`RunContext::shutdown`].
    ///
    /// # Errors
    ///
    /// Returns the driver's error if the scheduler stalls or exceeds its
    /// step limit.
    pub fn run(&self) -> Result<Report> {
        let entries = self.inner.registry.lock().take_entries();
        let report = harness::run(self, entries);
        self.shutdown();
        report
    }

    /// Drops every queued job and every suspended routine.
    ///
    /// Routines often hold a clone of their context, so a routine parked on
    /// a promise that never settles keeps the whole context alive. This
    /// breaks such cycles; dropping the last handle does the same for work
    /// that holds no handle. Returns the number of jobs and routines dropped.
    pub fn shutdown(&self) -> usize {
        self.inner.scheduler.shutdown()
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("scheduler", &self.inner.scheduler)
            .field("config", &self.inner.config)
            .field("tests", &self.test_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_runs_synchronously_until_first_await() {
        let ctx = RunContext::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let l = Arc::clone(&log);
        let tick = ctx.tick();
        let routine: Promise<(), ()> = ctx.spawn(async move {
            l.lock().push(1);
            tick.await;
            l.lock().push(3);
            Ok(())
        });
        log.lock().push(2);

        assert_eq!(*log.lock(), vec![1, 2]);
        assert_eq!(ctx.block_on(&routine).unwrap(), Ok(()));
        assert_eq!(*log.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn test_sleep_advances_virtual_time() {
        let ctx = RunContext::new();
        let sleep = ctx.sleep(Duration::from_secs(3600));
        assert_eq!(ctx.block_on(&sleep).unwrap(), Ok(()));
        assert_eq!(ctx.now(), Duration::from_secs(3600));
    }

    #[test]
    fn test_clear_timeout() {
        let ctx = RunContext::new();
        let fired = Arc::new(Mutex::new(false));
        let f = Arc::clone(&fired);
        let id = ctx.set_timeout(Duration::ZERO, move || *f.lock() = true);

        assert!(ctx.clear_timeout(id));
        ctx.scheduler().run_to_quiescence().unwrap();
        assert!(!*fired.lock());
    }

    #[test]
    fn test_block_on_stalls_on_unsettled_promise() {
        let ctx = RunContext::new();
        let (promise, _resolver) = Promise::<(), ()>::pending(&ctx);
        assert_eq!(
            ctx.block_on(&promise),
            Err(Error::Stalled { parked_routines: 0 })
        );
    }

    #[test]
    fn test_block_on_until_settled_leaves_timers() {
        let ctx = RunContext::new();
        ctx.set_timeout(Duration::from_millis(50), || {});
        let promise = Promise::<i32, ()>::resolved(&ctx, 1);

        assert_eq!(ctx.block_on(&promise).unwrap(), Ok(1));
        assert_eq!(ctx.scheduler().timer_count(), 1);
        assert_eq!(ctx.now(), Duration::ZERO);
    }

    #[test]
    fn test_block_on_all_work_fires_timers() {
        let ctx = RunContext::with_config(RunConfig::new().drain_all());
        ctx.set_timeout(Duration::from_millis(50), || {});
        let promise = Promise::<i32, ()>::resolved(&ctx, 1);

        assert_eq!(ctx.block_on(&promise).unwrap(), Ok(1));
        assert!(ctx.scheduler().is_idle());
        assert_eq!(ctx.now(), Duration::from_millis(50));
    }

    #[test]
    fn test_describe_nests_names() {
        let ctx = RunContext::with_config(RunConfig::new().with_name_separator("/"));
        ctx.describe("outer", || {
            ctx.describe("inner", || {
                ctx.test("a", |_| -> Result<()> { Ok(()) });
            });
            ctx.test("b", |_| -> Result<()> { Ok(()) });
        });
        ctx.test("c", |_| -> Result<()> { Ok(()) });

        let report = ctx.run().unwrap();
        let names: Vec<&str> = report.results().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["outer/inner/a", "outer/b", "c"]);
        assert_eq!(ctx.test_count(), 0);
    }

    #[test]
    fn test_debug() {
        let ctx = RunContext::new();
        let debug = format!("{ctx:?}");
        assert!(debug.contains("RunContext"));
        assert!(debug.contains("tests: 0"));
    }

    struct DropFlag(Arc<Mutex<bool>>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            *self.0.lock() = true;
        }
    }

    #[test]
    fn test_block_on_reports_suspended_routines() {
        let ctx = RunContext::new();
        let (never, _resolver) = Promise::<(), ()>::pending(&ctx);
        let routine: Promise<(), ()> = ctx.spawn(async move { never.await });

        assert_eq!(
            ctx.block_on(&routine),
            Err(Error::Stalled { parked_routines: 1 })
        );
    }

    #[test]
    fn test_abandoned_timer_does_not_outlive_context() {
        let ctx = RunContext::new();
        let weak = ctx.scheduler().downgrade();
        let sleep = ctx.sleep(Duration::from_millis(100));
        let ready = Promise::<i32, ()>::resolved(&ctx, 1);

        assert_eq!(ctx.block_on(&ready).unwrap(), Ok(1));
        assert_eq!(ctx.scheduler().timer_count(), 1);

        drop(ctx);
        assert!(Scheduler::upgrade(&weak).is_none());
        assert_eq!(sleep.state(), crate::promise::PromiseState::Pending);
    }

    #[test]
    fn test_parked_routine_is_dropped_with_context() {
        let ctx = RunContext::new();
        let weak = ctx.scheduler().downgrade();
        let dropped = Arc::new(Mutex::new(false));
        let flag = DropFlag(Arc::clone(&dropped));
        let (never, resolver) = Promise::<(), ()>::pending(&ctx);

        let routine: Promise<(), ()> = ctx.spawn(async move {
            let _flag = flag;
            never.await
        });
        assert_eq!(ctx.scheduler().parked_routines(), 1);

        drop(routine);
        drop(ctx);
        assert!(*dropped.lock());
        assert!(Scheduler::upgrade(&weak).is_none());

        // Settling after the scheduler is gone is harmless.
        assert!(resolver.fulfill(()));
    }

    #[test]
    fn test_shutdown_releases_routine_holding_its_context() {
        let ctx = RunContext::new();
        let weak = ctx.scheduler().downgrade();
        let dropped = Arc::new(Mutex::new(false));
        let flag = DropFlag(Arc::clone(&dropped));
        let (never, _resolver) = Promise::<(), ()>::pending(&ctx);

        let held = ctx.clone();
        let _routine: Promise<(), ()> = ctx.spawn(async move {
            let _flag = flag;
            never.await?;
            held.tick().await;
            Ok(())
        });

        assert_eq!(ctx.shutdown(), 1);
        assert!(*dropped.lock());
        assert_eq!(ctx.scheduler().parked_routines(), 0);

        drop(ctx);
        assert!(Scheduler::upgrade(&weak).is_none());
    }

    #[test]
    fn test_run_discards_leftover_work() {
        let ctx = RunContext::new();
        ctx.test("leaves a timer behind", |ctx| -> Result<()> {
            ctx.set_timeout(Duration::from_secs(1), || {});
            Ok(())
        });

        let report = ctx.run().unwrap();
        assert!(report.is_success());
        assert!(ctx.scheduler().is_idle());
        assert_eq!(ctx.now(), Duration::ZERO);
    }
}
