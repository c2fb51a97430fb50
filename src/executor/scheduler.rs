//! The two-queue cooperative scheduler.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::clock::{TimerCallback, TimerId, TimerQueue, VirtualClock};
use crate::error::{Error, Result};
use crate::executor::task::{BoxFuture, TaskCell, TaskId};
use crate::runtime::RunConfig;

/// A queued microtask.
pub(crate) type Microtask = Box<dyn FnOnce() + Send>;

/// Counts of jobs executed by one run of the scheduler loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainStats {
    /// Microtasks executed.
    pub microtasks: usize,
    /// Timer callbacks executed.
    pub timers: usize,
}

impl DrainStats {
    /// Total number of jobs executed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.microtasks + self.timers
    }
}

/// A deterministic scheduler with a microtask queue and a timer queue.
///
/// Nothing runs on its own. Jobs run only when one of the `run_*` methods is
/// called, and always in this order: the microtask queue is drained to empty
/// (including microtasks queued while draining), then the single earliest
/// timer runs, then microtasks drain again, and so on.
///
/// # Example
///
/// ```rust
/// use microtick::executor::Scheduler;
/// use parking_lot::Mutex;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let scheduler = Scheduler::new();
/// let log = Arc::new(Mutex::new(Vec::new()));
///
/// let l = log.clone();
/// scheduler.enqueue_timer(Duration::ZERO, move || l.lock().push("timer"));
/// let l = log.clone();
/// scheduler.enqueue_microtask(move || l.lock().push("microtask"));
///
/// let stats = scheduler.run_to_quiescence().unwrap();
/// assert_eq!(stats.total(), 2);
/// assert_eq!(*log.lock(), vec!["microtask", "timer"]);
/// ```
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

pub(crate) struct SchedulerInner {
    /// FIFO of ready microtasks.
    microtasks: Mutex<VecDeque<Microtask>>,
    /// Macrotasks ordered by fire time.
    timers: Mutex<TimerQueue>,
    clock: VirtualClock,
    /// Routines spawned and not yet finished. Weak: a parked routine is owned
    /// by whatever will wake it.
    tasks: Mutex<HashMap<TaskId, Weak<TaskCell>>>,
    next_task: AtomicU64,
    /// Job budget for a single run of the loop.
    max_steps: usize,
}

impl Scheduler {
    /// Creates a scheduler with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::from_config(&RunConfig::default())
    }

    /// Creates a scheduler from a run configuration.
    #[must_use]
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                microtasks: Mutex::new(VecDeque::new()),
                timers: Mutex::new(TimerQueue::new()),
                clock: VirtualClock::new(config.start_time, config.min_timer_delay),
                tasks: Mutex::new(HashMap::new()),
                next_task: AtomicU64::new(0),
                max_steps: config.max_steps,
            }),
        }
    }

    /// Returns the virtual clock.
    #[must_use]
    pub fn clock(&self) -> &VirtualClock {
        &self.inner.clock
    }

    /// Returns the current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.inner.clock.now()
    }

    /// Appends a job to the microtask queue.
    pub fn enqueue_microtask<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut queue = self.inner.microtasks.lock();
        queue.push_back(Box::new(job));
        tracing::trace!(queued = queue.len(), "microtask enqueued");
    }

    /// Queues a callback to run once `delay` of virtual time has passed.
    ///
    /// The delay is raised to the configured minimum, so a zero delay still
    /// waits for at least one full microtask drain.
    pub fn enqueue_timer<F>(&self, delay: Duration, job: F) -> TimerId
    where
        F: FnOnce() + Send + 'static,
    {
        let fire_at = self.inner.clock.deadline(delay);
        let callback: TimerCallback = Box::new(job);
        let id = self.inner.timers.lock().register(fire_at, callback);
        tracing::trace!(timer = %id, ?fire_at, "timer enqueued");
        id
    }

    /// Removes a queued timer. Returns `false` if it already ran.
    pub fn cancel_timer(&self, id: TimerId) -> bool {
        let cancelled = self.inner.timers.lock().cancel(id);
        tracing::trace!(timer = %id, cancelled, "timer cancelled");
        cancelled
    }

    /// Returns the number of queued microtasks.
    #[must_use]
    pub fn microtask_count(&self) -> usize {
        self.inner.microtasks.lock().len()
    }

    /// Returns the number of queued timers.
    #[must_use]
    pub fn timer_count(&self) -> usize {
        self.inner.timers.lock().len()
    }

    /// Fire time of the next timer, if any.
    #[must_use]
    pub fn next_timer_at(&self) -> Option<Duration> {
        self.inner.timers.lock().next_fire_at()
    }

    /// Number of spawned routines that have not finished.
    #[must_use]
    pub fn parked_routines(&self) -> usize {
        self.inner
            .tasks
            .lock()
            .values()
            .filter(|task| task.strong_count() > 0)
            .count()
    }

    /// Returns true if both queues are empty.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.microtask_count() == 0 && self.timer_count() == 0
    }

    /// Runs the first queued microtask.
    ///
    /// Returns `false` if the microtask queue was empty.
    pub fn run_microtask(&self) -> bool {
        // The lock is released before the job runs; jobs enqueue more work.
        let job = self.inner.microtasks.lock().pop_front();
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Runs the single earliest timer, advancing the clock to its fire time.
    ///
    /// Returns `false` if no timer was queued.
    pub fn run_timer(&self) -> bool {
        let entry = self.inner.timers.lock().pop_earliest();
        match entry {
            Some(entry) => {
                let now = self.inner.clock.jump_to(entry.fire_at);
                tracing::trace!(timer = %entry.id, ?now, "timer fired");
                (entry.callback)();
                true
            }
            None => false,
        }
    }

    /// Drains the microtask queue to empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StepLimitExceeded`] if more than the configured
    /// number of jobs run.
    pub fn drain_microtasks(&self) -> Result<usize> {
        let mut stats = DrainStats::default();
        self.drain_into(&mut stats)?;
        Ok(stats.microtasks)
    }

    /// Runs until both queues are empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StepLimitExceeded`] if more than the configured
    /// number of jobs run.
    pub fn run_to_quiescence(&self) -> Result<DrainStats> {
        self.run_until(|| false)
    }

    /// Runs until `done` returns true after a full microtask drain, or until
    /// both queues are empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StepLimitExceeded`] if more than the configured
    /// number of jobs run.
    pub fn run_until<F>(&self, mut done: F) -> Result<DrainStats>
    where
        F: FnMut() -> bool,
    {
        let mut stats = DrainStats::default();
        loop {
            self.drain_into(&mut stats)?;
            if done() || !self.run_timer() {
                tracing::debug!(
                    microtasks = stats.microtasks,
                    timers = stats.timers,
                    "scheduler run finished"
                );
                return Ok(stats);
            }
            stats.timers += 1;
            self.check_budget(&stats)?;
        }
    }

    /// Discards all outstanding work: queued microtasks, queued timers, and
    /// the futures of routines that have not finished.
    ///
    /// Returns how many jobs and routines were dropped. The clock and the id
    /// counters are untouched, so the scheduler stays usable.
    pub fn shutdown(&self) -> usize {
        let microtasks = std::mem::take(&mut *self.inner.microtasks.lock());
        let timers = self.inner.timers.lock().clear();
        let tasks = std::mem::take(&mut *self.inner.tasks.lock());
        let routines: Vec<BoxFuture> = tasks
            .values()
            .filter_map(Weak::upgrade)
            .filter_map(|task| task.cancel())
            .collect();

        let discarded = microtasks.len() + timers.len() + routines.len();
        tracing::debug!(
            microtasks = microtasks.len(),
            timers = timers.len(),
            routines = routines.len(),
            "scheduler shut down"
        );
        // Dropped here, with no lock held: their destructors may reach back
        // into the scheduler.
        drop((microtasks, timers, routines));
        discarded
    }

    /// Starts a routine, polling it synchronously up to its first suspension.
    pub(crate) fn spawn_task(&self, future: BoxFuture) -> TaskId {
        let id = TaskId::from_raw(self.inner.next_task.fetch_add(1, Ordering::Relaxed));
        let task = TaskCell::new(id, future);
        self.inner.tasks.lock().insert(id, Arc::downgrade(&task));
        tracing::debug!(task = %id, "routine spawned");
        let _ = task.poll(self);
        id
    }

    /// Forgets a finished routine.
    pub(crate) fn retire(&self, id: TaskId) {
        self.inner.tasks.lock().remove(&id);
    }

    pub(crate) fn downgrade(&self) -> Weak<SchedulerInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<SchedulerInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    fn drain_into(&self, stats: &mut DrainStats) -> Result<()> {
        while self.run_microtask() {
            stats.microtasks += 1;
            self.check_budget(stats)?;
        }
        Ok(())
    }

    fn check_budget(&self, stats: &DrainStats) -> Result<()> {
        if stats.total() > self.inner.max_steps {
            return Err(Error::StepLimitExceeded(self.inner.max_steps));
        }
        Ok(())
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("now", &self.now())
            .field("microtasks", &self.microtask_count())
            .field("timers", &self.timer_count())
            .field("routines", &self.parked_routines())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn push(log: &Log, entry: &'static str) -> impl FnOnce() + Send + 'static {
        let log = Arc::clone(log);
        move || log.lock().push(entry)
    }

    #[test]
    fn test_new_scheduler_is_idle() {
        let scheduler = Scheduler::new();
        assert!(scheduler.is_idle());
        assert_eq!(scheduler.now(), Duration::ZERO);
    }

    #[test]
    fn test_microtasks_run_fifo() {
        let scheduler = Scheduler::new();
        let log = Log::default();
        scheduler.enqueue_microtask(push(&log, "a"));
        scheduler.enqueue_microtask(push(&log, "b"));
        scheduler.enqueue_microtask(push(&log, "c"));

        assert_eq!(scheduler.drain_microtasks().unwrap(), 3);
        assert_eq!(*log.lock(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_microtasks_enqueued_while_draining_run_before_timers() {
        let scheduler = Scheduler::new();
        let log = Log::default();

        scheduler.enqueue_timer(Duration::ZERO, push(&log, "timer"));
        let nested = scheduler.clone();
        let l = Arc::clone(&log);
        scheduler.enqueue_microtask(move || {
            l.lock().push("outer");
            nested.enqueue_microtask(push(&l, "inner"));
        });

        let stats = scheduler.run_to_quiescence().unwrap();
        assert_eq!(stats, DrainStats { microtasks: 2, timers: 1 });
        assert_eq!(*log.lock(), vec!["outer", "inner", "timer"]);
    }

    #[test]
    fn test_timer_microtasks_drain_before_next_timer() {
        let scheduler = Scheduler::new();
        let log = Log::default();

        let nested = scheduler.clone();
        let l = Arc::clone(&log);
        scheduler.enqueue_timer(Duration::from_millis(5), move || {
            l.lock().push("first timer");
            nested.enqueue_microtask(push(&l, "first timer's microtask"));
        });
        scheduler.enqueue_timer(Duration::from_millis(5), push(&log, "second timer"));

        scheduler.run_to_quiescence().unwrap();
        assert_eq!(
            *log.lock(),
            vec!["first timer", "first timer's microtask", "second timer"]
        );
    }

    #[test]
    fn test_timers_ordered_by_fire_time_then_insertion() {
        let scheduler = Scheduler::new();
        let log = Log::default();

        scheduler.enqueue_timer(Duration::from_millis(100), push(&log, "100a"));
        scheduler.enqueue_timer(Duration::from_millis(10), push(&log, "10"));
        scheduler.enqueue_timer(Duration::from_millis(100), push(&log, "100b"));
        // Zero is clamped to the 1ms minimum and ties with an explicit 1ms
        scheduler.enqueue_timer(Duration::ZERO, push(&log, "0"));
        scheduler.enqueue_timer(Duration::from_millis(1), push(&log, "1"));

        scheduler.run_to_quiescence().unwrap();
        assert_eq!(*log.lock(), vec!["0", "1", "10", "100a", "100b"]);
        assert_eq!(scheduler.now(), Duration::from_millis(100));
    }

    #[test]
    fn test_cancel_timer() {
        let scheduler = Scheduler::new();
        let log = Log::default();

        let id = scheduler.enqueue_timer(Duration::ZERO, push(&log, "cancelled"));
        scheduler.enqueue_timer(Duration::ZERO, push(&log, "kept"));

        assert!(scheduler.cancel_timer(id));
        assert!(!scheduler.cancel_timer(id));
        scheduler.run_to_quiescence().unwrap();
        assert_eq!(*log.lock(), vec!["kept"]);
    }

    #[test]
    fn test_run_until_stops_before_later_timers() {
        let scheduler = Scheduler::new();
        let log = Log::default();

        scheduler.enqueue_timer(Duration::from_millis(1), push(&log, "first"));
        scheduler.enqueue_timer(Duration::from_millis(2), push(&log, "second"));

        let seen = Arc::clone(&log);
        let stats = scheduler.run_until(|| !seen.lock().is_empty()).unwrap();
        assert_eq!(stats.timers, 1);
        assert_eq!(*log.lock(), vec!["first"]);
        assert_eq!(scheduler.timer_count(), 1);
        assert_eq!(scheduler.next_timer_at(), Some(Duration::from_millis(2)));
    }

    #[test]
    fn test_step_limit() {
        let config = RunConfig::new().with_max_steps(10);
        let scheduler = Scheduler::from_config(&config);

        fn forever(scheduler: Scheduler) {
            let next = scheduler.clone();
            scheduler.enqueue_microtask(move || forever(next));
        }
        forever(scheduler.clone());

        assert_eq!(
            scheduler.run_to_quiescence(),
            Err(Error::StepLimitExceeded(10))
        );
    }

    #[test]
    fn test_start_time_from_config() {
        let config = RunConfig::new().with_start_time(Duration::from_secs(5));
        let scheduler = Scheduler::from_config(&config);
        assert_eq!(scheduler.now(), Duration::from_secs(5));

        scheduler.enqueue_timer(Duration::from_millis(10), || {});
        assert_eq!(
            scheduler.next_timer_at(),
            Some(Duration::from_secs(5) + Duration::from_millis(10))
        );
    }

    #[test]
    fn test_debug() {
        let scheduler = Scheduler::new();
        scheduler.enqueue_microtask(|| {});
        let debug = format!("{scheduler:?}");
        assert!(debug.contains("Scheduler"));
        assert!(debug.contains("microtasks: 1"));
    }

    #[test]
    fn test_shutdown_discards_queued_work() {
        let scheduler = Scheduler::new();
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        scheduler.enqueue_microtask(push(&log, "microtask"));
        scheduler.enqueue_timer(Duration::from_millis(10), push(&log, "timer"));

        assert_eq!(scheduler.shutdown(), 2);
        assert!(scheduler.is_idle());
        assert_eq!(scheduler.run_to_quiescence(), Ok(DrainStats::default()));
        assert!(log.lock().is_empty());
        assert_eq!(scheduler.now(), Duration::ZERO);

        // Still usable afterwards.
        scheduler.enqueue_microtask(push(&log, "after"));
        scheduler.run_to_quiescence().unwrap();
        assert_eq!(*log.lock(), vec!["after"]);
    }

    #[test]
    fn test_parked_routines_are_tracked_until_done() {
        let scheduler = Scheduler::new();
        let id = scheduler.spawn_task(Box::pin(async {}));
        assert_eq!(id.as_u64(), 0);
        assert_eq!(scheduler.parked_routines(), 0);

        let parked = scheduler.spawn_task(Box::pin(std::future::pending::<()>()));
        assert_eq!(parked.as_u64(), 1);
        // Nothing can wake it, so nothing owns it either.
        assert_eq!(scheduler.parked_routines(), 0);
    }

    #[test]
    fn test_shutdown_drops_parked_routine() {
        struct Guard(Arc<Mutex<bool>>);

        impl Drop for Guard {
            fn drop(&mut self) {
                *self.0.lock() = true;
            }
        }

        let scheduler = Scheduler::new();
        let dropped = Arc::new(Mutex::new(false));
        let guard = Guard(Arc::clone(&dropped));
        let wakers: Arc<Mutex<Vec<std::task::Waker>>> = Arc::new(Mutex::new(Vec::new()));
        let stash = Arc::clone(&wakers);

        scheduler.spawn_task(Box::pin(async move {
            let _guard = guard;
            std::future::poll_fn(|cx| {
                stash.lock().push(cx.waker().clone());
                std::task::Poll::<()>::Pending
            })
            .await;
        }));
        assert_eq!(scheduler.parked_routines(), 1);
        assert!(!*dropped.lock());

        assert_eq!(scheduler.shutdown(), 1);
        assert!(*dropped.lock());
        assert_eq!(scheduler.parked_routines(), 0);

        // A stale waker resumes nothing.
        for waker in wakers.lock().drain(..) {
            waker.wake();
        }
        scheduler.run_to_quiescence().unwrap();
    }
}
