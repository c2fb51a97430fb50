//! Task cells driving suspendable routines.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Wake, Waker};

use parking_lot::Mutex;

use super::scheduler::{Scheduler, SchedulerInner};

/// Identifier of a spawned routine, issued by its scheduler.
///
/// Ids count up from zero per scheduler, so two fresh contexts running the
/// same code log the same ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Spawn order of the routine on its scheduler.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "routine#{}", self.0)
    }
}

/// Type-erased boxed future.
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Owns a routine's state machine between polls.
///
/// The future is taken out while it is being polled, so a wake that arrives
/// mid-poll only queues a later poll and never re-enters the routine.
pub(crate) struct TaskCell {
    pub(crate) id: TaskId,
    future: Mutex<Option<BoxFuture>>,
    polls: AtomicUsize,
    cancelled: AtomicBool,
}

impl TaskCell {
    pub(crate) fn new(id: TaskId, future: BoxFuture) -> Arc<Self> {
        Arc::new(Self {
            id,
            future: Mutex::new(Some(future)),
            polls: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
        })
    }

    /// Takes the routine's future out for good; later polls and wakes are
    /// no-ops. A routine cancelled mid-poll drops its future when the poll
    /// returns.
    pub(crate) fn cancel(&self) -> Option<BoxFuture> {
        self.cancelled.store(true, Ordering::Release);
        self.future.lock().take()
    }

    /// Polls the routine once.
    ///
    /// Returns `Poll::Ready(())` once the routine has completed; polling a
    /// completed routine is a no-op.
    pub(crate) fn poll(self: &Arc<Self>, scheduler: &Scheduler) -> Poll<()> {
        let Some(mut future) = self.future.lock().take() else {
            return Poll::Ready(());
        };

        let waker = Waker::from(Arc::new(TaskWaker {
            task: Arc::clone(self),
            scheduler: scheduler.downgrade(),
        }));
        let mut cx = Context::from_waker(&waker);
        let poll_count = self.polls.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(task = %self.id, poll_count, "polling routine");

        match future.as_mut().poll(&mut cx) {
            Poll::Ready(()) => {
                tracing::debug!(task = %self.id, "routine completed");
                scheduler.retire(self.id);
                Poll::Ready(())
            }
            Poll::Pending if self.cancelled.load(Ordering::Acquire) => {
                tracing::debug!(task = %self.id, "routine cancelled while running");
                drop(future);
                Poll::Ready(())
            }
            Poll::Pending => {
                *self.future.lock() = Some(future);
                Poll::Pending
            }
        }
    }

    /// Number of times this routine has been polled.
    pub(crate) fn poll_count(&self) -> usize {
        self.polls.load(Ordering::Relaxed)
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.future.lock().is_none() && self.poll_count() > 0
    }
}

/// Waker implementation that resumes a routine from a microtask.
///
/// This is the resumption token handed to whatever the routine awaits: waking
/// it queues exactly one microtask that polls the routine.
struct TaskWaker {
    task: Arc<TaskCell>,
    scheduler: Weak<SchedulerInner>,
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        // Scheduler already dropped: nothing left to resume on.
        let Some(scheduler) = Scheduler::upgrade(&self.scheduler) else {
            return;
        };
        let task = Arc::clone(&self.task);
        tracing::trace!(task = %task.id, "routine woken");
        let handle = Weak::clone(&self.scheduler);
        scheduler.enqueue_microtask(move || {
            if let Some(scheduler) = Scheduler::upgrade(&handle) {
                let _ = task.poll(&scheduler);
            }
        });
    }
}
