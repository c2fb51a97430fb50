//! Single-assignment promises with microtask-scheduled reactions.
//!
//! A [`Promise`] starts pending and settles at most once, either fulfilled
//! with a `T` or rejected with an `E`. The first resolver call wins, whatever
//! its disposition; every later call is ignored.
//!
//! Reactions never run synchronously. Settling a promise queues one
//! microtask per registered reaction, in registration order. Registering on
//! an already-settled promise queues the microtask immediately. Awaiting is
//! the same thing: `promise.await` always costs one microtask hop, even when
//! the promise is already settled.
//!
//! # Example
//!
//! ```rust
//! use microtick::prelude::*;
//!
//! let ctx = RunContext::new();
//! let promise = Promise::<i32, String>::new(&ctx, |resolver| {
//!     resolver.fulfill(1);
//!     resolver.fulfill(2);
//!     resolver.reject("ignored".to_string());
//!     Ok(())
//! });
//! assert_eq!(promise.state(), PromiseState::Fulfilled);
//!
//! let doubled = promise.map(|v| v * 2);
//! assert_eq!(ctx.block_on(&doubled).unwrap(), Ok(2));
//! ```

mod flip;
mod resolver;
mod settled;

use std::fmt;
use std::future::{Future, IntoFuture};
use std::sync::{Arc, Weak};
use std::task::Waker;

use parking_lot::Mutex;
use serde::Serialize;

use crate::executor::{Scheduler, SchedulerInner};
use crate::runtime::RunContext;

pub use flip::flip;
pub use resolver::Resolver;
pub use settled::{Settled, Tick};

/// Observable state of a promise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum PromiseState {
    /// Not settled yet.
    Pending,
    /// Settled with a value.
    Fulfilled,
    /// Settled with an error.
    Rejected,
}

impl fmt::Display for PromiseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromiseState::Pending => write!(f, "Pending"),
            PromiseState::Fulfilled => write!(f, "Fulfilled"),
            PromiseState::Rejected => write!(f, "Rejected"),
        }
    }
}

/// Something a reaction handler can settle a derived promise with.
///
/// A plain `Result` settles directly. A `Promise` is adopted, so chains
/// flatten instead of nesting.
pub trait IntoSettlement<T, E> {
    /// Settle `resolver` with this value.
    fn settle_into(self, resolver: Resolver<T, E>);
}

impl<T, E> IntoSettlement<T, E> for Result<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn settle_into(self, resolver: Resolver<T, E>) {
        resolver.settle(self);
    }
}

impl<T, E> IntoSettlement<T, E> for Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn settle_into(self, resolver: Resolver<T, E>) {
        resolver.resolve_with(self);
    }
}

/// A continuation registered on a pending promise.
pub(crate) enum Reaction<T, E> {
    /// Runs as its own microtask with a clone of the outcome.
    Job(Box<dyn FnOnce(Result<T, E>) + Send>),
    /// Resumes an awaiting routine; the waker queues the resumption microtask.
    Wake(Arc<Mutex<Option<Waker>>>),
}

impl<T, E> Reaction<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Queues the reaction. Jobs need a live scheduler; wakers do not, since
    /// a foreign executor may be the one waiting.
    fn schedule(self, scheduler: Option<&Scheduler>, outcome: &Result<T, E>) {
        match self {
            Reaction::Job(job) => match scheduler {
                Some(scheduler) => {
                    let outcome = outcome.clone();
                    scheduler.enqueue_microtask(move || job(outcome));
                }
                None => tracing::trace!("scheduler dropped, reaction discarded"),
            },
            Reaction::Wake(slot) => {
                let waker = slot.lock().take();
                if let Some(waker) = waker {
                    waker.wake();
                }
            }
        }
    }
}

struct Shared<T, E> {
    outcome: Option<Result<T, E>>,
    /// Set by the first resolver call, which may settle later (adoption).
    locked: bool,
    reactions: Vec<Reaction<T, E>>,
}

/// A single-assignment asynchronous value.
///
/// Cloning a `Promise` clones the handle; all clones observe the same
/// settlement. Awaiting yields `Result<T, E>`: a rejection surfaces as `Err`
/// at the await point.
///
/// A promise does not keep its scheduler alive. Once the scheduler is gone,
/// the promise can still be settled and inspected, but its reactions are
/// dropped instead of queued.
pub struct Promise<T, E> {
    shared: Arc<Mutex<Shared<T, E>>>,
    scheduler: Weak<SchedulerInner>,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            scheduler: Weak::clone(&self.scheduler),
        }
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    pub(crate) fn with_scheduler(scheduler: &Scheduler) -> (Self, Resolver<T, E>) {
        Self::on(scheduler.downgrade())
    }

    fn on(scheduler: Weak<SchedulerInner>) -> (Self, Resolver<T, E>) {
        let promise = Self {
            shared: Arc::new(Mutex::new(Shared {
                outcome: None,
                locked: false,
                reactions: Vec::new(),
            })),
            scheduler,
        };
        let resolver = Resolver::new(promise.clone());
        (promise, resolver)
    }

    /// A fresh pending promise on the same scheduler as this one.
    pub(crate) fn sibling<U, V>(&self) -> (Promise<U, V>, Resolver<U, V>)
    where
        U: Clone + Send + 'static,
        V: Clone + Send + 'static,
    {
        Promise::on(Weak::clone(&self.scheduler))
    }

    /// Creates a pending promise together with its resolver.
    #[must_use]
    pub fn pending(ctx: &RunContext) -> (Self, Resolver<T, E>) {
        Self::with_scheduler(ctx.scheduler())
    }

    /// Creates a promise, running `initializer` synchronously inside the call.
    ///
    /// Returning `Err` from the initializer rejects the promise, unless a
    /// resolver call already happened; explicit settlement always wins over a
    /// later error in the same synchronous segment.
    ///
    /// # Example
    ///
    /// ```rust
    /// use microtick::prelude::*;
    ///
    /// let ctx = RunContext::new();
    /// let promise = Promise::<(), i32>::new(&ctx, |resolver| {
    ///     resolver.reject(1);
    ///     Err(2)
    /// });
    /// assert_eq!(promise.peek(), Some(Err(1)));
    /// ```
    pub fn new<F>(ctx: &RunContext, initializer: F) -> Self
    where
        F: FnOnce(Resolver<T, E>) -> Result<(), E>,
    {
        let (promise, resolver) = Self::pending(ctx);
        if let Err(error) = initializer(resolver.clone()) {
            if !resolver.reject(error) {
                tracing::debug!("initializer error ignored, promise already resolved");
            }
        }
        promise
    }

    /// Creates a promise whose initializer is a suspendable routine.
    ///
    /// Everything before the routine's first suspension point runs inside
    /// this call. An `Err` returned by the routine does not reject the
    /// promise; it is reported as an unhandled rejection.
    pub fn new_async<F, Fut>(ctx: &RunContext, initializer: F) -> Self
    where
        F: FnOnce(Resolver<T, E>) -> Fut,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Debug,
    {
        let (promise, resolver) = Self::pending(ctx);
        let routine: Promise<(), E> = ctx.spawn(initializer(resolver));
        routine.react(Reaction::Job(Box::new(|outcome| {
            if let Err(error) = outcome {
                tracing::warn!(?error, "unhandled rejection in async initializer");
            }
        })));
        promise
    }

    /// Creates an already-fulfilled promise.
    #[must_use]
    pub fn resolved(ctx: &RunContext, value: T) -> Self {
        let (promise, resolver) = Self::pending(ctx);
        resolver.fulfill(value);
        promise
    }

    /// Creates an already-rejected promise.
    #[must_use]
    pub fn rejected(ctx: &RunContext, error: E) -> Self {
        let (promise, resolver) = Self::pending(ctx);
        resolver.reject(error);
        promise
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> PromiseState {
        match &self.shared.lock().outcome {
            None => PromiseState::Pending,
            Some(Ok(_)) => PromiseState::Fulfilled,
            Some(Err(_)) => PromiseState::Rejected,
        }
    }

    /// Returns true once the promise is fulfilled or rejected.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.shared.lock().outcome.is_some()
    }

    /// Returns a clone of the outcome without waiting.
    #[must_use]
    pub fn peek(&self) -> Option<Result<T, E>> {
        self.shared.lock().outcome.clone()
    }

    /// Returns a future that resolves with the outcome.
    ///
    /// Equivalent to `promise.clone().await`.
    #[must_use]
    pub fn settled(&self) -> Settled<T, E> {
        Settled::new(self.clone())
    }

    /// Registers fulfillment and rejection handlers.
    ///
    /// Exactly one handler runs, in its own microtask, once this promise
    /// settles. The returned promise is settled with whatever the handler
    /// returns; a returned `Promise` is adopted.
    pub fn then<U, V, OnFulfilled, OnRejected, R1, R2>(
        &self,
        on_fulfilled: OnFulfilled,
        on_rejected: OnRejected,
    ) -> Promise<U, V>
    where
        U: Clone + Send + 'static,
        V: Clone + Send + 'static,
        OnFulfilled: FnOnce(T) -> R1 + Send + 'static,
        OnRejected: FnOnce(E) -> R2 + Send + 'static,
        R1: IntoSettlement<U, V>,
        R2: IntoSettlement<U, V>,
    {
        let (derived, resolver) = self.sibling();
        self.react(Reaction::Job(Box::new(move |outcome| match outcome {
            Ok(value) => on_fulfilled(value).settle_into(resolver),
            Err(error) => on_rejected(error).settle_into(resolver),
        })));
        derived
    }

    /// Transforms the fulfillment value; rejections pass through.
    pub fn map<U, F>(&self, f: F) -> Promise<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.then(move |value| Ok::<U, E>(f(value)), Err::<U, E>)
    }

    /// Transforms the rejection error; fulfillments pass through.
    pub fn map_err<V, F>(&self, f: F) -> Promise<T, V>
    where
        V: Clone + Send + 'static,
        F: FnOnce(E) -> V + Send + 'static,
    {
        self.then(Ok::<T, V>, move |error| Err::<T, V>(f(error)))
    }

    /// Chains a handler on fulfillment; rejections pass through.
    pub fn and_then<U, R, F>(&self, f: F) -> Promise<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> R + Send + 'static,
        R: IntoSettlement<U, E>,
    {
        self.then(f, Err::<U, E>)
    }

    /// Handles a rejection; fulfillments pass through.
    pub fn catch<V, R, F>(&self, f: F) -> Promise<T, V>
    where
        V: Clone + Send + 'static,
        F: FnOnce(E) -> R + Send + 'static,
        R: IntoSettlement<T, V>,
    {
        self.then(Ok::<T, V>, f)
    }

    /// Runs `f` on either settlement and passes the outcome through.
    pub fn finally<F>(&self, f: F) -> Promise<T, E>
    where
        F: FnOnce() + Send + 'static,
    {
        let hook = Arc::new(Mutex::new(Some(f)));
        let on_rejected = Arc::clone(&hook);
        self.then(
            move |value| {
                run_hook(&hook);
                Ok::<T, E>(value)
            },
            move |error| {
                run_hook(&on_rejected);
                Err::<T, E>(error)
            },
        )
    }

    /// The scheduler, unless it has been dropped.
    pub(crate) fn scheduler(&self) -> Option<Scheduler> {
        Scheduler::upgrade(&self.scheduler)
    }

    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Registers a reaction, scheduling it at once if already settled.
    pub(crate) fn react(&self, reaction: Reaction<T, E>) {
        let outcome = {
            let mut shared = self.shared.lock();
            if shared.outcome.is_none() {
                shared.reactions.push(reaction);
                return;
            }
            shared.outcome.clone()
        };
        if let Some(outcome) = outcome {
            self.schedule_all(vec![reaction], &outcome);
        }
    }

    /// Claims the right to resolve. Only the first caller gets `true`.
    pub(crate) fn try_lock_resolution(&self) -> bool {
        let mut shared = self.shared.lock();
        if shared.locked {
            false
        } else {
            shared.locked = true;
            true
        }
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.shared.lock().locked
    }

    /// Records the outcome and schedules every registered reaction.
    pub(crate) fn complete(&self, outcome: Result<T, E>) -> bool {
        let reactions = {
            let mut shared = self.shared.lock();
            if shared.outcome.is_some() {
                return false;
            }
            shared.locked = true;
            shared.outcome = Some(outcome.clone());
            std::mem::take(&mut shared.reactions)
        };
        tracing::debug!(
            fulfilled = outcome.is_ok(),
            reactions = reactions.len(),
            "promise settled"
        );
        self.schedule_all(reactions, &outcome);
        true
    }

    fn schedule_all(&self, reactions: Vec<Reaction<T, E>>, outcome: &Result<T, E>) {
        if reactions.is_empty() {
            return;
        }
        let scheduler = self.scheduler();
        for reaction in reactions {
            reaction.schedule(scheduler.as_ref(), outcome);
        }
    }
}

fn run_hook<F: FnOnce()>(hook: &Mutex<Option<F>>) {
    let f = hook.lock().take();
    if let Some(f) = f {
        f();
    }
}

impl<T, E> IntoFuture for Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    type Output = Result<T, E>;
    type IntoFuture = Settled<T, E>;

    fn into_future(self) -> Self::IntoFuture {
        Settled::new(self)
    }
}

impl<T, E> IntoFuture for &Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    type Output = Result<T, E>;
    type IntoFuture = Settled<T, E>;

    fn into_future(self) -> Self::IntoFuture {
        Settled::new(self.clone())
    }
}

impl<T, E> fmt::Debug for Promise<T, E>
where
    T: fmt::Debug,
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.shared.lock();
        f.debug_struct("Promise")
            .field("outcome", &shared.outcome)
            .field("reactions", &shared.reactions.len())
            .finish_non_exhaustive()
    }
}
