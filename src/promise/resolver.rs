//! The settling half of a promise.

use std::fmt;

use super::{Promise, Reaction};

/// Capability to settle one [`Promise`].
///
/// All resolver methods share a single "already resolved" flag: the first
/// call wins and every later call returns `false` without effect. Resolvers
/// are cheap to clone and may be moved into timer callbacks or other routines.
pub struct Resolver<T, E> {
    promise: Promise<T, E>,
}

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Self {
            promise: self.promise.clone(),
        }
    }
}

impl<T, E> Resolver<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    pub(crate) fn new(promise: Promise<T, E>) -> Self {
        Self { promise }
    }

    /// Fulfills the promise with `value`.
    pub fn fulfill(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Rejects the promise with `error`.
    pub fn reject(&self, error: E) -> bool {
        self.settle(Err(error))
    }

    /// Settles the promise with an outcome.
    pub fn settle(&self, outcome: Result<T, E>) -> bool {
        if !self.promise.try_lock_resolution() {
            tracing::trace!("resolver call ignored, promise already resolved");
            return false;
        }
        self.promise.complete(outcome)
    }

    /// Resolves the promise to follow `source`.
    ///
    /// Adoption is asynchronous: one microtask registers on `source`, and a
    /// second one copies its outcome once `source` settles. The promise counts
    /// as resolved immediately, so later resolver calls are ignored even while
    /// it is still pending.
    pub fn resolve_with(&self, source: Promise<T, E>) -> bool {
        if !self.promise.try_lock_resolution() {
            tracing::trace!("resolver call ignored, promise already resolved");
            return false;
        }
        if source.ptr_eq(&self.promise) {
            tracing::warn!("promise resolved with itself, it will never settle");
            return true;
        }

        let Some(scheduler) = self.promise.scheduler() else {
            tracing::trace!("scheduler dropped, adoption abandoned");
            return true;
        };
        let target = self.promise.clone();
        scheduler.enqueue_microtask(move || {
            source.react(Reaction::Job(Box::new(move |outcome| {
                target.complete(outcome);
            })));
        });
        true
    }

    /// Returns true once any resolver call has taken effect.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.promise.is_locked()
    }

    /// Returns the promise this resolver settles.
    #[must_use]
    pub fn promise(&self) -> Promise<T, E> {
        self.promise.clone()
    }
}

impl<T, E> fmt::Debug for Resolver<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("resolved", &self.is_resolved())
            .field("state", &self.promise.state())
            .finish()
    }
}
