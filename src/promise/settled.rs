//! Futures for awaiting promises.

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;

use super::{Promise, Reaction};

/// Future returned by awaiting a [`Promise`].
///
/// The first poll registers the awaiting routine as a reaction and always
/// suspends, so resuming costs exactly one microtask even when the promise
/// has already settled.
pub struct Settled<T, E> {
    promise: Promise<T, E>,
    waker: Option<Arc<Mutex<Option<Waker>>>>,
}

impl<T, E> Settled<T, E> {
    pub(crate) fn new(promise: Promise<T, E>) -> Self {
        Self {
            promise,
            waker: None,
        }
    }
}

impl<T, E> Future for Settled<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    type Output = Result<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(slot) = self.waker.clone() {
            return match self.promise.peek() {
                Some(outcome) => Poll::Ready(outcome),
                None => {
                    *slot.lock() = Some(cx.waker().clone());
                    Poll::Pending
                }
            };
        }

        let slot = Arc::new(Mutex::new(Some(cx.waker().clone())));
        self.promise.react(Reaction::Wake(Arc::clone(&slot)));
        self.waker = Some(slot);
        Poll::Pending
    }
}

impl<T, E> fmt::Debug for Settled<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settled")
            .field("state", &self.promise.state())
            .field("registered", &self.waker.is_some())
            .finish()
    }
}

/// Future that resumes after exactly one microtask hop.
///
/// Awaiting it behaves like awaiting a value that is not a promise.
#[derive(Debug)]
pub struct Tick {
    inner: Settled<(), Infallible>,
}

impl Tick {
    pub(crate) fn new(promise: Promise<(), Infallible>) -> Self {
        Self {
            inner: Settled::new(promise),
        }
    }
}

impl Future for Tick {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        match Pin::new(&mut self.inner).poll(cx) {
            Poll::Ready(_) => Poll::Ready(()),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RunContext;

    #[test]
    fn test_await_settled_promise_costs_one_microtask() {
        let ctx = RunContext::new();
        let promise = Promise::<i32, ()>::resolved(&ctx, 3);
        let seen = Arc::new(Mutex::new(None));

        let s = Arc::clone(&seen);
        let waiter = promise.clone();
        let _routine: Promise<(), ()> = ctx.spawn(async move {
            *s.lock() = Some(waiter.await);
            Ok(())
        });

        assert_eq!(*seen.lock(), None);
        assert_eq!(ctx.scheduler().microtask_count(), 1);
        assert!(ctx.scheduler().run_microtask());
        assert_eq!(*seen.lock(), Some(Ok(3)));
    }

    #[test]
    fn test_await_pending_promise_resumes_after_settlement() {
        let ctx = RunContext::new();
        let (promise, resolver) = Promise::<i32, String>::pending(&ctx);
        let waiter = promise.clone();
        let routine: Promise<i32, String> = ctx.spawn(async move {
            let value = waiter.await?;
            Ok(value + 1)
        });

        ctx.scheduler().run_to_quiescence().unwrap();
        assert!(!routine.is_settled());

        resolver.fulfill(1);
        assert_eq!(ctx.block_on(&routine).unwrap(), Ok(2));
    }

    #[test]
    fn test_tick_is_one_hop() {
        let ctx = RunContext::new();
        let tick = ctx.tick();
        let _routine: Promise<(), ()> = ctx.spawn(async move {
            tick.await;
            Ok(())
        });
        assert_eq!(ctx.scheduler().microtask_count(), 1);
    }

    #[test]
    fn test_interop_with_foreign_executor() {
        let ctx = RunContext::new();
        let promise = Promise::<&'static str, ()>::resolved(&ctx, "done");
        let outcome = futures::executor::block_on(promise.settled());
        assert_eq!(outcome, Ok("done"));
    }
}
