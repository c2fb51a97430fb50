//! Adapter that settles a promise with a routine's output.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use pin_project::pin_project;

use crate::promise::Resolver;

/// Drives a user routine and settles its completion promise.
#[pin_project]
pub(crate) struct Routine<F, T, E> {
    #[pin]
    body: F,
    resolver: Option<Resolver<T, E>>,
}

impl<F, T, E> Routine<F, T, E> {
    pub(crate) fn new(body: F, resolver: Resolver<T, E>) -> Self {
        Self {
            body,
            resolver: Some(resolver),
        }
    }
}

impl<F, T, E> Future for Routine<F, T, E>
where
    F: Future<Output = Result<T, E>>,
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        match this.body.poll(cx) {
            Poll::Ready(outcome) => {
                if let Some(resolver) = this.resolver.take() {
                    resolver.settle(outcome);
                }
                Poll::Ready(())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
