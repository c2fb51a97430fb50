//! Swapping a promise's fulfillment and rejection.

use std::convert::Infallible;

use super::Promise;

/// Returns a promise that rejects with `promise`'s value, or fulfills with
/// its error.
///
/// Used to assert that an operation fails: awaiting the flipped promise
/// yields the rejection reason as `Ok`.
///
/// # Example
///
/// ```rust
/// use microtick::prelude::*;
///
/// let ctx = RunContext::new();
/// let failing = Promise::<(), &str>::rejected(&ctx, "nope");
/// let flipped = flip(&failing);
/// assert_eq!(ctx.block_on(&flipped).unwrap(), Ok("nope"));
/// ```
pub fn flip<T, E>(promise: &Promise<T, E>) -> Promise<E, T>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    let (flipped, resolver) = promise.sibling();
    let on_value = resolver.clone();
    let _ = promise
        .then(
            move |value| {
                on_value.reject(value);
                Ok::<(), E>(())
            },
            Err::<(), E>,
        )
        .catch(move |error| {
            resolver.fulfill(error);
            Ok::<(), Infallible>(())
        });
    flipped
}
