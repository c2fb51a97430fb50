#![allow(clippy::must_use_candidate)]

//! Predicates for [`Expectation::to_match`](super::Expectation::to_match)
//! and [`check_that!`](crate::check_that).
//!
//! Plain values are checked with [`eq`], [`json_eq`], [`undefined`] and
//! [`contains`]; promises by their current state with [`fulfilled_with`],
//! [`rejected_with`] and [`pending`]. Any of them can be inverted with
//! [`not`].
//!
//! ```rust
//! use microtick::assertions::matcher::{contains, eq, not, Matcher};
//!
//! let orders = vec![2_u32, 1, 3];
//! assert!(contains(1).matches(&orders));
//! assert!(not(eq(vec![1_u32, 2, 3])).matches(&orders));
//! ```

use std::fmt::Debug;

use serde::Serialize;

use crate::promise::{Promise, PromiseState};

/// A check on a value that can explain itself when it fails.
///
/// ```rust
/// use microtick::assertions::matcher::Matcher;
///
/// /// Steps were recorded in increasing order.
/// struct Ascending;
///
/// impl Matcher<Vec<u32>> for Ascending {
///     fn matches(&self, orders: &Vec<u32>) -> bool {
///         orders.windows(2).all(|w| w[0] < w[1])
///     }
///
///     fn describe(&self) -> String {
///         "ascending".into()
///     }
///
///     fn describe_mismatch(&self, orders: &Vec<u32>) -> String {
///         format!("{orders:?} is out of order")
///     }
/// }
///
/// assert!(Ascending.matches(&vec![1, 2, 5]));
/// assert!(!Ascending.matches(&vec![1, 5, 2]));
/// ```
pub trait Matcher<T: ?Sized> {
    /// Whether `value` passes.
    fn matches(&self, value: &T) -> bool;

    /// What a passing value looks like.
    fn describe(&self) -> String;

    /// The failure message for `value`.
    fn describe_mismatch(&self, value: &T) -> String;
}

/// Passes for values equal to `expected`.
pub fn eq<T: PartialEq + Debug>(expected: T) -> EqMatcher<T> {
    EqMatcher { expected }
}

/// See [`eq`].
pub struct EqMatcher<T> {
    expected: T,
}

impl<T: PartialEq + Debug> Matcher<T> for EqMatcher<T> {
    fn matches(&self, actual: &T) -> bool {
        *actual == self.expected
    }

    fn describe(&self) -> String {
        format!("is {:?}", self.expected)
    }

    fn describe_mismatch(&self, actual: &T) -> String {
        format!("expected {:?} but received {actual:?}", self.expected)
    }
}

/// Create a structural equality matcher.
///
/// Values are compared by their canonical JSON form, so a map with numeric
/// keys matches a JSON object with the same keys as strings.
///
/// ```rust
/// use microtick::assertions::matcher::{json_eq, Matcher};
/// use std::collections::BTreeMap;
///
/// let values = BTreeMap::from([(0, 0), (1, 1)]);
/// assert!(json_eq(serde_json::json!({"0": 0, "1": 1})).matches(&values));
/// ```
pub fn json_eq<U: Serialize>(expected: U) -> JsonEqMatcher {
    JsonEqMatcher {
        expected: serde_json::to_value(expected).map_err(|e| e.to_string()),
    }
}

/// Matcher for structural equality via JSON.
pub struct JsonEqMatcher {
    expected: Result<serde_json::Value, String>,
}

impl<T: Serialize + ?Sized> Matcher<T> for JsonEqMatcher {
    fn matches(&self, value: &T) -> bool {
        match (&self.expected, serde_json::to_value(value)) {
            (Ok(expected), Ok(actual)) => expected == &actual,
            _ => false,
        }
    }

    fn describe(&self) -> String {
        match &self.expected {
            Ok(expected) => format!("serializes to {expected}"),
            Err(e) => format!("unserializable expectation ({e})"),
        }
    }

    fn describe_mismatch(&self, value: &T) -> String {
        let actual = serde_json::to_string(value).unwrap_or_else(|e| format!("<{e}>"));
        format!("{} but received {actual}", Matcher::<T>::describe(self))
    }
}

/// Values that can be "undefined": `None` or `()`.
pub trait Undefined {
    /// Returns true if the value carries nothing.
    fn is_undefined(&self) -> bool;
}

impl<T> Undefined for Option<T> {
    fn is_undefined(&self) -> bool {
        self.is_none()
    }
}

impl Undefined for () {
    fn is_undefined(&self) -> bool {
        true
    }
}

/// Create a matcher for undefined values.
pub fn undefined() -> UndefinedMatcher {
    UndefinedMatcher
}

/// Matcher for `None` and `()`.
pub struct UndefinedMatcher;

impl<T: Undefined + Debug> Matcher<T> for UndefinedMatcher {
    fn matches(&self, value: &T) -> bool {
        value.is_undefined()
    }

    fn describe(&self) -> String {
        "is undefined".to_string()
    }

    fn describe_mismatch(&self, value: &T) -> String {
        format!("expected undefined but received {value:?}")
    }
}

/// Passes for sequences holding `element`.
pub fn contains<T: PartialEq + Debug>(element: T) -> ContainsMatcher<T> {
    ContainsMatcher { element }
}

/// See [`contains`].
pub struct ContainsMatcher<T> {
    element: T,
}

impl<T, C> Matcher<C> for ContainsMatcher<T>
where
    T: PartialEq + Debug,
    C: AsRef<[T]> + Debug + ?Sized,
{
    fn matches(&self, items: &C) -> bool {
        items.as_ref().contains(&self.element)
    }

    fn describe(&self) -> String {
        format!("holds {:?}", self.element)
    }

    fn describe_mismatch(&self, items: &C) -> String {
        format!("{:?} not found in {items:?}", self.element)
    }
}

/// Create a matcher for a promise fulfilled with `value`.
///
/// ```rust
/// use microtick::assertions::matcher::{fulfilled_with, Matcher};
/// use microtick::prelude::*;
///
/// let ctx = RunContext::new();
/// let promise = Promise::<i32, ()>::resolved(&ctx, 1);
/// assert!(fulfilled_with(1).matches(&promise));
/// ```
pub fn fulfilled_with<T>(value: T) -> FulfilledMatcher<T> {
    FulfilledMatcher { expected: value }
}

/// Create a matcher for a promise rejected with `error`.
pub fn rejected_with<E>(error: E) -> RejectedMatcher<E> {
    RejectedMatcher { expected: error }
}

/// Create a matcher for a promise that has not settled.
pub fn pending() -> PendingMatcher {
    PendingMatcher
}

/// Matcher for a fulfilled promise.
pub struct FulfilledMatcher<T> {
    expected: T,
}

impl<T, E> Matcher<Promise<T, E>> for FulfilledMatcher<T>
where
    T: Clone + Send + PartialEq + Debug + 'static,
    E: Clone + Send + Debug + 'static,
{
    fn matches(&self, promise: &Promise<T, E>) -> bool {
        matches!(promise.peek(), Some(Ok(actual)) if actual == self.expected)
    }

    fn describe(&self) -> String {
        format!("is {} with {:?}", PromiseState::Fulfilled, self.expected)
    }

    fn describe_mismatch(&self, promise: &Promise<T, E>) -> String {
        let expected = <Self as Matcher<Promise<T, E>>>::describe(self);
        format!("expected promise that {expected} but found {promise:?}")
    }
}

/// Matcher for a rejected promise.
pub struct RejectedMatcher<E> {
    expected: E,
}

impl<T, E> Matcher<Promise<T, E>> for RejectedMatcher<E>
where
    T: Clone + Send + Debug + 'static,
    E: Clone + Send + PartialEq + Debug + 'static,
{
    fn matches(&self, promise: &Promise<T, E>) -> bool {
        matches!(promise.peek(), Some(Err(actual)) if actual == self.expected)
    }

    fn describe(&self) -> String {
        format!("is {} with {:?}", PromiseState::Rejected, self.expected)
    }

    fn describe_mismatch(&self, promise: &Promise<T, E>) -> String {
        let expected = <Self as Matcher<Promise<T, E>>>::describe(self);
        format!("expected promise that {expected} but found {promise:?}")
    }
}

/// Matcher for a pending promise.
pub struct PendingMatcher;

impl<T, E> Matcher<Promise<T, E>> for PendingMatcher
where
    T: Clone + Send + Debug + 'static,
    E: Clone + Send + Debug + 'static,
{
    fn matches(&self, promise: &Promise<T, E>) -> bool {
        promise.state() == PromiseState::Pending
    }

    fn describe(&self) -> String {
        format!("is {}", PromiseState::Pending)
    }

    fn describe_mismatch(&self, promise: &Promise<T, E>) -> String {
        format!("expected pending promise but found {promise:?}")
    }
}

/// Create a negation matcher.
pub fn not<M>(matcher: M) -> NotMatcher<M> {
    NotMatcher { inner: matcher }
}

/// Matcher that negates another matcher.
pub struct NotMatcher<M> {
    inner: M,
}

impl<T: ?Sized + Debug, M: Matcher<T>> Matcher<T> for NotMatcher<M> {
    fn matches(&self, value: &T) -> bool {
        !self.inner.matches(value)
    }

    fn describe(&self) -> String {
        format!("not ({})", Matcher::<T>::describe(&self.inner))
    }

    fn describe_mismatch(&self, value: &T) -> String {
        format!(
            "{value:?} matches {} but should not",
            Matcher::<T>::describe(&self.inner)
        )
    }
}
