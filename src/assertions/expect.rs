//! The `expect(actual).to_*(expected)` API.

use std::fmt::Debug;

use serde::Serialize;

use super::matcher::{Matcher, Undefined};
use crate::error::{Error, Result};

/// Start an expectation about `actual`.
///
/// Every check returns `Result<()>`, failing with
/// [`Error::AssertionFailed`], so test bodies chain them with `?`.
///
/// # Example
///
/// ```rust
/// use microtick::assertions::expect;
///
/// # fn main() -> microtick::Result<()> {
/// expect(1).to_be(1)?;
/// expect(None::<i32>).to_be_undefined()?;
/// expect(vec![2, 1]).to_equal([2, 1])?;
///
/// let err = expect(1).to_be(2).unwrap_err();
/// assert_eq!(err.to_string(), "Assertion failed: expected 2 but received 1");
/// # Ok(())
/// # }
/// ```
pub fn expect<T>(actual: T) -> Expectation<T> {
    Expectation { actual }
}

/// A value under test.
#[derive(Debug, Clone)]
pub struct Expectation<T> {
    actual: T,
}

impl<T: Debug> Expectation<T> {
    /// Passes if the value equals `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AssertionFailed`] with
    /// `expected <expected> but received <actual>` otherwise.
    pub fn to_be<U>(self, expected: U) -> Result<()>
    where
        T: PartialEq<U>,
        U: Debug,
    {
        if self.actual == expected {
            Ok(())
        } else {
            Err(Error::assertion(format!(
                "expected {expected:?} but received {:?}",
                self.actual
            )))
        }
    }

    /// Passes if the value differs from `unexpected`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AssertionFailed`] if the values are equal.
    pub fn not_to_be<U>(self, unexpected: U) -> Result<()>
    where
        T: PartialEq<U>,
        U: Debug,
    {
        if self.actual == unexpected {
            Err(Error::assertion(format!(
                "expected anything but {unexpected:?}"
            )))
        } else {
            Ok(())
        }
    }

    /// Passes if `matcher` accepts the value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AssertionFailed`] with the matcher's mismatch
    /// description otherwise.
    pub fn to_match<M: Matcher<T>>(self, matcher: M) -> Result<()> {
        if matcher.matches(&self.actual) {
            Ok(())
        } else {
            Err(Error::assertion(matcher.describe_mismatch(&self.actual)))
        }
    }
}

impl<T: Undefined + Debug> Expectation<T> {
    /// Passes if the value is `None` or `()`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AssertionFailed`] otherwise.
    pub fn to_be_undefined(self) -> Result<()> {
        if self.actual.is_undefined() {
            Ok(())
        } else {
            Err(Error::assertion(format!(
                "expected undefined but received {:?}",
                self.actual
            )))
        }
    }
}

impl<T: Serialize> Expectation<T> {
    /// Passes if the value and `expected` serialize to the same JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AssertionFailed`] if they differ, or
    /// [`Error::Serialization`] if either side cannot be serialized.
    pub fn to_equal<U: Serialize>(self, expected: U) -> Result<()> {
        let actual = serde_json::to_value(&self.actual)?;
        let expected = serde_json::to_value(&expected)?;
        if actual == expected {
            Ok(())
        } else {
            Err(Error::assertion(format!(
                "expected {expected} but received {actual}"
            )))
        }
    }
}

/// Return early with an assertion failure unless `value` matches `matcher`.
///
/// The macro form of [`Expectation::to_match`], for functions returning
/// [`Result`](crate::Result).
///
/// # Example
///
/// ```rust
/// use microtick::{check_that, assertions::matcher::contains};
///
/// fn orders_ok(orders: Vec<i32>) -> microtick::Result<()> {
///     check_that!(orders, contains(3));
///     Ok(())
/// }
///
/// assert!(orders_ok(vec![1, 3]).is_ok());
/// assert!(orders_ok(vec![1, 2]).is_err());
/// ```
#[macro_export]
macro_rules! check_that {
    ($value:expr, $matcher:expr) => {{
        let value = &$value;
        let matcher = &$matcher;
        if !$crate::assertions::matcher::Matcher::matches(matcher, value) {
            return ::std::result::Result::Err($crate::Error::assertion(
                $crate::assertions::matcher::Matcher::describe_mismatch(matcher, value),
            ));
        }
    }};
    ($value:expr, $matcher:expr, $($arg:tt)+) => {{
        let value = &$value;
        let matcher = &$matcher;
        if !$crate::assertions::matcher::Matcher::matches(matcher, value) {
            return ::std::result::Result::Err($crate::Error::assertion(format!(
                "{} ({})",
                $crate::assertions::matcher::Matcher::describe_mismatch(matcher, value),
                format_args!($($arg)+)
            )));
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertions::matcher::{eq, not};
    use std::collections::BTreeMap;

    #[test]
    fn test_to_be() {
        assert!(expect(1).to_be(1).is_ok());
        assert_eq!(
            expect(1).to_be(2),
            Err(Error::assertion("expected 2 but received 1"))
        );
        assert!(expect("a".to_string()).to_be("a").is_ok());
    }

    #[test]
    fn test_not_to_be() {
        assert!(expect(1).not_to_be(2).is_ok());
        assert!(expect(1).not_to_be(1).is_err());
    }

    #[test]
    fn test_to_be_undefined() {
        assert!(expect(None::<i32>).to_be_undefined().is_ok());
        assert!(expect(()).to_be_undefined().is_ok());
        assert_eq!(
            expect(Some(2)).to_be_undefined(),
            Err(Error::assertion("expected undefined but received Some(2)"))
        );
    }

    #[test]
    fn test_to_equal() {
        let values: BTreeMap<u32, i64> = BTreeMap::from([(0, 0), (1, 1)]);
        assert!(expect(&values)
            .to_equal(serde_json::json!({"0": 0, "1": 1}))
            .is_ok());
        assert_eq!(
            expect(vec![1, 2]).to_equal([2, 1]),
            Err(Error::assertion("expected [2,1] but received [1,2]"))
        );
    }

    #[test]
    fn test_to_match() {
        assert!(expect(5).to_match(not(eq(4))).is_ok());
        assert_eq!(
            expect(5).to_match(eq(4)),
            Err(Error::assertion("expected 4 but received 5"))
        );
    }

    #[test]
    fn test_check_that_macro() {
        fn check(value: i32) -> Result<()> {
            check_that!(value, eq(1), "value was {}", value);
            Ok(())
        }

        assert!(check(1).is_ok());
        assert_eq!(
            check(2),
            Err(Error::assertion("expected 1 but received 2 (value was 2)"))
        );
    }
}
