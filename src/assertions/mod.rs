//! Expectations for test bodies.
//!
//! - [`expect`] - Fluent `expect(actual).to_be(expected)` checks
//! - [`check_that!`](crate::check_that) - Early-return matcher check
//! - [`matcher`] - Matcher system for flexible checks
//!
//! Unlike `assert!`, every check returns a [`Result`](crate::Result), so a
//! failing expectation becomes the test's recorded failure instead of a
//! panic that would take the whole run down.
//!
//! # Example
//!
//! ```rust
//! use microtick::assertions::{expect, matcher::contains};
//!
//! # fn main() -> microtick::Result<()> {
//! let orders = vec![2, 1];
//! expect(orders.clone()).to_equal([2, 1])?;
//! expect(orders).to_match(contains(1))?;
//! # Ok(())
//! # }
//! ```

mod expect;
pub mod matcher;

pub use expect::{expect, Expectation};
