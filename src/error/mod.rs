//! Error definitions
//!
//! This module provides error types for microtick.
//!
//! Promises carry their own rejection type `E`; this [`Error`] is what the
//! harness and the top-level driver speak. Test bodies return
//! `Result<(), Error>`, so a rejected promise of some other type is brought
//! into it with [`Error::rejected`].

use std::fmt::Debug;

use serde::Serialize;
use thiserror::Error;

/// Main error type for microtick
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Error {
    /// Assertion failed
    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    /// A promise was rejected with the given (debug-formatted) value
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Canonical serialization of a value failed
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Both queues ran dry while the awaited promise was still pending
    #[error("Scheduler stalled with the awaited promise pending ({parked_routines} routines suspended)")]
    Stalled {
        /// Routines still suspended when the queues ran dry.
        parked_routines: usize,
    },

    /// The run loop executed more jobs than the configured limit
    #[error("Scheduler exceeded {0} steps without reaching quiescence")]
    StepLimitExceeded(usize),

    /// A registered test failed
    #[error("Test '{name}' failed: {message}")]
    TestFailed {
        /// Full name of the test.
        name: String,
        /// Failure message.
        message: String,
    },
}

impl Error {
    /// Create an assertion failure.
    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::AssertionFailed(message.into())
    }

    /// Convert a settlement error of any type into a harness error.
    ///
    /// Handy as `promise.await.map_err(Error::rejected)?`.
    #[must_use]
    pub fn rejected<E: Debug>(reason: E) -> Self {
        Self::Rejected(format!("{reason:?}"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
