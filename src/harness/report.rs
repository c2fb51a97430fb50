//! Run results handed to the external runner.

use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};

/// Outcome of one test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestResult {
    /// Full name, including `describe` prefixes.
    pub name: String,
    /// `Ok` if the test passed, otherwise the error it failed with.
    pub outcome: Result<()>,
}

impl TestResult {
    pub(crate) fn new(name: String, outcome: Result<()>) -> Self {
        Self { name, outcome }
    }

    /// Returns true if the test passed.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Ordered results of a [`RunContext::run`](crate::runtime::RunContext::run).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    results: Vec<TestResult>,
}

impl Report {
    pub(crate) fn new(results: Vec<TestResult>) -> Self {
        Self { results }
    }

    /// Results in registration order.
    #[must_use]
    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    /// Number of passing tests.
    #[must_use]
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    /// Number of failing tests.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.results.len() - self.passed()
    }

    /// Returns true if no test failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Iterates over the failing tests.
    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| !r.is_ok())
    }

    /// Converts the first failure into [`Error::TestFailed`].
    ///
    /// # Errors
    ///
    /// Returns an error if any test failed.
    pub fn into_result(self) -> Result<Self> {
        if let Some(failure) = self.failures().next() {
            let message = match &failure.outcome {
                Err(error) => error.to_string(),
                Ok(()) => String::new(),
            };
            return Err(Error::TestFailed {
                name: failure.name.clone(),
                message,
            });
        }
        Ok(self)
    }

    /// Serializes the report as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for result in &self.results {
            writeln!(f, "{}", result.name)?;
            match &result.outcome {
                Ok(()) => writeln!(f, "ok")?,
                Err(error) => writeln!(f, "{error}")?,
            }
        }
        write!(f, "{} passed, {} failed", self.passed(), self.failed())
    }
}
