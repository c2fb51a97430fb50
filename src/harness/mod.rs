//! Test registry and runner.
//!
//! Tests are registered on a [`RunContext`] with
//! [`describe`](RunContext::describe) and [`test`](RunContext::test), and run
//! in registration order by [`RunContext::run`]. The runner is itself a
//! routine on the context's scheduler, so each test's promise is awaited the
//! same way user code awaits one, and the orderings a test observes are the
//! orderings the model defines.

mod report;

use std::convert::Infallible;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::promise::Promise;
use crate::runtime::RunContext;

pub use report::{Report, TestResult};

/// What a test body hands back to the runner.
pub enum TestOutput {
    /// The test already finished.
    Sync(Result<()>),
    /// The test finishes when this promise settles.
    Async(Promise<(), Error>),
}

impl From<Result<()>> for TestOutput {
    fn from(result: Result<()>) -> Self {
        TestOutput::Sync(result)
    }
}

impl From<()> for TestOutput {
    fn from((): ()) -> Self {
        TestOutput::Sync(Ok(()))
    }
}

impl From<Promise<(), Error>> for TestOutput {
    fn from(promise: Promise<(), Error>) -> Self {
        TestOutput::Async(promise)
    }
}

pub(crate) type TestBody = Box<dyn FnOnce(RunContext) -> TestOutput + Send>;

pub(crate) struct TestEntry {
    name: String,
    body: TestBody,
}

/// Ordered test registrations plus the current `describe` prefix.
#[derive(Default)]
pub(crate) struct Registry {
    prefix: Vec<String>,
    entries: Vec<TestEntry>,
}

impl Registry {
    pub(crate) fn enter(&mut self, name: &str) {
        self.prefix.push(name.to_string());
    }

    pub(crate) fn exit(&mut self) {
        self.prefix.pop();
    }

    /// Registers a test and returns its full name.
    pub(crate) fn register(&mut self, name: &str, separator: &str, body: TestBody) -> String {
        let full_name = self
            .prefix
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(name))
            .collect::<Vec<_>>()
            .join(separator);
        self.entries.push(TestEntry {
            name: full_name.clone(),
            body,
        });
        full_name
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn take_entries(&mut self) -> Vec<TestEntry> {
        std::mem::take(&mut self.entries)
    }
}

/// Runs `entries` one after another on `ctx` and collects the report.
pub(crate) fn run(ctx: &RunContext, entries: Vec<TestEntry>) -> Result<Report> {
    tracing::info!(tests = entries.len(), "running tests");

    let results = Arc::new(Mutex::new(Vec::with_capacity(entries.len())));
    let sink = Arc::clone(&results);
    let driver_ctx = ctx.clone();
    let driver: Promise<(), Infallible> = ctx.spawn(async move {
        for entry in entries {
            let outcome = match (entry.body)(driver_ctx.clone()) {
                TestOutput::Sync(result) => {
                    driver_ctx.tick().await;
                    result
                }
                TestOutput::Async(promise) => promise.await,
            };
            match &outcome {
                Ok(()) => tracing::info!(test = %entry.name, "ok"),
                Err(error) => tracing::info!(test = %entry.name, %error, "failed"),
            }
            sink.lock().push(TestResult::new(entry.name, outcome));
        }
        Ok(())
    });

    ctx.block_on(&driver)?.unwrap_or_else(|never| match never {});
    let results = std::mem::take(&mut *results.lock());
    Ok(Report::new(results))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_registry_joins_prefix() {
        let mut registry = Registry::default();
        registry.enter("promise");
        registry.enter("multitimes");
        let name = registry.register("resolve", " ", Box::new(|_| TestOutput::from(())));
        registry.exit();
        let sibling = registry.register("other", " ", Box::new(|_| TestOutput::from(())));
        registry.exit();

        assert_eq!(name, "promise multitimes resolve");
        assert_eq!(sibling, "promise other");
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.take_entries().len(), 2);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_run_records_failures_and_continues() {
        let ctx = RunContext::new();
        ctx.test("passes", |_| -> Result<()> { Ok(()) });
        ctx.test("fails", |_| -> Result<()> { Err(Error::assertion("nope")) });
        ctx.test_async("rejects later", |ctx| async move {
            ctx.sleep(Duration::from_millis(5)).await.ok();
            Err(Error::assertion("late"))
        });
        ctx.test("still runs", |_| {});

        let report = ctx.run().unwrap();
        assert_eq!(report.passed(), 2);
        assert_eq!(report.failed(), 2);
        assert_eq!(
            report.results()[1].outcome,
            Err(Error::assertion("nope"))
        );
        assert_eq!(report.results()[3].name, "still runs");
    }

    #[test]
    fn test_tests_run_sequentially() {
        let ctx = RunContext::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let l = Arc::clone(&log);
        ctx.test_async("slow", move |ctx| async move {
            l.lock().push("slow start");
            ctx.sleep(Duration::from_millis(100)).await.ok();
            l.lock().push("slow end");
            Ok(())
        });
        let l = Arc::clone(&log);
        ctx.test("fast", move |_| l.lock().push("fast"));

        assert!(ctx.run().unwrap().is_success());
        assert_eq!(*log.lock(), vec!["slow start", "slow end", "fast"]);
    }

    #[test]
    fn test_bodies_do_not_run_at_registration() {
        let ctx = RunContext::new();
        let ran = Arc::new(Mutex::new(false));
        let r = Arc::clone(&ran);
        ctx.test("lazy", move |_| *r.lock() = true);

        assert!(!*ran.lock());
        ctx.run().unwrap();
        assert!(*ran.lock());
    }

    #[test]
    fn test_run_empty_registry() {
        let ctx = RunContext::new();
        let report = ctx.run().unwrap();
        assert!(report.is_success());
        assert!(report.results().is_empty());
    }
}
