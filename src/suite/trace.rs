//! Shared recorders for ordering scenarios.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::error::Result;
use crate::promise::Promise;
use crate::runtime::RunContext;

/// A variable that holds either a plain number or a promise of one.
///
/// Scenarios reassign one variable between the two, and read it both
/// synchronously and through `await`.
#[derive(Clone, Debug)]
pub enum Slot {
    /// A plain number.
    Value(i64),
    /// A promise of a number.
    Pending(Promise<i64, crate::Error>),
}

impl Slot {
    /// A slot holding an already-fulfilled promise.
    #[must_use]
    pub fn settled(ctx: &RunContext, value: i64) -> Self {
        Slot::Pending(Promise::resolved(ctx, value))
    }

    /// What a synchronous read observes: the number, or `{}` for a promise.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        match self {
            Slot::Value(v) => json!(v),
            Slot::Pending(_) => json!({}),
        }
    }

    /// Awaits the slot: a number still costs one microtask hop.
    ///
    /// # Errors
    ///
    /// Returns the promise's rejection.
    pub async fn resolve(self, ctx: &RunContext) -> Result<i64> {
        match self {
            Slot::Value(v) => {
                ctx.tick().await;
                Ok(v)
            }
            Slot::Pending(promise) => promise.await,
        }
    }
}

/// Records what a scenario observed and in which order.
#[derive(Clone, Debug)]
pub struct Trace {
    values: Arc<Mutex<BTreeMap<u32, Value>>>,
    orders: Arc<Mutex<Vec<u32>>>,
    slot: Arc<Mutex<Slot>>,
}

impl Trace {
    /// Creates a trace whose variable starts as `initial`.
    #[must_use]
    pub fn new(initial: i64) -> Self {
        Self {
            values: Arc::default(),
            orders: Arc::default(),
            slot: Arc::new(Mutex::new(Slot::Value(initial))),
        }
    }

    /// Current content of the variable.
    #[must_use]
    pub fn slot(&self) -> Slot {
        self.slot.lock().clone()
    }

    /// Reassigns the variable.
    pub fn assign(&self, slot: Slot) {
        *self.slot.lock() = slot;
    }

    /// Stores `value` under `key`.
    pub fn record(&self, key: u32, value: impl Into<Value>) {
        self.values.lock().insert(key, value.into());
    }

    /// Stores a synchronous read of the variable under `key`.
    pub fn record_slot(&self, key: u32) {
        let snapshot = self.slot().snapshot();
        self.record(key, snapshot);
    }

    /// Appends a step to the order log.
    pub fn push(&self, step: u32) {
        self.orders.lock().push(step);
    }

    /// Recorded values.
    #[must_use]
    pub fn values(&self) -> BTreeMap<u32, Value> {
        self.values.lock().clone()
    }

    /// Recorded steps, in execution order.
    #[must_use]
    pub fn orders(&self) -> Vec<u32> {
        self.orders.lock().clone()
    }
}

impl Default for Trace {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let ctx = RunContext::new();
        assert_eq!(Slot::Value(3).snapshot(), json!(3));
        assert_eq!(Slot::settled(&ctx, 3).snapshot(), json!({}));
    }

    #[test]
    fn test_record_slot_reads_current_assignment() {
        let ctx = RunContext::new();
        let trace = Trace::new(0);
        trace.record_slot(0);
        trace.assign(Slot::settled(&ctx, 1));
        trace.record_slot(1);
        trace.push(0);
        trace.push(1);

        assert_eq!(serde_json::to_value(trace.values()).unwrap(), json!({"0": 0, "1": {}}));
        assert_eq!(trace.orders(), vec![0, 1]);
    }

    #[test]
    fn test_resolving_a_value_takes_one_hop() {
        let ctx = RunContext::new();
        let c = ctx.clone();
        let routine: Promise<i64, crate::Error> =
            ctx.spawn(async move { Slot::Value(5).resolve(&c).await });

        assert!(!routine.is_settled());
        assert!(ctx.scheduler().run_microtask());
        assert_eq!(routine.peek(), Some(Ok(5)));
    }
}
