//! When initializers run relative to the code that creates the promise.
//!
//! Each scenario is a routine that reads and reassigns one variable (the
//! [`Trace`] slot) from inside a promise initializer and from the code that
//! awaits it. Every read is logged under a numbered key, so the recorded
//! values and step order pin down exactly where each suspension point
//! resumes.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;

use super::trace::{Slot, Trace};
use crate::assertions::expect;
use crate::error::Error;
use crate::promise::Promise;
use crate::runtime::RunContext;

const TIMER: Duration = Duration::from_millis(100);

/// Two initializers, one plain and one async, both running to completion
/// inside the constructor.
pub fn two_initializers(ctx: &RunContext, trace: &Trace) -> Promise<(), Error> {
    let (ctx, trace) = (ctx.clone(), trace.clone());
    ctx.clone().spawn(async move {
        let t = trace.clone();
        let promise = Promise::<i64, Error>::new(&ctx, move |resolve| {
            t.record_slot(0);
            t.push(0);
            t.assign(Slot::Value(1));
            resolve.fulfill(2);
            t.record_slot(1);
            t.push(1);
            Ok(())
        });
        trace.assign(Slot::Pending(promise));

        let value = trace.slot().resolve(&ctx).await?;
        trace.record(2, value);
        trace.push(2);
        let value = trace.slot().resolve(&ctx).await?;
        trace.assign(Slot::Value(value));

        let t = trace.clone();
        let promise = Promise::<i64, Error>::new_async(&ctx, move |resolve| async move {
            t.record_slot(3);
            t.push(3);
            t.assign(Slot::Value(3));
            resolve.fulfill(4);
            t.record_slot(4);
            t.push(4);
            Ok(())
        });
        trace.assign(Slot::Pending(promise));

        let value = trace.slot().resolve(&ctx).await?;
        trace.record(5, value);
        trace.push(5);
        Ok(())
    })
}

/// An async initializer that settles early, then waits on a timer before
/// reassigning the variable. With `outer_timer`, the awaiting side also
/// waits on a timer of the same length before its last read.
pub fn timer_in_initializer(
    ctx: &RunContext,
    trace: &Trace,
    outer_timer: bool,
) -> Promise<(), Error> {
    let (ctx, trace) = (ctx.clone(), trace.clone());
    ctx.clone().spawn(async move {
        let (init_ctx, t) = (ctx.clone(), trace.clone());
        let promise = Promise::<i64, Error>::new_async(&ctx, move |resolve| async move {
            t.record_slot(1);
            t.push(1);
            resolve.fulfill(1);
            t.record_slot(2);
            t.push(2);
            init_ctx.sleep(TIMER).await.ok();
            let value = t.slot().resolve(&init_ctx).await?;
            t.record(3, value);
            t.push(3);
            t.assign(Slot::Value(2));
            t.record_slot(4);
            t.push(4);
            Ok(())
        });
        trace.assign(Slot::Pending(promise));

        let value = trace.slot().resolve(&ctx).await?;
        trace.record(5, value);
        trace.push(5);
        if outer_timer {
            ctx.sleep(TIMER).await.ok();
        }
        let value = trace.slot().resolve(&ctx).await?;
        trace.record(6, value);
        trace.push(6);
        Ok(())
    })
}

/// An async initializer that awaits a nested promise whose own async
/// initializer reads the variable before the outer assignment happens.
pub fn nested_initializer(ctx: &RunContext, trace: &Trace) -> Promise<(), Error> {
    let (ctx, trace) = (ctx.clone(), trace.clone());
    ctx.clone().spawn(async move {
        let (init_ctx, t) = (ctx.clone(), trace.clone());
        let promise = Promise::<i64, Error>::new_async(&ctx, move |resolve| async move {
            t.record_slot(1);
            t.push(1);
            resolve.fulfill(1);
            t.record_slot(2);
            t.push(2);

            let (nested_ctx, nt) = (init_ctx.clone(), t.clone());
            let nested = Promise::<(), Error>::new_async(&init_ctx, move |done| async move {
                let value = nt.slot().resolve(&nested_ctx).await?;
                nt.record(3, value);
                nt.push(3);
                nested_ctx.set_timeout(TIMER, move || {
                    done.fulfill(());
                });
                Ok(())
            });
            nested.await?;

            let value = t.slot().resolve(&init_ctx).await?;
            t.record(4, value);
            t.push(4);
            t.assign(Slot::Value(2));
            t.record_slot(5);
            t.push(5);
            Ok(())
        });
        trace.assign(Slot::Pending(promise));

        let value = trace.slot().resolve(&ctx).await?;
        trace.record(6, value);
        trace.push(6);
        ctx.sleep(TIMER).await.ok();
        let value = trace.slot().resolve(&ctx).await?;
        trace.record(7, value);
        trace.push(7);
        Ok(())
    })
}

/// Like [`nested_initializer`], but the initializer awaits the variable
/// directly, while it still holds a plain number.
pub fn plain_value_first(ctx: &RunContext, trace: &Trace) -> Promise<(), Error> {
    let (ctx, trace) = (ctx.clone(), trace.clone());
    ctx.clone().spawn(async move {
        let (init_ctx, t) = (ctx.clone(), trace.clone());
        let promise = Promise::<i64, Error>::new_async(&ctx, move |resolve| async move {
            t.record_slot(1);
            t.push(1);
            resolve.fulfill(1);
            t.record_slot(2);
            t.push(2);
            let value = t.slot().resolve(&init_ctx).await?;
            t.record(3, value);
            t.push(3);
            init_ctx.sleep(TIMER).await.ok();
            let value = t.slot().resolve(&init_ctx).await?;
            t.record(4, value);
            t.push(4);
            t.assign(Slot::Value(2));
            t.record_slot(5);
            t.push(5);
            Ok(())
        });
        trace.assign(Slot::Pending(promise));

        let value = trace.slot().resolve(&ctx).await?;
        trace.record(6, value);
        trace.push(6);
        ctx.sleep(TIMER).await.ok();
        let value = trace.slot().resolve(&ctx).await?;
        trace.record(7, value);
        trace.push(7);
        Ok(())
    })
}

pub(super) fn register(ctx: &RunContext) {
    ctx.test_async(
        "constructor execute before promise created",
        |ctx| async move {
            let val = Arc::new(Mutex::new(1));
            let v = Arc::clone(&val);
            let promise = Promise::<i64, Error>::new(&ctx, move |resolve| {
                *v.lock() = 2;
                resolve.fulfill(3);
                Ok(())
            });
            let current = *val.lock();
            expect(current).to_be(2)?;
            promise.await?;
            Ok(())
        },
    );

    ctx.test_async(
        "constructor execute before promise created (2)",
        |ctx| async move {
            let trace = Trace::new(0);
            two_initializers(&ctx, &trace).await?;
            expect(trace.values()).to_equal(json!({
                "0": 0, "1": 1, "2": 2, "3": 2, "4": 3, "5": 4
            }))?;
            expect(trace.orders()).to_equal([0, 1, 2, 3, 4, 5])
        },
    );

    ctx.test_async(
        "constructor execute before promise created (3)",
        |ctx| async move {
            let trace = Trace::new(0);
            nested_initializer(&ctx, &trace).await?;
            expect(trace.values()).to_equal(json!({
                "1": 0, "2": 0, "3": 0, "4": 1, "5": 2, "6": 1, "7": 2
            }))?;
            expect(trace.orders()).to_equal([1, 2, 3, 6, 4, 5, 7])
        },
    );

    ctx.test_async(
        "constructor execute before promise created (3), awaiting a plain value first",
        |ctx| async move {
            let trace = Trace::new(0);
            plain_value_first(&ctx, &trace).await?;
            expect(trace.values()).to_equal(json!({
                "1": 0, "2": 0, "3": 0, "4": 1, "5": 2, "6": 1, "7": 2
            }))?;
            expect(trace.orders()).to_equal([1, 2, 3, 6, 4, 5, 7])
        },
    );

    // Step 6 reads the variable after step 4 reassigned it, hence 2.
    ctx.test_async(
        "constructor execute before promise created (3), timer in initializer",
        |ctx| async move {
            let trace = Trace::new(0);
            timer_in_initializer(&ctx, &trace, true).await?;
            expect(trace.values()).to_equal(json!({
                "1": 0, "2": 0, "3": 1, "4": 2, "5": 1, "6": 2
            }))?;
            expect(trace.orders()).to_equal([1, 2, 5, 3, 4, 6])
        },
    );

    ctx.test_async(
        "constructor execute before promise created (3), without the outer timer",
        |ctx| async move {
            let trace = Trace::new(0);
            timer_in_initializer(&ctx, &trace, false).await?;
            expect(trace.values()).to_equal(json!({
                "1": 0, "2": 0, "5": 1, "6": 1
            }))?;
            expect(trace.orders()).to_equal([1, 2, 5, 6])?;

            // The initializer is still parked on its timer.
            ctx.sleep(TIMER).await.ok();
            expect(trace.values()).to_equal(json!({
                "1": 0, "2": 0, "3": 1, "4": 2, "5": 1, "6": 1
            }))?;
            expect(trace.orders()).to_equal([1, 2, 5, 6, 3, 4])
        },
    );
}
