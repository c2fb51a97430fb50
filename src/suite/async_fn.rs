//! Routines suspend at every await, even on plain values.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::trace::{Slot, Trace};
use crate::assertions::expect;
use crate::assertions::matcher::{eq, undefined};
use crate::check_that;
use crate::error::{Error, Result};
use crate::promise::Promise;
use crate::runtime::RunContext;

/// A routine that awaits `p1`, then records `step`.
fn push_after(ctx: &RunContext, p1: Slot, trace: &Trace, step: u32) -> Promise<(), Error> {
    let (ctx, trace) = (ctx.clone(), trace.clone());
    ctx.clone().spawn(async move {
        p1.resolve(&ctx).await?;
        trace.push(step);
        Ok(())
    })
}

/// A routine that settles its promise early, then waits on two timers in
/// sequence; the awaiting side races it with a timer of its own.
pub fn timer_race(ctx: &RunContext) -> Promise<i64, Error> {
    let ctx = ctx.clone();
    ctx.clone().spawn(async move {
        let val = Arc::new(Mutex::new(1));
        let v = Arc::clone(&val);
        let init_ctx = ctx.clone();
        let promise = Promise::<(), Error>::new_async(&ctx, move |resolve| async move {
            let this = resolve.promise();
            resolve.fulfill(());
            let timer_ctx = init_ctx.clone();
            Promise::<(), Error>::new_async(&init_ctx, move |done| async move {
                timer_ctx.set_timeout(Duration::ZERO, move || {
                    done.fulfill(());
                });
                Ok(())
            })
            .await?;
            this.await?;
            *v.lock() = 2;
            Ok(())
        });
        promise.await?;
        ctx.sleep(Duration::ZERO).await.ok();
        let observed = *val.lock();
        Ok(observed)
    })
}

pub(super) fn register(ctx: &RunContext) {
    ctx.test("setTimeout execute after assignment", |ctx| -> Result<()> {
        let val = Arc::new(Mutex::new(1));
        let v = Arc::clone(&val);
        ctx.set_timeout(Duration::ZERO, move || *v.lock() = 2);
        let current = *val.lock();
        expect(current).to_be(1)
    });

    ctx.test_async("should do we await a promise return?", |ctx| async move {
        let inner_ctx = ctx.clone();
        let a: Promise<Option<i64>, Error> = ctx.spawn(async move {
            match Promise::<i64, i64>::rejected(&inner_ctx, 1).await {
                Ok(value) => Ok(Some(value)),
                Err(_) => Ok(None),
            }
        });
        expect(a.await?).to_match(undefined())
    });

    ctx.test_async("async function stop at await", |ctx| async move {
        let trace = Trace::new(0);
        let p2 = push_after(&ctx, Slot::Value(0), &trace, 1);
        trace.push(2);
        p2.await?;

        let p2 = push_after(&ctx, Slot::settled(&ctx, 0), &trace, 3);
        trace.push(4);
        p2.await?;
        expect(trace.orders()).to_equal([2, 1, 4, 3])
    });

    ctx.test_async(
        "async function stop at await even with a static constant",
        |ctx| async move {
            let trace = Trace::new(0);
            let promise = push_after(&ctx, Slot::Value(0), &trace, 1);
            trace.push(2);
            promise.await?;
            expect(trace.orders()).to_equal([2, 1])
        },
    );

    ctx.test_async("then calls schedule orders", |ctx| async move {
        let trace = Trace::new(0);
        let (init_ctx, t) = (ctx.clone(), trace.clone());
        let p = Promise::<(), Error>::new_async(&ctx, move |resolve| async move {
            resolve.fulfill(());
            init_ctx.tick().await;
            t.push(1);
            Ok(())
        });
        trace.push(2);
        p.await?;
        trace.push(3);
        expect(trace.orders()).to_equal([2, 1, 3])
    });

    ctx.test_async(
        "timer awaited inside an initializer fires before a later timer",
        |ctx| async move {
            let val = timer_race(&ctx).await?;
            check_that!(val, eq(2));
            Ok(())
        },
    );
}
