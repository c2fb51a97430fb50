//! The initializer runs inside the constructor call.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::assertions::expect;
use crate::error::Error;
use crate::promise::Promise;
use crate::runtime::RunContext;

type Var = Arc<Mutex<Option<i64>>>;

fn read(var: &Var) -> Option<i64> {
    *var.lock()
}

pub(super) fn register_sync(ctx: &RunContext) {
    ctx.test_async("constructor is not async", |ctx| async move {
        let (val, val1) = (Var::default(), Var::default());
        let (v, v1) = (Arc::clone(&val), Arc::clone(&val1));
        let timer_ctx = ctx.clone();
        let pr = Promise::<(), Error>::new(&ctx, move |resolve| {
            *v.lock() = Some(1);
            timer_ctx.set_timeout(Duration::ZERO, move || {
                resolve.fulfill(());
                *v1.lock() = Some(2);
            });
            Ok(())
        });
        expect(read(&val)).to_be(Some(1))?;
        expect(read(&val1)).to_be_undefined()?;
        pr.await?;
        expect(read(&val)).to_be(Some(1))?;
        expect(read(&val1)).to_be(Some(2))
    });

    ctx.test_async("constructor is sync until the first await", |ctx| async move {
        let (val, val1) = (Var::default(), Var::default());
        let (v, v1) = (Arc::clone(&val), Arc::clone(&val1));
        let tick = ctx.tick();
        let pr = Promise::<(), Error>::new_async(&ctx, move |resolve| async move {
            *v.lock() = Some(1);
            tick.await;
            *v1.lock() = Some(2);
            resolve.fulfill(());
            *v1.lock() = Some(3);
            Ok(())
        });
        expect(read(&val)).to_be(Some(1))?;
        expect(read(&val1)).to_be_undefined()?;
        pr.await?;
        expect(read(&val1)).to_be(Some(3))
    });
}
