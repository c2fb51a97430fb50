//! Repeated awaits and repeated resolver calls.

use crate::assertions::expect;
use crate::error::Error;
use crate::promise::{flip, Promise};
use crate::runtime::RunContext;

pub(super) fn register(ctx: &RunContext) {
    ctx.test_async("await multiple times resolved promise", |ctx| async move {
        let pr = Promise::<i64, i64>::resolved(&ctx, 1);
        expect((&pr).await).to_be(Ok(1))?;
        expect((&pr).await).to_be(Ok(1))
    });

    ctx.test_async("await multiple times rejected promise", |ctx| async move {
        let pr = Promise::<i64, i64>::rejected(&ctx, 1);
        expect(flip(&pr).await).to_be(Ok(1))?;
        expect(flip(&pr).await).to_be(Ok(1))
    });

    ctx.test_async("resolve multiple times", |ctx| async move {
        let pr = Promise::<i64, i64>::new(&ctx, |resolve| {
            resolve.fulfill(1);
            resolve.fulfill(2);
            resolve.fulfill(3);
            Ok(())
        });
        expect(pr.await).to_be(Ok(1))
    });

    ctx.test_async("resolve then reject", |ctx| async move {
        let pr = Promise::<i64, i64>::new(&ctx, |resolve| {
            resolve.fulfill(1);
            resolve.fulfill(2);
            resolve.fulfill(3);
            resolve.reject(4);
            Ok(())
        });
        expect(pr.await).to_be(Ok(1))
    });

    ctx.test_async("reject multiple times", |ctx| async move {
        let pr = Promise::<i64, i64>::new(&ctx, |resolve| {
            resolve.reject(1);
            resolve.reject(2);
            resolve.reject(3);
            Ok(())
        });
        expect(flip(&pr).await).to_be(Ok(1))
    });

    ctx.test_async("reject then resolve", |ctx| async move {
        let pr = Promise::<i64, i64>::new(&ctx, |resolve| {
            resolve.reject(1);
            resolve.reject(2);
            resolve.reject(3);
            resolve.fulfill(4);
            Ok(())
        });
        let reason = flip(&pr).await.map_err(Error::rejected)?;
        expect(reason).to_be(1)
    });
}
