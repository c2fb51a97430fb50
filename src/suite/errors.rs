//! Where errors surface: at the await point, and from initializers.

use crate::assertions::expect;
use crate::error::{Error, Result};
use crate::promise::{flip, Promise};
use crate::runtime::RunContext;

const EXPECTED: &str = "error caught in expected location";
const UNEXPECTED: &str = "error caught in unexpected location";

fn unexpected_fulfillment(_: ()) -> Error {
    Error::assertion("expected a rejection but the promise was fulfilled")
}

/// Errors raised after an await are caught around that await, never inside
/// the already-finished initializer.
pub(super) fn register_catching(ctx: &RunContext) {
    ctx.test("error catch with resolve", |ctx| {
        let inner_ctx = ctx.clone();
        Promise::<(), Error>::new_async(&ctx, move |outer| async move {
            let on_inner = outer.clone();
            let inner = Promise::<(), Error>::new(&inner_ctx, move |resolve| {
                if !resolve.fulfill(()) {
                    on_inner.reject(Error::assertion(UNEXPECTED));
                }
                Ok(())
            });
            let attempt: Result<()> = async {
                inner.await?;
                Err(Error::assertion("error thrown outside"))
            }
            .await;
            if let Err(error) = attempt {
                tracing::debug!(%error, "{EXPECTED}");
                outer.fulfill(());
            }
            Ok(())
        })
    });

    ctx.test("error catch with reject", |ctx| {
        let inner_ctx = ctx.clone();
        Promise::<(), Error>::new_async(&ctx, move |outer| async move {
            let on_inner = outer.clone();
            let inner = Promise::<(), Error>::new(&inner_ctx, move |resolve| {
                if !resolve.reject(Error::assertion("rejected")) {
                    on_inner.reject(Error::assertion(UNEXPECTED));
                }
                Ok(())
            });
            if let Err(rejection) = inner.await {
                let thrown: Result<()> = Err(Error::assertion("error thrown outside"));
                if let Err(error) = thrown {
                    tracing::debug!(%rejection, %error, "{EXPECTED}");
                    outer.fulfill(());
                }
            }
            Ok(())
        })
    });
}

/// An initializer returning `Err` rejects, unless it already settled.
pub(super) fn register_constructor(ctx: &RunContext) {
    ctx.test_async("constructor reject if error thrown", |ctx| async move {
        let failing = Promise::<(), Error>::new(&ctx, |_| Err(Error::assertion("my err")));
        let reason = flip(&failing).await.map_err(unexpected_fulfillment)?;
        expect(reason).to_be(Error::assertion("my err"))
    });

    ctx.test_async("constructor reject if resolve then reject", |ctx| async move {
        Promise::<(), Error>::new(&ctx, |resolve| {
            resolve.fulfill(());
            Err(Error::assertion("an error"))
        })
        .await
    });

    ctx.test_async(
        "constructor returns a rejected promise when error is thrown synchronously",
        |ctx| async move {
            let promise = Promise::<(), Error>::new(&ctx, |_| Err(Error::assertion("an error")));
            flip(&promise).await.map_err(unexpected_fulfillment)?;
            Ok(())
        },
    );
}

/// The first disposition wins even when the initializer also returns `Err`.
pub(super) fn register_duplicated(ctx: &RunContext) {
    ctx.test_async("the first returned (reject function) is used", |ctx| async move {
        let promise = Promise::<(), i64>::new(&ctx, |resolve| {
            resolve.reject(1);
            Err(2)
        });
        let reason = flip(&promise).await.map_err(unexpected_fulfillment)?;
        expect(reason).to_be(1)
    });
}
