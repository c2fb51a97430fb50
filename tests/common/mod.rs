#![allow(dead_code)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```
//! mod common;
//! use common::*;
//! ```

use std::sync::Once;

use microtick::prelude::*;

static INIT_LOGGING: Once = Once::new();

/// Initialize test logging once per test binary.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .with_ansi(false)
            .try_init();
    });
}

/// A fresh context with the scenario suite registered.
pub fn suite_context(config: RunConfig) -> RunContext {
    let ctx = RunContext::with_config(config);
    microtick::suite::register(&ctx);
    ctx
}
