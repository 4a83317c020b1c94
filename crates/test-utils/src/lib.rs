//! Shared helpers for `regionflow` integration tests.
//!
//! - [`builders`]: fluent construction of regions and config files.
//! - [`elements`]: node bodies that record, fail, or refuse to initialise.
//! - [`inline_pool`]: a worker pool that runs chains on the submitting thread.

pub mod builders;
pub mod elements;
pub mod inline_pool;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use regionflow::logging::LOG_ENV;
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Upper bound for any single awaited region operation in tests.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Install a test subscriber once per test binary.
///
/// Output is captured per test and shown only for failures (or with
/// `--nocapture`). The filter comes from `REGIONFLOW_LOG`, then `RUST_LOG`,
/// then defaults to `info`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_thread_names(true)
            .try_init();
    });
}

/// Await `f`, failing the test if it takes longer than [`TEST_TIMEOUT`].
///
/// A hung barrier or a lost chain handle shows up as a timeout here instead
/// of a stuck test run.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(TEST_TIMEOUT, f)
        .await
        .unwrap_or_else(|_| panic!("region operation timed out after {TEST_TIMEOUT:?}"))
}
