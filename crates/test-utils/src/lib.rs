pub mod builders;
pub mod fake_submitter;

use std::sync::Once;
use tracing_subscriber::{fmt, EnvFilter};

pub use builders::{ConfigFileBuilder, ContextBuilder};
pub use fake_submitter::FakeSubmitter;

static INIT: Once = Once::new();

const TEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Initialise tracing for slotdag tests, once per test binary.
///
/// Output goes through the test writer, so it only shows for failing tests
/// (or with `-- --nocapture`). Without `RUST_LOG`, slotdag's own events are
/// shown at `debug` and everything else at `warn`; lock polling and DAG edge
/// wiring stay at `trace` and need e.g. `RUST_LOG=slotdag=trace`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("warn,slotdag=debug"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Bound a worker, manager or lock future in tests so a lost wakeup or a
/// stuck lock fails the test instead of hanging it.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(TEST_TIMEOUT, f)
        .await
        .unwrap_or_else(|_| panic!("slotdag test did not finish within {TEST_TIMEOUT:?}"))
}
