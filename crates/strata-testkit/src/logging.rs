//! Tracing initialization for tests

use once_cell::sync::OnceCell;

static INIT: OnceCell<()> = OnceCell::new();

/// Install a compact subscriber writing through the test harness.
///
/// Safe to call from every test; only the first call installs anything.
/// Filtering follows `RUST_LOG`.
pub fn init_tracing() {
    INIT.get_or_init(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}
