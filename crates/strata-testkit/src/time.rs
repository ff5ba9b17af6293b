//! Manually controlled time for deterministic tests

use std::sync::atomic::{AtomicU64, Ordering};

use strata_ledger::Ticker;

/// Monotonic clock a test advances by hand.
#[derive(Debug, Default)]
pub struct ManualTicker {
    now: AtomicU64,
}

impl ManualTicker {
    /// Create a ticker reading zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock by `nanos`
    pub fn advance(&self, nanos: u64) {
        self.now.fetch_add(nanos, Ordering::SeqCst);
    }

    /// Jump the clock to an absolute reading
    pub fn set(&self, nanos: u64) {
        self.now.store(nanos, Ordering::SeqCst);
    }
}

impl Ticker for ManualTicker {
    fn read(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
