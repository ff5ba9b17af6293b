//! Ledger runtime configuration.

/// Tunables for one history's ledger.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Responses retained per transaction for answering retransmissions.
    ///
    /// Bounds how far behind a retransmitted request may lag before it is
    /// rejected as out of order instead of replayed.
    pub replay_cache_capacity: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            replay_cache_capacity: 64,
        }
    }
}
