//! Seams to the local data tree engine
//!
//! The engine owns persistence, commit, and purge work, plus leader-failover
//! recovery; the ledger only schedules operations and reacts to their
//! completion. Every asynchronous operation takes a callback the engine must
//! invoke exactly once on success. An operation whose callback never fires
//! leaves its reply unfulfilled; recovering from that is the engine's and
//! transport's contract, not this layer's.

use std::time::Instant;

use strata_core::{HistoryId, SealedModification, TransactionId, TreePath, Value};

/// Callback fired exactly once when an asynchronous engine operation
/// finishes.
///
/// Implementations enqueue the typed result onto the issuing history's own
/// queue rather than touching ledger state directly; see
/// [`Completion`](crate::history::Completion).
pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

/// Monotonic time source used for elapsed-time reporting.
///
/// Readings are nanoseconds from an arbitrary origin; only differences are
/// meaningful. Never consulted for ordering decisions.
pub trait Ticker: Send + Sync {
    /// Current reading in nanoseconds
    fn read(&self) -> u64;
}

/// [`Ticker`] backed by `std::time::Instant`.
#[derive(Debug)]
pub struct MonotonicTicker {
    origin: Instant,
}

impl MonotonicTicker {
    /// Create a ticker originating now
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicTicker {
    fn default() -> Self {
        Self::new()
    }
}

impl Ticker for MonotonicTicker {
    fn read(&self) -> u64 {
        // Saturates after ~584 years of uptime.
        u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}

/// Fixed point-in-time read view of the data tree.
pub trait DataTreeSnapshot: Send {
    /// Read the node at `path`, if present
    fn read(&self, path: &TreePath) -> Option<Value>;
}

/// Mutable overlay an open transaction accumulates writes into.
///
/// Reads go through the overlay, so a transaction observes its own staged
/// writes.
pub trait DataTreeModification: Send {
    /// Read the node at `path` as the overlay sees it
    fn read(&self, path: &TreePath) -> Option<Value>;

    /// Create or replace the node at `path`
    fn write(&mut self, path: TreePath, value: Value);

    /// Remove the subtree rooted at `path`
    fn delete(&mut self, path: &TreePath);

    /// Freeze the accumulated writes into an immutable batch
    fn seal(self: Box<Self>) -> SealedModification;
}

/// Handle to an engine cohort: a readied transaction's unit of commit work.
///
/// Driving the commit protocol is the engine's business; the ledger holds
/// the handle only so the readied transaction stays identifiable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CohortHandle {
    transaction: TransactionId,
}

impl CohortHandle {
    /// Create a handle for `transaction`'s cohort
    pub fn new(transaction: TransactionId) -> Self {
        Self { transaction }
    }

    /// The transaction the cohort belongs to
    pub fn transaction(&self) -> TransactionId {
        self.transaction
    }
}

/// The local data tree engine the ledger delegates to.
pub trait DataTreeEngine: Send + Sync + 'static {
    /// Monotonic time source
    fn ticker(&self) -> &dyn Ticker;

    /// Fixed read view for a snapshot transaction
    fn take_snapshot(&self) -> Box<dyn DataTreeSnapshot>;

    /// Fresh mutable overlay for an open transaction
    fn new_modification(&self) -> Box<dyn DataTreeModification>;

    /// Build the commit cohort for a readied transaction's sealed writes
    fn create_ready_cohort(
        &self,
        id: TransactionId,
        modification: SealedModification,
    ) -> CohortHandle;

    /// Permanently remove `id`'s state; `on_complete` fires exactly once
    fn purge_transaction(&self, id: TransactionId, on_complete: CompletionCallback);

    /// Close the transaction chain backing `history`; `on_complete` fires
    /// exactly once
    fn close_transaction_chain(&self, history: HistoryId, on_complete: CompletionCallback);

    /// Purge the transaction chain backing `history`; `on_complete` fires
    /// exactly once
    fn purge_transaction_chain(&self, history: HistoryId, on_complete: CompletionCallback);
}
