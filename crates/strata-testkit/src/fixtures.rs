//! Wired-up tracker fixture
//!
//! A tracker connected to a recording engine and a hand-pumped completion
//! queue, so tests control exactly when asynchronous work resolves.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use strata_core::{
    ClientId, HistoryId, TransactionId, TransactionOutcome, UnsignedRangeSet,
};
use strata_ledger::{Completion, DataTreeEngine, HistoryTracker, LedgerConfig};

use crate::engine::RecordingEngine;

/// A tracker plus the doubles it is wired to.
pub struct TestHistory {
    /// The tracker under test
    pub tracker: HistoryTracker,
    /// The recording engine behind it
    pub engine: Arc<RecordingEngine>,
    /// The receiver half of the tracker's completion queue
    pub completions: mpsc::UnboundedReceiver<Completion>,
}

impl TestHistory {
    /// Fresh tracker with empty recovered state
    pub fn new() -> Self {
        Self::with_recovered(HashMap::new(), UnsignedRangeSet::new())
    }

    /// Tracker seeded with state inherited from a previous owner
    pub fn with_recovered(
        closed: HashMap<u64, TransactionOutcome>,
        purged: UnsignedRangeSet,
    ) -> Self {
        let engine = Arc::new(RecordingEngine::new());
        let engine_seam: Arc<dyn DataTreeEngine> = engine.clone();
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let history = HistoryId::new(ClientId::new(), 0);
        let tracker = HistoryTracker::new(
            history.to_string(),
            history,
            engine_seam,
            closed,
            purged,
            LedgerConfig::default(),
            completion_tx,
        );
        Self {
            tracker,
            engine,
            completions: completion_rx,
        }
    }

    /// The history under test
    pub fn history_id(&self) -> HistoryId {
        self.tracker.id()
    }

    /// Identifier of transaction `index` within the history
    pub fn txn(&self, index: u64) -> TransactionId {
        self.history_id().transaction(index)
    }

    /// Fire the next engine completion and apply everything it enqueues
    pub fn complete_next(&mut self) {
        self.engine.complete_next();
        self.drain_completions();
    }

    /// Fire every pending engine completion and apply the results
    pub fn complete_all(&mut self) {
        self.engine.complete_all();
        self.drain_completions();
    }

    /// Apply already-enqueued completions without touching the engine
    pub fn drain_completions(&mut self) {
        while let Ok(completion) = self.completions.try_recv() {
            self.tracker.apply_completion(completion);
        }
    }
}

impl Default for TestHistory {
    fn default() -> Self {
        Self::new()
    }
}
