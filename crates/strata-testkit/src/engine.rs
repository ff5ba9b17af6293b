//! In-memory data tree engine double
//!
//! Backs transactions with a plain map, records every engine call, and holds
//! asynchronous completions in a queue until the test fires them. In
//! auto-complete mode completions fire inline instead, for worker-level
//! tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use strata_core::{HistoryId, SealedModification, TransactionId, TreePath, Value, WriteOp};
use strata_ledger::{
    CohortHandle, CompletionCallback, DataTreeEngine, DataTreeModification, DataTreeSnapshot,
    Ticker,
};

use crate::time::ManualTicker;

/// Engine operations observed by a [`RecordingEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCall {
    /// `purge_transaction` was invoked
    PurgeTransaction(TransactionId),
    /// `close_transaction_chain` was invoked
    CloseChain(HistoryId),
    /// `purge_transaction_chain` was invoked
    PurgeChain(HistoryId),
    /// `create_ready_cohort` was invoked
    CreateCohort(TransactionId),
}

/// In-memory engine that records calls and defers completions.
#[derive(Default)]
pub struct RecordingEngine {
    ticker: ManualTicker,
    tree: Mutex<BTreeMap<TreePath, Value>>,
    calls: Mutex<Vec<EngineCall>>,
    pending: Mutex<VecDeque<CompletionCallback>>,
    auto_complete: AtomicBool,
}

impl RecordingEngine {
    /// Create an engine over an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire completions inline instead of queueing them.
    ///
    /// Worker-level tests use this so a purge resolves without the test
    /// having to pump the queue by hand.
    pub fn set_auto_complete(&self, auto: bool) {
        self.auto_complete.store(auto, Ordering::SeqCst);
    }

    /// Seed the backing tree
    pub fn put(&self, path: TreePath, value: Value) {
        self.tree.lock().insert(path, value);
    }

    /// The manually advanced clock backing [`DataTreeEngine::ticker`]
    pub fn manual_ticker(&self) -> &ManualTicker {
        &self.ticker
    }

    /// Every engine call observed so far, in order
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    /// Number of `purge_transaction` calls for `id`
    pub fn purge_count(&self, id: TransactionId) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, EngineCall::PurgeTransaction(t) if *t == id))
            .count()
    }

    /// Completions waiting to be fired
    pub fn pending_completions(&self) -> usize {
        self.pending.lock().len()
    }

    /// Fire the oldest pending completion.
    ///
    /// Panics if nothing is pending; that is a test bug.
    pub fn complete_next(&self) {
        let callback = self
            .pending
            .lock()
            .pop_front()
            .expect("no pending engine completion");
        callback();
    }

    /// Fire every pending completion, oldest first
    pub fn complete_all(&self) {
        loop {
            let next = self.pending.lock().pop_front();
            match next {
                Some(callback) => callback(),
                None => break,
            }
        }
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().push(call);
    }

    fn schedule(&self, on_complete: CompletionCallback) {
        if self.auto_complete.load(Ordering::SeqCst) {
            on_complete();
        } else {
            self.pending.lock().push_back(on_complete);
        }
    }
}

impl DataTreeEngine for RecordingEngine {
    fn ticker(&self) -> &dyn Ticker {
        &self.ticker
    }

    fn take_snapshot(&self) -> Box<dyn DataTreeSnapshot> {
        Box::new(TreeSnapshot {
            view: self.tree.lock().clone(),
        })
    }

    fn new_modification(&self) -> Box<dyn DataTreeModification> {
        Box::new(TreeOverlay {
            base: self.tree.lock().clone(),
            ops: Vec::new(),
        })
    }

    fn create_ready_cohort(
        &self,
        id: TransactionId,
        _modification: SealedModification,
    ) -> CohortHandle {
        self.record(EngineCall::CreateCohort(id));
        CohortHandle::new(id)
    }

    fn purge_transaction(&self, id: TransactionId, on_complete: CompletionCallback) {
        self.record(EngineCall::PurgeTransaction(id));
        self.schedule(on_complete);
    }

    fn close_transaction_chain(&self, history: HistoryId, on_complete: CompletionCallback) {
        self.record(EngineCall::CloseChain(history));
        self.schedule(on_complete);
    }

    fn purge_transaction_chain(&self, history: HistoryId, on_complete: CompletionCallback) {
        self.record(EngineCall::PurgeChain(history));
        self.schedule(on_complete);
    }
}

struct TreeSnapshot {
    view: BTreeMap<TreePath, Value>,
}

impl DataTreeSnapshot for TreeSnapshot {
    fn read(&self, path: &TreePath) -> Option<Value> {
        self.view.get(path).cloned()
    }
}

struct TreeOverlay {
    base: BTreeMap<TreePath, Value>,
    ops: Vec<WriteOp>,
}

impl DataTreeModification for TreeOverlay {
    fn read(&self, path: &TreePath) -> Option<Value> {
        // Later ops shadow earlier ones and the base view.
        for op in self.ops.iter().rev() {
            match op {
                WriteOp::Put { path: p, value } if p == path => return Some(value.clone()),
                WriteOp::Delete { path: p } if path.starts_with(p) => return None,
                _ => {}
            }
        }
        self.base.get(path).cloned()
    }

    fn write(&mut self, path: TreePath, value: Value) {
        self.ops.push(WriteOp::Put { path, value });
    }

    fn delete(&mut self, path: &TreePath) {
        self.ops.push(WriteOp::Delete { path: path.clone() });
    }

    fn seal(self: Box<Self>) -> SealedModification {
        SealedModification::new(self.ops)
    }
}
