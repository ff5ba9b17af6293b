//! Per-transaction state and replay bookkeeping
//!
//! A transaction's state is created by its first (sequence-0) request and
//! lives until the transaction is purged. The variant is picked from the
//! shape of that first request and never changes: a submitted modification
//! becomes a pre-readied transaction, a snapshot-scoped read becomes a
//! read-only snapshot, anything else becomes a general open transaction.
//!
//! Successful responses are recorded in a bounded replay cache keyed by
//! sequence number so retransmitted requests are answered without
//! re-executing their effect. Rejections are not recorded; a retransmitted
//! bad request is re-rejected deterministically.

use std::collections::VecDeque;

use strata_core::{
    RequestError, Result, SealedModification, TransactionId, TransactionRequest,
    TransactionSuccess, WriteOp,
};

use crate::engine::{CohortHandle, DataTreeEngine, DataTreeModification, DataTreeSnapshot};

/// Context a transaction borrows while handling one request.
///
/// Carried per call so transaction state owns no engine reference.
pub(crate) struct TransactionContext<'a> {
    /// The data tree engine to execute against
    pub engine: &'a dyn DataTreeEngine,
    /// The owning tracker's persistence id, for logging
    pub persistence_id: &'a str,
}

impl TransactionContext<'_> {
    /// Build the commit cohort for a readied transaction.
    ///
    /// The tracker's delegation point: cohort creation always goes through
    /// here rather than transactions talking to the engine ad hoc.
    fn create_ready_cohort(
        &self,
        id: TransactionId,
        modification: SealedModification,
    ) -> CohortHandle {
        self.engine.create_ready_cohort(id, modification)
    }
}

/// Bounded record of recent successful responses, keyed by sequence.
#[derive(Debug)]
struct ReplayCache {
    responses: VecDeque<(u64, TransactionSuccess)>,
    capacity: usize,
    last_applied: Option<u64>,
}

impl ReplayCache {
    fn new(capacity: usize) -> Self {
        Self {
            responses: VecDeque::new(),
            capacity: capacity.max(1),
            last_applied: None,
        }
    }

    /// The next sequence this transaction will accept.
    fn next_sequence(&self) -> u64 {
        self.last_applied.map_or(0, |s| s.saturating_add(1))
    }

    fn record(&mut self, sequence: u64, response: TransactionSuccess) {
        self.last_applied = Some(sequence);
        if self.responses.len() == self.capacity {
            self.responses.pop_front();
        }
        self.responses.push_back((sequence, response));
    }

    /// Look up a previously produced response for `sequence`.
    ///
    /// `Ok(None)` means the sequence is the next expected one and should be
    /// executed. A sequence past the next expected one, or one older than
    /// the cache retains, is out of order.
    fn replay(&self, target: TransactionId, sequence: u64) -> Result<Option<TransactionSuccess>> {
        let expected = self.next_sequence();
        if sequence == expected {
            return Ok(None);
        }
        if sequence > expected {
            return Err(RequestError::OutOfOrderRequest {
                target,
                sequence,
                expected,
            });
        }
        match self
            .responses
            .iter()
            .find(|(s, _)| *s == sequence)
            .map(|(_, response)| response.clone())
        {
            Some(response) => Ok(Some(response)),
            // Older than the cache retains: nothing faithful to answer with.
            None => Err(RequestError::OutOfOrderRequest {
                target,
                sequence,
                expected,
            }),
        }
    }
}

/// State of one frontend transaction, from creation to purge.
pub enum Transaction {
    /// General read/write transaction working against a mutable overlay
    Open(OpenTransaction),
    /// Read-only transaction scoped to a fixed point-in-time view
    Snapshot(SnapshotTransaction),
    /// Transaction submitted with its modification already applied
    Ready(ReadyTransaction),
}

impl Transaction {
    /// Create the variant matching the shape of a transaction's first
    /// request.
    pub(crate) fn create(
        request: &TransactionRequest,
        cx: &TransactionContext<'_>,
        replay_capacity: usize,
    ) -> Self {
        match request {
            TransactionRequest::CommitLocal {
                target,
                modification,
                ..
            } => {
                tracing::debug!(
                    history = cx.persistence_id,
                    tx = %target,
                    "allocating new ready transaction"
                );
                Transaction::Ready(ReadyTransaction::new(
                    *target,
                    modification.clone(),
                    cx,
                    replay_capacity,
                ))
            }
            TransactionRequest::Read {
                target,
                snapshot_only: true,
                ..
            } => {
                tracing::debug!(
                    history = cx.persistence_id,
                    tx = %target,
                    "allocating new open snapshot"
                );
                Transaction::Snapshot(SnapshotTransaction::new(
                    *target,
                    cx.engine.take_snapshot(),
                    replay_capacity,
                ))
            }
            other => {
                tracing::debug!(
                    history = cx.persistence_id,
                    tx = %other.target(),
                    "allocating new open transaction"
                );
                Transaction::Open(OpenTransaction::new(
                    other.target(),
                    cx.engine.new_modification(),
                    replay_capacity,
                ))
            }
        }
    }

    /// The transaction's identifier
    pub fn id(&self) -> TransactionId {
        match self {
            Transaction::Open(tx) => tx.id,
            Transaction::Snapshot(tx) => tx.id,
            Transaction::Ready(tx) => tx.id,
        }
    }

    fn cache(&self) -> &ReplayCache {
        match self {
            Transaction::Open(tx) => &tx.cache,
            Transaction::Snapshot(tx) => &tx.cache,
            Transaction::Ready(tx) => &tx.cache,
        }
    }

    fn cache_mut(&mut self) -> &mut ReplayCache {
        match self {
            Transaction::Open(tx) => &mut tx.cache,
            Transaction::Snapshot(tx) => &mut tx.cache,
            Transaction::Ready(tx) => &mut tx.cache,
        }
    }

    /// A previously produced response for `sequence`, if one is cached.
    ///
    /// `Ok(None)` means the sequence is new and must be executed.
    pub(crate) fn replay_sequence(&self, sequence: u64) -> Result<Option<TransactionSuccess>> {
        self.cache().replay(self.id(), sequence)
    }

    /// Execute a request's effect and record the response for replay.
    pub(crate) fn handle_request(
        &mut self,
        request: &TransactionRequest,
        cx: &TransactionContext<'_>,
    ) -> Result<TransactionSuccess> {
        let response = match self {
            Transaction::Open(tx) => tx.handle(request, cx)?,
            Transaction::Snapshot(tx) => tx.handle(request)?,
            Transaction::Ready(tx) => tx.handle(request)?,
        };
        self.cache_mut().record(request.sequence(), response.clone());
        Ok(response)
    }
}

fn illegal(target: TransactionId, request: &TransactionRequest) -> RequestError {
    RequestError::IllegalOperation {
        target,
        operation: request.kind().to_owned(),
    }
}

/// General open transaction: reads and writes against a mutable overlay
/// until it is readied or aborted.
pub struct OpenTransaction {
    id: TransactionId,
    cache: ReplayCache,
    stage: OpenStage,
}

enum OpenStage {
    /// Accepting reads and writes
    Mutating(Box<dyn DataTreeModification>),
    /// Sealed; the commit cohort exists
    Readied(CohortHandle),
    /// Writes discarded; only purge remains
    Aborted,
}

impl OpenTransaction {
    fn new(id: TransactionId, overlay: Box<dyn DataTreeModification>, replay_capacity: usize) -> Self {
        Self {
            id,
            cache: ReplayCache::new(replay_capacity),
            stage: OpenStage::Mutating(overlay),
        }
    }

    /// The commit cohort, once the transaction has been readied
    pub fn cohort(&self) -> Option<CohortHandle> {
        match &self.stage {
            OpenStage::Readied(cohort) => Some(*cohort),
            _ => None,
        }
    }

    fn handle(
        &mut self,
        request: &TransactionRequest,
        cx: &TransactionContext<'_>,
    ) -> Result<TransactionSuccess> {
        match request {
            TransactionRequest::Read { sequence, path, .. } => match &self.stage {
                OpenStage::Mutating(overlay) => Ok(TransactionSuccess::Read {
                    target: self.id,
                    sequence: *sequence,
                    value: overlay.read(path),
                }),
                _ => Err(illegal(self.id, request)),
            },
            TransactionRequest::Modify { sequence, ops, .. } => match &mut self.stage {
                OpenStage::Mutating(overlay) => {
                    for op in ops {
                        match op {
                            WriteOp::Put { path, value } => {
                                overlay.write(path.clone(), value.clone());
                            }
                            WriteOp::Delete { path } => overlay.delete(path),
                        }
                    }
                    Ok(TransactionSuccess::Modified {
                        target: self.id,
                        sequence: *sequence,
                    })
                }
                _ => Err(illegal(self.id, request)),
            },
            TransactionRequest::Ready { sequence, .. } => {
                match std::mem::replace(&mut self.stage, OpenStage::Aborted) {
                    OpenStage::Mutating(overlay) => {
                        let cohort = cx.create_ready_cohort(self.id, overlay.seal());
                        self.stage = OpenStage::Readied(cohort);
                        Ok(TransactionSuccess::Readied {
                            target: self.id,
                            sequence: *sequence,
                        })
                    }
                    other => {
                        self.stage = other;
                        Err(illegal(self.id, request))
                    }
                }
            }
            TransactionRequest::Abort { sequence, .. } => match self.stage {
                OpenStage::Mutating(_) => {
                    self.stage = OpenStage::Aborted;
                    Ok(TransactionSuccess::Aborted {
                        target: self.id,
                        sequence: *sequence,
                    })
                }
                _ => Err(illegal(self.id, request)),
            },
            TransactionRequest::Purge { .. } | TransactionRequest::CommitLocal { .. } => {
                Err(illegal(self.id, request))
            }
        }
    }
}

/// Read-only transaction against a fixed point-in-time view.
pub struct SnapshotTransaction {
    id: TransactionId,
    cache: ReplayCache,
    snapshot: Box<dyn DataTreeSnapshot>,
}

impl SnapshotTransaction {
    fn new(id: TransactionId, snapshot: Box<dyn DataTreeSnapshot>, replay_capacity: usize) -> Self {
        Self {
            id,
            cache: ReplayCache::new(replay_capacity),
            snapshot,
        }
    }

    fn handle(&mut self, request: &TransactionRequest) -> Result<TransactionSuccess> {
        match request {
            TransactionRequest::Read { sequence, path, .. } => Ok(TransactionSuccess::Read {
                target: self.id,
                sequence: *sequence,
                value: self.snapshot.read(path),
            }),
            _ => Err(illegal(self.id, request)),
        }
    }
}

/// Transaction readied at creation from a submitted modification.
///
/// The cohort is built when the state is created; no further operations are
/// accepted.
pub struct ReadyTransaction {
    id: TransactionId,
    cache: ReplayCache,
    cohort: CohortHandle,
}

impl ReadyTransaction {
    fn new(
        id: TransactionId,
        modification: SealedModification,
        cx: &TransactionContext<'_>,
        replay_capacity: usize,
    ) -> Self {
        let cohort = cx.create_ready_cohort(id, modification);
        Self {
            id,
            cache: ReplayCache::new(replay_capacity),
            cohort,
        }
    }

    /// The commit cohort built from the submitted modification
    pub fn cohort(&self) -> CohortHandle {
        self.cohort
    }

    fn handle(&mut self, request: &TransactionRequest) -> Result<TransactionSuccess> {
        match request {
            // The creating request itself; retransmissions of it are served
            // from the replay cache, so any later commit-local is a protocol
            // violation.
            TransactionRequest::CommitLocal { sequence, .. }
                if self.cache.next_sequence() == 0 =>
            {
                Ok(TransactionSuccess::Readied {
                    target: self.id,
                    sequence: *sequence,
                })
            }
            _ => Err(illegal(self.id, request)),
        }
    }
}
