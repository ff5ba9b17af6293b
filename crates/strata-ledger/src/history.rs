//! The history tracker: request classification, sequencing, and completion
//! handling
//!
//! The tracker reconciles three pieces of bookkeeping (active transactions,
//! transactions closed by a previous owner, and permanently purged
//! transactions) while tolerating duplicate, reordered, or
//! inherited-from-failover requests. Classification checks the purge ledger,
//! then the closed ledger, then the active map, so a dead transaction is reported
//! dead even if stale closed or active bookkeeping still exists, and a
//! closed-but-unpurged transaction is reported with its real outcome rather
//! than as unknown.
//!
//! At any instant a transaction index appears in at most one of the three,
//! and membership only ever moves forward: active or closed → purged.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use strata_core::{
    HistoryId, LocalHistorySuccess, RequestError, Response, Result, TransactionId,
    TransactionOutcome, TransactionRequest, TransactionSuccess, UnsignedRangeSet,
};

use crate::closed::ClosedTransactions;
use crate::config::LedgerConfig;
use crate::engine::DataTreeEngine;
use crate::reply::ReplyChannel;
use crate::transaction::{Transaction, TransactionContext};

/// Queue-delivered second half of an asynchronous engine operation.
///
/// Engine callbacks enqueue one of these onto the issuing history's own
/// queue; the owning task applies it via
/// [`HistoryTracker::apply_completion`], so every ledger mutation happens on
/// the serialized context that issued the operation. No locks anywhere.
pub enum Completion {
    /// `purge_transaction` finished for an id held in the closed ledger
    InheritedPurged {
        /// The purged transaction
        target: TransactionId,
        /// Sequence of the purge request
        sequence: u64,
        /// Channel awaiting the purge success
        reply: Arc<dyn ReplyChannel>,
        /// Ticker reading when the request was received
        started_at: u64,
    },
    /// `purge_transaction` finished for an id held in the active map
    TransactionPurged {
        /// The purged transaction
        target: TransactionId,
        /// Sequence of the purge request
        sequence: u64,
        /// Channel awaiting the purge success
        reply: Arc<dyn ReplyChannel>,
        /// Ticker reading when the request was received
        started_at: u64,
    },
    /// `close_transaction_chain` finished
    HistoryClosed {
        /// Sequence of the history request
        sequence: u64,
        /// Channel awaiting the history success
        reply: Arc<dyn ReplyChannel>,
        /// Ticker reading when the request was received
        started_at: u64,
    },
    /// `purge_transaction_chain` finished
    HistoryPurged {
        /// Sequence of the history request
        sequence: u64,
        /// Channel awaiting the history success
        reply: Arc<dyn ReplyChannel>,
        /// Ticker reading when the request was received
        started_at: u64,
    },
}

/// Frontend-facing ledger for one logical transaction history.
///
/// Constructed once per history with state recovered from the previous
/// owner, and torn down with the history. All methods must be called from
/// the history's single serialized context, normally the
/// [`HistoryWorker`](crate::worker::HistoryWorker) task; the tracker
/// performs no locking of its own.
pub struct HistoryTracker {
    id: HistoryId,
    persistence_id: String,
    engine: Arc<dyn DataTreeEngine>,
    config: LedgerConfig,
    transactions: HashMap<TransactionId, Transaction>,
    closed: ClosedTransactions,
    purged: UnsignedRangeSet,
    completions: mpsc::UnboundedSender<Completion>,
}

impl HistoryTracker {
    /// Construct the tracker for `id`, seeded with recovered state.
    ///
    /// `closed` and `purged` are typically non-empty after a leadership
    /// change. `completions` is the sender half of the queue the owning
    /// task drains into [`Self::apply_completion`].
    pub fn new(
        persistence_id: impl Into<String>,
        id: HistoryId,
        engine: Arc<dyn DataTreeEngine>,
        closed: HashMap<u64, TransactionOutcome>,
        purged: UnsignedRangeSet,
        config: LedgerConfig,
        completions: mpsc::UnboundedSender<Completion>,
    ) -> Self {
        Self {
            id,
            persistence_id: persistence_id.into(),
            engine,
            config,
            transactions: HashMap::new(),
            closed: ClosedTransactions::new(closed),
            purged,
            completions,
        }
    }

    /// The history this ledger tracks
    pub fn id(&self) -> HistoryId {
        self.id
    }

    /// The persistence identifier used in log output
    pub fn persistence_id(&self) -> &str {
        &self.persistence_id
    }

    /// Monotonic engine clock; used only for elapsed-time reporting
    pub fn read_time(&self) -> u64 {
        self.engine.ticker().read()
    }

    /// The permanently purged transaction indexes
    pub fn purged(&self) -> &UnsignedRangeSet {
        &self.purged
    }

    /// The transactions closed by the previous owner and not yet purged
    pub fn closed(&self) -> &ClosedTransactions {
        &self.closed
    }

    /// Whether `target` currently has active (open) state
    pub fn is_active(&self, target: &TransactionId) -> bool {
        self.transactions.contains_key(target)
    }

    /// Classify and handle one transaction request.
    ///
    /// `Ok(Some(_))` is an immediate response, `Ok(None)` means the reply
    /// channel will be signalled when the scheduled engine work completes,
    /// and `Err(_)` is a synchronous rejection. `now` is the ticker reading
    /// taken when the request was received.
    pub fn handle_transaction_request(
        &mut self,
        request: &TransactionRequest,
        reply: &Arc<dyn ReplyChannel>,
        now: u64,
    ) -> Result<Option<TransactionSuccess>> {
        let target = request.target();
        let index = target.index();
        let sequence = request.sequence();

        if request.is_purge() {
            if self.purged.contains(index) {
                // Retransmitted purge request: nothing to do.
                tracing::debug!(
                    history = %self.persistence_id,
                    tx = %target,
                    "transaction already purged"
                );
                return Ok(Some(TransactionSuccess::Purged { target, sequence }));
            }

            if self.closed.contains(index) {
                self.schedule_purge(target, sequence, reply, now, true);
                return Ok(None);
            }

            if !self.transactions.contains_key(&target) {
                // The purge completion removes the transaction and records it
                // as purged in one step, so an id tracked nowhere means
                // bookkeeping was lost somewhere; treat it as purged.
                tracing::warn!(
                    history = %self.persistence_id,
                    tx = %target,
                    purged = %self.purged,
                    "purge for transaction not tracked anywhere"
                );
                self.purged.insert(index);
                return Ok(Some(TransactionSuccess::Purged { target, sequence }));
            }

            self.schedule_purge(target, sequence, reply, now, false);
            return Ok(None);
        }

        if self.purged.contains(index) {
            tracing::warn!(
                history = %self.persistence_id,
                tx = %target,
                purged = %self.purged,
                "request for purged transaction"
            );
            return Err(RequestError::DeadTransaction {
                target,
                purged: self.purged.clone(),
            });
        }

        if let Some(outcome) = self.closed.get(index) {
            tracing::debug!(
                history = %self.persistence_id,
                tx = %target,
                %outcome,
                "request refers to a closed transaction"
            );
            return Err(RequestError::ClosedTransaction { target, outcome });
        }

        let cx = TransactionContext {
            engine: self.engine.as_ref(),
            persistence_id: &self.persistence_id,
        };

        if let Some(tx) = self.transactions.get_mut(&target) {
            if let Some(replayed) = tx.replay_sequence(sequence)? {
                tracing::debug!(
                    history = %self.persistence_id,
                    tx = %target,
                    sequence,
                    "replaying cached response"
                );
                return Ok(Some(replayed));
            }
            return tx.handle_request(request, &cx).map(Some);
        }

        // First sighting of this transaction: it must start at sequence 0,
        // otherwise we are looking at a retransmission that outlived its
        // original.
        if sequence != 0 {
            tracing::debug!(
                history = %self.persistence_id,
                tx = %target,
                sequence,
                "no transaction state present, unexpected request"
            );
            return Err(RequestError::OutOfOrderStart { target, sequence });
        }

        let mut tx = Transaction::create(request, &cx, self.config.replay_cache_capacity);
        let response = tx.handle_request(request, &cx)?;
        self.transactions.insert(target, tx);
        Ok(Some(response))
    }

    /// Close the history's transaction chain.
    ///
    /// The reply channel is signalled with a history-level success when the
    /// engine finishes.
    pub fn destroy(&mut self, sequence: u64, reply: &Arc<dyn ReplyChannel>, now: u64) {
        tracing::debug!(history = %self.persistence_id, id = %self.id, "closing history");
        let completion = Completion::HistoryClosed {
            sequence,
            reply: Arc::clone(reply),
            started_at: now,
        };
        let queue = self.completions.clone();
        self.engine.close_transaction_chain(
            self.id,
            Box::new(move || {
                let _ = queue.send(completion);
            }),
        );
    }

    /// Purge the history's transaction chain.
    pub fn purge_history(&mut self, sequence: u64, reply: &Arc<dyn ReplyChannel>, now: u64) {
        tracing::debug!(history = %self.persistence_id, id = %self.id, "purging history");
        let completion = Completion::HistoryPurged {
            sequence,
            reply: Arc::clone(reply),
            started_at: now,
        };
        let queue = self.completions.clone();
        self.engine.purge_transaction_chain(
            self.id,
            Box::new(move || {
                let _ = queue.send(completion);
            }),
        );
    }

    /// Apply a queue-delivered completion on the owning context.
    ///
    /// Performs the ledger mutations for the finished operation and signals
    /// the reply channel with the elapsed processing time.
    pub fn apply_completion(&mut self, completion: Completion) {
        match completion {
            Completion::InheritedPurged {
                target,
                sequence,
                reply,
                started_at,
            } => {
                self.closed.remove(target.index());
                self.purged.insert(target.index());
                tracing::debug!(
                    history = %self.persistence_id,
                    tx = %target,
                    "finished purging inherited transaction"
                );
                self.send_success(
                    &reply,
                    Response::Transaction(TransactionSuccess::Purged { target, sequence }),
                    started_at,
                );
            }
            Completion::TransactionPurged {
                target,
                sequence,
                reply,
                started_at,
            } => {
                self.purged.insert(target.index());
                self.transactions.remove(&target);
                tracing::debug!(
                    history = %self.persistence_id,
                    tx = %target,
                    "finished purging transaction"
                );
                self.send_success(
                    &reply,
                    Response::Transaction(TransactionSuccess::Purged { target, sequence }),
                    started_at,
                );
            }
            Completion::HistoryClosed {
                sequence,
                reply,
                started_at,
            } => {
                tracing::debug!(history = %self.persistence_id, id = %self.id, "closed history");
                self.send_success(
                    &reply,
                    Response::History(LocalHistorySuccess {
                        history: self.id,
                        sequence,
                    }),
                    started_at,
                );
            }
            Completion::HistoryPurged {
                sequence,
                reply,
                started_at,
            } => {
                tracing::debug!(history = %self.persistence_id, id = %self.id, "purged history");
                self.send_success(
                    &reply,
                    Response::History(LocalHistorySuccess {
                        history: self.id,
                        sequence,
                    }),
                    started_at,
                );
            }
        }
    }

    fn schedule_purge(
        &mut self,
        target: TransactionId,
        sequence: u64,
        reply: &Arc<dyn ReplyChannel>,
        now: u64,
        inherited: bool,
    ) {
        let completion = if inherited {
            Completion::InheritedPurged {
                target,
                sequence,
                reply: Arc::clone(reply),
                started_at: now,
            }
        } else {
            Completion::TransactionPurged {
                target,
                sequence,
                reply: Arc::clone(reply),
                started_at: now,
            }
        };
        let queue = self.completions.clone();
        self.engine.purge_transaction(
            target,
            Box::new(move || {
                // The receiver only goes away when the history is torn down;
                // then the completion is a no-op.
                let _ = queue.send(completion);
            }),
        );
    }

    fn send_success(&self, reply: &Arc<dyn ReplyChannel>, response: Response, started_at: u64) {
        let elapsed = Duration::from_nanos(self.read_time().saturating_sub(started_at));
        reply.send_success(response, elapsed);
    }
}
