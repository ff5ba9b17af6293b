//! Per-history worker task
//!
//! One Tokio task owns a history's tracker and both of its queues. Commands
//! from the transport and completions from the engine are serialized here;
//! that single-task ownership is the synchronization primitive the whole
//! ledger relies on, and no other code ever touches tracker state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use strata_core::{Response, TransactionRequest};

use crate::history::{Completion, HistoryTracker};
use crate::reply::ReplyChannel;

/// Commands accepted by a history worker.
pub enum HistoryCommand {
    /// Dispatch one transaction request
    Transaction {
        /// The request to classify and handle
        request: TransactionRequest,
        /// Channel the outcome is delivered on
        reply: Arc<dyn ReplyChannel>,
    },
    /// Close the history's transaction chain
    Destroy {
        /// History-level request sequence
        sequence: u64,
        /// Channel the outcome is delivered on
        reply: Arc<dyn ReplyChannel>,
    },
    /// Purge the history's transaction chain
    PurgeHistory {
        /// History-level request sequence
        sequence: u64,
        /// Channel the outcome is delivered on
        reply: Arc<dyn ReplyChannel>,
    },
}

/// Clonable handle for submitting commands to a history worker.
#[derive(Clone)]
pub struct HistoryHandle {
    commands: mpsc::UnboundedSender<HistoryCommand>,
}

impl HistoryHandle {
    /// Submit a command; `false` if the worker has shut down
    pub fn submit(&self, command: HistoryCommand) -> bool {
        self.commands.send(command).is_ok()
    }
}

/// The task driving one history's tracker.
pub struct HistoryWorker {
    tracker: HistoryTracker,
    commands: mpsc::UnboundedReceiver<HistoryCommand>,
    completions: mpsc::UnboundedReceiver<Completion>,
}

impl HistoryWorker {
    /// Build a worker and its submission handle.
    ///
    /// `build` receives the completion-queue sender the tracker must be
    /// constructed with, tying engine completions back to this worker.
    pub fn new(
        build: impl FnOnce(mpsc::UnboundedSender<Completion>) -> HistoryTracker,
    ) -> (Self, HistoryHandle) {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let tracker = build(completion_tx);
        (
            Self {
                tracker,
                commands: command_rx,
                completions: completion_rx,
            },
            HistoryHandle {
                commands: command_tx,
            },
        )
    }

    /// Run until every [`HistoryHandle`] is dropped.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                // Completions first: ledger mutations for work issued earlier
                // must land before any new command can observe the id.
                biased;
                Some(completion) = self.completions.recv() => {
                    self.tracker.apply_completion(completion);
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
            }
        }
        tracing::debug!(
            history = %self.tracker.persistence_id(),
            "history worker shutting down"
        );
    }

    /// Spawn the worker onto the current runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Dispatch one command into the tracker on this task.
    fn handle_command(&mut self, command: HistoryCommand) {
        let now = self.tracker.read_time();
        match command {
            HistoryCommand::Transaction { request, reply } => {
                match self.tracker.handle_transaction_request(&request, &reply, now) {
                    Ok(Some(response)) => {
                        let elapsed =
                            Duration::from_nanos(self.tracker.read_time().saturating_sub(now));
                        reply.send_success(Response::Transaction(response), elapsed);
                    }
                    // The completion will signal the reply channel.
                    Ok(None) => {}
                    Err(error) => reply.send_failure(error),
                }
            }
            HistoryCommand::Destroy { sequence, reply } => {
                self.tracker.destroy(sequence, &reply, now);
            }
            HistoryCommand::PurgeHistory { sequence, reply } => {
                self.tracker.purge_history(sequence, &reply, now);
            }
        }
    }
}
