//! Frontend transaction ledger for one logical history
//!
//! This crate sits between an unreliable, at-least-once transport and a
//! local data tree engine. It gives every inbound transaction request
//! exactly-once effect despite retransmission, tracks which transactions are
//! permanently gone (purged) versus merely decided (closed), enforces
//! per-transaction request ordering, and coordinates asynchronous completion
//! signaling back to the caller.
//!
//! # Architecture
//!
//! - [`HistoryTracker`]: the dispatcher; owns the active-transaction map,
//!   the closed-transaction ledger, and the purge ledger, and classifies
//!   each request against all three
//! - [`transaction::Transaction`]: per-transaction state (open read/write,
//!   read-only snapshot, or pre-readied) with a bounded replay cache
//! - [`DataTreeEngine`]: the seam to the engine that performs actual
//!   mutation, commit, and purge work
//! - [`worker::HistoryWorker`]: the single Tokio task serializing commands
//!   and engine completions for one history
//!
//! No locking is performed: a history's state is only ever touched from its
//! own worker task, and engine completions re-enter through that task's
//! queue.

pub mod closed;
pub mod config;
pub mod engine;
pub mod history;
pub mod reply;
pub mod transaction;
pub mod worker;

pub use closed::ClosedTransactions;
pub use config::LedgerConfig;
pub use engine::{
    CohortHandle, CompletionCallback, DataTreeEngine, DataTreeModification, DataTreeSnapshot,
    MonotonicTicker, Ticker,
};
pub use history::{Completion, HistoryTracker};
pub use reply::{OneshotReply, ReplyChannel, ReplyResult};
pub use worker::{HistoryCommand, HistoryHandle, HistoryWorker};
