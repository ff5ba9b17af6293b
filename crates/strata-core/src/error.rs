//! Request-rejection taxonomy surfaced to callers
//!
//! Every variant is decidable without consulting the data tree engine and is
//! returned synchronously to the immediate caller; rejections never travel
//! through the asynchronous reply channel. None is process-fatal: each
//! carries enough state for the caller to branch programmatically (retry,
//! give up, or treat the transaction as settled).

use crate::identifiers::TransactionId;
use crate::outcome::TransactionOutcome;
use crate::ranges::UnsignedRangeSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons the ledger rejects a transaction request.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum RequestError {
    /// The target transaction has been permanently purged.
    ///
    /// Carries the full purge-range snapshot so the caller can distinguish
    /// "never existed" from "gone".
    #[error("transaction {target} is dead, purged transactions: {purged}")]
    DeadTransaction {
        /// The rejected target
        target: TransactionId,
        /// Snapshot of the purge ledger at rejection time
        purged: UnsignedRangeSet,
    },

    /// The target transaction's outcome was decided by a previous owner of
    /// the history and has not yet been purged.
    #[error("transaction {target} already closed as {outcome}")]
    ClosedTransaction {
        /// The rejected target
        target: TransactionId,
        /// The recorded outcome
        outcome: TransactionOutcome,
    },

    /// The first observed request for a transaction did not carry sequence 0.
    ///
    /// Signals a replay or retransmission arriving before (or without) its
    /// originating start.
    #[error("transaction {target} has no state, refusing to start at sequence {sequence}")]
    OutOfOrderStart {
        /// The rejected target
        target: TransactionId,
        /// The sequence the request carried
        sequence: u64,
    },

    /// Sequence gap, or a replay older than the response cache retains.
    #[error("request sequence {sequence} for {target} out of order, expected {expected}")]
    OutOfOrderRequest {
        /// The rejected target
        target: TransactionId,
        /// The sequence the request carried
        sequence: u64,
        /// The next sequence the transaction will accept
        expected: u64,
    },

    /// The operation is not legal for the transaction's current state.
    #[error("{operation} not permitted on {target}")]
    IllegalOperation {
        /// The rejected target
        target: TransactionId,
        /// Short name of the refused operation
        operation: String,
    },
}

/// Result type for ledger request handling
pub type Result<T> = std::result::Result<T, RequestError>;
