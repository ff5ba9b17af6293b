//! Transaction requests and responses
//!
//! The transport owns the wire encoding; these are the in-process shapes the
//! ledger classifies and answers. Every request targets one transaction and
//! carries the per-transaction sequence number assigned by the frontend;
//! the first request for a transaction must carry sequence 0.

use crate::identifiers::{HistoryId, TransactionId};
use crate::tree::{SealedModification, TreePath, Value, WriteOp};
use serde::{Deserialize, Serialize};

/// A transaction request delivered by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransactionRequest {
    /// Permanently remove all bookkeeping for the target transaction
    Purge {
        /// Target transaction
        target: TransactionId,
        /// Per-transaction request sequence
        sequence: u64,
    },
    /// Read the node at `path`
    Read {
        /// Target transaction
        target: TransactionId,
        /// Per-transaction request sequence
        sequence: u64,
        /// Node to read
        path: TreePath,
        /// Scope the whole transaction to a fixed point-in-time view.
        ///
        /// Only consulted on the transaction's first request, where it
        /// selects the read-only snapshot variant.
        snapshot_only: bool,
    },
    /// Apply a batch of writes to an open transaction's overlay
    Modify {
        /// Target transaction
        target: TransactionId,
        /// Per-transaction request sequence
        sequence: u64,
        /// Writes to stage
        ops: Vec<WriteOp>,
    },
    /// Seal an open transaction and produce its commit cohort
    Ready {
        /// Target transaction
        target: TransactionId,
        /// Per-transaction request sequence
        sequence: u64,
    },
    /// Submit a locally applied modification as an already-ready transaction
    CommitLocal {
        /// Target transaction
        target: TransactionId,
        /// Per-transaction request sequence
        sequence: u64,
        /// The writes the client already applied locally
        modification: SealedModification,
    },
    /// Discard an open transaction's staged writes
    Abort {
        /// Target transaction
        target: TransactionId,
        /// Per-transaction request sequence
        sequence: u64,
    },
}

impl TransactionRequest {
    /// The transaction this request targets
    pub fn target(&self) -> TransactionId {
        match self {
            TransactionRequest::Purge { target, .. }
            | TransactionRequest::Read { target, .. }
            | TransactionRequest::Modify { target, .. }
            | TransactionRequest::Ready { target, .. }
            | TransactionRequest::CommitLocal { target, .. }
            | TransactionRequest::Abort { target, .. } => *target,
        }
    }

    /// The per-transaction request sequence number
    pub fn sequence(&self) -> u64 {
        match self {
            TransactionRequest::Purge { sequence, .. }
            | TransactionRequest::Read { sequence, .. }
            | TransactionRequest::Modify { sequence, .. }
            | TransactionRequest::Ready { sequence, .. }
            | TransactionRequest::CommitLocal { sequence, .. }
            | TransactionRequest::Abort { sequence, .. } => *sequence,
        }
    }

    /// Whether this is a purge request
    pub fn is_purge(&self) -> bool {
        matches!(self, TransactionRequest::Purge { .. })
    }

    /// Short operation name for logging and rejection payloads
    pub fn kind(&self) -> &'static str {
        match self {
            TransactionRequest::Purge { .. } => "purge",
            TransactionRequest::Read { .. } => "read",
            TransactionRequest::Modify { .. } => "modify",
            TransactionRequest::Ready { .. } => "ready",
            TransactionRequest::CommitLocal { .. } => "commit-local",
            TransactionRequest::Abort { .. } => "abort",
        }
    }
}

/// Successful response to a transaction request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransactionSuccess {
    /// The transaction's bookkeeping is permanently gone
    Purged {
        /// Target transaction
        target: TransactionId,
        /// Sequence of the answered request
        sequence: u64,
    },
    /// Result of a read
    Read {
        /// Target transaction
        target: TransactionId,
        /// Sequence of the answered request
        sequence: u64,
        /// The value at the requested path, if any
        value: Option<Value>,
    },
    /// Writes were staged on the transaction's overlay
    Modified {
        /// Target transaction
        target: TransactionId,
        /// Sequence of the answered request
        sequence: u64,
    },
    /// The transaction is sealed and its commit cohort exists
    Readied {
        /// Target transaction
        target: TransactionId,
        /// Sequence of the answered request
        sequence: u64,
    },
    /// The transaction's staged writes were discarded
    Aborted {
        /// Target transaction
        target: TransactionId,
        /// Sequence of the answered request
        sequence: u64,
    },
}

impl TransactionSuccess {
    /// The transaction this response answers for
    pub fn target(&self) -> TransactionId {
        match self {
            TransactionSuccess::Purged { target, .. }
            | TransactionSuccess::Read { target, .. }
            | TransactionSuccess::Modified { target, .. }
            | TransactionSuccess::Readied { target, .. }
            | TransactionSuccess::Aborted { target, .. } => *target,
        }
    }

    /// The sequence number of the answered request
    pub fn sequence(&self) -> u64 {
        match self {
            TransactionSuccess::Purged { sequence, .. }
            | TransactionSuccess::Read { sequence, .. }
            | TransactionSuccess::Modified { sequence, .. }
            | TransactionSuccess::Readied { sequence, .. }
            | TransactionSuccess::Aborted { sequence, .. } => *sequence,
        }
    }
}

/// History-level success: the chain was closed or purged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalHistorySuccess {
    /// The history the operation applied to
    pub history: HistoryId,
    /// Sequence of the answered request
    pub sequence: u64,
}

/// Any success the ledger can deliver through a reply channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    /// Transaction-level success
    Transaction(TransactionSuccess),
    /// History-level success
    History(LocalHistorySuccess),
}
