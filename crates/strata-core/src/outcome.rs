//! Decided transaction outcomes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a transaction whose fate has been decided.
///
/// Carried by the closed-transaction ledger for entries inherited from a
/// previous owner of the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionOutcome {
    /// The transaction committed
    Committed,
    /// The transaction aborted
    Aborted,
}

impl TransactionOutcome {
    /// Whether the transaction committed
    pub fn is_committed(&self) -> bool {
        matches!(self, TransactionOutcome::Committed)
    }
}

impl fmt::Display for TransactionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionOutcome::Committed => write!(f, "committed"),
            TransactionOutcome::Aborted => write!(f, "aborted"),
        }
    }
}
