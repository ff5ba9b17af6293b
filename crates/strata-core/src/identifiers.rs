//! Identifier types for clients, histories, and transactions
//!
//! A frontend client owns a set of logical histories; each history owns an
//! ordered sequence of transactions. Transaction indexes are interpreted as
//! unsigned 64-bit integers so the purge ledger can track them as ranges.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies the frontend client instance that owns a set of histories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(pub Uuid);

impl ClientId {
    /// Create a new random client ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

impl From<Uuid> for ClientId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<ClientId> for Uuid {
    fn from(client_id: ClientId) -> Self {
        client_id.0
    }
}

/// Identifies one logical transaction history owned by a client.
///
/// A history is an ordered sequence of transactions sharing ordering and
/// visibility guarantees, standalone or chained. The identifier is immutable
/// for the lifetime of the ledger tracking it and doubles as the ledger's own
/// external identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HistoryId {
    client: ClientId,
    history: u64,
}

impl HistoryId {
    /// Create a history identifier for `client`
    pub fn new(client: ClientId, history: u64) -> Self {
        Self { client, history }
    }

    /// The owning client
    pub fn client(&self) -> ClientId {
        self.client
    }

    /// The history number within the client
    pub fn history(&self) -> u64 {
        self.history
    }

    /// Identifier of transaction `index` within this history
    pub fn transaction(&self, index: u64) -> TransactionId {
        TransactionId::new(*self, index)
    }
}

impl fmt::Display for HistoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "history-{}-{}", self.client.0, self.history)
    }
}

/// Globally unique identifier of one transaction.
///
/// Belongs to exactly one history; `index` is the 64-bit number the purge
/// ledger tracks as an unsigned range-set member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId {
    history: HistoryId,
    index: u64,
}

impl TransactionId {
    /// Create a transaction identifier within `history`
    pub fn new(history: HistoryId, index: u64) -> Self {
        Self { history, index }
    }

    /// The owning history
    pub fn history(&self) -> HistoryId {
        self.history
    }

    /// The transaction index within the history
    pub fn index(&self) -> u64 {
        self.index
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-txn-{}", self.history, self.index)
    }
}
