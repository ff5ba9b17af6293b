//! Proptest strategies for ledger types
//!
//! Strategies are seed-derived and deterministic so failures reproduce.

use proptest::prelude::*;
use uuid::Uuid;

use strata_core::{ClientId, HistoryId, TransactionId, TransactionOutcome};

// Re-export proptest for convenience
pub use proptest;

/// Strategy for deterministic client ids drawn from a small seed space
pub fn arb_client_id() -> impl Strategy<Value = ClientId> {
    (0u64..10_000).prop_map(|seed| ClientId::from_uuid(Uuid::from_u128(u128::from(seed))))
}

/// Strategy for history ids
pub fn arb_history_id() -> impl Strategy<Value = HistoryId> {
    (arb_client_id(), 0u64..16).prop_map(|(client, history)| HistoryId::new(client, history))
}

/// Strategy for transaction ids with indexes below `max_index`
pub fn arb_transaction_id(max_index: u64) -> impl Strategy<Value = TransactionId> {
    (arb_history_id(), 0..max_index).prop_map(|(history, index)| history.transaction(index))
}

/// Strategy for transaction outcomes
pub fn arb_outcome() -> impl Strategy<Value = TransactionOutcome> {
    prop_oneof![
        Just(TransactionOutcome::Committed),
        Just(TransactionOutcome::Aborted),
    ]
}
