//! Shared concepts for the Strata frontend transaction ledger
//!
//! This crate is the single source of truth for the types the ledger, the
//! transport, and the data tree engine all agree on: identifiers, the
//! transaction outcome enum, the unsigned range set backing the purge ledger,
//! the tree vocabulary (paths, values, modifications), request and response
//! messages, and the request-rejection error taxonomy.
//!
//! Behavior lives in `strata-ledger`; this crate is data only.

pub mod error;
pub mod identifiers;
pub mod messages;
pub mod outcome;
pub mod ranges;
pub mod tree;

pub use error::{RequestError, Result};
pub use identifiers::{ClientId, HistoryId, TransactionId};
pub use messages::{LocalHistorySuccess, Response, TransactionRequest, TransactionSuccess};
pub use outcome::TransactionOutcome;
pub use ranges::UnsignedRangeSet;
pub use tree::{SealedModification, TreePath, Value, WriteOp};
