//! Test doubles and strategies for the Strata ledger
//!
//! Everything a ledger test needs: an in-memory data tree engine that
//! records calls and holds completions until the test fires them, a manually
//! advanced clock, a recording reply channel, a wired-up tracker fixture,
//! and proptest strategies for identifier types.

pub mod engine;
pub mod fixtures;
pub mod logging;
pub mod reply;
pub mod strategies;
pub mod time;

pub use engine::{EngineCall, RecordingEngine};
pub use fixtures::TestHistory;
pub use logging::init_tracing;
pub use reply::RecordingReply;
pub use time::ManualTicker;
