//! Recording reply channel

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use strata_core::{RequestError, Response};
use strata_ledger::ReplyChannel;

/// Reply channel that records everything it is asked to deliver.
#[derive(Default)]
pub struct RecordingReply {
    successes: Mutex<Vec<(Response, Duration)>>,
    failures: Mutex<Vec<RequestError>>,
}

impl RecordingReply {
    /// Create a shared recording channel
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Successes delivered so far
    pub fn successes(&self) -> Vec<(Response, Duration)> {
        self.successes.lock().clone()
    }

    /// Failures delivered so far
    pub fn failures(&self) -> Vec<RequestError> {
        self.failures.lock().clone()
    }

    /// Total deliveries of either kind
    pub fn delivery_count(&self) -> usize {
        self.successes.lock().len() + self.failures.lock().len()
    }
}

impl ReplyChannel for RecordingReply {
    fn send_success(&self, response: Response, elapsed: Duration) {
        self.successes.lock().push((response, elapsed));
    }

    fn send_failure(&self, error: RequestError) {
        self.failures.lock().push(error);
    }
}
