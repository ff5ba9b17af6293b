//! Reply delivery back to the original caller
//!
//! The transport hands the ledger a reply channel alongside every request.
//! Successes may be delivered synchronously by the worker or later from a
//! completion task; rejections are always decided synchronously and only the
//! worker driver routes them.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use strata_core::{RequestError, Response};
use tokio::sync::oneshot;

/// Delivery seam for request outcomes.
///
/// `send_success` is invoked at most once per request. `send_failure` is
/// only ever invoked by the worker driver, since rejections never travel
/// through completion tasks.
pub trait ReplyChannel: Send + Sync {
    /// Deliver a success and the elapsed processing time
    fn send_success(&self, response: Response, elapsed: Duration);

    /// Deliver a synchronous rejection
    fn send_failure(&self, error: RequestError);
}

/// Outcome delivered through a [`OneshotReply`].
pub type ReplyResult = Result<(Response, Duration), RequestError>;

/// Reply channel backed by a Tokio oneshot sender.
///
/// The first delivery consumes the sender; any further delivery is a no-op,
/// which is how the at-most-once contract is kept even against a buggy
/// collaborator.
pub struct OneshotReply {
    tx: Mutex<Option<oneshot::Sender<ReplyResult>>>,
}

impl OneshotReply {
    /// Create a reply channel and the receiver the caller awaits
    pub fn channel() -> (Arc<Self>, oneshot::Receiver<ReplyResult>) {
        let (tx, rx) = oneshot::channel();
        (
            Arc::new(Self {
                tx: Mutex::new(Some(tx)),
            }),
            rx,
        )
    }

    fn deliver(&self, result: ReplyResult) {
        if let Some(tx) = self.tx.lock().take() {
            // A dropped receiver means the caller went away; nothing to do.
            let _ = tx.send(result);
        }
    }
}

impl ReplyChannel for OneshotReply {
    fn send_success(&self, response: Response, elapsed: Duration) {
        self.deliver(Ok((response, elapsed)));
    }

    fn send_failure(&self, error: RequestError) {
        self.deliver(Err(error));
    }
}
