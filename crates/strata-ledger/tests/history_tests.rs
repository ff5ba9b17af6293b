//! End-to-end tests for the history tracker and its worker
//!
//! These drive the tracker through the recording engine, firing engine
//! completions by hand so asynchronous interleavings are deterministic.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;

use strata_core::{
    ClientId, HistoryId, RequestError, Response, TransactionId, TransactionOutcome,
    TransactionRequest, TransactionSuccess, TreePath, UnsignedRangeSet, Value, WriteOp,
};
use strata_ledger::{
    DataTreeEngine, HistoryCommand, HistoryTracker, HistoryWorker, LedgerConfig, OneshotReply,
    ReplyChannel,
};
use strata_testkit::{init_tracing, EngineCall, RecordingEngine, RecordingReply, TestHistory};

fn read_req(target: TransactionId, sequence: u64) -> TransactionRequest {
    TransactionRequest::Read {
        target,
        sequence,
        path: TreePath::parse("/config"),
        snapshot_only: false,
    }
}

fn snapshot_read_req(target: TransactionId, sequence: u64) -> TransactionRequest {
    TransactionRequest::Read {
        target,
        sequence,
        path: TreePath::parse("/config"),
        snapshot_only: true,
    }
}

fn modify_req(target: TransactionId, sequence: u64) -> TransactionRequest {
    TransactionRequest::Modify {
        target,
        sequence,
        ops: vec![WriteOp::Put {
            path: TreePath::parse("/config"),
            value: Value::from("staged"),
        }],
    }
}

fn purge_req(target: TransactionId, sequence: u64) -> TransactionRequest {
    TransactionRequest::Purge { target, sequence }
}

fn reply() -> (Arc<RecordingReply>, Arc<dyn ReplyChannel>) {
    let recording = RecordingReply::new();
    let channel: Arc<dyn ReplyChannel> = Arc::clone(&recording) as Arc<dyn ReplyChannel>;
    (recording, channel)
}

#[test]
fn test_purge_is_idempotent_after_completion() {
    init_tracing();
    let mut history = TestHistory::new();
    let target = history.txn(1);
    let (_, channel) = reply();

    // Create the transaction, then purge it.
    history
        .tracker
        .handle_transaction_request(&read_req(target, 0), &channel, 0)
        .unwrap();
    let (recording, channel) = reply();
    let scheduled = history
        .tracker
        .handle_transaction_request(&purge_req(target, 1), &channel, 0)
        .unwrap();
    assert!(scheduled.is_none());
    assert_eq!(history.engine.purge_count(target), 1);

    history.complete_next();
    assert_eq!(recording.successes().len(), 1);
    assert!(history.tracker.purged().contains(1));
    assert!(!history.tracker.is_active(&target));

    // Retransmitted purge: answered immediately, engine untouched.
    let (_, channel) = reply();
    let response = history
        .tracker
        .handle_transaction_request(&purge_req(target, 1), &channel, 0)
        .unwrap();
    assert_eq!(
        response,
        Some(TransactionSuccess::Purged {
            target,
            sequence: 1
        })
    );
    assert_eq!(history.engine.purge_count(target), 1);
}

#[test]
fn test_purge_untracked_transaction_self_heals() {
    init_tracing();
    let mut history = TestHistory::new();
    let target = history.txn(9);
    let (_, channel) = reply();

    let response = history
        .tracker
        .handle_transaction_request(&purge_req(target, 0), &channel, 0)
        .unwrap();
    assert_eq!(
        response,
        Some(TransactionSuccess::Purged {
            target,
            sequence: 0
        })
    );
    // Healed synchronously: no engine purge was scheduled.
    assert_eq!(history.engine.purge_count(target), 0);
    assert!(history.tracker.purged().contains(9));
}

#[test]
fn test_dead_transaction_rejection_carries_snapshot() {
    init_tracing();
    let mut history = TestHistory::new();
    let target = history.txn(4);
    let (_, channel) = reply();

    history
        .tracker
        .handle_transaction_request(&read_req(target, 0), &channel, 0)
        .unwrap();
    history
        .tracker
        .handle_transaction_request(&purge_req(target, 1), &channel, 0)
        .unwrap();
    history.complete_next();

    let error = history
        .tracker
        .handle_transaction_request(&read_req(target, 2), &channel, 0)
        .unwrap_err();
    assert_matches!(
        error,
        RequestError::DeadTransaction { purged, .. } if purged.contains(4)
    );
}

#[test]
fn test_closed_transaction_rejection_carries_outcome() {
    init_tracing();
    let mut history = TestHistory::with_recovered(
        HashMap::from([(7, TransactionOutcome::Aborted)]),
        UnsignedRangeSet::new(),
    );
    let target = history.txn(7);
    let (_, channel) = reply();

    let error = history
        .tracker
        .handle_transaction_request(&read_req(target, 0), &channel, 0)
        .unwrap_err();
    assert_eq!(
        error,
        RequestError::ClosedTransaction {
            target,
            outcome: TransactionOutcome::Aborted,
        }
    );
}

#[test]
fn test_inherited_transaction_scenario() {
    // Tracker inherits {T7: aborted}; requests fail closed, purge drains the
    // ledger, and the second purge never reaches the engine.
    init_tracing();
    let mut history = TestHistory::with_recovered(
        HashMap::from([(7, TransactionOutcome::Aborted)]),
        UnsignedRangeSet::new(),
    );
    let target = history.txn(7);
    let (_, channel) = reply();

    let error = history
        .tracker
        .handle_transaction_request(&read_req(target, 0), &channel, 0)
        .unwrap_err();
    assert_matches!(error, RequestError::ClosedTransaction { .. });

    let (recording, channel) = reply();
    let scheduled = history
        .tracker
        .handle_transaction_request(&purge_req(target, 0), &channel, 0)
        .unwrap();
    assert!(scheduled.is_none());

    history.complete_next();
    assert!(history.tracker.closed().is_empty());
    assert!(history.tracker.purged().contains(7));
    assert_eq!(
        recording.successes()[0].0,
        Response::Transaction(TransactionSuccess::Purged {
            target,
            sequence: 0
        })
    );

    let (_, channel) = reply();
    let response = history
        .tracker
        .handle_transaction_request(&purge_req(target, 0), &channel, 0)
        .unwrap();
    assert!(response.is_some());
    assert_eq!(history.engine.purge_count(target), 1);
}

#[test]
fn test_closed_ledger_shrinks_one_purge_at_a_time() {
    init_tracing();
    let mut history = TestHistory::with_recovered(
        HashMap::from([
            (1, TransactionOutcome::Committed),
            (2, TransactionOutcome::Aborted),
        ]),
        UnsignedRangeSet::new(),
    );
    let (_, channel) = reply();

    history
        .tracker
        .handle_transaction_request(&purge_req(history.txn(1), 0), &channel, 0)
        .unwrap();
    history.complete_next();
    assert_eq!(history.tracker.closed().len(), 1);
    assert_eq!(
        history.tracker.closed().get(2),
        Some(TransactionOutcome::Aborted)
    );

    history
        .tracker
        .handle_transaction_request(&purge_req(history.txn(2), 0), &channel, 0)
        .unwrap();
    history.complete_next();
    assert!(history.tracker.closed().is_empty());
    assert!(history.tracker.purged().contains(1));
    assert!(history.tracker.purged().contains(2));
}

#[test]
fn test_unsequenced_start_rejected() {
    init_tracing();
    let mut history = TestHistory::new();
    let target = history.txn(3);
    let (_, channel) = reply();

    let error = history
        .tracker
        .handle_transaction_request(&read_req(target, 5), &channel, 0)
        .unwrap_err();
    assert_eq!(
        error,
        RequestError::OutOfOrderStart {
            target,
            sequence: 5
        }
    );

    // The same request at sequence 0 creates the transaction.
    let response = history
        .tracker
        .handle_transaction_request(&read_req(target, 0), &channel, 0)
        .unwrap();
    assert_matches!(response, Some(TransactionSuccess::Read { .. }));
    assert!(history.tracker.is_active(&target));
}

#[test]
fn test_sequence_gap_rejected() {
    init_tracing();
    let mut history = TestHistory::new();
    let target = history.txn(3);
    let (_, channel) = reply();

    history
        .tracker
        .handle_transaction_request(&read_req(target, 0), &channel, 0)
        .unwrap();
    let error = history
        .tracker
        .handle_transaction_request(&read_req(target, 2), &channel, 0)
        .unwrap_err();
    assert_eq!(
        error,
        RequestError::OutOfOrderRequest {
            target,
            sequence: 2,
            expected: 1
        }
    );
}

#[test]
fn test_retransmission_replays_without_reexecution() {
    init_tracing();
    let mut history = TestHistory::new();
    let target = history.txn(6);
    let (_, channel) = reply();

    history
        .tracker
        .handle_transaction_request(&read_req(target, 0), &channel, 0)
        .unwrap();
    history
        .tracker
        .handle_transaction_request(&modify_req(target, 1), &channel, 0)
        .unwrap();
    let readied = history
        .tracker
        .handle_transaction_request(&TransactionRequest::Ready { target, sequence: 2 }, &channel, 0)
        .unwrap();
    assert_eq!(
        readied,
        Some(TransactionSuccess::Readied {
            target,
            sequence: 2
        })
    );
    let cohorts = history
        .engine
        .calls()
        .into_iter()
        .filter(|call| matches!(call, EngineCall::CreateCohort(_)))
        .count();
    assert_eq!(cohorts, 1);

    // Retransmitted ready: answered from the replay cache, no second cohort.
    let replayed = history
        .tracker
        .handle_transaction_request(&TransactionRequest::Ready { target, sequence: 2 }, &channel, 0)
        .unwrap();
    assert_eq!(replayed, readied);
    let cohorts = history
        .engine
        .calls()
        .into_iter()
        .filter(|call| matches!(call, EngineCall::CreateCohort(_)))
        .count();
    assert_eq!(cohorts, 1);
}

#[test]
fn test_open_transaction_observes_own_writes() {
    init_tracing();
    let mut history = TestHistory::new();
    let path = TreePath::parse("/config");
    history.engine.put(path.clone(), Value::from("base"));
    let target = history.txn(2);
    let (_, channel) = reply();

    let before = history
        .tracker
        .handle_transaction_request(&read_req(target, 0), &channel, 0)
        .unwrap();
    assert_eq!(
        before,
        Some(TransactionSuccess::Read {
            target,
            sequence: 0,
            value: Some(Value::from("base"))
        })
    );

    history
        .tracker
        .handle_transaction_request(&modify_req(target, 1), &channel, 0)
        .unwrap();
    let after = history
        .tracker
        .handle_transaction_request(&read_req(target, 2), &channel, 0)
        .unwrap();
    assert_eq!(
        after,
        Some(TransactionSuccess::Read {
            target,
            sequence: 2,
            value: Some(Value::from("staged"))
        })
    );
}

#[test]
fn test_readied_transaction_rejects_further_writes() {
    init_tracing();
    let mut history = TestHistory::new();
    let target = history.txn(2);
    let (_, channel) = reply();

    history
        .tracker
        .handle_transaction_request(&read_req(target, 0), &channel, 0)
        .unwrap();
    history
        .tracker
        .handle_transaction_request(&TransactionRequest::Ready { target, sequence: 1 }, &channel, 0)
        .unwrap();

    let error = history
        .tracker
        .handle_transaction_request(&modify_req(target, 2), &channel, 0)
        .unwrap_err();
    assert_matches!(error, RequestError::IllegalOperation { .. });
}

#[test]
fn test_abort_discards_transaction() {
    init_tracing();
    let mut history = TestHistory::new();
    let target = history.txn(2);
    let (_, channel) = reply();

    history
        .tracker
        .handle_transaction_request(&modify_req(target, 0), &channel, 0)
        .unwrap();
    let aborted = history
        .tracker
        .handle_transaction_request(&TransactionRequest::Abort { target, sequence: 1 }, &channel, 0)
        .unwrap();
    assert_eq!(
        aborted,
        Some(TransactionSuccess::Aborted {
            target,
            sequence: 1
        })
    );

    let error = history
        .tracker
        .handle_transaction_request(&modify_req(target, 2), &channel, 0)
        .unwrap_err();
    assert_matches!(error, RequestError::IllegalOperation { .. });
}

#[test]
fn test_snapshot_transaction_is_read_only() {
    init_tracing();
    let mut history = TestHistory::new();
    let path = TreePath::parse("/config");
    history.engine.put(path.clone(), Value::from("fixed"));
    let target = history.txn(5);
    let (_, channel) = reply();

    let read = history
        .tracker
        .handle_transaction_request(&snapshot_read_req(target, 0), &channel, 0)
        .unwrap();
    assert_eq!(
        read,
        Some(TransactionSuccess::Read {
            target,
            sequence: 0,
            value: Some(Value::from("fixed"))
        })
    );

    // The view is pinned even if the tree moves on.
    history.engine.put(path, Value::from("changed"));
    let pinned = history
        .tracker
        .handle_transaction_request(&snapshot_read_req(target, 1), &channel, 0)
        .unwrap();
    assert_eq!(
        pinned,
        Some(TransactionSuccess::Read {
            target,
            sequence: 1,
            value: Some(Value::from("fixed"))
        })
    );

    let error = history
        .tracker
        .handle_transaction_request(&modify_req(target, 2), &channel, 0)
        .unwrap_err();
    assert_matches!(error, RequestError::IllegalOperation { .. });
}

#[test]
fn test_commit_local_creates_ready_transaction() {
    init_tracing();
    let mut history = TestHistory::new();
    let target = history.txn(8);
    let (_, channel) = reply();

    let request = TransactionRequest::CommitLocal {
        target,
        sequence: 0,
        modification: strata_core::SealedModification::new(vec![WriteOp::Put {
            path: TreePath::parse("/config"),
            value: Value::from(1),
        }]),
    };
    let response = history
        .tracker
        .handle_transaction_request(&request, &channel, 0)
        .unwrap();
    assert_eq!(
        response,
        Some(TransactionSuccess::Readied {
            target,
            sequence: 0
        })
    );
    assert!(history
        .engine
        .calls()
        .contains(&EngineCall::CreateCohort(target)));

    // Ready transactions accept no further mutation.
    let error = history
        .tracker
        .handle_transaction_request(&modify_req(target, 1), &channel, 0)
        .unwrap_err();
    assert_matches!(error, RequestError::IllegalOperation { .. });
}

#[test]
fn test_purge_success_reports_elapsed_time() {
    init_tracing();
    let mut history = TestHistory::new();
    let target = history.txn(1);
    let (_, channel) = reply();

    history
        .tracker
        .handle_transaction_request(&read_req(target, 0), &channel, 0)
        .unwrap();

    history.engine.manual_ticker().set(100);
    let now = history.tracker.read_time();
    let (recording, channel) = reply();
    history
        .tracker
        .handle_transaction_request(&purge_req(target, 1), &channel, now)
        .unwrap();

    history.engine.manual_ticker().advance(40);
    history.complete_next();

    let successes = recording.successes();
    assert_eq!(successes.len(), 1);
    assert_eq!(successes[0].1, Duration::from_nanos(40));
}

#[test]
fn test_destroy_and_purge_history_signal_success() {
    init_tracing();
    let mut history = TestHistory::new();
    let id = history.history_id();

    let (closed, channel) = reply();
    history.tracker.destroy(11, &channel, 0);
    assert!(history
        .engine
        .calls()
        .contains(&EngineCall::CloseChain(id)));
    history.complete_next();
    assert_matches!(
        &closed.successes()[0].0,
        Response::History(success) if success.sequence == 11
    );

    let (purged, channel) = reply();
    history.tracker.purge_history(12, &channel, 0);
    assert!(history
        .engine
        .calls()
        .contains(&EngineCall::PurgeChain(id)));
    history.complete_next();
    assert_matches!(
        &purged.successes()[0].0,
        Response::History(success) if success.sequence == 12
    );
}

#[tokio::test]
async fn test_worker_round_trip() {
    init_tracing();
    let engine = Arc::new(RecordingEngine::new());
    engine.set_auto_complete(true);
    let engine_seam: Arc<dyn DataTreeEngine> = engine.clone();
    let history = HistoryId::new(ClientId::new(), 0);
    let target = history.transaction(1);

    let (worker, handle) = HistoryWorker::new(|completions| {
        HistoryTracker::new(
            history.to_string(),
            history,
            engine_seam,
            HashMap::new(),
            UnsignedRangeSet::new(),
            LedgerConfig::default(),
            completions,
        )
    });
    let join = worker.spawn();

    // Immediate response path.
    let (channel, rx) = OneshotReply::channel();
    assert!(handle.submit(HistoryCommand::Transaction {
        request: read_req(target, 0),
        reply: channel,
    }));
    let (response, _) = rx.await.unwrap().unwrap();
    assert_matches!(
        response,
        Response::Transaction(TransactionSuccess::Read { .. })
    );

    // Asynchronous path: the purge completion re-enters through the queue.
    let (channel, rx) = OneshotReply::channel();
    handle.submit(HistoryCommand::Transaction {
        request: purge_req(target, 1),
        reply: channel,
    });
    let (response, _) = rx.await.unwrap().unwrap();
    assert_eq!(
        response,
        Response::Transaction(TransactionSuccess::Purged {
            target,
            sequence: 1
        })
    );

    // Rejection path: routed back as a failure.
    let (channel, rx) = OneshotReply::channel();
    handle.submit(HistoryCommand::Transaction {
        request: read_req(target, 2),
        reply: channel,
    });
    let error = rx.await.unwrap().unwrap_err();
    assert_matches!(error, RequestError::DeadTransaction { .. });

    // History-level command.
    let (channel, rx) = OneshotReply::channel();
    handle.submit(HistoryCommand::Destroy {
        sequence: 3,
        reply: channel,
    });
    let (response, _) = rx.await.unwrap().unwrap();
    assert_matches!(response, Response::History(_));

    drop(handle);
    join.await.unwrap();
}
