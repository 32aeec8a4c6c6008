// Unit tests for the enumerator registry

use crate::RpcError;
use crate::rpc::enumerator::{EnumeratorRegistry, StreamEnumerator};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::stream;
use serde_json::json;

/// **VALUE**: Verifies a sequence is served one value at a time and then finishes.
///
/// **WHY THIS MATTERS**: The document's async iterator relies on `finished: true`
/// arriving exactly once after the last value.
///
/// **BUG THIS CATCHES**: Would catch batching values, skipping the last one, or keeping
/// the entry after exhaustion.
#[tokio::test]
async fn given_three_values_when_next_repeatedly_then_values_then_finished() {
    // GIVEN: A registered three-item sequence
    let registry = EnumeratorRegistry::new();
    let enumerator = StreamEnumerator::from_values([1, 2, 3]).expect("serializable");
    let token = registry.register(Box::new(enumerator));

    // WHEN: Pulling four times
    let mut replies = Vec::new();
    for _ in 0..4 {
        replies.push(registry.next(&token).await.expect("next succeeds"));
    }

    // THEN: Three values then finished, and the entry is gone
    assert_eq!(replies[0], json!({ "values": [1], "finished": false }));
    assert_eq!(replies[2], json!({ "values": [3], "finished": false }));
    assert_eq!(replies[3], json!({ "values": [], "finished": true }));
    assert!(!registry.contains(&token));
}

/// **VALUE**: Verifies `next` on an unknown token reports finished without creating state.
#[tokio::test]
async fn given_unknown_token_when_next_then_finished_and_absent() {
    let registry = EnumeratorRegistry::new();

    let reply = registry.next("nope").await.expect("next succeeds");

    assert_eq!(reply, json!({ "values": [], "finished": true }));
    assert!(registry.is_empty());
}

/// **VALUE**: Verifies abort disposes exactly once, even when repeated.
///
/// **WHY THIS MATTERS**: Disposal releases resources held by the producer; running it
/// twice can double-free whatever the hook owns.
#[tokio::test]
async fn given_open_sequence_when_aborted_twice_then_disposed_once() {
    let disposed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&disposed);
    let registry = EnumeratorRegistry::new();
    let enumerator = StreamEnumerator::from_values(["a", "b"])
        .expect("serializable")
        .on_dispose(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    let token = registry.register(Box::new(enumerator));

    registry.abort(&token).await;
    registry.abort(&token).await;

    assert_eq!(disposed.load(Ordering::SeqCst), 1);
    assert!(!registry.contains(&token));
}

/// **VALUE**: Verifies a failing dispose hook is swallowed.
///
/// **BUG THIS CATCHES**: Would catch dispose errors escaping into the reply of the final
/// `next` call.
#[tokio::test]
async fn given_failing_dispose_when_sequence_finishes_then_finished_reply() {
    let registry = EnumeratorRegistry::new();
    let enumerator = StreamEnumerator::from_values(Vec::<i32>::new())
        .expect("serializable")
        .on_dispose(|| Err(RpcError::internal("dispose failed")));
    let token = registry.register(Box::new(enumerator));

    let reply = registry.next(&token).await.expect("dispose errors are not surfaced");

    assert_eq!(reply["finished"], json!(true));
}

/// **VALUE**: Verifies a producer error surfaces and retires the token.
#[tokio::test]
async fn given_failing_producer_when_next_then_error_and_entry_removed() {
    let registry = EnumeratorRegistry::new();
    let enumerator = StreamEnumerator::new(stream::iter(vec![
        Ok(json!(1)),
        Err(RpcError::internal("producer broke")),
    ]));
    let token = registry.register(Box::new(enumerator));

    let first = registry.next(&token).await.expect("first value");
    let second = registry.next(&token).await.expect_err("producer error");

    assert_eq!(first["values"], json!([1]));
    assert_eq!(second.message(), "producer broke");
    assert!(!registry.contains(&token));
}

/// **VALUE**: Verifies abort_all clears every open sequence.
#[tokio::test]
async fn given_many_sequences_when_abort_all_then_empty() {
    let registry = EnumeratorRegistry::new();
    for _ in 0..3 {
        let enumerator = StreamEnumerator::from_values([0]).expect("serializable");
        registry.register(Box::new(enumerator));
    }

    registry.abort_all().await;

    assert_eq!(registry.len(), 0);
}
