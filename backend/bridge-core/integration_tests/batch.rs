use crate::helpers::{empty_reply, error_code, recording_engine, success_reply};

use bridge_core::rpc::{HandlerTarget, Reply, handler};

use std::time::Duration;

use serde_json::{Value, json};

fn echo_engine() -> (bridge_core::RpcEngine, std::sync::Arc<crate::helpers::RecordingChannel>) {
    let (engine, channel) = recording_engine();
    engine.handle(
        "Echo.say",
        handler(|call| async move { Ok(Reply::Value(call.params.unwrap_or(Value::Null))) }),
    );
    engine.handle(
        "Echo.slow",
        handler(|call| async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            Ok(Reply::Value(call.params.unwrap_or(Value::Null)))
        }),
    );
    (engine, channel)
}

/// **VALUE**: Verifies a batch of requests produces one array reply, in input order.
///
/// **WHY THIS MATTERS**: The document's batch helper resolves each promise by
/// id, but a single reply frame per batch is what keeps round-trips down.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Items are answered as separate frames
/// - A slow item reorders the replies
#[tokio::test]
async fn given_batch_of_requests_when_processed_then_single_ordered_reply() {
    // GIVEN: A slow item first, fast items after
    let (engine, channel) = echo_engine();
    let batch = json!([
        { "jsonrpc": "2.0", "id": 1, "method": "Echo.slow", "params": "first" },
        { "jsonrpc": "2.0", "id": 2, "method": "Echo.say", "params": "second" },
        { "jsonrpc": "2.0", "id": 3, "method": "Echo.say", "params": "third" }
    ]);

    // WHEN: Processed
    let handled = engine.process_message(&batch.to_string()).await;

    // THEN: One frame, three replies in request order
    assert!(handled);
    let sent = channel.envelopes();
    assert_eq!(sent.len(), 1);
    let replies = sent[0].as_array().expect("batch reply is an array");
    let ids: Vec<i64> = replies.iter().filter_map(|r| r["id"].as_i64()).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(replies[0]["result"], "first");
    assert_eq!(replies[2]["result"], "third");
}

/// **VALUE**: Verifies a batch of only notifications posts nothing.
#[tokio::test]
async fn given_batch_of_notifications_when_processed_then_no_reply() {
    let (engine, channel) = echo_engine();
    let batch = json!([
        { "jsonrpc": "2.0", "method": "Echo.say", "params": 1 },
        { "jsonrpc": "2.0", "method": "Echo.say", "params": 2 }
    ]);

    assert!(engine.process_message(&batch.to_string()).await);
    assert!(channel.messages().is_empty());
}

/// **VALUE**: Verifies invalid items get InvalidRequest and unknown methods MethodNotFound,
/// without affecting valid siblings.
///
/// **BUG THIS CATCHES**: Would catch one bad item failing the whole batch.
#[tokio::test]
async fn given_mixed_batch_when_processed_then_each_item_answered_independently() {
    let (engine, channel) = echo_engine();
    let batch = json!([
        { "jsonrpc": "2.0", "id": 1, "method": "Echo.say", "params": "ok" },
        { "jsonrpc": "1.0", "id": 2, "method": "Echo.say" },
        { "jsonrpc": "2.0", "id": 3, "method": "Missing.method" },
        { "jsonrpc": "2.0", "method": "Echo.say" },
        "garbage"
    ]);

    engine.process_message(&batch.to_string()).await;

    let sent = channel.envelopes();
    let replies = sent[0].as_array().expect("batch reply is an array");
    assert_eq!(replies.len(), 3);
    assert_eq!(replies[0]["result"], "ok");
    assert_eq!(replies[1]["id"], 2);
    assert_eq!(error_code(&replies[1]), -32600);
    assert_eq!(replies[2]["id"], 3);
    assert_eq!(error_code(&replies[2]), -32601);
}

/// **VALUE**: Verifies replies inside a batch resolve pending outbound calls.
#[tokio::test]
async fn given_batch_with_reply_when_processed_then_pending_call_resolves() {
    let (engine, channel) = echo_engine();
    let caller = engine.clone();
    let call = tokio::spawn(async move { caller.invoke("Document.count", None).await });
    let id = channel.wait_for_envelopes(1).await[0]["id"].clone();
    let reply: Value = serde_json::from_str(&success_reply(&id, json!(42))).expect("json");

    engine
        .process_message(&Value::Array(vec![reply]).to_string())
        .await;

    assert_eq!(call.await.expect("call task").expect("ok"), json!(42));
    // Only the original request was ever posted
    assert_eq!(channel.envelopes().len(), 1);
}

/// **VALUE**: Verifies a bare `{jsonrpc, id}` reply inside a batch completes its call.
#[tokio::test]
async fn given_batch_with_bare_reply_when_processed_then_pending_call_resolves_null() {
    let (engine, channel) = echo_engine();
    let caller = engine.clone();
    let call = tokio::spawn(async move { caller.invoke("Document.clear", None).await });
    let id = channel.wait_for_envelopes(1).await[0]["id"].clone();
    let reply: Value = serde_json::from_str(&empty_reply(&id)).expect("json");

    assert!(
        engine
            .process_message(&Value::Array(vec![reply]).to_string())
            .await
    );

    assert!(call.await.expect("call task").expect("ok").is_null());
    assert_eq!(engine.pending_count(), 0);
    assert_eq!(channel.envelopes().len(), 1);
}

/// **VALUE**: Verifies an empty batch posts nothing.
///
/// **BUG THIS CATCHES**: Would catch an empty array reply `[]` being sent back.
#[tokio::test]
async fn given_empty_batch_when_processed_then_no_reply() {
    // GIVEN: An engine
    let (engine, channel) = echo_engine();

    // WHEN: Processing `[]`
    engine.process_message("[]").await;

    // THEN: Nothing was posted
    assert!(channel.messages().is_empty());
}
