use crate::helpers::{
    DisconnectedChannel, empty_reply, error_code, error_reply, notification, recording_engine, request,
    success_reply,
};

use bridge_core::rpc::{HandlerTarget, Reply, RpcEngine, handler};
use bridge_core::{OutboundMessage, RpcErrorCode};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Inbound requests: document calls the host
// ============================================================================

/// **VALUE**: Verifies a request for a registered method is answered with its result.
///
/// **WHY THIS MATTERS**: This is the document → host call path every exposed
/// service relies on.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The reply carries a different id than the request
/// - The reply is posted as a request instead of a response
#[tokio::test]
async fn given_registered_handler_when_request_processed_then_result_posted() {
    // GIVEN: Engine with an `add` handler
    let (engine, channel) = recording_engine();
    engine.handle(
        "Math.add",
        handler(|call| async move {
            let params = call.params.unwrap_or(Value::Null);
            let sum = params["a"].as_i64().unwrap_or(0) + params["b"].as_i64().unwrap_or(0);
            Reply::value(sum)
        }),
    );

    // WHEN: The document calls it
    let handled = engine
        .process_message(&request(1, "Math.add", json!({ "a": 2, "b": 3 })))
        .await;

    // THEN: One response with the same id and the sum
    assert!(handled);
    let messages = channel.messages();
    assert_eq!(messages.len(), 1);
    assert!(matches!(messages[0], OutboundMessage::Response(_)));
    let reply = &channel.envelopes()[0];
    assert_eq!(reply["jsonrpc"], "2.0");
    assert_eq!(reply["id"], 1);
    assert_eq!(reply["result"], 5);
    assert!(reply.get("error").is_none());
}

/// **VALUE**: Verifies unit handlers reply with neither result nor error.
#[tokio::test]
async fn given_unit_handler_when_request_processed_then_reply_has_no_result() {
    let (engine, channel) = recording_engine();
    engine.handle("Log.write", handler(|_call| async { Ok(Reply::Empty) }));

    engine
        .process_message(&request(9, "Log.write", json!({})))
        .await;

    let reply = &channel.envelopes()[0];
    assert_eq!(reply["id"], 9);
    assert!(reply.get("result").is_none());
    assert!(reply.get("error").is_none());
}

/// **VALUE**: Verifies an unknown method is answered with MethodNotFound.
///
/// **BUG THIS CATCHES**: Would catch the request being silently dropped, which
/// leaves the document's call hanging until its own timeout.
#[tokio::test]
async fn given_no_handler_when_request_processed_then_method_not_found() {
    let (engine, channel) = recording_engine();

    let handled = engine
        .process_message(&request(4, "Unknown.thing", json!({})))
        .await;

    assert!(handled);
    let reply = &channel.envelopes()[0];
    assert_eq!(reply["id"], 4);
    assert_eq!(error_code(reply), -32601);
    assert!(
        reply["error"]["message"]
            .as_str()
            .unwrap_or_default()
            .contains("Unknown.thing")
    );
}

/// **VALUE**: Verifies a failing handler's code and message reach the document unchanged.
#[tokio::test]
async fn given_failing_handler_when_request_processed_then_error_reply() {
    let (engine, channel) = recording_engine();
    engine.handle(
        "Files.open",
        handler(|_call| async { Err(bridge_core::RpcError::new(1001, "file locked")) }),
    );

    engine
        .process_message(&request(2, "Files.open", Value::Null))
        .await;

    let reply = &channel.envelopes()[0];
    assert_eq!(error_code(reply), 1001);
    assert_eq!(reply["error"]["message"], "file locked");
}

/// **VALUE**: Verifies a panicking handler becomes an InternalError reply.
///
/// **BUG THIS CATCHES**: Would catch a panic tearing down the transport task
/// instead of failing one call.
#[tokio::test]
async fn given_panicking_handler_when_request_processed_then_internal_error() {
    let (engine, channel) = recording_engine();
    engine.handle(
        "Broken.call",
        handler(|call| async move {
            if call.params.is_some() {
                panic!("handler exploded");
            }
            Ok(Reply::Empty)
        }),
    );

    let handled = engine
        .process_message(&request(3, "Broken.call", json!({})))
        .await;

    assert!(handled);
    let reply = &channel.envelopes()[0];
    assert_eq!(error_code(reply), -32603);
    assert_eq!(reply["error"]["message"], "handler exploded");
}

/// **VALUE**: Verifies notifications run their handler and never produce a reply.
#[tokio::test]
async fn given_notification_when_processed_then_handler_runs_without_reply() {
    let (engine, channel) = recording_engine();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    engine.handle(
        "Log.write",
        handler(move |_call| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Reply::Empty)
            }
        }),
    );

    let handled = engine
        .process_message(&notification("Log.write", json!({ "line": "hi" })))
        .await;

    assert!(handled);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(channel.messages().is_empty());
}

/// **VALUE**: Verifies foreign or malformed text is ignored without a reply.
///
/// **WHY THIS MATTERS**: The document shares its message channel with other
/// code; non-RPC traffic must fall through to other consumers.
#[tokio::test]
async fn given_non_rpc_text_when_processed_then_returns_false() {
    let (engine, channel) = recording_engine();

    assert!(!engine.process_message("").await);
    assert!(!engine.process_message("not json").await);
    assert!(!engine.process_message(r#"{"hello":"world"}"#).await);
    assert!(!engine.process_message(r#"{"jsonrpc":"1.0","id":1,"method":"x"}"#).await);
    assert!(!engine.process_message(&notification("Nobody.listens", Value::Null)).await);

    assert!(channel.messages().is_empty());
}

// ============================================================================
// Outbound calls: host calls the document
// ============================================================================

/// **VALUE**: Verifies invoke posts a request and resolves with the document's result.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Replies are not correlated by id
/// - The pending entry leaks after completion
#[tokio::test]
async fn given_outbound_call_when_document_replies_then_invoke_resolves() {
    // GIVEN: A call in flight
    let (engine, channel) = recording_engine();
    let caller = engine.clone();
    let call = tokio::spawn(async move {
        caller
            .invoke("Document.getTitle", Some(json!({ "tab": 1 })))
            .await
    });
    let sent = channel.wait_for_envelopes(1).await;
    let outbound = &sent[0];
    assert_eq!(outbound["method"], "Document.getTitle");
    assert_eq!(outbound["params"]["tab"], 1);
    assert!(matches!(channel.messages()[0], OutboundMessage::Request(_)));

    // WHEN: The document replies
    let handled = engine
        .process_message(&success_reply(&outbound["id"], json!("Inbox")))
        .await;

    // THEN: The call resolves and nothing stays pending
    assert!(handled);
    let result = call.await.expect("call task").expect("call succeeds");
    assert_eq!(result, json!("Inbox"));
    assert_eq!(engine.pending_count(), 0);
}

/// **VALUE**: Verifies a second reply for the same id is ignored.
///
/// **BUG THIS CATCHES**: Would catch double completion of one call.
#[tokio::test]
async fn given_resolved_call_when_reply_repeated_then_ignored() {
    let (engine, channel) = recording_engine();
    let caller = engine.clone();
    let call = tokio::spawn(async move { caller.invoke("Document.ping", None).await });
    let id = channel.wait_for_envelopes(1).await[0]["id"].clone();

    assert!(engine.process_message(&success_reply(&id, json!(1))).await);
    assert!(!engine.process_message(&success_reply(&id, json!(2))).await);

    assert_eq!(call.await.expect("call task").expect("ok"), json!(1));
}

/// **VALUE**: Verifies an error reply fails the call with the document's code and message.
#[tokio::test]
async fn given_outbound_call_when_document_errors_then_invoke_fails_with_code() {
    let (engine, channel) = recording_engine();
    let caller = engine.clone();
    let call = tokio::spawn(async move { caller.invoke("Document.save", None).await });
    let id = channel.wait_for_envelopes(1).await[0]["id"].clone();

    engine
        .process_message(&error_reply(&id, 4000, "read only"))
        .await;

    let error = call.await.expect("call task").expect_err("must fail");
    assert_eq!(error.code(), 4000);
    assert_eq!(error.message(), "read only");
}

/// **VALUE**: Verifies typed invoke maps a null result to `None`.
#[tokio::test]
async fn given_null_result_when_invoke_as_then_none() {
    let (engine, channel) = recording_engine();
    let caller = engine.clone();
    let call = tokio::spawn(async move {
        caller
            .invoke_as::<String>("Document.selection", None)
            .await
    });
    let id = channel.wait_for_envelopes(1).await[0]["id"].clone();

    engine.process_message(&success_reply(&id, Value::Null)).await;

    assert_eq!(call.await.expect("call task").expect("ok"), None);
}

/// **VALUE**: Verifies a reply with neither `result` nor `error` completes the call with null.
///
/// **WHY THIS MATTERS**: A void document handler answers with `{jsonrpc, id}`
/// only, which is also the shape this engine posts for unit replies.
///
/// **BUG THIS CATCHES**: Would catch void calls being left pending until they
/// time out.
#[tokio::test]
async fn given_void_document_method_when_bare_reply_then_invoke_resolves_null() {
    // GIVEN: A call in flight with a short timeout
    let channel = crate::helpers::RecordingChannel::new();
    let engine = RpcEngine::with_call_timeout(channel.clone(), Duration::from_millis(500));
    let caller = engine.clone();
    let call = tokio::spawn(async move { caller.invoke("Doc.voidMethod", None).await });
    let id = channel.wait_for_envelopes(1).await[0]["id"].clone();

    // WHEN: The document replies with only the id
    let handled = engine.process_message(&empty_reply(&id)).await;

    // THEN: Handled, resolved with null, nothing pending
    assert!(handled);
    assert_eq!(engine.pending_count(), 0);
    let result = call.await.expect("call task").expect("void call succeeds");
    assert!(result.is_null());
}

/// **VALUE**: Verifies the engine accepts the unit reply shape it produces itself.
#[tokio::test]
async fn given_engine_unit_reply_when_fed_to_caller_then_resolves() {
    // GIVEN: A host engine calling out, and a peer engine with a unit handler
    let (host, host_channel) = recording_engine();
    let (peer, peer_channel) = recording_engine();
    peer.handle("Doc.touch", handler(|_call| async { Ok(Reply::Empty) }));
    let caller = host.clone();
    let call = tokio::spawn(async move { caller.invoke("Doc.touch", None).await });
    let outbound = host_channel.wait_for_envelopes(1).await[0].to_string();

    // WHEN: The peer answers and its reply travels back
    peer.process_message(&outbound).await;
    let reply = peer_channel.envelopes()[0].clone();
    assert!(reply.get("result").is_none());
    assert!(host.process_message(&reply.to_string()).await);

    // THEN: The host call completes
    assert!(call.await.expect("call task").expect("ok").is_null());
}

/// **VALUE**: Verifies an unanswered call fails with Timeout and a late reply is discarded.
///
/// **WHY THIS MATTERS**: A document that never answers must not pin memory or
/// hang the host forever.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The timeout is not applied
/// - The pending entry survives the timeout
/// - A late reply is treated as handled
#[tokio::test]
async fn given_short_timeout_when_document_never_replies_then_timeout_error() {
    // GIVEN: Engine with a 50ms call timeout
    let channel = crate::helpers::RecordingChannel::new();
    let engine = RpcEngine::with_call_timeout(channel.clone(), Duration::from_millis(50));

    // WHEN: Nobody replies
    let error = engine
        .invoke("Document.slow", None)
        .await
        .expect_err("must time out");

    // THEN: Timeout, nothing pending, late reply ignored
    assert_eq!(error.kind(), Some(RpcErrorCode::Timeout));
    assert!(error.is_timeout());
    assert_eq!(engine.pending_count(), 0);
    let id = channel.envelopes()[0]["id"].clone();
    assert!(!engine.process_message(&success_reply(&id, json!(1))).await);
}

/// **VALUE**: Verifies cancelling an outbound call sends `$/cancelRequest` for its id.
///
/// **BUG THIS CATCHES**: Would catch the document being left running work the
/// host no longer wants.
#[tokio::test]
async fn given_outbound_call_when_cancelled_then_cancel_request_sent() {
    let (engine, channel) = recording_engine();
    let token = CancellationToken::new();
    let caller = engine.clone();
    let signal = token.clone();
    let call = tokio::spawn(async move {
        caller
            .invoke_with_cancel("Document.render", None, signal)
            .await
    });
    let id = channel.wait_for_envelopes(1).await[0]["id"].clone();

    token.cancel();

    let error = call.await.expect("call task").expect_err("must cancel");
    assert!(error.is_cancelled());
    assert_eq!(error.code(), -32800);
    let sent = channel.wait_for_envelopes(2).await;
    assert_eq!(sent[1]["method"], "$/cancelRequest");
    assert_eq!(sent[1]["params"]["id"], id);
    assert!(sent[1].get("id").is_none());
    assert_eq!(engine.pending_count(), 0);
}

/// **VALUE**: Verifies an already-cancelled signal fails before anything is sent.
#[tokio::test]
async fn given_cancelled_signal_when_invoke_then_nothing_sent() {
    let (engine, channel) = recording_engine();
    let token = CancellationToken::new();
    token.cancel();

    let error = engine
        .invoke_with_cancel("Document.render", None, token)
        .await
        .expect_err("must cancel");

    assert!(error.is_cancelled());
    assert!(channel.messages().is_empty());
}

/// **VALUE**: Verifies notify posts a request envelope without an id.
#[tokio::test]
async fn given_notify_when_called_then_notification_posted() {
    let (engine, channel) = recording_engine();

    engine
        .notify("Document.refresh", Some(json!({ "full": true })))
        .await
        .expect("notify");

    let sent = channel.envelopes();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["method"], "Document.refresh");
    assert!(sent[0].get("id").is_none());
}

/// **VALUE**: Verifies a send failure surfaces to the caller instead of hanging.
#[tokio::test]
async fn given_disconnected_channel_when_invoke_then_fails_immediately() {
    let engine = RpcEngine::new(Arc::new(DisconnectedChannel));

    let error = engine
        .invoke("Document.ping", None)
        .await
        .expect_err("must fail");

    assert_eq!(error.kind(), Some(RpcErrorCode::InternalError));
    assert_eq!(engine.pending_count(), 0);
}

// ============================================================================
// Lifecycle
// ============================================================================

/// **VALUE**: Verifies dispose fails pending calls with Cancelled and ignores later traffic.
///
/// **BUG THIS CATCHES**: Would catch callers awaiting forever after the document closes.
#[tokio::test]
async fn given_pending_call_when_disposed_then_cancelled_and_engine_inert() {
    let (engine, channel) = recording_engine();
    engine.handle("Host.ping", handler(|_call| async { Reply::value("pong") }));
    let caller = engine.clone();
    let call = tokio::spawn(async move { caller.invoke("Document.wait", None).await });
    channel.wait_for_envelopes(1).await;

    engine.dispose().await;

    let error = call.await.expect("call task").expect_err("must cancel");
    assert!(error.is_cancelled());
    assert!(engine.is_disposed());
    assert!(!engine.has_handler("Host.ping"));
    assert!(!engine.process_message(&request(1, "Host.ping", Value::Null)).await);
    let after = engine.invoke("Document.ping", None).await;
    assert!(after.expect_err("disposed").is_cancelled());
}
