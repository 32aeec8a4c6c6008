use crate::helpers::{error_code, notification, recording_engine, request, wait_until};

use bridge_core::RpcError;
use bridge_core::rpc::{HandlerTarget, Reply, handler};

use serde_json::{Value, json};

/// **VALUE**: Verifies `$/cancelRequest` fires a cancellable handler's token and the
/// call is answered with Cancelled.
///
/// **WHY THIS MATTERS**: Long-running host work (searches, exports) must stop
/// when the document aborts it.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The cancel id is not matched to the running call
/// - The reply reports success or a generic error instead of -32800
#[tokio::test]
async fn given_cancellable_handler_when_cancel_request_arrives_then_cancelled_reply() {
    // GIVEN: A handler that waits for its token
    let (engine, channel) = recording_engine();
    engine.handle_cancellable(
        "Search.run",
        handler(|call| async move {
            call.cancellation.cancelled().await;
            Err(RpcError::cancelled())
        }),
    );
    let running = engine.clone();
    let call = tokio::spawn(async move {
        running
            .process_message(&request(7, "Search.run", json!({ "q": "x" })))
            .await
    });
    wait_until(|| engine.active_cancellations() == 1).await;

    // WHEN: The document cancels id 7
    let handled = engine
        .process_message(&notification("$/cancelRequest", json!({ "id": 7 })))
        .await;

    // THEN: Cancelled reply for id 7 and the registration is gone
    assert!(handled);
    assert!(call.await.expect("dispatch task"));
    let reply = &channel.envelopes()[0];
    assert_eq!(reply["id"], 7);
    assert_eq!(error_code(reply), -32800);
    assert_eq!(engine.active_cancellations(), 0);
}

/// **VALUE**: Verifies a handler failing for another reason after cancellation still
/// reports Cancelled.
#[tokio::test]
async fn given_handler_error_after_cancel_when_replied_then_reported_as_cancelled() {
    let (engine, channel) = recording_engine();
    engine.handle_cancellable(
        "Export.run",
        handler(|call| async move {
            call.cancellation.cancelled().await;
            Err(RpcError::internal("stream closed"))
        }),
    );
    let running = engine.clone();
    let call = tokio::spawn(async move {
        running
            .process_message(&request(8, "Export.run", Value::Null))
            .await
    });
    wait_until(|| engine.active_cancellations() == 1).await;

    engine
        .process_message(&notification("$/cancelRequest", json!({ "id": 8 })))
        .await;

    call.await.expect("dispatch task");
    assert_eq!(error_code(&channel.envelopes()[0]), -32800);
}

/// **VALUE**: Verifies cancelling an unknown id is accepted and changes nothing.
///
/// **BUG THIS CATCHES**: Would catch a race (reply already sent) producing an error frame.
#[tokio::test]
async fn given_unknown_id_when_cancel_request_arrives_then_ignored() {
    let (engine, channel) = recording_engine();

    let handled = engine
        .process_message(&notification("$/cancelRequest", json!({ "id": 999 })))
        .await;

    assert!(handled);
    assert!(channel.messages().is_empty());
}

/// **VALUE**: Verifies handlers registered without cancellation never see the signal.
#[tokio::test]
async fn given_plain_handler_when_cancel_request_arrives_then_completes_normally() {
    let (engine, channel) = recording_engine();
    let (release, released) = tokio::sync::oneshot::channel::<()>();
    let released = std::sync::Mutex::new(Some(released));
    engine.handle(
        "Slow.work",
        handler(move |call| {
            let gate = released.lock().expect("gate").take();
            async move {
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
                Ok(Reply::Value(Value::Bool(call.cancellation.is_cancelled())))
            }
        }),
    );
    let running = engine.clone();
    let call = tokio::spawn(async move {
        running
            .process_message(&request(5, "Slow.work", Value::Null))
            .await
    });
    tokio::task::yield_now().await;

    engine
        .process_message(&notification("$/cancelRequest", json!({ "id": 5 })))
        .await;
    release.send(()).expect("handler waiting");

    call.await.expect("dispatch task");
    let reply = &channel.envelopes()[0];
    assert_eq!(reply["result"], false);
}
