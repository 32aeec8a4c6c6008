use crate::helpers::{error_code, notification, recording_engine, request};

use bridge_core::RpcError;
use bridge_core::rpc::{HandlerTarget, Reply, RpcEngine, StreamEnumerator, handler};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::stream;
use serde_json::{Value, json};

async fn call(engine: &RpcEngine, channel: &crate::helpers::RecordingChannel, id: i64, method: &str) -> Value {
    engine.process_message(&request(id, method, Value::Null)).await;
    channel
        .envelopes()
        .into_iter()
        .find(|reply| reply["id"] == id)
        .expect("reply posted")
}

/// **VALUE**: Verifies a streaming handler replies with a token the document can drain.
///
/// **WHY THIS MATTERS**: Async iteration in the document pulls one value per
/// `$/enumerator/next/<token>` call; the whole sequence must arrive in order and
/// end with `finished: true`.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The sequence is materialized or reordered
/// - The enumerator outlives exhaustion
/// - Dispose runs zero or two times
#[tokio::test]
async fn given_stream_handler_when_drained_then_values_in_order_and_disposed() {
    // GIVEN: A handler streaming three numbers with a dispose hook
    let (engine, channel) = recording_engine();
    let disposed = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&disposed);
    engine.handle(
        "Feed.numbers",
        handler(move |_call| {
            let flag = Arc::clone(&flag);
            async move {
                let enumerator = StreamEnumerator::from_values([1, 2, 3])?.on_dispose(move || {
                    assert!(!flag.swap(true, Ordering::SeqCst), "disposed twice");
                    Ok(())
                });
                Ok(Reply::stream(enumerator))
            }
        }),
    );

    // WHEN: Calling and then pulling until finished
    let opened = call(&engine, &channel, 1, "Feed.numbers").await;
    let token = opened["result"]["token"].as_str().expect("token").to_string();
    assert!(engine.has_enumerator(&token));

    let next = format!("$/enumerator/next/{token}");
    let mut values = Vec::new();
    for id in 2..10 {
        let step = call(&engine, &channel, id, &next).await;
        if step["result"]["finished"] == true {
            assert_eq!(step["result"]["values"], json!([]));
            break;
        }
        values.extend(step["result"]["values"].as_array().expect("values").clone());
    }

    // THEN: All values, in order, then disposed and forgotten
    assert_eq!(values, vec![json!(1), json!(2), json!(3)]);
    assert!(disposed.load(Ordering::SeqCst));
    assert!(!engine.has_enumerator(&token));
    assert_eq!(engine.active_enumerators(), 0);
}

/// **VALUE**: Verifies `$/enumerator/abort` disposes a partially read sequence.
///
/// **BUG THIS CATCHES**: Would catch a `break` out of a `for await` loop in
/// the document leaking the host-side producer.
#[tokio::test]
async fn given_open_stream_when_aborted_then_disposed() {
    let (engine, channel) = recording_engine();
    let disposed = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&disposed);
    engine.handle(
        "Feed.forever",
        handler(move |_call| {
            let flag = Arc::clone(&flag);
            async move {
                let endless = stream::repeat_with(|| Ok(json!("tick")));
                let enumerator = StreamEnumerator::new(endless).on_dispose(move || {
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                });
                Ok(Reply::stream(enumerator))
            }
        }),
    );
    let opened = call(&engine, &channel, 1, "Feed.forever").await;
    let token = opened["result"]["token"].as_str().expect("token").to_string();
    call(&engine, &channel, 2, &format!("$/enumerator/next/{token}")).await;

    let handled = engine
        .process_message(&notification("$/enumerator/abort", json!({ "token": token })))
        .await;

    assert!(handled);
    assert!(disposed.load(Ordering::SeqCst));
    assert!(!engine.has_enumerator(&token));
}

/// **VALUE**: Verifies pulling an unknown token answers finished instead of failing.
#[tokio::test]
async fn given_unknown_token_when_next_then_finished() {
    let (engine, channel) = recording_engine();

    let step = call(&engine, &channel, 1, "$/enumerator/next/no-such-token").await;

    assert_eq!(step["result"]["finished"], true);
}

/// **VALUE**: Verifies a producer error fails that `next` call and disposes the sequence.
#[tokio::test]
async fn given_failing_stream_when_next_then_error_and_disposed() {
    let (engine, channel) = recording_engine();
    engine.handle(
        "Feed.broken",
        handler(|_call| async {
            let items = stream::iter(vec![Ok(json!(1)), Err(RpcError::internal("disk gone"))]);
            Ok(Reply::stream(StreamEnumerator::new(items)))
        }),
    );
    let opened = call(&engine, &channel, 1, "Feed.broken").await;
    let token = opened["result"]["token"].as_str().expect("token").to_string();
    let next = format!("$/enumerator/next/{token}");

    let first = call(&engine, &channel, 2, &next).await;
    let second = call(&engine, &channel, 3, &next).await;

    assert_eq!(first["result"]["values"], json!([1]));
    assert_eq!(error_code(&second), -32603);
    assert_eq!(second["error"]["message"], "disk gone");
    assert!(!engine.has_enumerator(&token));
}

/// **VALUE**: Verifies dispose of the engine aborts every open sequence.
#[tokio::test]
async fn given_open_streams_when_engine_disposed_then_all_aborted() {
    let (engine, channel) = recording_engine();
    engine.handle(
        "Feed.numbers",
        handler(|_call| async { Ok(Reply::stream(StreamEnumerator::from_values([1, 2])?)) }),
    );
    call(&engine, &channel, 1, "Feed.numbers").await;
    call(&engine, &channel, 2, "Feed.numbers").await;
    assert_eq!(engine.active_enumerators(), 2);

    engine.dispose().await;

    assert_eq!(engine.active_enumerators(), 0);
}
