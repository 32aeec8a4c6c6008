use bridge_core::BridgeConfig;
use bridge_core::RpcErrorCode;

use bridge_host::host::BridgeHost;
use bridge_host::services::HostInfo;

use common::RedactedToken;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

// ============================================================================
// End-to-end tests: a started host driven by a WebSocket client playing the
// document side of the bridge
// ============================================================================

const TEST_AUTH_TOKEN: &str = "host-test-token";

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_host() -> BridgeHost {
    BridgeHost::start(
        &BridgeConfig::default(),
        0,
        RedactedToken::new(TEST_AUTH_TOKEN),
    )
    .await
    .expect("host should start")
}

async fn send_json(client: &mut Client, value: Value) {
    client
        .send(Message::Text(value.to_string().into()))
        .await
        .expect("Failed to send message");
}

async fn receive_json(client: &mut Client) -> Value {
    let message = tokio::time::timeout(Duration::from_secs(2), client.next())
        .await
        .expect("Timed out waiting for message")
        .expect("Connection closed")
        .expect("Error receiving message");
    let text = message.into_text().expect("Message was not text");
    serde_json::from_str(text.as_str()).expect("Message was not JSON")
}

/// Connected and authenticated document.
async fn attach(host: &BridgeHost) -> Client {
    let (mut client, _) = connect_async(format!("ws://127.0.0.1:{}", host.port()))
        .await
        .expect("Failed to connect to host");
    send_json(&mut client, json!({ "type": "auth", "token": TEST_AUTH_TOKEN })).await;
    let auth = receive_json(&mut client).await;
    assert_eq!(auth["success"], true, "auth failed: {auth}");
    client
}

/// Send a request and return its reply, skipping unrelated frames.
async fn call(client: &mut Client, id: i64, method: &str, params: Value) -> Value {
    send_json(
        client,
        json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }),
    )
    .await;
    loop {
        let frame = receive_json(client).await;
        if frame["id"] == id {
            return frame;
        }
    }
}

/// **VALUE**: Verifies a started host serves its built-in service end to end.
///
/// **WHY THIS MATTERS**: This is the whole stack a document sees: socket,
/// handshake, engine, bridge binding and camelCase wire names.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - HostInfo is not exposed at startup
/// - Wire names keep their snake_case spelling
/// - Named arguments are not bound
#[tokio::test]
async fn given_started_host_when_document_calls_host_info_then_replies() {
    // GIVEN: A host on a free port and an attached document
    let host = start_host().await;
    assert!(host.bridge().is_exposed::<dyn HostInfo>());
    let mut client = attach(&host).await;

    // WHEN: Calling ping and echo
    let ping = call(&mut client, 1, "HostInfo.ping", Value::Null).await;
    let echo = call(&mut client, 2, "HostInfo.echo", json!({ "message": "hi" })).await;
    let status = call(&mut client, 3, "HostInfo.status", Value::Null).await;

    // THEN: Results come back
    assert_eq!(ping["result"], "pong");
    assert_eq!(echo["result"], "hi");
    assert_eq!(status["result"]["name"], "bridge-host");

    host.shutdown().await;
}

/// **VALUE**: Verifies the streamed method can be drained through enumerator calls.
///
/// **BUG THIS CATCHES**: Would catch if the declared default limit is ignored
/// or the enumerator token is not served over the socket.
#[tokio::test]
async fn given_count_to_when_drained_then_sequence_then_finished() {
    // GIVEN: An attached document
    let host = start_host().await;
    let mut client = attach(&host).await;

    // WHEN: Opening the stream and pulling until finished
    let opened = call(&mut client, 1, "HostInfo.countTo", json!({ "limit": 3 })).await;
    let token = opened["result"]["token"]
        .as_str()
        .expect("stream token")
        .to_string();
    let next = format!("$/enumerator/next/{token}");

    let mut values = Vec::new();
    for id in 2..10 {
        let step = call(&mut client, id, &next, Value::Null).await;
        if step["result"]["finished"] == true {
            break;
        }
        values.extend(step["result"]["values"].as_array().cloned().unwrap_or_default());
    }

    // THEN: 1, 2, 3 then the enumerator is gone
    assert_eq!(values, vec![json!(1), json!(2), json!(3)]);
    assert!(!host.engine().has_enumerator(&token));

    host.shutdown().await;
}

/// **VALUE**: Verifies `$/cancelRequest` from the document ends a long host call.
///
/// **BUG THIS CATCHES**: Would catch if the cancellation parameter is not
/// wired to the request's token, leaving the call to run its full delay.
#[tokio::test]
async fn given_delayed_echo_when_document_cancels_then_cancelled_reply() {
    // GIVEN: An attached document and a long-running call
    let host = start_host().await;
    let mut client = attach(&host).await;
    send_json(
        &mut client,
        json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "HostInfo.delayedEcho",
            "params": { "message": "slow", "delayMs": 30000 }
        }),
    )
    .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // WHEN: The document cancels it
    send_json(
        &mut client,
        json!({ "jsonrpc": "2.0", "method": "$/cancelRequest", "params": { "id": 7 } }),
    )
    .await;

    // THEN: The call fails with Cancelled well before the delay
    let reply = receive_json(&mut client).await;
    assert_eq!(reply["id"], 7);
    assert_eq!(reply["error"]["code"], RpcErrorCode::Cancelled.code());

    host.shutdown().await;
}

/// **VALUE**: Verifies shutdown releases the port and fails pending host calls.
#[tokio::test]
async fn given_running_host_when_shutdown_then_connections_refused() {
    // GIVEN: A host with a known port
    let host = start_host().await;
    let port = host.port();
    let engine = host.engine().clone();

    // WHEN: Shutting down
    host.shutdown().await;

    // THEN: No new connections and the engine is inert
    assert!(connect_async(format!("ws://127.0.0.1:{port}")).await.is_err());
    assert_eq!(engine.pending_count(), 0);
    let err = engine
        .invoke("Document.anything", None)
        .await
        .expect_err("disposed engine should refuse");
    assert_eq!(err.code(), RpcErrorCode::Cancelled.code());
}
