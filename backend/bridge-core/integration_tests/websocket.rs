use bridge_core::rpc::{HandlerTarget, Reply, RpcEngine, handler};
use bridge_core::transport::{WebSocketChannel, WebSocketServerHandle, start_websocket_server};

use common::RedactedToken;

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

const TEST_AUTH_TOKEN: &str = "test-token-12345";

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Test helper: server on a free port with a `Host.ping` handler.
async fn start_server() -> (WebSocketServerHandle, Arc<WebSocketChannel>, RpcEngine) {
    let channel = Arc::new(WebSocketChannel::new());
    let engine = RpcEngine::new(channel.clone());
    engine.handle("Host.ping", handler(|_call| async { Reply::value("pong") }));
    let handle = start_websocket_server(
        0,
        RedactedToken::new(TEST_AUTH_TOKEN),
        Arc::clone(&channel),
        engine.clone(),
    )
    .await
    .expect("Failed to start WebSocket server");
    (handle, channel, engine)
}

async fn connect(port: u16) -> Client {
    let (client, _) = connect_async(format!("ws://127.0.0.1:{port}"))
        .await
        .expect("Failed to connect to WebSocket server");
    client
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

async fn authenticate(client: &mut Client, token: &str) -> Value {
    send_json(client, json!({ "type": "auth", "token": token })).await;
    receive_json(client).await
}

/// **VALUE**: Verifies an authenticated document can call host handlers over the socket.
///
/// **WHY THIS MATTERS**: This is the out-of-process transport; the handshake
/// and one request/reply prove the whole path works.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Port 0 is not resolved to the real bound port
/// - The handshake reply shape changes
/// - Text frames are not routed into the engine
#[tokio::test]
async fn given_authenticated_client_when_request_sent_then_reply_received() {
    // GIVEN: Server on a free port and an authenticated client
    let (handle, _channel, _engine) = start_server().await;
    assert_ne!(handle.port(), 0);
    let mut client = connect(handle.port()).await;
    let auth = authenticate(&mut client, TEST_AUTH_TOKEN).await;
    assert_eq!(auth, json!({ "type": "auth", "success": true }));

    // WHEN: The document sends a request
    send_json(
        &mut client,
        json!({ "jsonrpc": "2.0", "id": 1, "method": "Host.ping" }),
    )
    .await;

    // THEN: The reply arrives as a text frame
    let reply = receive_json(&mut client).await;
    assert_eq!(reply["id"], 1);
    assert_eq!(reply["result"], "pong");

    handle.shutdown().await;
}

/// **VALUE**: Verifies a wrong token is refused and the connection is never attached.
///
/// **BUG THIS CATCHES**: Would catch any local process driving the host
/// without the shared secret.
#[tokio::test]
async fn given_wrong_token_when_authenticating_then_rejected() {
    let (handle, channel, _engine) = start_server().await;
    let mut client = connect(handle.port()).await;

    let auth = authenticate(&mut client, "wrong-token").await;

    assert_eq!(auth["success"], false);
    assert_eq!(auth["error"], "Invalid authentication token");
    assert!(!channel.is_connected().await);

    handle.shutdown().await;
}

/// **VALUE**: Verifies host-to-document calls travel over the socket and resolve on reply.
#[tokio::test]
async fn given_attached_client_when_host_invokes_then_client_answers() {
    let (handle, channel, engine) = start_server().await;
    let mut client = connect(handle.port()).await;
    authenticate(&mut client, TEST_AUTH_TOKEN).await;
    wait_for_attach(&channel).await;

    let caller = engine.clone();
    let call = tokio::spawn(async move {
        caller
            .invoke("Document.getTitle", Some(json!({ "tab": 0 })))
            .await
    });
    let request = receive_json(&mut client).await;
    assert_eq!(request["method"], "Document.getTitle");
    send_json(
        &mut client,
        json!({ "jsonrpc": "2.0", "id": request["id"], "result": "Inbox" }),
    )
    .await;

    assert_eq!(call.await.expect("call task").expect("title"), json!("Inbox"));

    handle.shutdown().await;
}

/// **VALUE**: Verifies calls fail fast while no document is attached.
#[tokio::test]
async fn given_no_client_when_host_invokes_then_fails_immediately() {
    let (handle, _channel, engine) = start_server().await;

    let error = engine
        .invoke("Document.getTitle", None)
        .await
        .expect_err("no document attached");

    assert_eq!(error.code(), -32603);
    assert_eq!(engine.pending_count(), 0);

    handle.shutdown().await;
}

/// **VALUE**: Verifies shutdown stops accepting new connections.
#[tokio::test]
async fn given_running_server_when_shut_down_then_new_connections_refused() {
    let (handle, _channel, _engine) = start_server().await;
    let port = handle.port();

    handle.shutdown().await;

    let result = connect_async(format!("ws://127.0.0.1:{port}")).await;
    assert!(result.is_err());
}

/// The channel attaches only after the handshake reply has been written.
async fn wait_for_attach(channel: &WebSocketChannel) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !channel.is_connected().await {
        assert!(tokio::time::Instant::now() < deadline, "client never attached");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
