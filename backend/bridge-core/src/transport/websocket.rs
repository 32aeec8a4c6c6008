//! WebSocket string channel between the engine and a document.
//!
//! The server:
//!
//! - Listens on `127.0.0.1` only and drops non-loopback peers
//! - Requires `{"type":"auth","token":…}` as the first text frame
//! - Hands every later text frame to [`RpcEngine::process_message`]
//! - Writes every outbound envelope as one text frame
//!
//! One document is attached at a time; a newly authenticated connection
//! replaces the previous one. Raw scripts (service stubs) have no meaning
//! over a socket and are skipped.

use crate::error::TransportError;
use crate::error::ws::WsError;
use crate::rpc::{DocumentChannel, OutboundMessage, RpcEngine};
use crate::transport::connection_state::ConnectionState;
use crate::transport::handle::WebSocketServerHandle;

use common::{ErrorLocation, RedactedToken};

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::future::BoxFuture;
use futures_util::stream::SplitSink;
use futures_util::{FutureExt, SinkExt, StreamExt};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{RwLock, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};
use tokio_util::sync::CancellationToken;

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// First frame a client must send.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ClientHandshake {
    Auth { token: String },
}

#[derive(Debug, Serialize)]
struct HandshakeResponse<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

struct Attachment {
    connection: u64,
    sender: mpsc::UnboundedSender<String>,
}

/// [`DocumentChannel`] backed by the currently attached WebSocket client.
#[derive(Default)]
pub struct WebSocketChannel {
    current: RwLock<Option<Attachment>>,
    next_connection: AtomicU64,
}

impl WebSocketChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_connected(&self) -> bool {
        self.current
            .read()
            .await
            .as_ref()
            .is_some_and(|a| !a.sender.is_closed())
    }

    async fn attach(&self, sender: mpsc::UnboundedSender<String>) -> u64 {
        let connection = self.next_connection.fetch_add(1, Ordering::Relaxed);
        let previous = self
            .current
            .write()
            .await
            .replace(Attachment { connection, sender });
        if let Some(previous) = previous {
            warn!(
                "Document connection {} replaced by {}",
                previous.connection, connection
            );
        }
        connection
    }

    async fn detach(&self, connection: u64) {
        let mut current = self.current.write().await;
        if current.as_ref().is_some_and(|a| a.connection == connection) {
            *current = None;
        }
    }
}

impl DocumentChannel for WebSocketChannel {
    fn post(&self, message: OutboundMessage) -> BoxFuture<'_, Result<(), TransportError>> {
        async move {
            let Some(json) = message.envelope_json() else {
                debug!("Skipping script push on WebSocket channel");
                return Ok(());
            };
            let current = self.current.read().await;
            let attachment = current
                .as_ref()
                .ok_or_else(|| TransportError::not_connected())?;
            attachment
                .sender
                .send(json.to_string())
                .map_err(|_| TransportError::closed())
        }
        .boxed()
    }
}

/// Start the listener on `127.0.0.1:<port>` (0 picks a free port).
///
/// # Errors
///
/// Returns [`WsError::Io`] if the port cannot be bound.
pub async fn start_websocket_server(
    port: u16,
    auth_token: RedactedToken,
    channel: Arc<WebSocketChannel>,
    engine: RpcEngine,
) -> Result<WebSocketServerHandle, WsError> {
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let local_addr = listener.local_addr()?;
    info!("Bridge WebSocket listening on {}", local_addr);

    let auth_token = Arc::new(auth_token);
    let shutdown = CancellationToken::new();
    let stop = shutdown.clone();

    let task = tokio::spawn(async move {
        loop {
            let accepted = tokio::select! {
                _ = stop.cancelled() => break,
                accepted = listener.accept() => accepted,
            };
            match accepted {
                Ok((stream, addr)) => {
                    info!("Document connecting from {}", addr);
                    let token = Arc::clone(&auth_token);
                    let channel = Arc::clone(&channel);
                    let engine = engine.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, addr, token, channel, engine).await {
                            error!("Connection {} ended with error: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
        info!("Bridge WebSocket listener on {} stopped", local_addr);
    });

    Ok(WebSocketServerHandle {
        local_addr,
        shutdown,
        task,
    })
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    auth_token: Arc<RedactedToken>,
    channel: Arc<WebSocketChannel>,
    engine: RpcEngine,
) -> Result<(), WsError> {
    // SECURITY: Reject non-loopback connections
    if !addr.ip().is_loopback() {
        warn!("Rejected non-loopback connection from {}", addr);
        return Ok(());
    }

    let ws_stream = accept_async(stream).await.map_err(|e| WsError::Handshake {
        message: format!("WebSocket handshake failed: {e}"),
        location: ErrorLocation::caller(),
    })?;

    let (mut write, mut read) = ws_stream.split();
    let mut state = ConnectionState::new(auth_token);

    // SECURITY: First message MUST be the auth handshake
    match read.next().await {
        Some(Ok(Message::Text(text))) => {
            match serde_json::from_str::<ClientHandshake>(text.as_str()) {
                Ok(ClientHandshake::Auth { token }) if state.validate_token(&token) => {
                    info!("Document {} authenticated", addr);
                    send_handshake_response(&mut write, true, None).await?;
                }
                Ok(ClientHandshake::Auth { .. }) => {
                    warn!("Document {} auth failed: invalid token", addr);
                    send_handshake_response(&mut write, false, Some("Invalid authentication token"))
                        .await?;
                    return Ok(());
                }
                Err(e) => {
                    warn!("Document {} auth failed: first message was not a handshake ({})", addr, e);
                    return Ok(());
                }
            }
        }
        Some(Ok(_)) => {
            warn!("Document {} sent non-text first message", addr);
            return Ok(());
        }
        Some(Err(e)) => {
            return Err(WsError::Read {
                message: format!("Error reading first message: {e}"),
                location: ErrorLocation::caller(),
            });
        }
        None => {
            warn!("Document {} disconnected before sending auth", addr);
            return Ok(());
        }
    }

    if !state.is_authenticated() {
        return Err(WsError::Auth {
            message: "connection not authenticated".to_string(),
            location: ErrorLocation::caller(),
        });
    }

    let (sender, mut outbound) = mpsc::unbounded_channel::<String>();
    let connection = channel.attach(sender).await;

    let writer = tokio::spawn(async move {
        while let Some(text) = outbound.recv().await {
            if let Err(e) = write.send(Message::Text(text.into())).await {
                error!("Failed to write to document {}: {}", addr, e);
                break;
            }
        }
        let _ = write.close().await;
    });

    let result = read_loop(&mut read, addr, &engine).await;

    channel.detach(connection).await;
    writer.abort();
    info!("Document {} disconnected", addr);
    result
}

async fn read_loop(
    read: &mut futures_util::stream::SplitStream<WebSocketStream<TcpStream>>,
    addr: SocketAddr,
    engine: &RpcEngine,
) -> Result<(), WsError> {
    while let Some(message) = read.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let engine = engine.clone();
                let body = text.to_string();
                tokio::spawn(async move {
                    if !engine.process_message(&body).await {
                        debug!("Unhandled message from document");
                    }
                });
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Binary(_)) => {
                warn!("Document {} sent binary frame; ignored", addr);
            }
            Ok(_) => {}
            Err(e) => {
                return Err(WsError::Read {
                    message: format!("Error reading message: {e}"),
                    location: ErrorLocation::caller(),
                });
            }
        }
    }
    Ok(())
}

async fn send_handshake_response(
    write: &mut WsSink,
    success: bool,
    error: Option<&str>,
) -> Result<(), WsError> {
    let response = HandshakeResponse {
        kind: "auth",
        success,
        error,
    };
    let json = serde_json::to_string(&response)?;
    write
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| WsError::Send {
            message: format!("Failed to send auth response: {e}"),
            location: ErrorLocation::caller(),
        })
}
