//! Wiring: WebSocket channel → engine → bridge → exposed services.

use crate::error::HostError;
use crate::services::{HostInfo, LocalHostInfo};

use bridge_core::rpc::RpcEngine;
use bridge_core::transport::{WebSocketChannel, WebSocketServerHandle, start_websocket_server};
use bridge_core::{BridgeConfig, BridgeService, CoreError};

use common::RedactedToken;

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub const HEARTBEAT_PERIOD: Duration = Duration::from_secs(5);

/// Token from `env_name`, or a fresh random one when it is unset or empty.
///
/// Returns the token and whether it was generated.
pub fn auth_token_from_env(env_name: &str) -> (RedactedToken, bool) {
    match std::env::var(env_name) {
        Ok(token) if !token.trim().is_empty() => (RedactedToken::new(token.trim()), false),
        _ => (RedactedToken::new(Uuid::new_v4().simple().to_string()), true),
    }
}

/// A running host: one document channel, one engine, one bridge.
pub struct BridgeHost {
    engine: RpcEngine,
    bridge: BridgeService,
    channel: Arc<WebSocketChannel>,
    host_info: Arc<LocalHostInfo>,
    server: WebSocketServerHandle,
    heartbeat: CancellationToken,
    heartbeat_task: JoinHandle<()>,
}

impl BridgeHost {
    /// Start listening on `port` (0 picks a free port) and expose the host services.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] if a service cannot be exposed or the port
    /// cannot be bound.
    pub async fn start(
        config: &BridgeConfig,
        port: u16,
        auth_token: RedactedToken,
    ) -> Result<Self, HostError> {
        let channel = Arc::new(WebSocketChannel::new());
        let engine = RpcEngine::with_call_timeout(channel.clone(), config.rpc.call_timeout());
        let bridge = BridgeService::builder(engine.clone())
            .config(&config.binding)
            .build();

        let host_info = Arc::new(LocalHostInfo::new());
        bridge
            .expose(host_info.clone() as Arc<dyn HostInfo>, None)
            .map_err(CoreError::from)?;
        info!("Exposed services: {}", bridge.exposed_services().join(", "));

        let server =
            match start_websocket_server(port, auth_token, channel.clone(), engine.clone()).await {
                Ok(server) => server,
                Err(e) => {
                    bridge.dispose();
                    engine.dispose().await;
                    return Err(CoreError::from(e).into());
                }
            };

        let heartbeat = CancellationToken::new();
        let heartbeat_task = spawn_heartbeat(host_info.clone(), HEARTBEAT_PERIOD, heartbeat.clone());

        Ok(Self {
            engine,
            bridge,
            channel,
            host_info,
            server,
            heartbeat,
            heartbeat_task,
        })
    }

    pub fn port(&self) -> u16 {
        self.server.port()
    }

    pub fn engine(&self) -> &RpcEngine {
        &self.engine
    }

    pub fn bridge(&self) -> &BridgeService {
        &self.bridge
    }

    pub fn host_info(&self) -> &Arc<LocalHostInfo> {
        &self.host_info
    }

    pub async fn is_document_connected(&self) -> bool {
        self.channel.is_connected().await
    }

    /// Stop the listener, tear down every service and fail pending calls.
    pub async fn shutdown(self) {
        info!("Bridge host shutting down");
        self.heartbeat.cancel();
        if let Err(e) = self.heartbeat_task.await {
            warn!("Heartbeat task ended abnormally: {}", e);
        }
        self.server.shutdown().await;
        self.bridge.dispose();
        self.engine.dispose().await;
        info!("Bridge host stopped");
    }
}

/// Emit `heartbeat` every `period` until `stop` fires. Emits are no-ops
/// while the document is not subscribed.
fn spawn_heartbeat(
    host_info: Arc<LocalHostInfo>,
    period: Duration,
    stop: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {
                    let uptime = host_info.uptime().as_secs();
                    match host_info.heartbeat().emit(&uptime).await {
                        Ok(true) => debug!("Heartbeat {} sent", uptime),
                        Ok(false) => {}
                        Err(e) => debug!("Heartbeat not delivered: {}", e),
                    }
                }
            }
        }
    })
}
