//! Handle to a running WebSocket listener.

use std::net::SocketAddr;

use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Returned by [`start_websocket_server`](crate::transport::start_websocket_server).
///
/// Dropping the handle leaves the listener running; call
/// [`shutdown`](Self::shutdown) to stop accepting connections.
pub struct WebSocketServerHandle {
    pub(crate) local_addr: SocketAddr,
    pub(crate) shutdown: CancellationToken,
    pub(crate) task: JoinHandle<()>,
}

impl WebSocketServerHandle {
    /// Bound address; useful when started on port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Stop accepting connections and wait for the accept loop to exit.
    /// Established connections finish on their own.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            info!("WebSocket accept loop ended abnormally: {}", e);
        }
    }
}
