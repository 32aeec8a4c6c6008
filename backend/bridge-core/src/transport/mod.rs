//! Transports that carry the string channel.

mod connection_state;
mod handle;
pub mod websocket;

pub use handle::WebSocketServerHandle;
pub use websocket::{WebSocketChannel, start_websocket_server};
