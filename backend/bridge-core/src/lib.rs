//! Typed, bidirectional RPC between a native host and an embedded web document.
//!
//! - [`rpc`]: JSON-RPC 2.0 correlation engine, cancellation and streaming
//! - [`bridge`]: exposing and importing typed service interfaces
//! - [`transport`]: a WebSocket implementation of the document channel
//! - [`config`]: `bridge.json` settings

pub mod bridge;
pub mod config;
pub mod error;
pub mod rpc;
pub mod transport;

#[cfg(test)]
mod tests;

pub use bridge::{BridgeContract, BridgeOptions, BridgeService};
pub use config::BridgeConfig;
pub use error::{BindingError, CoreError, RpcError, RpcErrorCode};
pub use rpc::{DocumentChannel, OutboundMessage, RpcEngine};
