pub mod binding;
pub mod config;
pub mod rpc;
pub mod transport;
pub mod ws;

pub use binding::BindingError;
pub use rpc::{RpcError, RpcErrorCode};
pub use transport::TransportError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Rpc(#[from] rpc::RpcError),

    #[error(transparent)]
    Binding(#[from] binding::BindingError),

    #[error(transparent)]
    Transport(#[from] transport::TransportError),

    #[error(transparent)]
    Ws(#[from] ws::WsError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),
}
