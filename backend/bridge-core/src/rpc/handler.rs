//! Inbound handler types.

use crate::error::RpcError;
use crate::rpc::engine::WeakRpcEngine;
use crate::rpc::enumerator::Enumerator;

use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// What a handler receives for one inbound call.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub params: Option<Value>,
    /// Fires when the document sends `$/cancelRequest` for this call.
    /// Never fires for handlers registered without cancellation.
    pub cancellation: CancellationToken,
}

impl CallContext {
    pub fn new(params: Option<Value>) -> Self {
        Self {
            params,
            cancellation: CancellationToken::new(),
        }
    }
}

/// A handler's successful outcome.
pub enum Reply {
    /// Unit completion; the reply carries no `result`.
    Empty,
    Value(Value),
    /// A lazy sequence served through the enumerator protocol.
    Stream(Box<dyn Enumerator>),
}

impl Reply {
    pub fn value<T: Serialize>(value: T) -> Result<Self, RpcError> {
        Ok(Reply::Value(serde_json::to_value(value)?))
    }

    pub fn stream(enumerator: impl Enumerator + 'static) -> Self {
        Reply::Stream(Box::new(enumerator))
    }
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::Empty => formatter.write_str("Empty"),
            Reply::Value(value) => formatter.debug_tuple("Value").field(value).finish(),
            Reply::Stream(_) => formatter.write_str("Stream(..)"),
        }
    }
}

pub type HandlerFuture = BoxFuture<'static, Result<Reply, RpcError>>;
pub type Handler = Arc<dyn Fn(CallContext) -> HandlerFuture + Send + Sync>;

/// Box an async closure as a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(CallContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply, RpcError>> + Send + 'static,
{
    Arc::new(move |context| f(context).boxed())
}

/// Anything inbound methods can be registered on.
///
/// Implemented by the engine itself and by the binding layer's wrapping
/// target, which layers middleware around each handler.
pub trait HandlerTarget: Send + Sync {
    fn handle(&self, method: &str, handler: Handler);

    /// Register a handler whose [`CallContext::cancellation`] is wired to
    /// `$/cancelRequest`.
    fn handle_cancellable(&self, method: &str, handler: Handler);

    /// Returns `true` if a handler was registered under `method`.
    fn remove_handler(&self, method: &str) -> bool;

    /// The engine handlers end up on, for sources that push notifications.
    fn engine(&self) -> WeakRpcEngine;
}
