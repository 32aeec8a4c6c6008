//! The correlation engine.
//!
//! One [`RpcEngine`] sits on one document channel. It turns inbound strings
//! into correlated replies, dispatches inbound requests to registered
//! handlers, and tracks outbound calls until the document answers.
//!
//! # Concurrency
//!
//! There is no dispatch loop and no global lock. Every table is a `DashMap`;
//! values are cloned out before any `.await`, so shard locks are never held
//! across a suspension point. A pending call is resolved by whoever removes
//! it from the table first: the matching reply, the timeout, cancellation or
//! disposal.

use crate::error::{RpcError, RpcErrorCode};
use crate::rpc::cancellation::CancellationRegistry;
use crate::rpc::channel::{DocumentChannel, OutboundMessage};
use crate::rpc::enumerator::EnumeratorRegistry;
use crate::rpc::envelope::{
    CANCEL_REQUEST_METHOD, ENUMERATOR_ABORT_METHOD, ENUMERATOR_NEXT_PREFIX, Envelope, Incoming,
    RequestId,
};
use crate::rpc::handler::{CallContext, Handler, HandlerTarget, Reply};

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use futures_util::FutureExt;
use futures_util::future::join_all;
use log::{debug, error, info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

type PendingSender = oneshot::Sender<Result<Value, RpcError>>;

#[derive(Clone)]
struct RegisteredHandler {
    handler: Handler,
    cancellable: bool,
}

struct EngineInner {
    channel: Arc<dyn DocumentChannel>,
    handlers: DashMap<String, RegisteredHandler>,
    pending: DashMap<RequestId, PendingSender>,
    cancellations: Arc<CancellationRegistry>,
    enumerators: EnumeratorRegistry,
    call_timeout: Duration,
    disposed: AtomicBool,
}

/// JSON-RPC peer for one document.
///
/// Cheap to clone; all clones share the same tables.
#[derive(Clone)]
pub struct RpcEngine {
    inner: Arc<EngineInner>,
}

/// Non-owning handle, used by event sources that must not keep the engine alive.
#[derive(Clone)]
pub struct WeakRpcEngine {
    inner: Weak<EngineInner>,
}

impl WeakRpcEngine {
    pub fn upgrade(&self) -> Option<RpcEngine> {
        self.inner.upgrade().map(|inner| RpcEngine { inner })
    }
}

impl RpcEngine {
    pub fn new(channel: Arc<dyn DocumentChannel>) -> Self {
        Self::with_call_timeout(channel, DEFAULT_CALL_TIMEOUT)
    }

    pub fn with_call_timeout(channel: Arc<dyn DocumentChannel>, call_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                channel,
                handlers: DashMap::new(),
                pending: DashMap::new(),
                cancellations: Arc::new(CancellationRegistry::new()),
                enumerators: EnumeratorRegistry::new(),
                call_timeout,
                disposed: AtomicBool::new(false),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakRpcEngine {
        WeakRpcEngine {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn call_timeout(&self) -> Duration {
        self.inner.call_timeout
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    pub fn has_handler(&self, method: &str) -> bool {
        self.inner.handlers.contains_key(method)
    }

    /// Registered method names, sorted.
    pub fn handler_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .handlers
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    pub fn active_enumerators(&self) -> usize {
        self.inner.enumerators.len()
    }

    pub fn has_enumerator(&self, token: &str) -> bool {
        self.inner.enumerators.contains(token)
    }

    pub fn active_cancellations(&self) -> usize {
        self.inner.cancellations.len()
    }

    // ============================================
    // INBOUND
    // ============================================

    /// Process one inbound string from the document.
    ///
    /// Returns `true` if the text was an RPC message this engine handled.
    /// Parse failures, foreign messages and replies for unknown calls return
    /// `false` and never raise. Completes once every reply the message
    /// produced has been posted, so transports should spawn it.
    pub async fn process_message(&self, body: &str) -> bool {
        if body.is_empty() || self.is_disposed() {
            return false;
        }

        let value: Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(e) => {
                debug!("Ignoring non-JSON message: {}", e);
                return false;
            }
        };

        match value {
            Value::Array(items) => {
                self.process_batch(items).await;
                true
            }
            single => self.process_single(single).await,
        }
    }

    async fn process_single(&self, value: Value) -> bool {
        match Incoming::classify(value) {
            Incoming::Invalid { reason, .. } => {
                debug!("Ignoring message: {}", reason);
                false
            }
            Incoming::Reply { id, outcome } => self.resolve_pending(&id, outcome),
            Incoming::Notification { method, params } => {
                self.handle_notification(&method, params).await
            }
            Incoming::Request { id, method, params } => {
                let reply = self.reply_for(id, &method, params).await;
                self.post_reply(reply).await;
                true
            }
        }
    }

    async fn process_batch(&self, items: Vec<Value>) {
        debug!("Processing batch of {} item(s)", items.len());

        let replies = join_all(items.into_iter().map(|item| self.batch_item(item))).await;
        let replies: Vec<Value> = replies.into_iter().flatten().collect();
        if replies.is_empty() {
            return;
        }

        match serde_json::to_string(&replies) {
            Ok(json) => self.post_or_log(OutboundMessage::Response(json)).await,
            Err(e) => error!("Failed to serialize batch reply: {}", e),
        }
    }

    async fn batch_item(&self, item: Value) -> Option<Value> {
        let envelope = match Incoming::classify(item) {
            Incoming::Invalid { id: Some(id), reason } => {
                Envelope::failure(id, &RpcError::invalid_request(reason))
            }
            Incoming::Invalid { id: None, reason } => {
                debug!("Dropping invalid batch item without id: {}", reason);
                return None;
            }
            Incoming::Reply { id, outcome } => {
                self.resolve_pending(&id, outcome);
                return None;
            }
            Incoming::Notification { method, params } => {
                self.handle_notification(&method, params).await;
                return None;
            }
            Incoming::Request { id, method, params } => {
                self.reply_for(id, &method, params).await
            }
        };

        match envelope.to_value() {
            Ok(value) => Some(value),
            Err(e) => {
                error!("Failed to serialize batch item reply: {}", e);
                None
            }
        }
    }

    async fn handle_notification(&self, method: &str, params: Option<Value>) -> bool {
        match method {
            CANCEL_REQUEST_METHOD => {
                self.cancel_request(params.as_ref());
                true
            }
            ENUMERATOR_ABORT_METHOD => {
                self.abort_enumerator(params.as_ref()).await;
                true
            }
            _ if self.inner.handlers.contains_key(method) => {
                if let Err(e) = self.dispatch(None, method, params).await {
                    debug!("Notification '{}' failed: {}", method, e);
                }
                true
            }
            _ => {
                debug!("No handler for notification '{}'", method);
                false
            }
        }
    }

    fn cancel_request(&self, params: Option<&Value>) {
        // Unknown or missing ids are accepted and ignored.
        if let Some(id) = params
            .and_then(|p| p.get("id"))
            .and_then(RequestId::from_value)
        {
            self.inner.cancellations.cancel(&id);
        }
    }

    async fn abort_enumerator(&self, params: Option<&Value>) {
        if let Some(token) = params
            .and_then(|p| p.get("token"))
            .and_then(Value::as_str)
        {
            self.inner.enumerators.abort(token).await;
        }
    }

    async fn reply_for(&self, id: RequestId, method: &str, params: Option<Value>) -> Envelope {
        match self.dispatch(Some(&id), method, params).await {
            Ok(result) => Envelope::success(id, result),
            Err(e) => {
                debug!("Call '{}' ({}) failed: {}", method, id, e);
                Envelope::failure(id, &e)
            }
        }
    }

    async fn dispatch(
        &self,
        id: Option<&RequestId>,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, RpcError> {
        if let Some(token) = method.strip_prefix(ENUMERATOR_NEXT_PREFIX) {
            return self.inner.enumerators.next(token).await;
        }
        if method == CANCEL_REQUEST_METHOD {
            self.cancel_request(params.as_ref());
            return Ok(Value::Null);
        }
        if method == ENUMERATOR_ABORT_METHOD {
            self.abort_enumerator(params.as_ref()).await;
            return Ok(Value::Null);
        }

        let registered = self
            .inner
            .handlers
            .get(method)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RpcError::method_not_found(method))?;

        debug!("Dispatching '{}'", method);

        let guard = match (registered.cancellable, id) {
            (true, Some(id)) => Some(self.inner.cancellations.register(id.clone())),
            _ => None,
        };
        let cancellation = guard
            .as_ref()
            .map(|g| g.token())
            .unwrap_or_default();
        let context = CallContext {
            params,
            cancellation: cancellation.clone(),
        };

        let outcome = run_handler(&registered.handler, context).await;
        drop(guard);

        match outcome {
            Ok(Reply::Empty) => Ok(Value::Null),
            Ok(Reply::Value(value)) => Ok(value),
            Ok(Reply::Stream(enumerator)) => {
                let token = self.inner.enumerators.register(enumerator);
                Ok(json!({ "token": token }))
            }
            Err(e) if cancellation.is_cancelled() && !e.is_cancelled() => {
                debug!("'{}' failed after cancellation: {}", method, e);
                Err(RpcError::cancelled())
            }
            Err(e) => Err(e),
        }
    }

    fn resolve_pending(&self, id: &RequestId, outcome: Result<Value, RpcError>) -> bool {
        match self.inner.pending.remove(id) {
            Some((_, sender)) => {
                // The caller may have given up already; that is not an error.
                let _ = sender.send(outcome);
                true
            }
            None => {
                debug!("Discarding reply for unknown call {}", id);
                false
            }
        }
    }

    async fn post_reply(&self, envelope: Envelope) {
        match envelope.to_json() {
            Ok(json) => self.post_or_log(OutboundMessage::Response(json)).await,
            Err(e) => error!("Failed to serialize reply: {}", e),
        }
    }

    async fn post_or_log(&self, message: OutboundMessage) {
        if let Err(e) = self.inner.channel.post(message).await {
            error!("Failed to post reply to document: {}", e);
        }
    }

    // ============================================
    // OUTBOUND
    // ============================================

    /// Call a method implemented by the document.
    ///
    /// Fails with the document's `(code, message)` on an error reply, with
    /// Timeout after the configured wait, or with Cancelled if the engine is
    /// disposed while waiting.
    pub async fn invoke(&self, method: &str, params: Option<Value>) -> Result<Value, RpcError> {
        self.call(method, params, None).await
    }

    /// Like [`invoke`](Self::invoke) with any serializable argument object.
    pub async fn invoke_with<A: Serialize>(&self, method: &str, args: &A) -> Result<Value, RpcError> {
        let params = serde_json::to_value(args)?;
        self.invoke(method, Some(params)).await
    }

    /// Invoke and deserialize the result. A null result is `None`.
    pub async fn invoke_as<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<Option<R>, RpcError> {
        let result = self.invoke(method, params).await?;
        if result.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(result)?))
    }

    /// Invoke with a cancellation signal. When it fires the call is
    /// forgotten, the document is sent `$/cancelRequest`, and the call fails
    /// with Cancelled.
    pub async fn invoke_with_cancel(
        &self,
        method: &str,
        params: Option<Value>,
        cancellation: CancellationToken,
    ) -> Result<Value, RpcError> {
        self.call(method, params, Some(cancellation)).await
    }

    /// Fire-and-forget notification.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), RpcError> {
        let json = Envelope::notification(method, params).to_json()?;
        self.post(OutboundMessage::Request(json)).await
    }

    /// Push a raw script (stubs, runtime) into the document.
    pub async fn push_script(&self, script: String) -> Result<(), RpcError> {
        self.post(OutboundMessage::Script(script)).await
    }

    async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        cancellation: Option<CancellationToken>,
    ) -> Result<Value, RpcError> {
        if self.is_disposed() {
            return Err(disposed_error());
        }
        if cancellation.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(RpcError::cancelled());
        }

        let id = RequestId::generate();
        let (sender, receiver) = oneshot::channel();
        self.inner.pending.insert(id.clone(), sender);
        let _pending = PendingGuard {
            engine: self,
            id: id.clone(),
        };

        debug!("Invoking '{}' ({})", method, id);
        let json = Envelope::request(id.clone(), method, params).to_json()?;
        self.post(OutboundMessage::Request(json)).await?;

        let wait = tokio::time::timeout(self.inner.call_timeout, receiver);
        let outcome = match cancellation {
            Some(token) => tokio::select! {
                outcome = wait => outcome,
                _ = token.cancelled() => {
                    self.inner.pending.remove(&id);
                    let params = json!({ "id": id });
                    if let Err(e) = self.notify(CANCEL_REQUEST_METHOD, Some(params)).await {
                        warn!("Failed to send cancellation for '{}' ({}): {}", method, id, e);
                    }
                    return Err(RpcError::cancelled());
                }
            },
            None => wait.await,
        };

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(disposed_error()),
            Err(_) => {
                warn!("Call '{}' ({}) timed out", method, id);
                Err(RpcError::timeout(method))
            }
        }
    }

    async fn post(&self, message: OutboundMessage) -> Result<(), RpcError> {
        self.inner
            .channel
            .post(message)
            .await
            .map_err(|e| RpcError::internal(e.to_string()))
    }

    // ============================================
    // LIFECYCLE
    // ============================================

    /// Fail every pending call with Cancelled, cancel in-flight handlers and
    /// abort every enumerator. Further messages are ignored.
    pub async fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let ids: Vec<RequestId> = self
            .inner
            .pending
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for id in ids {
            self.resolve_pending(&id, Err(disposed_error()));
        }

        self.inner.cancellations.cancel_all();
        self.inner.enumerators.abort_all().await;
        self.inner.handlers.clear();

        info!("RPC engine disposed");
    }
}

impl HandlerTarget for RpcEngine {
    fn handle(&self, method: &str, handler: Handler) {
        self.register(method, handler, false);
    }

    fn handle_cancellable(&self, method: &str, handler: Handler) {
        self.register(method, handler, true);
    }

    fn remove_handler(&self, method: &str) -> bool {
        self.inner.handlers.remove(method).is_some()
    }

    fn engine(&self) -> WeakRpcEngine {
        self.downgrade()
    }
}

impl RpcEngine {
    fn register(&self, method: &str, handler: Handler, cancellable: bool) {
        let previous = self.inner.handlers.insert(
            method.to_string(),
            RegisteredHandler {
                handler,
                cancellable,
            },
        );
        if previous.is_some() {
            warn!("Handler for '{}' replaced", method);
        } else {
            debug!("Handler for '{}' registered", method);
        }
    }
}

struct PendingGuard<'a> {
    engine: &'a RpcEngine,
    id: RequestId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.engine.inner.pending.remove(&self.id);
    }
}

async fn run_handler(handler: &Handler, context: CallContext) -> Result<Reply, RpcError> {
    let future = match std::panic::catch_unwind(AssertUnwindSafe(|| handler(context))) {
        Ok(future) => future,
        Err(payload) => return Err(RpcError::internal(panic_message(payload.as_ref()))),
    };
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(payload) => Err(RpcError::internal(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Handler panicked".to_string()
    }
}

#[track_caller]
fn disposed_error() -> RpcError {
    RpcError::from_code(RpcErrorCode::Cancelled, "RPC engine disposed")
}
