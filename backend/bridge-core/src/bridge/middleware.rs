//! Interceptors wrapped around exposed handlers.
//!
//! Chains are built once per expose. The first interceptor registered runs
//! outermost; the built-in rate limiter, when configured, precedes all of them.

use crate::error::RpcError;
use crate::rpc::handler::{CallContext, Handler, HandlerFuture};

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use log::debug;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Per-call state seen by interceptors.
#[derive(Debug, Clone)]
pub struct MiddlewareContext {
    pub service_name: String,
    pub method_name: String,
    pub params: Option<Value>,
    pub cancellation: CancellationToken,
    /// Scratch space for interceptors to share data along the chain.
    pub properties: HashMap<String, Value>,
}

/// The rest of the chain.
pub type Next = Box<dyn FnOnce(MiddlewareContext) -> HandlerFuture + Send>;

pub trait BridgeMiddleware: Send + Sync {
    /// Handle the call, usually by calling `next`. Returning without calling
    /// it short-circuits the chain.
    fn invoke(&self, context: MiddlewareContext, next: Next) -> HandlerFuture;
}

/// Sliding-window limit shared by every method of one exposed service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub max_calls: usize,
    pub window: Duration,
}

impl RateLimit {
    pub fn new(max_calls: usize, window: Duration) -> Self {
        Self { max_calls, window }
    }
}

/// Options applied when exposing one service.
#[derive(Clone, Default)]
pub struct BridgeOptions {
    pub rate_limit: Option<RateLimit>,
    pub middleware: Vec<Arc<dyn BridgeMiddleware>>,
}

impl BridgeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rate_limit(mut self, max_calls: usize, window: Duration) -> Self {
        self.rate_limit = Some(RateLimit::new(max_calls, window));
        self
    }

    pub fn with_middleware(mut self, middleware: Arc<dyn BridgeMiddleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Rate limiter first, then the caller's interceptors in order.
    pub(crate) fn build_chain(&self) -> Arc<[Arc<dyn BridgeMiddleware>]> {
        let limiter = self
            .rate_limit
            .map(|limit| Arc::new(RateLimitMiddleware::new(limit)) as Arc<dyn BridgeMiddleware>);
        limiter
            .into_iter()
            .chain(self.middleware.iter().cloned())
            .collect()
    }
}

pub struct RateLimitMiddleware {
    limit: RateLimit,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimitMiddleware {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            calls: Mutex::new(VecDeque::with_capacity(limit.max_calls)),
        }
    }

    /// Record a call at `now`, or fail with RateLimited when the window is full.
    pub fn try_acquire(&self, now: Instant) -> Result<(), RpcError> {
        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        while let Some(oldest) = calls.front() {
            if now.saturating_duration_since(*oldest) > self.limit.window {
                calls.pop_front();
            } else {
                break;
            }
        }
        if calls.len() >= self.limit.max_calls {
            return Err(RpcError::rate_limited());
        }
        calls.push_back(now);
        Ok(())
    }
}

impl BridgeMiddleware for RateLimitMiddleware {
    fn invoke(&self, context: MiddlewareContext, next: Next) -> HandlerFuture {
        match self.try_acquire(Instant::now()) {
            Ok(()) => next(context),
            Err(error) => {
                debug!(
                    "Rate limit hit for {}.{}",
                    context.service_name, context.method_name
                );
                async move { Err(error) }.boxed()
            }
        }
    }
}

/// Wrap `inner` in `chain`, outermost first.
pub(crate) fn compose(
    chain: Arc<[Arc<dyn BridgeMiddleware>]>,
    service_name: String,
    method_name: String,
    inner: Handler,
) -> Handler {
    if chain.is_empty() {
        return inner;
    }
    Arc::new(move |call: CallContext| {
        let context = MiddlewareContext {
            service_name: service_name.clone(),
            method_name: method_name.clone(),
            params: call.params,
            cancellation: call.cancellation,
            properties: HashMap::new(),
        };
        run_from(Arc::clone(&chain), 0, context, Arc::clone(&inner))
    })
}

fn run_from(
    chain: Arc<[Arc<dyn BridgeMiddleware>]>,
    index: usize,
    context: MiddlewareContext,
    inner: Handler,
) -> HandlerFuture {
    let Some(middleware) = chain.get(index).cloned() else {
        return inner(CallContext {
            params: context.params,
            cancellation: context.cancellation,
        });
    };
    let next: Next = Box::new(move |context| run_from(chain, index + 1, context, inner));
    middleware.invoke(context, next)
}
