//! The handler target binders see during expose.
//!
//! It wraps each handler in the service's middleware chain and tracer before
//! it reaches the engine, and remembers what was registered so a failed
//! expose or a remove can take it back out.

use crate::bridge::middleware::{BridgeMiddleware, compose};
use crate::bridge::tracer::BridgeTracer;
use crate::rpc::handler::{CallContext, Handler, HandlerFuture, HandlerTarget, Reply};
use crate::rpc::{RpcEngine, WeakRpcEngine};

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use futures_util::FutureExt;

pub(crate) struct BindingTarget {
    engine: RpcEngine,
    service_name: String,
    chain: Arc<[Arc<dyn BridgeMiddleware>]>,
    tracer: Arc<dyn BridgeTracer>,
    registered: Mutex<Vec<String>>,
}

impl BindingTarget {
    pub(crate) fn new(
        engine: RpcEngine,
        service_name: String,
        chain: Arc<[Arc<dyn BridgeMiddleware>]>,
        tracer: Arc<dyn BridgeTracer>,
    ) -> Self {
        Self {
            engine,
            service_name,
            chain,
            tracer,
            registered: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn registered(&self) -> Vec<String> {
        self.registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove everything registered through this target.
    pub(crate) fn rollback(&self) {
        for method in self.registered() {
            self.engine.remove_handler(&method);
        }
        self.registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn wrap(&self, method: &str, handler: Handler) -> Handler {
        let method_name = method
            .strip_prefix(self.service_name.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(method)
            .to_string();
        let composed = compose(
            Arc::clone(&self.chain),
            self.service_name.clone(),
            method_name.clone(),
            handler,
        );
        traced(
            Arc::clone(&self.tracer),
            self.service_name.clone(),
            method_name,
            composed,
        )
    }

    fn record(&self, method: &str) {
        let mut registered = self.registered.lock().unwrap_or_else(PoisonError::into_inner);
        if !registered.iter().any(|m| m == method) {
            registered.push(method.to_string());
        }
    }
}

impl HandlerTarget for BindingTarget {
    fn handle(&self, method: &str, handler: Handler) {
        self.engine.handle(method, self.wrap(method, handler));
        self.record(method);
    }

    fn handle_cancellable(&self, method: &str, handler: Handler) {
        self.engine.handle_cancellable(method, self.wrap(method, handler));
        self.record(method);
    }

    fn remove_handler(&self, method: &str) -> bool {
        self.registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|m| m != method);
        self.engine.remove_handler(method)
    }

    fn engine(&self) -> WeakRpcEngine {
        self.engine.downgrade()
    }
}

fn traced(
    tracer: Arc<dyn BridgeTracer>,
    service_name: String,
    method_name: String,
    inner: Handler,
) -> Handler {
    Arc::new(move |call: CallContext| -> HandlerFuture {
        tracer.on_export_call_start(&service_name, &method_name, call.params.as_ref());
        let started = Instant::now();
        let future = inner(call);
        let tracer = Arc::clone(&tracer);
        let service_name = service_name.clone();
        let method_name = method_name.clone();
        async move {
            let outcome = future.await;
            match &outcome {
                Ok(reply) => tracer.on_export_call_end(
                    &service_name,
                    &method_name,
                    started.elapsed(),
                    reply_kind(reply),
                ),
                Err(error) => tracer.on_export_call_error(
                    &service_name,
                    &method_name,
                    started.elapsed(),
                    error,
                ),
            }
            outcome
        }
        .boxed()
    })
}

fn reply_kind(reply: &Reply) -> &'static str {
    match reply {
        Reply::Empty => "empty",
        Reply::Value(_) => "value",
        Reply::Stream(_) => "stream",
    }
}
