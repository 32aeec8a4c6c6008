//! Service interfaces shared by the binding, middleware and proxy tests.

use bridge_core::bridge::{
    BridgeContract, BridgeEvent, ContractInfo, EventDescriptor, EventSource, ImportDispatcher,
    MethodDescriptor, ParamDescriptor, ProxyArg, ReturnShape, ServiceBinder, ServiceDescriptor,
};
use bridge_core::rpc::{CallContext, HandlerTarget, Reply, handler};
use bridge_core::{BindingError, RpcError};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::json;

// ----------------------------------------------------------------------------
// Exported: Greeter
// ----------------------------------------------------------------------------

pub trait Greeter: Send + Sync {
    fn greet(&self, name: String) -> String;
    fn shout(&self, name: String, repeat_count: u32) -> String;
    fn greeted(&self) -> &BridgeEvent<String>;
}

fn greeted_event<'a>(service: &'a (dyn Greeter + 'static)) -> &'a dyn EventSource {
    service.greeted()
}

impl BridgeContract for dyn Greeter {
    fn contract() -> ContractInfo {
        ContractInfo::exported("Greeter")
    }

    fn descriptor() -> Option<ServiceDescriptor<Self>> {
        let greet = MethodDescriptor::new(
            "greet",
            ReturnShape::Value,
            |service: Arc<dyn Greeter>, args, _| async move {
                let name: String = args.get(0)?;
                Reply::value(service.greet(name))
            },
        )
        .param(ParamDescriptor::of::<String>("name"));

        let shout = MethodDescriptor::new(
            "shout",
            ReturnShape::Value,
            |service: Arc<dyn Greeter>, args, _| async move {
                let name: String = args.get(0)?;
                let repeat_count: u32 = args.get(1)?;
                Reply::value(service.shout(name, repeat_count))
            },
        )
        .param(ParamDescriptor::of::<String>("name"))
        .param(ParamDescriptor::of::<u32>("repeat_count").with_default(json!(1)));

        Some(
            ServiceDescriptor::new()
                .method(greet)
                .method(shout)
                .event(EventDescriptor::new("greeted", greeted_event)),
        )
    }
}

#[derive(Default)]
pub struct FriendlyGreeter {
    pub calls: AtomicUsize,
    pub greeted: BridgeEvent<String>,
}

impl Greeter for FriendlyGreeter {
    fn greet(&self, name: String) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        format!("Hello, {name}!")
    }

    fn shout(&self, name: String, repeat_count: u32) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        format!("HEY {}", name.to_uppercase()).repeat(repeat_count as usize)
    }

    fn greeted(&self) -> &BridgeEvent<String> {
        &self.greeted
    }
}

// ----------------------------------------------------------------------------
// Exported: Foo (middleware scenario)
// ----------------------------------------------------------------------------

pub trait Foo: Send + Sync {
    fn bar(&self, x: i64) -> i64;
    fn baz(&self, x: i64) -> i64;
}

impl BridgeContract for dyn Foo {
    fn contract() -> ContractInfo {
        ContractInfo::exported("Foo")
    }

    fn descriptor() -> Option<ServiceDescriptor<Self>> {
        let method = |name: &'static str, call: fn(&dyn Foo, i64) -> i64| {
            MethodDescriptor::new(
                name,
                ReturnShape::Value,
                move |service: Arc<dyn Foo>, args, _| async move {
                    let x: i64 = args.get(0)?;
                    Reply::value(call(&*service, x))
                },
            )
            .param(ParamDescriptor::required("x"))
        };
        Some(
            ServiceDescriptor::new()
                .method(method("bar", |foo, x| foo.bar(x)))
                .method(method("baz", |foo, x| foo.baz(x))),
        )
    }
}

pub struct Doubler;

impl Foo for Doubler {
    fn bar(&self, x: i64) -> i64 {
        x * 2
    }

    fn baz(&self, x: i64) -> i64 {
        x * 3
    }
}

/// Hand-written stand-in for a build-time generated `Foo` binder.
///
/// Registers `Foo.bar` and `Foo.baz` under its own names (answering with a
/// `generated` marker), tears its handlers down itself, and counts hook calls.
/// With `fail_after` set, registration stops with an error after that many
/// handlers.
#[derive(Default)]
pub struct GeneratedFooBinder {
    pub fail_after: Option<usize>,
    pub unregistered: AtomicUsize,
    pub disconnected: AtomicUsize,
}

pub const GENERATED_FOO_METHODS: [&str; 2] = ["Foo.bar", "Foo.baz"];

impl GeneratedFooBinder {
    pub fn failing_after(handlers: usize) -> Self {
        Self {
            fail_after: Some(handlers),
            ..Self::default()
        }
    }
}

impl ServiceBinder<dyn Foo> for GeneratedFooBinder {
    fn service_name(&self) -> &str {
        "Foo"
    }

    fn method_names(&self) -> Vec<String> {
        GENERATED_FOO_METHODS.iter().map(|m| m.to_string()).collect()
    }

    fn js_stub(&self) -> String {
        "/* generated */ window.agWebView.bridge[\"Foo\"] = {};".to_string()
    }

    fn register_handlers(
        &self,
        target: &dyn HandlerTarget,
        implementation: Arc<dyn Foo>,
    ) -> Result<(), BindingError> {
        let calls: [fn(&dyn Foo, i64) -> i64; 2] = [|foo, x| foo.bar(x), |foo, x| foo.baz(x)];
        for (index, (method, call)) in GENERATED_FOO_METHODS.iter().zip(calls).enumerate() {
            if self.fail_after == Some(index) {
                return Err(BindingError::registration("Foo", "generated binder gave up"));
            }
            let service = Arc::clone(&implementation);
            target.handle(
                method,
                handler(move |call_context: CallContext| {
                    let service = Arc::clone(&service);
                    async move {
                        let x = call_context
                            .params
                            .as_ref()
                            .and_then(|p| p.get("x"))
                            .and_then(|x| x.as_i64())
                            .ok_or_else(|| RpcError::invalid_request("x is required"))?;
                        Reply::value(json!({ "generated": true, "value": call(&*service, x) }))
                    }
                }),
            );
        }
        Ok(())
    }

    fn unregister_handlers(&self, target: &dyn HandlerTarget) -> bool {
        for method in GENERATED_FOO_METHODS {
            target.remove_handler(method);
        }
        self.unregistered.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn disconnect(&self, _implementation: &dyn Foo) {
        self.disconnected.fetch_add(1, Ordering::SeqCst);
    }

    fn is_generated(&self) -> bool {
        true
    }
}

// ----------------------------------------------------------------------------
// Types that cannot be exposed
// ----------------------------------------------------------------------------

pub trait Unmarked: Send + Sync {}

impl BridgeContract for dyn Unmarked {
    fn contract() -> ContractInfo {
        ContractInfo::unmarked("Unmarked")
    }
}

pub struct Concrete;

impl BridgeContract for Concrete {
    fn contract() -> ContractInfo {
        ContractInfo::exported("Concrete").concrete()
    }
}

/// Marked, but with no binder of any kind.
pub trait Bare: Send + Sync {}

impl BridgeContract for dyn Bare {
    fn contract() -> ContractInfo {
        ContractInfo::exported("Bare")
    }
}

pub struct Nothing;

impl Bare for Nothing {}

// ----------------------------------------------------------------------------
// Imported: DocumentView
// ----------------------------------------------------------------------------

pub trait DocumentView: Send + Sync {
    fn title(&self, tab_index: u32) -> BoxFuture<'_, Result<String, RpcError>>;
    fn scroll_to(&self, line_number: u32) -> BoxFuture<'_, Result<(), RpcError>>;
    /// Streams cannot cross to the document; calling this always fails.
    fn lines(&self) -> BoxFuture<'_, Result<(), RpcError>>;
}

pub struct DocumentViewProxy {
    dispatcher: ImportDispatcher,
}

impl From<ImportDispatcher> for DocumentViewProxy {
    fn from(dispatcher: ImportDispatcher) -> Self {
        Self { dispatcher }
    }
}

impl DocumentView for DocumentViewProxy {
    fn title(&self, tab_index: u32) -> BoxFuture<'_, Result<String, RpcError>> {
        async move {
            let args = vec![ProxyArg::named("tab_index", &tab_index)?];
            self.dispatcher.call_value("title", args).await
        }
        .boxed()
    }

    fn scroll_to(&self, line_number: u32) -> BoxFuture<'_, Result<(), RpcError>> {
        async move {
            let args = vec![ProxyArg::named("line_number", &line_number)?];
            self.dispatcher.call_unit("scroll_to", args).await
        }
        .boxed()
    }

    fn lines(&self) -> BoxFuture<'_, Result<(), RpcError>> {
        async move {
            self.dispatcher
                .call("lines", ReturnShape::Stream, Vec::new())
                .await
                .map(|_| ())
        }
        .boxed()
    }
}

impl BridgeContract for dyn DocumentView {
    fn contract() -> ContractInfo {
        ContractInfo::imported("DocumentView")
    }

    fn dynamic_proxy(dispatcher: ImportDispatcher) -> Option<Arc<Self>> {
        Some(Arc::new(DocumentViewProxy::from(dispatcher)))
    }
}

/// Imported, with no wrapper available.
pub trait Unwrapped: Send + Sync {}

impl BridgeContract for dyn Unwrapped {
    fn contract() -> ContractInfo {
        ContractInfo::imported("Unwrapped")
    }
}
