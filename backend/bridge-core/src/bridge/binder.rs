//! Binders turn an implementation into registered handlers.
//!
//! [`ServiceBinder`] is the single contract. Generated binders (from a
//! [`BinderRegistry`](crate::bridge::BinderRegistry)) and the
//! [`DescriptorBinder`] built from a [`ServiceDescriptor`] are siblings; the
//! service layer never branches on which one it holds.

use crate::bridge::arguments::{NameMatchOrder, bind_arguments};
use crate::bridge::descriptor::{
    EventAccessor, EventDescriptor, MethodDescriptor, ParamDescriptor, ReturnShape,
    ServiceDescriptor,
};
use crate::bridge::naming::{
    event_wire_name, method_wire_name, overload_name, subscribe_wire_name, to_camel_case,
    unsubscribe_wire_name,
};
use crate::bridge::stub::{self, StubEvent, StubMethod};
use crate::error::BindingError;
use crate::rpc::handler::{CallContext, Handler, HandlerFuture, HandlerTarget, Reply};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::Value;

pub trait ServiceBinder<T: ?Sized>: Send + Sync {
    fn service_name(&self) -> &str;

    /// Every wire method this binder registers.
    fn method_names(&self) -> Vec<String>;

    fn js_stub(&self) -> String;

    fn register_handlers(
        &self,
        target: &dyn HandlerTarget,
        implementation: Arc<T>,
    ) -> Result<(), BindingError>;

    /// Tear down what [`register_handlers`](Self::register_handlers) added.
    /// Returns `false` when the caller should remove the handlers it tracked.
    fn unregister_handlers(&self, _target: &dyn HandlerTarget) -> bool {
        false
    }

    /// Detach event sources from the engine.
    fn disconnect(&self, _implementation: &T) {}

    fn is_generated(&self) -> bool {
        false
    }
}

struct BoundMethod<T: ?Sized> {
    js_name: String,
    wire_name: String,
    descriptor: MethodDescriptor<T>,
}

struct BoundEvent<T: ?Sized> {
    js_name: String,
    subscribe: String,
    unsubscribe: String,
    notification: String,
    accessor: EventAccessor<T>,
}

/// Introspection binder over a [`ServiceDescriptor`].
pub struct DescriptorBinder<T: ?Sized> {
    service_name: String,
    methods: Vec<BoundMethod<T>>,
    events: Vec<BoundEvent<T>>,
    match_order: NameMatchOrder,
}

impl<T: ?Sized + Send + Sync + 'static> DescriptorBinder<T> {
    /// Resolve wire names, including `$N` suffixes for overloads.
    ///
    /// # Errors
    ///
    /// [`BindingError::DuplicateMethod`] when two overloads share a name and
    /// parameter count.
    pub fn new(
        service_name: String,
        descriptor: ServiceDescriptor<T>,
        match_order: NameMatchOrder,
    ) -> Result<Self, BindingError> {
        let mut lowest_arity: HashMap<String, usize> = HashMap::new();
        let mut seen: HashSet<(String, usize)> = HashSet::new();
        for method in &descriptor.methods {
            let name = to_camel_case(method.name);
            let arity = method.arity();
            if !seen.insert((name.clone(), arity)) {
                return Err(BindingError::duplicate_method(method_wire_name(
                    &service_name,
                    &name,
                )));
            }
            lowest_arity
                .entry(name)
                .and_modify(|lowest| *lowest = (*lowest).min(arity))
                .or_insert(arity);
        }

        let methods = descriptor
            .methods
            .into_iter()
            .map(|descriptor| {
                let name = to_camel_case(descriptor.name);
                let arity = descriptor.arity();
                let is_lowest = lowest_arity.get(&name) == Some(&arity);
                let js_name = overload_name(&name, arity, is_lowest);
                BoundMethod {
                    wire_name: method_wire_name(&service_name, &js_name),
                    js_name,
                    descriptor,
                }
            })
            .collect();

        let events = descriptor
            .events
            .into_iter()
            .map(|EventDescriptor { name, accessor }| BoundEvent {
                js_name: to_camel_case(name),
                subscribe: subscribe_wire_name(&service_name, name),
                unsubscribe: unsubscribe_wire_name(&service_name, name),
                notification: event_wire_name(&service_name, name),
                accessor,
            })
            .collect();

        Ok(Self {
            service_name,
            methods,
            events,
            match_order,
        })
    }

    fn method_handler(&self, method: &BoundMethod<T>, implementation: Arc<T>) -> Handler {
        let params: Arc<[ParamDescriptor]> = method.descriptor.params.clone().into();
        let invoker = Arc::clone(&method.descriptor.invoker);
        let order = self.match_order;
        Arc::new(move |call: CallContext| -> HandlerFuture {
            match bind_arguments(&params, call.params.as_ref(), order) {
                Ok(args) => invoker(Arc::clone(&implementation), args, call.cancellation),
                Err(error) => async move { Err(error) }.boxed(),
            }
        })
    }
}

fn event_toggle<T: ?Sized + Send + Sync + 'static>(
    implementation: Arc<T>,
    accessor: EventAccessor<T>,
    subscribed: bool,
) -> Handler {
    Arc::new(move |_call: CallContext| -> HandlerFuture {
        accessor(&*implementation).set_subscribed(subscribed);
        async { Ok(Reply::Value(Value::Bool(true))) }.boxed()
    })
}

impl<T: ?Sized + Send + Sync + 'static> ServiceBinder<T> for DescriptorBinder<T> {
    fn service_name(&self) -> &str {
        &self.service_name
    }

    fn method_names(&self) -> Vec<String> {
        let methods = self.methods.iter().map(|m| m.wire_name.clone());
        let events = self
            .events
            .iter()
            .flat_map(|e| [e.subscribe.clone(), e.unsubscribe.clone()]);
        methods.chain(events).collect()
    }

    fn js_stub(&self) -> String {
        let methods: Vec<StubMethod> = self
            .methods
            .iter()
            .map(|m| StubMethod {
                js_name: m.js_name.clone(),
                wire_name: m.wire_name.clone(),
                streaming: m.descriptor.returns == ReturnShape::Stream,
            })
            .collect();
        let events: Vec<StubEvent> = self
            .events
            .iter()
            .map(|e| StubEvent {
                js_name: e.js_name.clone(),
                subscribe: e.subscribe.clone(),
                unsubscribe: e.unsubscribe.clone(),
                notification: e.notification.clone(),
            })
            .collect();
        stub::service_stub(&self.service_name, &methods, &events)
    }

    fn register_handlers(
        &self,
        target: &dyn HandlerTarget,
        implementation: Arc<T>,
    ) -> Result<(), BindingError> {
        for method in &self.methods {
            let handler = self.method_handler(method, Arc::clone(&implementation));
            if method.descriptor.is_cancellable() {
                target.handle_cancellable(&method.wire_name, handler);
            } else {
                target.handle(&method.wire_name, handler);
            }
        }

        let engine = target.engine();
        for event in &self.events {
            (event.accessor)(&*implementation).connect(engine.clone(), event.notification.clone());
            target.handle(
                &event.subscribe,
                event_toggle(Arc::clone(&implementation), event.accessor, true),
            );
            target.handle(
                &event.unsubscribe,
                event_toggle(Arc::clone(&implementation), event.accessor, false),
            );
        }
        Ok(())
    }

    fn disconnect(&self, implementation: &T) {
        for event in &self.events {
            (event.accessor)(implementation).disconnect();
        }
    }
}
