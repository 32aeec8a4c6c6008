//! Exposing host services to the document and importing document services.
//!
//! Per interface type the lifecycle is `Unbound → Exposed → Unbound`.
//! Expose and remove are serialized by one registration lock; call dispatch
//! never touches it.

use crate::bridge::arguments::NameMatchOrder;
use crate::bridge::binder::{DescriptorBinder, ServiceBinder};
use crate::bridge::contract::{BridgeContract, ContractInfo, ContractKind};
use crate::bridge::middleware::BridgeOptions;
use crate::bridge::proxy::ImportDispatcher;
use crate::bridge::registry::BinderRegistry;
use crate::bridge::stub;
use crate::bridge::target::BindingTarget;
use crate::bridge::tracer::{BridgeTracer, LogTracer, NullBridgeTracer};
use crate::config::BindingConfig;
use crate::error::BindingError;
use crate::rpc::RpcEngine;
use crate::rpc::handler::HandlerTarget;

use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use log::{debug, info, warn};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// Type-erased view of one exposed service.
trait ExposedEntry: Send + Sync {
    fn service_name(&self) -> &str;
    fn method_names(&self) -> &[String];
    fn is_generated(&self) -> bool;
    /// Unregister handlers and disconnect events.
    fn teardown(&self, engine: &RpcEngine);
}

struct Exposed<T: ?Sized> {
    service_name: String,
    binder: Arc<dyn ServiceBinder<T>>,
    implementation: Arc<T>,
    method_names: Vec<String>,
}

impl<T: ?Sized + Send + Sync + 'static> ExposedEntry for Exposed<T> {
    fn service_name(&self) -> &str {
        &self.service_name
    }

    fn method_names(&self) -> &[String] {
        &self.method_names
    }

    fn is_generated(&self) -> bool {
        self.binder.is_generated()
    }

    fn teardown(&self, engine: &RpcEngine) {
        if !self.binder.unregister_handlers(engine) {
            for method in &self.method_names {
                engine.remove_handler(method);
            }
        }
        self.binder.disconnect(&self.implementation);
    }
}

enum Slot {
    /// Expose in progress; handlers not yet registered.
    Reserved(String),
    Active(Box<dyn ExposedEntry>),
}

impl Slot {
    fn service_name(&self) -> &str {
        match self {
            Slot::Reserved(name) => name,
            Slot::Active(entry) => entry.service_name(),
        }
    }
}

/// Stub and removal scripts, delivered to the document in the order queued.
///
/// One drain task per bridge, started by the first push inside a runtime.
struct ScriptQueue {
    sender: UnboundedSender<String>,
    receiver: Mutex<Option<UnboundedReceiver<String>>>,
}

impl ScriptQueue {
    fn new() -> Self {
        let (sender, receiver) = unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
        }
    }

    fn push(&self, engine: &RpcEngine, script: String) {
        {
            let mut receiver = self.receiver.lock().unwrap_or_else(PoisonError::into_inner);
            if receiver.is_some() {
                let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                    warn!("No async runtime; script not pushed to document");
                    return;
                };
                if let Some(receiver) = receiver.take() {
                    runtime.spawn(drain_scripts(engine.clone(), receiver));
                }
            }
        }
        if self.sender.send(script).is_err() {
            warn!("Script queue closed; script not pushed to document");
        }
    }
}

async fn drain_scripts(engine: RpcEngine, mut receiver: UnboundedReceiver<String>) {
    while let Some(script) = receiver.recv().await {
        if let Err(e) = engine.push_script(script).await {
            warn!("Failed to push script to document: {}", e);
        }
    }
}

struct ServiceInner {
    engine: RpcEngine,
    registry: BinderRegistry,
    tracer: Arc<dyn BridgeTracer>,
    match_order: NameMatchOrder,
    exposed: DashMap<TypeId, Slot>,
    proxies: DashMap<TypeId, Box<dyn Any + Send + Sync>>,
    registration: Mutex<()>,
    scripts: ScriptQueue,
    disposed: AtomicBool,
}

/// Binding layer over one [`RpcEngine`].
#[derive(Clone)]
pub struct BridgeService {
    inner: Arc<ServiceInner>,
}

pub struct BridgeServiceBuilder {
    engine: RpcEngine,
    registry: BinderRegistry,
    tracer: Arc<dyn BridgeTracer>,
    match_order: NameMatchOrder,
}

impl BridgeServiceBuilder {
    pub fn registry(mut self, registry: BinderRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn tracer(mut self, tracer: Arc<dyn BridgeTracer>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn match_order(mut self, match_order: NameMatchOrder) -> Self {
        self.match_order = match_order;
        self
    }

    /// Apply `binding.*` settings: name match order and call tracing.
    pub fn config(mut self, config: &BindingConfig) -> Self {
        self.match_order = config.parameter_match;
        if config.trace_calls {
            self.tracer = Arc::new(LogTracer);
        }
        self
    }

    pub fn build(self) -> BridgeService {
        BridgeService {
            inner: Arc::new(ServiceInner {
                engine: self.engine,
                registry: self.registry,
                tracer: self.tracer,
                match_order: self.match_order,
                exposed: DashMap::new(),
                proxies: DashMap::new(),
                registration: Mutex::new(()),
                scripts: ScriptQueue::new(),
                disposed: AtomicBool::new(false),
            }),
        }
    }
}

impl BridgeService {
    pub fn new(engine: RpcEngine) -> Self {
        Self::builder(engine).build()
    }

    pub fn builder(engine: RpcEngine) -> BridgeServiceBuilder {
        BridgeServiceBuilder {
            engine,
            registry: BinderRegistry::new(),
            tracer: Arc::new(NullBridgeTracer),
            match_order: NameMatchOrder::default(),
        }
    }

    pub fn engine(&self) -> &RpcEngine {
        &self.inner.engine
    }

    pub fn is_exposed<T: ?Sized + 'static>(&self) -> bool {
        matches!(
            self.inner.exposed.get(&TypeId::of::<T>()).as_deref(),
            Some(Slot::Active(_))
        )
    }

    /// Wire method names registered for `T`, empty when not exposed.
    pub fn exposed_methods<T: ?Sized + 'static>(&self) -> Vec<String> {
        match self.inner.exposed.get(&TypeId::of::<T>()).as_deref() {
            Some(Slot::Active(entry)) => entry.method_names().to_vec(),
            _ => Vec::new(),
        }
    }

    pub fn exposed_services(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .exposed
            .iter()
            .map(|entry| entry.value().service_name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Make `implementation` callable from the document as interface `T`.
    ///
    /// # Errors
    ///
    /// - [`BindingError::MissingMarker`] / [`BindingError::NotAnInterface`]
    ///   when `T` is not an exported interface
    /// - [`BindingError::AlreadyExposed`] when `T` is already exposed; the
    ///   existing registration is untouched
    /// - [`BindingError::NoBinder`] when neither a generated binder nor a
    ///   descriptor exists
    /// - [`BindingError::Registration`] when a wire name is already taken
    ///
    /// Any failure after the reservation rolls back completely.
    pub fn expose<T>(
        &self,
        implementation: Arc<T>,
        options: Option<BridgeOptions>,
    ) -> Result<(), BindingError>
    where
        T: ?Sized + BridgeContract,
    {
        self.ensure_live()?;
        let contract = T::contract();
        validate_export(&contract)?;
        let service_name = contract.service_name();

        let _registration = self
            .inner
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let type_id = TypeId::of::<T>();
        match self.inner.exposed.entry(type_id) {
            Entry::Occupied(existing) => {
                warn!("Service {} is already exposed", existing.get().service_name());
                return Err(BindingError::already_exposed(service_name));
            }
            Entry::Vacant(slot) => {
                slot.insert(Slot::Reserved(service_name.clone()));
            }
        }

        match self.bind(&contract, service_name, implementation, options.unwrap_or_default()) {
            Ok((entry, stub)) => {
                self.inner.tracer.on_service_exposed(
                    entry.service_name(),
                    entry.method_names().len(),
                    entry.is_generated(),
                );
                info!(
                    "Exposed {} with {} method(s)",
                    entry.service_name(),
                    entry.method_names().len()
                );
                self.inner.exposed.insert(type_id, Slot::Active(entry));
                self.push_script(stub);
                Ok(())
            }
            Err(error) => {
                self.inner.exposed.remove(&type_id);
                Err(error)
            }
        }
    }

    /// Resolve a binder and register through a wrapping target.
    /// Returns the entry and its stub script.
    fn bind<T>(
        &self,
        contract: &ContractInfo,
        service_name: String,
        implementation: Arc<T>,
        options: BridgeOptions,
    ) -> Result<(Box<dyn ExposedEntry>, String), BindingError>
    where
        T: ?Sized + BridgeContract,
    {
        let binder = self.resolve_binder::<T>(contract, service_name)?;
        let service_name = binder.service_name().to_string();

        let taken: Vec<String> = binder
            .method_names()
            .into_iter()
            .filter(|method| self.inner.engine.has_handler(method))
            .collect();
        if !taken.is_empty() {
            return Err(BindingError::registration(
                service_name,
                format!("methods already registered: {}", taken.join(", ")),
            ));
        }

        let target = BindingTarget::new(
            self.inner.engine.clone(),
            service_name.clone(),
            options.build_chain(),
            Arc::clone(&self.inner.tracer),
        );
        if let Err(error) = binder.register_handlers(&target, Arc::clone(&implementation)) {
            target.rollback();
            binder.disconnect(&implementation);
            return Err(error);
        }

        let stub = binder.js_stub();
        let entry = Exposed {
            service_name,
            method_names: target.registered(),
            binder,
            implementation,
        };
        Ok((Box::new(entry), stub))
    }

    fn resolve_binder<T>(
        &self,
        contract: &ContractInfo,
        service_name: String,
    ) -> Result<Arc<dyn ServiceBinder<T>>, BindingError>
    where
        T: ?Sized + BridgeContract,
    {
        if let Some(binder) = self.inner.registry.binder::<T>() {
            debug!("Using generated binder for {}", contract.type_name);
            return Ok(binder);
        }
        let descriptor = T::descriptor().ok_or_else(|| BindingError::no_binder(contract.type_name))?;
        debug!("Using descriptor binder for {}", contract.type_name);
        let binder = DescriptorBinder::new(service_name, descriptor, self.inner.match_order)?;
        Ok(Arc::new(binder))
    }

    /// Unexpose `T`. Returns `false` when it was not exposed.
    pub fn remove<T>(&self) -> Result<bool, BindingError>
    where
        T: ?Sized + BridgeContract,
    {
        self.ensure_live()?;
        let _registration = self
            .inner
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let Some((_, slot)) = self.inner.exposed.remove(&TypeId::of::<T>()) else {
            return Ok(false);
        };
        let Slot::Active(entry) = slot else {
            return Ok(false);
        };

        self.teardown(entry.as_ref());
        Ok(true)
    }

    fn teardown(&self, entry: &dyn ExposedEntry) {
        entry.teardown(&self.inner.engine);
        self.inner.tracer.on_service_removed(entry.service_name());
        info!("Removed {}", entry.service_name());
        self.push_script(stub::removal_script(entry.service_name()));
    }

    /// Typed proxy for a document-implemented interface, created once.
    ///
    /// # Errors
    ///
    /// - [`BindingError::MissingMarker`] / [`BindingError::NotAnInterface`]
    ///   when `T` is not an imported interface
    /// - [`BindingError::Proxy`] when neither a registered factory nor a
    ///   dynamic wrapper exists
    pub fn get_proxy<T>(&self) -> Result<Arc<T>, BindingError>
    where
        T: ?Sized + BridgeContract,
    {
        self.ensure_live()?;
        let contract = T::contract();
        validate_import(&contract)?;

        let type_id = TypeId::of::<T>();
        if let Some(cached) = self.cached_proxy::<T>(type_id) {
            return Ok(cached);
        }

        let dispatcher = ImportDispatcher::new(
            self.inner.engine.clone(),
            contract.service_name(),
            Arc::clone(&self.inner.tracer),
        );
        let proxy = match self.inner.registry.proxy_factory::<T>() {
            Some(factory) => factory(dispatcher),
            None => T::dynamic_proxy(dispatcher).ok_or_else(|| {
                BindingError::proxy(contract.type_name, "no proxy factory or dynamic wrapper")
            })?,
        };
        debug!("Created import proxy for {}", contract.service_name());

        // A concurrent caller may have won; hand out whichever got cached.
        self.inner
            .proxies
            .entry(type_id)
            .or_insert_with(|| Box::new(Arc::clone(&proxy)) as Box<dyn Any + Send + Sync>);
        Ok(self.cached_proxy::<T>(type_id).unwrap_or(proxy))
    }

    fn cached_proxy<T: ?Sized + Send + Sync + 'static>(&self, type_id: TypeId) -> Option<Arc<T>> {
        self.inner
            .proxies
            .get(&type_id)
            .and_then(|entry| entry.value().downcast_ref::<Arc<T>>().cloned())
    }

    /// Remove every exposed service, drop cached proxies and refuse further use.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _registration = self
            .inner
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let types: Vec<TypeId> = self.inner.exposed.iter().map(|e| *e.key()).collect();
        for type_id in types {
            if let Some((_, Slot::Active(entry))) = self.inner.exposed.remove(&type_id) {
                self.teardown(entry.as_ref());
            }
        }
        self.inner.proxies.clear();
        info!("Bridge disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    fn ensure_live(&self) -> Result<(), BindingError> {
        if self.is_disposed() {
            return Err(BindingError::disposed());
        }
        Ok(())
    }

    /// Fire-and-forget: publishing never blocks or fails a bind. Called under
    /// the registration lock, so queue order matches expose/remove order.
    fn push_script(&self, script: String) {
        self.inner.scripts.push(&self.inner.engine, script);
    }
}

fn validate_export(contract: &ContractInfo) -> Result<(), BindingError> {
    if contract.kind != ContractKind::Interface {
        return Err(BindingError::not_an_interface(contract.type_name));
    }
    if !contract.exported {
        return Err(BindingError::missing_marker(contract.type_name, "exported"));
    }
    Ok(())
}

fn validate_import(contract: &ContractInfo) -> Result<(), BindingError> {
    if contract.kind != ContractKind::Interface {
        return Err(BindingError::not_an_interface(contract.type_name));
    }
    if !contract.imported {
        return Err(BindingError::missing_marker(contract.type_name, "imported"));
    }
    Ok(())
}
