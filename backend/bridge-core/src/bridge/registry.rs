//! Explicit registry of generated binders and import proxy factories.
//!
//! The host populates it once, before constructing the
//! [`BridgeService`](crate::bridge::BridgeService). Lookups are keyed by the
//! interface's `TypeId`.

use crate::bridge::binder::ServiceBinder;
use crate::bridge::proxy::ImportDispatcher;

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

pub type ProxyFactory<T> = Arc<dyn Fn(ImportDispatcher) -> Arc<T> + Send + Sync>;

#[derive(Default)]
pub struct BinderRegistry {
    binders: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    proxies: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl BinderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_binder<T: ?Sized + 'static>(
        &mut self,
        binder: Arc<dyn ServiceBinder<T>>,
    ) -> &mut Self {
        self.binders.insert(TypeId::of::<T>(), Box::new(binder));
        self
    }

    pub fn register_proxy<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(ImportDispatcher) -> Arc<T> + Send + Sync + 'static,
    {
        let factory: ProxyFactory<T> = Arc::new(factory);
        self.proxies.insert(TypeId::of::<T>(), Box::new(factory));
        self
    }

    pub fn binder<T: ?Sized + 'static>(&self) -> Option<Arc<dyn ServiceBinder<T>>> {
        self.binders
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.downcast_ref::<Arc<dyn ServiceBinder<T>>>())
            .cloned()
    }

    pub fn proxy_factory<T: ?Sized + Send + Sync + 'static>(&self) -> Option<ProxyFactory<T>> {
        self.proxies
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.downcast_ref::<ProxyFactory<T>>())
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.binders.len() + self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.binders.is_empty() && self.proxies.is_empty()
    }
}
