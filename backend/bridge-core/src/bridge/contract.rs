//! Marker metadata an interface carries to take part in the bridge.
//!
//! Interfaces are Rust traits used as `dyn Trait`. The trait object type
//! implements [`BridgeContract`] to say whether it is exported (the host
//! implements it for the document) or imported (the document implements it
//! for the host), and how to bind it.

use crate::bridge::descriptor::ServiceDescriptor;
use crate::bridge::naming;
use crate::bridge::proxy::ImportDispatcher;

use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractKind {
    /// A trait used through `dyn Trait`.
    Interface,
    /// A concrete type; cannot be bound.
    Concrete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractInfo {
    pub type_name: &'static str,
    /// Overrides the derived service name.
    pub service_name: Option<&'static str>,
    pub kind: ContractKind,
    pub exported: bool,
    pub imported: bool,
}

impl ContractInfo {
    /// An interface the host implements and the document calls.
    pub const fn exported(type_name: &'static str) -> Self {
        Self {
            type_name,
            service_name: None,
            kind: ContractKind::Interface,
            exported: true,
            imported: false,
        }
    }

    /// An interface the document implements and the host calls.
    pub const fn imported(type_name: &'static str) -> Self {
        Self {
            type_name,
            service_name: None,
            kind: ContractKind::Interface,
            exported: false,
            imported: true,
        }
    }

    /// A type carrying no markers at all.
    pub const fn unmarked(type_name: &'static str) -> Self {
        Self {
            type_name,
            service_name: None,
            kind: ContractKind::Interface,
            exported: false,
            imported: false,
        }
    }

    pub const fn named(mut self, service_name: &'static str) -> Self {
        self.service_name = Some(service_name);
        self
    }

    pub const fn concrete(mut self) -> Self {
        self.kind = ContractKind::Concrete;
        self
    }

    pub fn service_name(&self) -> String {
        naming::service_name(self.type_name, self.service_name)
    }
}

pub trait BridgeContract: Send + Sync + 'static {
    fn contract() -> ContractInfo;

    /// Method table for the introspection binder.
    fn descriptor() -> Option<ServiceDescriptor<Self>> {
        None
    }

    /// Hand-written typed wrapper over the generic import dispatcher.
    fn dynamic_proxy(_dispatcher: ImportDispatcher) -> Option<Arc<Self>> {
        None
    }
}
