//! Typed service binding on top of the RPC engine.
//!
//! Interfaces are traits used as `dyn Trait` that implement
//! [`BridgeContract`]. [`BridgeService::expose`] binds a host
//! implementation so the document can call it; [`BridgeService::get_proxy`]
//! returns a typed handle on a document implementation.

pub mod arguments;
pub mod binder;
pub mod contract;
pub mod descriptor;
pub mod event;
pub mod middleware;
pub mod naming;
pub mod proxy;
pub mod registry;
pub mod service;
pub mod stub;
pub mod tracer;

mod target;

pub use arguments::NameMatchOrder;
pub use binder::{DescriptorBinder, ServiceBinder};
pub use contract::{BridgeContract, ContractInfo, ContractKind};
pub use descriptor::{
    Args, EventDescriptor, MethodDescriptor, ParamDescriptor, ReturnShape, ServiceDescriptor,
};
pub use event::{BridgeEvent, EventSource};
pub use middleware::{BridgeMiddleware, BridgeOptions, MiddlewareContext, Next, RateLimit};
pub use proxy::{ImportDispatcher, ProxyArg};
pub use registry::BinderRegistry;
pub use service::{BridgeService, BridgeServiceBuilder};
pub use tracer::{BridgeTracer, LogTracer, NullBridgeTracer};
