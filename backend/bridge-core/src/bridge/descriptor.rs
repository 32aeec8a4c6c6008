//! Runtime description of a service interface.
//!
//! A [`ServiceDescriptor`] is what the introspection binder reads in place
//! of reflection: the method list, each parameter's name and defaults, and
//! an invoker that calls the real implementation with bound arguments.

use crate::bridge::event::EventSource;
use crate::error::RpcError;
use crate::rpc::Reply;

use std::fmt::{Display, Formatter, Result as FormatResult};
use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// How a method completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnShape {
    /// Completes with no value.
    Unit,
    /// Completes with one value.
    Value,
    /// Produces a lazy sequence.
    Stream,
}

impl Display for ReturnShape {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        let name = match self {
            ReturnShape::Unit => "unit",
            ReturnShape::Value => "value",
            ReturnShape::Stream => "stream",
        };
        formatter.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    Value {
        /// Declared default, used when the caller omits the argument.
        default: Option<Value>,
        /// Zero value of the parameter type, used when there is no default.
        zero: Value,
    },
    /// Receives the call's cancellation token; never bound from arguments.
    CancellationSignal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDescriptor {
    pub name: &'static str,
    pub kind: ParamKind,
}

impl ParamDescriptor {
    /// A parameter of type `T`, whose zero value is `T::default()`.
    pub fn of<T: Default + Serialize>(name: &'static str) -> Self {
        let zero = serde_json::to_value(T::default()).unwrap_or(Value::Null);
        Self {
            name,
            kind: ParamKind::Value {
                default: None,
                zero,
            },
        }
    }

    /// A parameter with no zero value; omitting it binds `null`.
    pub fn required(name: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Value {
                default: None,
                zero: Value::Null,
            },
        }
    }

    pub fn cancellation(name: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::CancellationSignal,
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        if let ParamKind::Value { default, .. } = &mut self.kind {
            *default = Some(value);
        }
        self
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self.kind, ParamKind::CancellationSignal)
    }

    /// Default when declared, zero value otherwise.
    pub fn fallback(&self) -> Value {
        match &self.kind {
            ParamKind::Value { default, zero } => default.clone().unwrap_or_else(|| zero.clone()),
            ParamKind::CancellationSignal => Value::Null,
        }
    }
}

/// Bound arguments, one per non-cancellation parameter in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args(Vec<Value>);

impl Args {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Deserialize argument `index`. A type mismatch is an InternalError.
    pub fn get<A: DeserializeOwned>(&self, index: usize) -> Result<A, RpcError> {
        let value = self.0.get(index).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| {
            RpcError::internal(format!("Invalid argument at position {index}: {e}"))
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }
}

pub type Invoker<T> = Arc<
    dyn Fn(Arc<T>, Args, CancellationToken) -> BoxFuture<'static, Result<Reply, RpcError>>
        + Send
        + Sync,
>;

pub struct MethodDescriptor<T: ?Sized> {
    /// Name as declared on the interface; the wire name is derived from it.
    pub name: &'static str,
    pub params: Vec<ParamDescriptor>,
    pub returns: ReturnShape,
    pub invoker: Invoker<T>,
}

impl<T: ?Sized + Send + Sync + 'static> MethodDescriptor<T> {
    pub fn new<F, Fut>(name: &'static str, returns: ReturnShape, invoke: F) -> Self
    where
        F: Fn(Arc<T>, Args, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply, RpcError>> + Send + 'static,
    {
        Self {
            name,
            params: Vec::new(),
            returns,
            invoker: Arc::new(move |service, args, token| invoke(service, args, token).boxed()),
        }
    }

    pub fn param(mut self, param: ParamDescriptor) -> Self {
        self.params.push(param);
        self
    }

    /// Parameter count used for overload suffixes.
    pub fn arity(&self) -> usize {
        self.params.iter().filter(|p| !p.is_cancellation()).count()
    }

    pub fn is_cancellable(&self) -> bool {
        self.params.iter().any(ParamDescriptor::is_cancellation)
    }
}

impl<T: ?Sized> Clone for MethodDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            params: self.params.clone(),
            returns: self.returns,
            invoker: Arc::clone(&self.invoker),
        }
    }
}

/// Looks up an event field on the implementation.
pub type EventAccessor<T> = fn(&T) -> &dyn EventSource;

pub struct EventDescriptor<T: ?Sized> {
    pub name: &'static str,
    pub accessor: EventAccessor<T>,
}

impl<T: ?Sized> EventDescriptor<T> {
    pub fn new(name: &'static str, accessor: EventAccessor<T>) -> Self {
        Self { name, accessor }
    }
}

impl<T: ?Sized> Clone for EventDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            accessor: self.accessor,
        }
    }
}

pub struct ServiceDescriptor<T: ?Sized> {
    pub methods: Vec<MethodDescriptor<T>>,
    pub events: Vec<EventDescriptor<T>>,
}

impl<T: ?Sized> ServiceDescriptor<T> {
    pub fn new() -> Self {
        Self {
            methods: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn method(mut self, method: MethodDescriptor<T>) -> Self {
        self.methods.push(method);
        self
    }

    pub fn event(mut self, event: EventDescriptor<T>) -> Self {
        self.events.push(event);
        self
    }
}

impl<T: ?Sized> Default for ServiceDescriptor<T> {
    fn default() -> Self {
        Self::new()
    }
}
