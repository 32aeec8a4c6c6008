//! Outbound calls on imported interfaces.
//!
//! Typed proxies are thin wrappers that forward each method to
//! [`ImportDispatcher::call`] with the method name and its arguments.

use crate::bridge::descriptor::ReturnShape;
use crate::bridge::naming::{method_wire_name, to_camel_case};
use crate::bridge::tracer::BridgeTracer;
use crate::error::RpcError;
use crate::rpc::RpcEngine;

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

pub enum ProxyArg {
    Named(&'static str, Value),
    /// Threads cancellation into the call instead of being sent.
    Cancellation(CancellationToken),
}

impl ProxyArg {
    pub fn named<T: Serialize>(name: &'static str, value: &T) -> Result<Self, RpcError> {
        Ok(ProxyArg::Named(name, serde_json::to_value(value)?))
    }
}

#[derive(Clone)]
pub struct ImportDispatcher {
    engine: RpcEngine,
    service_name: String,
    tracer: Arc<dyn BridgeTracer>,
}

impl ImportDispatcher {
    pub fn new(engine: RpcEngine, service_name: String, tracer: Arc<dyn BridgeTracer>) -> Self {
        Self {
            engine,
            service_name,
            tracer,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Invoke `Service.method` with the arguments as a camelCase object.
    ///
    /// Only [`ReturnShape::Unit`] and [`ReturnShape::Value`] can cross to the
    /// document; any other shape fails before anything is sent.
    pub async fn call(
        &self,
        method: &str,
        shape: ReturnShape,
        args: Vec<ProxyArg>,
    ) -> Result<Value, RpcError> {
        if !matches!(shape, ReturnShape::Unit | ReturnShape::Value) {
            return Err(RpcError::unsupported_shape(method, shape));
        }

        let wire_name = method_wire_name(&self.service_name, &to_camel_case(method));
        let mut named = Map::new();
        let mut cancellation = None;
        for arg in args {
            match arg {
                ProxyArg::Named(name, value) => {
                    named.insert(to_camel_case(name), value);
                }
                ProxyArg::Cancellation(token) => cancellation = Some(token),
            }
        }
        let params = (!named.is_empty()).then_some(Value::Object(named));

        self.tracer
            .on_import_call_start(&self.service_name, method, params.as_ref());
        let started = Instant::now();
        let result = match cancellation {
            Some(token) => self.engine.invoke_with_cancel(&wire_name, params, token).await,
            None => self.engine.invoke(&wire_name, params).await,
        };
        self.tracer
            .on_import_call_end(&self.service_name, method, started.elapsed());

        match shape {
            ReturnShape::Unit => result.map(|_| Value::Null),
            _ => result,
        }
    }

    pub async fn call_unit(&self, method: &str, args: Vec<ProxyArg>) -> Result<(), RpcError> {
        self.call(method, ReturnShape::Unit, args).await.map(|_| ())
    }

    pub async fn call_value<R: DeserializeOwned>(
        &self,
        method: &str,
        args: Vec<ProxyArg>,
    ) -> Result<R, RpcError> {
        let value = self.call(method, ReturnShape::Value, args).await?;
        Ok(serde_json::from_value(value)?)
    }
}
