//! Host-to-document push channels declared on exported services.
//!
//! The document opts in with `Service.$subscribe.<event>`; until then
//! [`BridgeEvent::emit`] is a no-op. Payloads travel as the notification
//! `Service.$event.<event>`.

use crate::error::RpcError;
use crate::rpc::WeakRpcEngine;

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use log::debug;
use serde::Serialize;

/// Binding-side view of an event, independent of its payload type.
pub trait EventSource: Send + Sync {
    /// Attach to an engine under the given notification method.
    fn connect(&self, engine: WeakRpcEngine, wire_name: String);
    fn set_subscribed(&self, subscribed: bool);
    /// Detach and forget any subscription.
    fn disconnect(&self);
}

#[derive(Default)]
struct EventState {
    binding: RwLock<Option<(WeakRpcEngine, String)>>,
    subscribed: AtomicBool,
}

/// An event the host raises and the document may listen to.
pub struct BridgeEvent<P> {
    state: Arc<EventState>,
    _payload: PhantomData<fn(P)>,
}

impl<P: Serialize> BridgeEvent<P> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(EventState::default()),
            _payload: PhantomData,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.binding().is_some()
    }

    pub fn is_subscribed(&self) -> bool {
        self.state.subscribed.load(Ordering::Acquire)
    }

    /// Send `payload` to the document. Returns `false` when nobody listens.
    pub async fn emit(&self, payload: &P) -> Result<bool, RpcError> {
        if !self.is_subscribed() {
            return Ok(false);
        }
        let Some((engine, wire_name)) = self.binding() else {
            return Ok(false);
        };
        let Some(engine) = engine.upgrade() else {
            debug!("Event '{}' dropped: engine is gone", wire_name);
            return Ok(false);
        };

        let params = serde_json::to_value(payload)?;
        engine.notify(&wire_name, Some(params)).await?;
        Ok(true)
    }

    fn binding(&self) -> Option<(WeakRpcEngine, String)> {
        self.state
            .binding
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<P: Serialize> Default for BridgeEvent<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> EventSource for BridgeEvent<P> {
    fn connect(&self, engine: WeakRpcEngine, wire_name: String) {
        *self
            .state
            .binding
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some((engine, wire_name));
    }

    fn set_subscribed(&self, subscribed: bool) {
        self.state.subscribed.store(subscribed, Ordering::Release);
    }

    fn disconnect(&self) {
        self.set_subscribed(false);
        *self
            .state
            .binding
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}
