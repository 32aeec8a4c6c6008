//! Hooks for observing bridge traffic.

use crate::error::RpcError;

use std::time::Duration;

use log::{debug, info, warn};
use serde_json::Value;

/// Receives export/import call and service lifecycle events.
///
/// Every hook has an empty default so implementations pick what they need.
pub trait BridgeTracer: Send + Sync {
    fn on_export_call_start(&self, _service: &str, _method: &str, _params: Option<&Value>) {}

    fn on_export_call_end(&self, _service: &str, _method: &str, _elapsed: Duration, _result: &str) {}

    fn on_export_call_error(
        &self,
        _service: &str,
        _method: &str,
        _elapsed: Duration,
        _error: &RpcError,
    ) {
    }

    fn on_import_call_start(&self, _service: &str, _method: &str, _params: Option<&Value>) {}

    fn on_import_call_end(&self, _service: &str, _method: &str, _elapsed: Duration) {}

    fn on_service_exposed(&self, _service: &str, _method_count: usize, _generated: bool) {}

    fn on_service_removed(&self, _service: &str) {}
}

pub struct NullBridgeTracer;

impl BridgeTracer for NullBridgeTracer {}

/// Writes every hook to the `log` facade.
pub struct LogTracer;

impl BridgeTracer for LogTracer {
    fn on_export_call_start(&self, service: &str, method: &str, params: Option<&Value>) {
        debug!("Bridge: {}.{} called with {:?}", service, method, params);
    }

    fn on_export_call_end(&self, service: &str, method: &str, elapsed: Duration, result: &str) {
        debug!(
            "Bridge: {}.{} returned {} in {}ms",
            service,
            method,
            result,
            elapsed.as_millis()
        );
    }

    fn on_export_call_error(&self, service: &str, method: &str, elapsed: Duration, error: &RpcError) {
        warn!(
            "Bridge: {}.{} failed after {}ms: {}",
            service,
            method,
            elapsed.as_millis(),
            error
        );
    }

    fn on_import_call_start(&self, service: &str, method: &str, params: Option<&Value>) {
        debug!("Bridge: calling document {}.{} with {:?}", service, method, params);
    }

    fn on_import_call_end(&self, service: &str, method: &str, elapsed: Duration) {
        debug!(
            "Bridge: document {}.{} answered in {}ms",
            service,
            method,
            elapsed.as_millis()
        );
    }

    fn on_service_exposed(&self, service: &str, method_count: usize, generated: bool) {
        info!(
            "Bridge: exposed {} ({} methods, {} binder)",
            service,
            method_count,
            if generated { "generated" } else { "descriptor" }
        );
    }

    fn on_service_removed(&self, service: &str) {
        info!("Bridge: removed {}", service);
    }
}
