use crate::contracts::{Doubler, Foo};
use crate::helpers::{error_code, recording_engine, request};

use bridge_core::bridge::{
    BridgeMiddleware, BridgeOptions, BridgeService, BridgeTracer, MiddlewareContext, Next,
};
use bridge_core::rpc::handler::HandlerFuture;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};

/// Test helper: tracer that records export outcomes as `method:outcome`.
#[derive(Default)]
struct RecordingTracer {
    events: Mutex<Vec<String>>,
}

impl RecordingTracer {
    fn events(&self) -> Vec<String> {
        self.events.lock().expect("tracer lock").clone()
    }
}

impl BridgeTracer for RecordingTracer {
    fn on_export_call_end(&self, service: &str, method: &str, _elapsed: Duration, result: &str) {
        self.events
            .lock()
            .expect("tracer lock")
            .push(format!("{service}.{method}:{result}"));
    }

    fn on_export_call_error(
        &self,
        service: &str,
        method: &str,
        _elapsed: Duration,
        error: &bridge_core::RpcError,
    ) {
        self.events
            .lock()
            .expect("tracer lock")
            .push(format!("{service}.{method}:error {}", error.code()));
    }

    fn on_service_exposed(&self, service: &str, method_count: usize, generated: bool) {
        self.events
            .lock()
            .expect("tracer lock")
            .push(format!("exposed {service} {method_count} generated={generated}"));
    }
}

/// Test helper: interceptor that rewrites `x` before the handler sees it.
struct AddOne;

impl BridgeMiddleware for AddOne {
    fn invoke(&self, mut context: MiddlewareContext, next: Next) -> HandlerFuture {
        if let Some(Value::Object(params)) = context.params.as_mut() {
            if let Some(x) = params.get("x").and_then(Value::as_i64) {
                params.insert("x".to_string(), json!(x + 1));
            }
        }
        next(context)
    }
}

/// **VALUE**: Verifies the end-to-end export scenario: a good call succeeds, a malformed
/// one is an InternalError, an unknown service is MethodNotFound, and the rate
/// limiter rejects the call that exceeds its window.
///
/// **WHY THIS MATTERS**: These are the four outcomes a document sees from any
/// exposed service; each must carry the right reserved code.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The limiter is bypassed or counts per method instead of per service
/// - Bad arguments crash the dispatch instead of replying
/// - The tracer misses failed calls
#[tokio::test]
async fn given_rate_limited_service_when_called_repeatedly_then_codes_match_outcomes() {
    // GIVEN: Foo exposed with a limit of 2 calls per second and a tracer
    let (engine, channel) = recording_engine();
    let tracer = Arc::new(RecordingTracer::default());
    let bridge = BridgeService::builder(engine.clone())
        .tracer(tracer.clone())
        .build();
    let options = BridgeOptions::new().rate_limit(2, Duration::from_secs(1));
    bridge
        .expose(Arc::new(Doubler) as Arc<dyn Foo>, Some(options))
        .expect("expose");

    // WHEN: Good call, malformed call, unknown service, then one over the limit
    engine.process_message(&request(1, "Foo.bar", json!({ "x": 1 }))).await;
    engine
        .process_message(&request(2, "Foo.baz", json!({ "x": "three" })))
        .await;
    engine
        .process_message(&request(3, "Unknown.thing", json!({})))
        .await;
    engine.process_message(&request(4, "Foo.bar", json!({ "x": 5 }))).await;

    // THEN: Each reply carries the expected outcome
    let replies = channel.envelopes();
    assert_eq!(replies[0]["result"], 2);
    assert_eq!(error_code(&replies[1]), -32603);
    assert_eq!(error_code(&replies[2]), -32601);
    assert_eq!(error_code(&replies[3]), -32029);
    assert_eq!(
        tracer.events(),
        vec![
            "exposed Foo 2 generated=false".to_string(),
            "Foo.bar:value".to_string(),
            "Foo.baz:error -32603".to_string(),
            "Foo.bar:error -32029".to_string(),
        ]
    );
}

/// **VALUE**: Verifies interceptors can rewrite params before binding.
#[tokio::test]
async fn given_rewriting_middleware_when_called_then_handler_sees_rewritten_params() {
    let (engine, channel) = recording_engine();
    let bridge = BridgeService::new(engine.clone());
    let options = BridgeOptions::new().with_middleware(Arc::new(AddOne));
    bridge
        .expose(Arc::new(Doubler) as Arc<dyn Foo>, Some(options))
        .expect("expose");

    engine.process_message(&request(1, "Foo.bar", json!({ "x": 1 }))).await;

    assert_eq!(channel.envelopes()[0]["result"], 4);
}

/// **VALUE**: Verifies the limiter window slides and calls are accepted again later.
#[tokio::test]
async fn given_full_window_when_window_passes_then_calls_accepted() {
    let (engine, channel) = recording_engine();
    let bridge = BridgeService::new(engine.clone());
    let options = BridgeOptions::new().rate_limit(1, Duration::from_millis(50));
    bridge
        .expose(Arc::new(Doubler) as Arc<dyn Foo>, Some(options))
        .expect("expose");

    engine.process_message(&request(1, "Foo.bar", json!({ "x": 1 }))).await;
    engine.process_message(&request(2, "Foo.bar", json!({ "x": 1 }))).await;
    tokio::time::sleep(Duration::from_millis(80)).await;
    engine.process_message(&request(3, "Foo.bar", json!({ "x": 1 }))).await;

    let replies = channel.envelopes();
    assert_eq!(replies[0]["result"], 2);
    assert_eq!(error_code(&replies[1]), -32029);
    assert_eq!(replies[2]["result"], 2);
}
