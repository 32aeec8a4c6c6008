// Unit tests for the rate limiter and middleware composition

use crate::RpcErrorCode;
use crate::bridge::middleware::{
    BridgeMiddleware, BridgeOptions, MiddlewareContext, Next, RateLimit, RateLimitMiddleware,
    compose,
};
use crate::rpc::handler::{CallContext, HandlerFuture, Reply, handler};

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use serde_json::{Value, json};

/// **VALUE**: Verifies the sliding window rejects at capacity and recovers after it.
///
/// **WHY THIS MATTERS**: The limiter protects host services from a runaway document;
/// it must reject the excess and then let calls through again.
///
/// **BUG THIS CATCHES**: Would catch off-by-one capacity or never evicting old entries.
#[test]
fn given_limit_of_two_when_three_calls_then_third_rejected_until_window_passes() {
    // GIVEN: 2 calls per second
    let limiter = RateLimitMiddleware::new(RateLimit::new(2, Duration::from_secs(1)));
    let start = Instant::now();

    // WHEN: Three calls within 100ms
    let first = limiter.try_acquire(start);
    let second = limiter.try_acquire(start + Duration::from_millis(50));
    let third = limiter.try_acquire(start + Duration::from_millis(100));

    // THEN: Third is rate limited
    assert!(first.is_ok());
    assert!(second.is_ok());
    let error = third.expect_err("third call exceeds the limit");
    assert_eq!(error.kind(), Some(RpcErrorCode::RateLimited));
    assert_eq!(error.message(), "Rate limit exceeded");

    // THEN: After the window slides past the first call, a call is admitted
    assert!(limiter.try_acquire(start + Duration::from_millis(1001)).is_ok());
}

/// **VALUE**: Verifies a call exactly one window after the oldest is still counted.
///
/// **BUG THIS CATCHES**: Would catch eviction at `>= window`, which admits one
/// call more per window than the limit allows at the boundary.
#[test]
fn given_full_window_when_call_exactly_one_window_later_then_still_rejected() {
    // GIVEN: 1 call per second, used at `start`
    let limiter = RateLimitMiddleware::new(RateLimit::new(1, Duration::from_secs(1)));
    let start = Instant::now();
    assert!(limiter.try_acquire(start).is_ok());

    // WHEN/THEN: At exactly one window the entry is not evicted yet
    assert!(limiter.try_acquire(start + Duration::from_secs(1)).is_err());

    // WHEN/THEN: Strictly past the window it is
    assert!(
        limiter
            .try_acquire(start + Duration::from_secs(1) + Duration::from_millis(1))
            .is_ok()
    );
}

struct Recorder {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl BridgeMiddleware for Recorder {
    fn invoke(&self, mut context: MiddlewareContext, next: Next) -> HandlerFuture {
        self.log
            .lock()
            .expect("log lock")
            .push(format!("{}:{}", self.name, context.method_name));
        context
            .properties
            .insert(self.name.to_string(), Value::Bool(true));
        next(context)
    }
}

struct Reject;

impl BridgeMiddleware for Reject {
    fn invoke(&self, _context: MiddlewareContext, _next: Next) -> HandlerFuture {
        async { Err(crate::RpcError::new(-32001, "denied")) }.boxed()
    }
}

/// **VALUE**: Verifies the first registered interceptor runs outermost.
///
/// **WHY THIS MATTERS**: Auth or logging interceptors registered first must see every
/// call before later ones can short-circuit it.
///
/// **BUG THIS CATCHES**: Would catch composing the chain in reverse.
#[tokio::test]
async fn given_two_interceptors_when_called_then_registration_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let options = BridgeOptions::new()
        .with_middleware(Arc::new(Recorder { name: "outer", log: Arc::clone(&log) }))
        .with_middleware(Arc::new(Recorder { name: "inner", log: Arc::clone(&log) }));
    let inner_log = Arc::clone(&log);
    let target = handler(move |_call: CallContext| {
        let log = Arc::clone(&inner_log);
        async move {
            log.lock().expect("log lock").push("handler".to_string());
            Ok(Reply::Value(json!(1)))
        }
    });

    let wrapped = compose(options.build_chain(), "Svc".into(), "run".into(), target);
    let outcome = wrapped(CallContext::new(None)).await;

    assert!(matches!(outcome, Ok(Reply::Value(_))));
    assert_eq!(
        *log.lock().expect("log lock"),
        vec!["outer:run", "inner:run", "handler"]
    );
}

/// **VALUE**: Verifies an interceptor can short-circuit with its own error code.
#[tokio::test]
async fn given_rejecting_interceptor_when_called_then_handler_skipped() {
    let called = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&called);
    let target = handler(move |_call: CallContext| {
        let flag = Arc::clone(&flag);
        async move {
            *flag.lock().expect("flag lock") = true;
            Ok(Reply::Empty)
        }
    });
    let options = BridgeOptions::new().with_middleware(Arc::new(Reject));

    let wrapped = compose(options.build_chain(), "Svc".into(), "run".into(), target);
    let error = wrapped(CallContext::new(None)).await.expect_err("rejected");

    assert_eq!(error.code(), -32001);
    assert!(!*called.lock().expect("flag lock"));
}

/// **VALUE**: Verifies the rate limiter is placed ahead of caller interceptors.
#[test]
fn given_rate_limit_and_middleware_when_build_chain_then_limiter_first() {
    let options = BridgeOptions::new()
        .with_middleware(Arc::new(Reject))
        .rate_limit(5, Duration::from_secs(1));

    let chain = options.build_chain();

    assert_eq!(chain.len(), 2);
}
