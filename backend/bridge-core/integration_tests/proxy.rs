use crate::contracts::{DocumentView, DocumentViewProxy, Greeter, Unwrapped};
use crate::helpers::{recording_engine, success_reply};

use bridge_core::BindingError;
use bridge_core::bridge::{BinderRegistry, BridgeService};

use std::sync::Arc;

use serde_json::{Value, json};

/// **VALUE**: Verifies a proxy call becomes `Service.method` with camelCase named params.
///
/// **WHY THIS MATTERS**: The document registers `DocumentView.scrollTo` and
/// reads `params.lineNumber`; Rust's snake_case must never leak onto the wire.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Method or argument names keep their Rust spelling
/// - The typed result is not deserialized
#[tokio::test]
async fn given_imported_interface_when_proxy_called_then_camel_case_request_sent() {
    // GIVEN: A proxy for the document's view
    let (engine, channel) = recording_engine();
    let bridge = BridgeService::new(engine.clone());
    let view = bridge.get_proxy::<dyn DocumentView>().expect("proxy");

    // WHEN: Calling title(3)
    let call = tokio::spawn(async move { view.title(3).await });
    let sent = channel.wait_for_envelopes(1).await;

    // THEN: The wire request is camelCase, and the reply comes back typed
    assert_eq!(sent[0]["method"], "DocumentView.title");
    assert_eq!(sent[0]["params"], json!({ "tabIndex": 3 }));
    engine
        .process_message(&success_reply(&sent[0]["id"], json!("Inbox")))
        .await;
    assert_eq!(call.await.expect("call task").expect("title"), "Inbox");
}

/// **VALUE**: Verifies unit methods ignore whatever result the document returns.
#[tokio::test]
async fn given_unit_method_when_document_returns_value_then_ignored() {
    let (engine, channel) = recording_engine();
    let bridge = BridgeService::new(engine.clone());
    let view = bridge.get_proxy::<dyn DocumentView>().expect("proxy");

    let call = tokio::spawn(async move { view.scroll_to(120).await });
    let sent = channel.wait_for_envelopes(1).await;
    assert_eq!(sent[0]["method"], "DocumentView.scrollTo");
    assert_eq!(sent[0]["params"]["lineNumber"], 120);
    engine
        .process_message(&success_reply(&sent[0]["id"], json!({ "ignored": true })))
        .await;

    call.await.expect("call task").expect("scroll");
}

/// **VALUE**: Verifies stream-shaped imports fail before anything is sent.
#[tokio::test]
async fn given_stream_shape_when_proxy_called_then_unsupported_without_sending() {
    let (engine, channel) = recording_engine();
    let bridge = BridgeService::new(engine);
    let view = bridge.get_proxy::<dyn DocumentView>().expect("proxy");

    let error = view.lines().await.expect_err("streams cannot be imported");

    assert_eq!(error.code(), -32603);
    assert!(error.message().contains("stream"));
    assert!(channel.messages().is_empty());
}

/// **VALUE**: Verifies proxies are created once and shared.
#[tokio::test]
async fn given_proxy_requested_twice_when_compared_then_same_instance() {
    let (engine, _channel) = recording_engine();
    let bridge = BridgeService::new(engine);

    let first = bridge.get_proxy::<dyn DocumentView>().expect("proxy");
    let second = bridge.get_proxy::<dyn DocumentView>().expect("proxy");

    assert!(Arc::ptr_eq(&first, &second));
}

/// **VALUE**: Verifies a registered factory wins over the dynamic wrapper.
#[tokio::test]
async fn given_registered_factory_when_proxy_requested_then_factory_used() {
    let (engine, channel) = recording_engine();
    let mut registry = BinderRegistry::new();
    let made = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let flag = Arc::clone(&made);
    registry.register_proxy::<dyn DocumentView, _>(move |dispatcher| {
        flag.store(true, std::sync::atomic::Ordering::SeqCst);
        assert_eq!(dispatcher.service_name(), "DocumentView");
        Arc::new(DocumentViewProxy::from(dispatcher)) as Arc<dyn DocumentView>
    });
    let bridge = BridgeService::builder(engine).registry(registry).build();

    let _view = bridge.get_proxy::<dyn DocumentView>().expect("proxy");

    assert!(made.load(std::sync::atomic::Ordering::SeqCst));
    assert!(channel.messages().is_empty());
}

/// **VALUE**: Verifies import validation: exported-only interfaces and missing wrappers fail.
#[tokio::test]
async fn given_invalid_import_when_proxy_requested_then_error() {
    let (engine, _channel) = recording_engine();
    let bridge = BridgeService::new(engine);

    let exported_only = bridge.get_proxy::<dyn Greeter>();
    let unwrapped = bridge.get_proxy::<dyn Unwrapped>();

    assert!(matches!(
        exported_only,
        Err(BindingError::MissingMarker { marker: "imported", .. })
    ));
    assert!(matches!(unwrapped, Err(BindingError::Proxy { .. })));
}

/// **VALUE**: Verifies an error reply from the document surfaces from the proxy call.
#[tokio::test]
async fn given_document_error_when_proxy_called_then_error_returned() {
    let (engine, channel) = recording_engine();
    let bridge = BridgeService::new(engine.clone());
    let view = bridge.get_proxy::<dyn DocumentView>().expect("proxy");

    let call = tokio::spawn(async move { view.title(0).await });
    let id: Value = channel.wait_for_envelopes(1).await[0]["id"].clone();
    engine
        .process_message(&crate::helpers::error_reply(&id, 404, "no such tab"))
        .await;

    let error = call.await.expect("call task").expect_err("must fail");
    assert_eq!(error.code(), 404);
}
