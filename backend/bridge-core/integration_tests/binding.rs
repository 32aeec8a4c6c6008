use crate::contracts::{
    Bare, Concrete, Doubler, Foo, FriendlyGreeter, GENERATED_FOO_METHODS, GeneratedFooBinder,
    Greeter, Nothing, Unmarked,
};
use crate::helpers::{error_code, recording_engine, request};

use bridge_core::bridge::{
    BinderRegistry, BridgeContract, BridgeService, ContractInfo, NameMatchOrder, ServiceBinder,
};
use bridge_core::BindingError;
use bridge_core::rpc::{HandlerTarget, Reply, handler};

use std::sync::Arc;
use std::sync::atomic::Ordering;

use serde_json::json;

fn greeter_bridge() -> (
    BridgeService,
    Arc<FriendlyGreeter>,
    Arc<crate::helpers::RecordingChannel>,
) {
    let (engine, channel) = recording_engine();
    let bridge = BridgeService::new(engine);
    let greeter = Arc::new(FriendlyGreeter::default());
    (bridge, greeter, channel)
}

// ----------------------------------------------------------------------------
// expose()
// ----------------------------------------------------------------------------

/// **VALUE**: Verifies an exposed service answers calls under `Service.method` and its
/// stub is pushed to the document.
///
/// **WHY THIS MATTERS**: This is the whole point of the bridge: a host trait
/// becomes callable as `window.agWebView.bridge.Greeter.greet(...)`.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Wire names are not camelCase `Service.method`
/// - Named arguments are not bound to parameters
/// - The stub is never published
#[tokio::test]
async fn given_exposed_service_when_document_calls_method_then_implementation_runs() {
    // GIVEN: Greeter exposed
    let (bridge, greeter, channel) = greeter_bridge();
    let implementation: Arc<dyn Greeter> = greeter.clone();
    bridge.expose(implementation, None).expect("expose succeeds");

    // WHEN: The document calls Greeter.greet with a named argument
    bridge
        .engine()
        .process_message(&request(1, "Greeter.greet", json!({ "name": "Ada" })))
        .await;

    // THEN: The implementation answered, and the stub went out
    let reply = channel.wait_for_envelopes(1).await;
    assert_eq!(reply[0]["result"], "Hello, Ada!");
    assert_eq!(greeter.calls.load(Ordering::SeqCst), 1);
    let scripts = channel.wait_for_scripts(1).await;
    assert!(scripts[0].contains(r#"window.agWebView.bridge["Greeter"]"#));
    assert!(scripts[0].contains(r#"rpc.invoke("Greeter.greet", params)"#));
}

/// **VALUE**: Verifies positional arguments and declared defaults bind correctly.
#[tokio::test]
async fn given_exposed_service_when_called_positionally_then_defaults_fill_gaps() {
    let (bridge, greeter, channel) = greeter_bridge();
    bridge.expose(greeter as Arc<dyn Greeter>, None).expect("expose");

    bridge
        .engine()
        .process_message(&request(1, "Greeter.shout", json!(["bo", 2])))
        .await;
    bridge
        .engine()
        .process_message(&request(2, "Greeter.shout", json!(["bo"])))
        .await;

    let replies = channel.envelopes();
    assert_eq!(replies[0]["result"], "HEY BOHEY BO");
    assert_eq!(replies[1]["result"], "HEY BO");
}

/// **VALUE**: Verifies a wrongly typed argument is answered with InternalError.
#[tokio::test]
async fn given_wrong_argument_type_when_called_then_internal_error() {
    let (bridge, greeter, channel) = greeter_bridge();
    bridge.expose(greeter as Arc<dyn Greeter>, None).expect("expose");

    bridge
        .engine()
        .process_message(&request(1, "Greeter.greet", json!({ "name": 42 })))
        .await;

    assert_eq!(error_code(&channel.envelopes()[0]), -32603);
}

/// **VALUE**: Verifies exposing the same interface twice fails and leaves the first
/// registration working.
///
/// **BUG THIS CATCHES**: Would catch the second expose replacing handlers of
/// the first implementation.
#[tokio::test]
async fn given_exposed_service_when_exposed_again_then_already_exposed() {
    let (bridge, greeter, channel) = greeter_bridge();
    bridge
        .expose(greeter.clone() as Arc<dyn Greeter>, None)
        .expect("first expose");
    let second: Arc<dyn Greeter> = Arc::new(FriendlyGreeter::default());

    let result = bridge.expose(second, None);

    assert!(matches!(result, Err(BindingError::AlreadyExposed { .. })));
    bridge
        .engine()
        .process_message(&request(1, "Greeter.greet", json!({ "name": "x" })))
        .await;
    assert_eq!(channel.envelopes()[0]["result"], "Hello, x!");
    assert_eq!(greeter.calls.load(Ordering::SeqCst), 1);
}

/// **VALUE**: Verifies types without the right markers are rejected before anything registers.
#[tokio::test]
async fn given_invalid_contracts_when_exposed_then_rejected() {
    let (engine, _channel) = recording_engine();
    let bridge = BridgeService::new(engine.clone());

    let unmarked = bridge.expose::<dyn Unmarked>(Arc::new(UnmarkedImpl), None);
    let concrete = bridge.expose(Arc::new(Concrete), None);
    let bare = bridge.expose::<dyn Bare>(Arc::new(Nothing), None);

    assert!(matches!(unmarked, Err(BindingError::MissingMarker { marker: "exported", .. })));
    assert!(matches!(concrete, Err(BindingError::NotAnInterface { .. })));
    assert!(matches!(bare, Err(BindingError::NoBinder { .. })));
    assert!(engine.handler_names().is_empty());
    assert!(bridge.exposed_services().is_empty());
}

struct UnmarkedImpl;

impl Unmarked for UnmarkedImpl {}

/// **VALUE**: Verifies a method name already registered on the engine fails the expose
/// without leaving partial handlers behind.
#[tokio::test]
async fn given_taken_wire_name_when_exposed_then_registration_error_and_rolled_back() {
    let (bridge, greeter, _channel) = greeter_bridge();
    bridge
        .engine()
        .handle("Greeter.shout", handler(|_call| async { Ok(Reply::Empty) }));

    let result = bridge.expose(greeter as Arc<dyn Greeter>, None);

    assert!(matches!(result, Err(BindingError::Registration { .. })));
    assert_eq!(bridge.engine().handler_names(), vec!["Greeter.shout".to_string()]);
    assert!(!bridge.is_exposed::<dyn Greeter>());
}

// ----------------------------------------------------------------------------
// Generated binders
// ----------------------------------------------------------------------------

fn generated_foo_bridge(
    binder: GeneratedFooBinder,
) -> (
    BridgeService,
    Arc<GeneratedFooBinder>,
    Arc<crate::helpers::RecordingChannel>,
) {
    let (engine, channel) = recording_engine();
    let binder = Arc::new(binder);
    let mut registry = BinderRegistry::new();
    registry.register_binder::<dyn Foo>(Arc::clone(&binder) as Arc<dyn ServiceBinder<dyn Foo>>);
    let bridge = BridgeService::builder(engine).registry(registry).build();
    (bridge, binder, channel)
}

/// **VALUE**: Verifies a registered generated binder is used instead of the descriptor.
///
/// **WHY THIS MATTERS**: Generated binders avoid per-call argument binding;
/// when one is registered the descriptor path must not shadow it.
///
/// **BUG THIS CATCHES**: Would catch the registry lookup being skipped or
/// keyed by the wrong type.
#[tokio::test]
async fn given_registered_generated_binder_when_exposed_then_it_wins_over_descriptor() {
    // GIVEN: Foo has both a descriptor and a generated binder
    let (bridge, _binder, channel) = generated_foo_bridge(GeneratedFooBinder::default());

    // WHEN: Exposed and called
    bridge
        .expose(Arc::new(Doubler) as Arc<dyn Foo>, None)
        .expect("expose");
    bridge
        .engine()
        .process_message(&request(1, "Foo.bar", json!({ "x": 4 })))
        .await;

    // THEN: The generated handler answered and its stub was pushed
    let reply = &channel.envelopes()[0];
    assert_eq!(reply["result"], json!({ "generated": true, "value": 8 }));
    let scripts = channel.wait_for_scripts(1).await;
    assert!(scripts[0].contains("/* generated */"));
    assert_eq!(bridge.exposed_methods::<dyn Foo>(), GENERATED_FOO_METHODS);
}

/// **VALUE**: Verifies remove hands teardown to the generated binder and disconnects.
///
/// **BUG THIS CATCHES**: Would catch remove ignoring the binder's own
/// teardown, or skipping the disconnect hook.
#[tokio::test]
async fn given_generated_binder_when_removed_then_its_teardown_and_disconnect_run() {
    // GIVEN: Foo exposed through the generated binder
    let (bridge, binder, _channel) = generated_foo_bridge(GeneratedFooBinder::default());
    bridge
        .expose(Arc::new(Doubler) as Arc<dyn Foo>, None)
        .expect("expose");

    // WHEN: Removed
    assert!(bridge.remove::<dyn Foo>().expect("remove"));

    // THEN: Each hook ran once and nothing is left on the engine
    assert_eq!(binder.unregistered.load(Ordering::SeqCst), 1);
    assert_eq!(binder.disconnected.load(Ordering::SeqCst), 1);
    assert!(bridge.engine().handler_names().is_empty());
}

/// **VALUE**: Verifies a binder failing part-way through registration is rolled back.
///
/// **WHY THIS MATTERS**: A half-registered service would answer some calls
/// while the bridge reports it as not exposed.
///
/// **BUG THIS CATCHES**: Would catch handlers registered before the failure
/// surviving it, or the reservation never being released.
#[tokio::test]
async fn given_binder_failing_mid_registration_when_exposed_then_rolled_back() {
    // GIVEN: A binder that fails after registering one handler
    let (bridge, binder, _channel) = generated_foo_bridge(GeneratedFooBinder::failing_after(1));

    // WHEN: Exposed
    let result = bridge.expose(Arc::new(Doubler) as Arc<dyn Foo>, None);

    // THEN: Error, no handlers, no slot, disconnect ran
    assert!(matches!(result, Err(BindingError::Registration { .. })));
    assert!(bridge.engine().handler_names().is_empty());
    assert!(!bridge.is_exposed::<dyn Foo>());
    assert!(bridge.exposed_services().is_empty());
    assert_eq!(binder.disconnected.load(Ordering::SeqCst), 1);
}

// ----------------------------------------------------------------------------
// remove()
// ----------------------------------------------------------------------------

/// **VALUE**: Verifies remove unregisters every handler, pushes a removal script, and
/// allows exposing again.
///
/// **BUG THIS CATCHES**: Would catch stale handlers answering after removal.
#[tokio::test]
async fn given_exposed_service_when_removed_then_calls_fail_and_reexpose_works() {
    // GIVEN: Greeter exposed
    let (bridge, greeter, channel) = greeter_bridge();
    bridge
        .expose(greeter.clone() as Arc<dyn Greeter>, None)
        .expect("expose");
    assert_eq!(
        bridge.exposed_methods::<dyn Greeter>().len(),
        4,
        "greet, shout, and the event's subscribe/unsubscribe"
    );

    // WHEN: Removed
    let removed = bridge.remove::<dyn Greeter>().expect("remove");

    // THEN: Gone from the engine and the document
    assert!(removed);
    assert!(!bridge.is_exposed::<dyn Greeter>());
    assert!(bridge.engine().handler_names().is_empty());
    bridge
        .engine()
        .process_message(&request(1, "Greeter.greet", json!({ "name": "x" })))
        .await;
    assert_eq!(error_code(&channel.envelopes()[0]), -32601);
    let scripts = channel.wait_for_scripts(2).await;
    assert!(scripts.iter().any(|s| s.contains("delete window.agWebView.bridge[\"Greeter\"]")));

    // AND: Removing again is a no-op, exposing again works
    assert!(!bridge.remove::<dyn Greeter>().expect("second remove"));
    bridge
        .expose(greeter as Arc<dyn Greeter>, None)
        .expect("re-expose");
    assert!(bridge.is_exposed::<dyn Greeter>());
}

/// **VALUE**: Verifies stub and removal scripts reach the document in call order.
///
/// **WHY THIS MATTERS**: A removal script landing after the next stub deletes
/// the service the document was just given.
///
/// **BUG THIS CATCHES**: Would catch script pushes racing each other.
#[tokio::test]
async fn given_rapid_remove_and_expose_when_scripts_pushed_then_order_preserved() {
    // GIVEN: Greeter exposed
    let (bridge, greeter, channel) = greeter_bridge();
    bridge
        .expose(greeter.clone() as Arc<dyn Greeter>, None)
        .expect("expose");

    // WHEN: Removed and exposed again several times in a row
    for _ in 0..10 {
        bridge.remove::<dyn Greeter>().expect("remove");
        bridge
            .expose(greeter.clone() as Arc<dyn Greeter>, None)
            .expect("re-expose");
    }

    // THEN: Scripts alternate stub, removal, stub, ... ending with a stub
    let scripts = channel.wait_for_scripts(21).await;
    for (index, script) in scripts.iter().enumerate() {
        let is_removal = script.contains("delete window.agWebView.bridge");
        assert_eq!(is_removal, index % 2 == 1, "script {index} out of order");
    }
}

// ----------------------------------------------------------------------------
// Events
// ----------------------------------------------------------------------------

/// **VALUE**: Verifies events reach the document only between subscribe and unsubscribe.
///
/// **WHY THIS MATTERS**: Emitting to a document with no listener wastes a
/// round trip and logs noise on the document side.
#[tokio::test]
async fn given_exposed_event_when_subscribed_then_emits_notification() {
    let (bridge, greeter, channel) = greeter_bridge();
    bridge
        .expose(greeter.clone() as Arc<dyn Greeter>, None)
        .expect("expose");
    assert!(greeter.greeted.is_connected());

    // Not subscribed: nothing sent
    assert!(!greeter.greeted.emit(&"early".to_string()).await.expect("emit"));

    bridge
        .engine()
        .process_message(&request(1, "Greeter.$subscribe.greeted", json!({})))
        .await;
    assert!(greeter.greeted.is_subscribed());
    assert!(greeter.greeted.emit(&"Ada".to_string()).await.expect("emit"));

    bridge
        .engine()
        .process_message(&request(2, "Greeter.$unsubscribe.greeted", json!({})))
        .await;
    assert!(!greeter.greeted.emit(&"late".to_string()).await.expect("emit"));

    let notifications: Vec<_> = channel
        .envelopes()
        .into_iter()
        .filter(|e| e.get("id").is_none())
        .collect();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["method"], "Greeter.$event.greeted");
    assert_eq!(notifications[0]["params"], "Ada");
}

/// **VALUE**: Verifies removing a service disconnects its events.
#[tokio::test]
async fn given_subscribed_event_when_service_removed_then_disconnected() {
    let (bridge, greeter, _channel) = greeter_bridge();
    bridge
        .expose(greeter.clone() as Arc<dyn Greeter>, None)
        .expect("expose");
    bridge
        .engine()
        .process_message(&request(1, "Greeter.$subscribe.greeted", json!({})))
        .await;

    bridge.remove::<dyn Greeter>().expect("remove");

    assert!(!greeter.greeted.is_connected());
    assert!(!greeter.greeted.is_subscribed());
    assert!(!greeter.greeted.emit(&"gone".to_string()).await.expect("emit"));
}

// ----------------------------------------------------------------------------
// Naming and lifecycle
// ----------------------------------------------------------------------------

trait IInventory: Send + Sync {}

impl BridgeContract for dyn IInventory {
    fn contract() -> ContractInfo {
        ContractInfo::exported("IInventory")
    }
}

trait Renamed: Send + Sync {}

impl BridgeContract for dyn Renamed {
    fn contract() -> ContractInfo {
        ContractInfo::exported("Renamed").named("Store")
    }
}

/// **VALUE**: Verifies service names drop a leading interface `I` and honor custom names.
#[test]
fn given_contracts_when_naming_service_then_prefix_dropped_or_custom_used() {
    assert_eq!(<dyn IInventory as BridgeContract>::contract().service_name(), "Inventory");
    assert_eq!(<dyn Renamed as BridgeContract>::contract().service_name(), "Store");
}

/// **VALUE**: Verifies the configured match order decides which spelling binds when the
/// document sends both.
#[tokio::test]
async fn given_exact_first_order_when_both_spellings_sent_then_exact_wins() {
    let (engine, channel) = recording_engine();
    let bridge = BridgeService::builder(engine)
        .match_order(NameMatchOrder::ExactFirst)
        .build();
    bridge
        .expose(Arc::new(FriendlyGreeter::default()) as Arc<dyn Greeter>, None)
        .expect("expose");

    bridge
        .engine()
        .process_message(&request(
            1,
            "Greeter.shout",
            json!({ "name": "a", "repeat_count": 1, "repeatCount": 3 }),
        ))
        .await;

    assert_eq!(channel.envelopes()[0]["result"], "HEY A");
}

/// **VALUE**: Verifies the default order prefers the camelCase spelling.
#[tokio::test]
async fn given_default_order_when_both_spellings_sent_then_camel_case_wins() {
    let (bridge, greeter, channel) = greeter_bridge();
    bridge.expose(greeter as Arc<dyn Greeter>, None).expect("expose");

    bridge
        .engine()
        .process_message(&request(
            1,
            "Greeter.shout",
            json!({ "name": "a", "repeat_count": 1, "repeatCount": 2 }),
        ))
        .await;

    assert_eq!(channel.envelopes()[0]["result"], "HEY AHEY A");
}

/// **VALUE**: Verifies dispose tears everything down and refuses further use.
#[tokio::test]
async fn given_bridge_when_disposed_then_services_removed_and_calls_refused() {
    let (bridge, greeter, _channel) = greeter_bridge();
    bridge
        .expose(greeter.clone() as Arc<dyn Greeter>, None)
        .expect("expose");

    bridge.dispose();

    assert!(bridge.is_disposed());
    assert!(bridge.engine().handler_names().is_empty());
    let again = bridge.expose(greeter as Arc<dyn Greeter>, None);
    assert!(matches!(again, Err(BindingError::Disposed { .. })));
}
