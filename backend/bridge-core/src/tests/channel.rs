// Unit tests for outbound script framing

use crate::rpc::channel::OutboundMessage;
use crate::rpc::document::{RPC_RUNTIME_SCRIPT, runtime_message};

/// **VALUE**: Verifies requests and replies are framed as calls with a JSON string literal.
///
/// **WHY THIS MATTERS**: The document parses the argument with `JSON.parse`; unescaped
/// quotes would break the script before it runs.
///
/// **BUG THIS CATCHES**: Would catch embedding raw JSON instead of a string literal, or
/// routing replies to `_dispatch`.
#[test]
fn given_envelopes_when_to_script_then_wrapped_in_entry_points() {
    let json = r#"{"jsonrpc":"2.0","id":"1","result":"a\"b"}"#;

    let reply = OutboundMessage::Response(json.to_string()).to_script();
    let request = OutboundMessage::Request(json.to_string()).to_script();

    assert!(reply.ends_with(r#"._onResponse("{\"jsonrpc\":\"2.0\",\"id\":\"1\",\"result\":\"a\\\"b\"}")"#));
    assert!(request.contains("._dispatch(\""));
    assert!(reply.starts_with("window.agWebView && window.agWebView.rpc"));
}

/// **VALUE**: Verifies raw scripts pass through untouched and carry no envelope.
#[test]
fn given_script_message_when_rendered_then_unchanged_and_no_envelope() {
    let message = OutboundMessage::Script("console.log(1);".to_string());

    assert_eq!(message.to_script(), "console.log(1);");
    assert_eq!(message.envelope_json(), None);
}

/// **VALUE**: Verifies the document runtime exposes every entry point the host relies on.
///
/// **BUG THIS CATCHES**: Would catch an edit dropping batch support or the streaming helper.
#[test]
fn given_runtime_script_when_inspected_then_all_entry_points_present() {
    for entry in [
        "invoke: function(method, params, signal)",
        "batch: function(calls)",
        "handle: function(method, handler)",
        "_dispatch: function(jsonStr)",
        "_onResponse: function(jsonStr)",
        "_createAsyncIterable: function(method, params)",
        "Promise.all(resultPromises)",
        "$/cancelRequest",
        "$/enumerator/abort",
    ] {
        assert!(RPC_RUNTIME_SCRIPT.contains(entry), "missing {entry}");
    }
    assert!(matches!(runtime_message(), OutboundMessage::Script(_)));
}
