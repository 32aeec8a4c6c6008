// Unit tests for envelope encoding and inbound classification

use crate::RpcError;
use crate::rpc::envelope::{Envelope, Incoming, RequestId};

use serde_json::{Value, json};

/// **VALUE**: Verifies a null success result omits the `result` member.
///
/// **WHY THIS MATTERS**: Unit-returning handlers reply `{jsonrpc, id}` only; the
/// document treats a missing result as `undefined`.
///
/// **BUG THIS CATCHES**: Would catch serializing `"result": null`.
#[test]
fn given_null_result_when_success_envelope_then_result_omitted() {
    let envelope = Envelope::success(RequestId::from("1"), Value::Null);

    let value = envelope.to_value().expect("serializable");

    assert_eq!(value, json!({ "jsonrpc": "2.0", "id": "1" }));
}

/// **VALUE**: Verifies error replies carry exactly `code` and `message`.
#[test]
fn given_rpc_error_when_failure_envelope_then_code_and_message() {
    let envelope = Envelope::failure(RequestId::from(7), &RpcError::method_not_found("A.b"));

    let value = envelope.to_value().expect("serializable");

    assert_eq!(
        value,
        json!({
            "jsonrpc": "2.0",
            "id": 7,
            "error": { "code": -32601, "message": "Method not found: A.b" }
        })
    );
}

/// **VALUE**: Verifies outbound ids are 32-char simple UUIDs and unique.
#[test]
fn given_generated_ids_when_compared_then_simple_uuid_and_unique() {
    let first = RequestId::generate();
    let second = RequestId::generate();

    let RequestId::Str(text) = &first else {
        panic!("generated ids are strings");
    };
    assert_eq!(text.len(), 32);
    assert!(!text.contains('-'));
    assert_ne!(first, second);
}

/// **VALUE**: Verifies the four inbound kinds are recognized.
///
/// **WHY THIS MATTERS**: Classification decides whether a message resolves a pending
/// call, runs a handler, or is ignored; a mistake either hangs callers or answers
/// notifications.
///
/// **BUG THIS CATCHES**: Would catch requests without ids being treated as requests,
/// or replies with a method being treated as replies.
#[test]
fn given_each_message_kind_when_classify_then_correct_variant() {
    let request = Incoming::classify(json!({"jsonrpc":"2.0","id":"a","method":"S.m","params":[1]}));
    let notification = Incoming::classify(json!({"jsonrpc":"2.0","method":"S.n"}));
    let reply = Incoming::classify(json!({"jsonrpc":"2.0","id":"b","result":5}));
    let failure = Incoming::classify(
        json!({"jsonrpc":"2.0","id":"c","error":{"code":-32029,"message":"slow down"}}),
    );

    assert!(matches!(
        request,
        Incoming::Request { ref method, params: Some(_), .. } if method == "S.m"
    ));
    assert!(matches!(notification, Incoming::Notification { params: None, .. }));
    assert!(matches!(reply, Incoming::Reply { outcome: Ok(ref v), .. } if *v == json!(5)));
    match failure {
        Incoming::Reply { outcome: Err(e), .. } => {
            assert_eq!(e.code(), -32029);
            assert_eq!(e.message(), "slow down");
        }
        other => panic!("expected error reply, got {other:?}"),
    }
}

/// **VALUE**: Verifies a `result: null` reply still counts as a reply.
#[test]
fn given_null_result_reply_when_classify_then_reply_with_null() {
    let reply = Incoming::classify(json!({"jsonrpc":"2.0","id":"x","result":null}));

    assert!(matches!(reply, Incoming::Reply { outcome: Ok(Value::Null), .. }));
}

/// **VALUE**: Verifies structurally invalid items keep whatever id they had.
///
/// **WHY THIS MATTERS**: Batch replies answer invalid items with InvalidRequest under
/// their id; items without an id must produce no entry.
#[test]
fn given_invalid_items_when_classify_then_invalid_with_optional_id() {
    let no_version = Incoming::classify(json!({"id": 3, "method": "S.m"}));
    let no_method_no_id = Incoming::classify(json!({"jsonrpc":"2.0","params":[1]}));
    let not_object = Incoming::classify(json!(42));

    assert!(matches!(no_version, Incoming::Invalid { id: Some(RequestId::Num(3)), .. }));
    assert!(matches!(no_method_no_id, Incoming::Invalid { id: None, .. }));
    assert!(matches!(not_object, Incoming::Invalid { id: None, .. }));
}

/// **VALUE**: Verifies a reply carrying only an id is an empty success.
///
/// **WHY THIS MATTERS**: A document handler returning `undefined` serializes
/// without a `result` member; the host's own unit replies omit it too.
///
/// **BUG THIS CATCHES**: Would catch void calls into the document waiting for
/// the full call timeout instead of completing.
#[test]
fn given_reply_without_result_or_error_when_classify_then_null_success() {
    // GIVEN: `{jsonrpc, id}` only
    let bare = Incoming::classify(json!({"jsonrpc":"2.0","id":"q"}));

    // THEN: Reply with a null value
    match bare {
        Incoming::Reply { id: RequestId::Str(id), outcome: Ok(value) } => {
            assert_eq!(id, "q");
            assert!(value.is_null());
        }
        other => panic!("expected an empty success reply, got {other:?}"),
    }
}
