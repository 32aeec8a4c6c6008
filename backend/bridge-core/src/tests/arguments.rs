// Unit tests for binding raw params onto declared parameters

use crate::RpcErrorCode;
use crate::bridge::NameMatchOrder;
use crate::bridge::arguments::bind_arguments;
use crate::bridge::descriptor::ParamDescriptor;

use serde_json::{Value, json};

fn params() -> Vec<ParamDescriptor> {
    vec![
        ParamDescriptor::of::<String>("user_name"),
        ParamDescriptor::of::<i32>("max_count").with_default(json!(10)),
        ParamDescriptor::cancellation("cancellation"),
        ParamDescriptor::of::<bool>("verbose"),
    ]
}

/// **VALUE**: Verifies object arguments bind by camelCase name.
///
/// **WHY THIS MATTERS**: The document sends `{ userName: ... }` for a Rust parameter
/// named `user_name`. This is the normal calling convention.
///
/// **BUG THIS CATCHES**: Would catch binding by position for objects or ignoring the
/// camelCase conversion.
#[test]
fn given_object_with_camel_keys_when_bind_then_values_by_name() {
    // GIVEN: Object params using camelCase keys, out of order
    let raw = json!({ "verbose": true, "maxCount": 3, "userName": "ada" });

    // WHEN: Binding
    let args = bind_arguments(&params(), Some(&raw), NameMatchOrder::CamelCaseFirst)
        .expect("binding should succeed");

    // THEN: Declaration order, cancellation slot skipped
    assert_eq!(args.values(), &[json!("ada"), json!(3), json!(true)]);
}

/// **VALUE**: Verifies missing properties fall back to the declared default, then zero value.
///
/// **BUG THIS CATCHES**: Would catch binding `null` where a default exists, which makes
/// typed deserialization fail with InternalError.
#[test]
fn given_object_missing_properties_when_bind_then_default_then_zero_value() {
    let raw = json!({ "userName": "ada" });

    let args = bind_arguments(&params(), Some(&raw), NameMatchOrder::CamelCaseFirst)
        .expect("binding should succeed");

    assert_eq!(args.values(), &[json!("ada"), json!(10), json!(false)]);
}

/// **VALUE**: Verifies the exact Rust parameter name is accepted as a fallback.
#[test]
fn given_object_with_exact_keys_when_bind_then_exact_name_matches() {
    let raw = json!({ "user_name": "grace", "max_count": 1 });

    let args = bind_arguments(&params(), Some(&raw), NameMatchOrder::CamelCaseFirst)
        .expect("binding should succeed");

    assert_eq!(args.get::<String>(0).expect("string"), "grace");
    assert_eq!(args.get::<i32>(1).expect("int"), 1);
}

/// **VALUE**: Verifies the configurable match order picks the exact name first.
///
/// **WHY THIS MATTERS**: When both spellings are present the result depends on the
/// configured order; each order must be honoured.
///
/// **BUG THIS CATCHES**: Would catch the order setting being ignored.
#[test]
fn given_both_spellings_when_bind_then_match_order_decides() {
    let raw = json!({ "userName": "camel", "user_name": "exact" });

    let camel_first = bind_arguments(&params(), Some(&raw), NameMatchOrder::CamelCaseFirst)
        .expect("binding should succeed");
    let exact_first = bind_arguments(&params(), Some(&raw), NameMatchOrder::ExactFirst)
        .expect("binding should succeed");

    assert_eq!(camel_first.values()[0], json!("camel"));
    assert_eq!(exact_first.values()[0], json!("exact"));
}

/// **VALUE**: Verifies array arguments bind positionally with trailing slots defaulted.
#[test]
fn given_short_array_when_bind_then_positional_with_defaults() {
    let raw = json!(["ada"]);

    let args = bind_arguments(&params(), Some(&raw), NameMatchOrder::CamelCaseFirst)
        .expect("binding should succeed");

    assert_eq!(args.values(), &[json!("ada"), json!(10), json!(false)]);
}

/// **VALUE**: Verifies absent and null params bind every parameter to its fallback.
#[test]
fn given_null_or_absent_params_when_bind_then_all_fallbacks() {
    let expected = [json!(""), json!(10), json!(false)];

    let absent = bind_arguments(&params(), None, NameMatchOrder::CamelCaseFirst)
        .expect("binding should succeed");
    let null = bind_arguments(&params(), Some(&Value::Null), NameMatchOrder::CamelCaseFirst)
        .expect("binding should succeed");

    assert_eq!(absent.values(), &expected);
    assert_eq!(null.values(), &expected);
}

/// **VALUE**: Verifies a bare scalar binds to a single-parameter method.
///
/// **WHY THIS MATTERS**: `invoke('Svc.echo', 'hi')` is a common shorthand in documents.
#[test]
fn given_scalar_and_single_param_when_bind_then_scalar_is_argument() {
    let single = vec![ParamDescriptor::of::<String>("text")];

    let args = bind_arguments(&single, Some(&json!("hi")), NameMatchOrder::CamelCaseFirst)
        .expect("binding should succeed");

    assert_eq!(args.values(), &[json!("hi")]);
}

/// **VALUE**: Verifies a scalar for a multi-parameter method is an InternalError.
///
/// **BUG THIS CATCHES**: Would catch silently binding the scalar to the first parameter.
#[test]
fn given_scalar_and_many_params_when_bind_then_internal_error() {
    let error = bind_arguments(&params(), Some(&json!(5)), NameMatchOrder::CamelCaseFirst)
        .expect_err("binding should fail");

    assert_eq!(error.kind(), Some(RpcErrorCode::InternalError));
}

/// **VALUE**: Verifies a type mismatch surfaces as InternalError when the invoker reads it.
#[test]
fn given_wrong_type_when_args_get_then_internal_error() {
    let raw = json!({ "userName": 42 });
    let args = bind_arguments(&params(), Some(&raw), NameMatchOrder::CamelCaseFirst)
        .expect("binding should succeed");

    let error = args.get::<String>(0).expect_err("42 is not a string");

    assert_eq!(error.code(), -32603);
}
