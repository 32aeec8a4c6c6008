// Unit tests for wire naming rules

use crate::bridge::naming::{
    event_wire_name, overload_name, service_name, subscribe_wire_name, to_camel_case,
};

/// **VALUE**: Verifies Rust and PascalCase method names map to the camelCase wire form.
///
/// **WHY THIS MATTERS**: The document calls `Service.getUser`; if the host registers
/// `Service.get_user` every call is MethodNotFound.
///
/// **BUG THIS CATCHES**: Would catch underscores leaking into wire names or the first
/// letter staying uppercase.
#[test]
fn given_snake_and_pascal_names_when_to_camel_case_then_lower_camel() {
    assert_eq!(to_camel_case("get_user"), "getUser");
    assert_eq!(to_camel_case("GetUser"), "getUser");
    assert_eq!(to_camel_case("getUser"), "getUser");
    assert_eq!(to_camel_case("ping"), "ping");
    assert_eq!(to_camel_case("list_all_items"), "listAllItems");
    assert_eq!(to_camel_case(""), "");
}

/// **VALUE**: Verifies leading underscores do not produce an uppercase first letter.
///
/// **BUG THIS CATCHES**: Would catch `_internal` becoming `Internal`.
#[test]
fn given_leading_underscore_when_to_camel_case_then_first_letter_lowercase() {
    assert_eq!(to_camel_case("_internal"), "internal");
}

/// **VALUE**: Verifies the `I` prefix convention for interface names.
///
/// **WHY THIS MATTERS**: Stubs appear under `window.agWebView.bridge.<Service>`; the
/// document expects `Greeter`, not `IGreeter`.
///
/// **BUG THIS CATCHES**: Would catch stripping the `I` from names like `Inventory`.
#[test]
fn given_interface_names_when_service_name_then_strips_leading_i_only_before_uppercase() {
    assert_eq!(service_name("IGreeter", None), "Greeter");
    assert_eq!(service_name("Inventory", None), "Inventory");
    assert_eq!(service_name("I", None), "I");
    assert_eq!(service_name("Calculator", None), "Calculator");
}

/// **VALUE**: Verifies a custom service name wins over the derived one.
#[test]
fn given_custom_name_when_service_name_then_custom_name_used() {
    assert_eq!(service_name("IGreeter", Some("Hello")), "Hello");
    assert_eq!(service_name("IGreeter", Some("")), "Greeter");
}

/// **VALUE**: Verifies overload suffixes use the parameter count.
///
/// **BUG THIS CATCHES**: Would catch suffixing the lowest-arity overload.
#[test]
fn given_overloads_when_overload_name_then_only_higher_arity_suffixed() {
    assert_eq!(overload_name("query", 0, true), "query");
    assert_eq!(overload_name("query", 1, false), "query$1");
    assert_eq!(overload_name("query", 3, false), "query$3");
}

/// **VALUE**: Verifies event control and notification method names.
#[test]
fn given_event_when_wire_names_then_reserved_prefixes_used() {
    assert_eq!(subscribe_wire_name("Clock", "tick"), "Clock.$subscribe.tick");
    assert_eq!(event_wire_name("Clock", "time_changed"), "Clock.$event.timeChanged");
}
