// Unit tests for the descriptor binder's naming and stub output

use crate::bridge::NameMatchOrder;
use crate::bridge::binder::{DescriptorBinder, ServiceBinder};
use crate::bridge::descriptor::{MethodDescriptor, ParamDescriptor, ReturnShape, ServiceDescriptor};
use crate::error::BindingError;
use crate::rpc::Reply;

trait Search: Send + Sync {}

fn method(
    name: &'static str,
    returns: ReturnShape,
    params: &[&'static str],
) -> MethodDescriptor<dyn Search> {
    let base = MethodDescriptor::new(name, returns, |_service, _args, _token| async {
        Ok(Reply::Empty)
    });
    params
        .iter()
        .fold(base, |method, param| method.param(ParamDescriptor::required(param)))
}

/// **VALUE**: Verifies overloads get `$N` suffixes by parameter count, lowest keeps the bare name.
///
/// **WHY THIS MATTERS**: The document stub calls `Search.query$3`; if the suffix used a
/// declaration index instead of the count the call would miss.
///
/// **BUG THIS CATCHES**: Would catch suffixing by position or suffixing the base overload.
#[test]
fn given_three_overloads_when_binder_built_then_suffixed_by_arity() {
    // GIVEN: query(), query(text), query(text, page, size) declared out of order
    let descriptor = ServiceDescriptor::new()
        .method(method("query", ReturnShape::Value, &["text", "page", "size"]))
        .method(method("query", ReturnShape::Value, &[]))
        .method(method("query", ReturnShape::Value, &["text"]));

    // WHEN: Building the binder
    let binder = DescriptorBinder::new("Search".into(), descriptor, NameMatchOrder::default())
        .expect("distinct arities bind");

    // THEN: Bare name for the lowest arity, count suffix for the rest
    let mut names = binder.method_names();
    names.sort();
    assert_eq!(names, vec!["Search.query", "Search.query$1", "Search.query$3"]);
}

/// **VALUE**: Verifies cancellation parameters do not count toward arity.
#[test]
fn given_cancellable_overload_when_binder_built_then_signal_excluded_from_suffix() {
    let cancellable = method("fetch", ReturnShape::Value, &["url"])
        .param(ParamDescriptor::cancellation("cancellation"));
    let descriptor = ServiceDescriptor::new()
        .method(method("fetch", ReturnShape::Value, &[]))
        .method(cancellable);

    let binder = DescriptorBinder::new("Search".into(), descriptor, NameMatchOrder::default())
        .expect("distinct arities bind");

    assert!(binder.method_names().contains(&"Search.fetch$1".to_string()));
}

/// **VALUE**: Verifies two overloads with the same arity are rejected.
///
/// **BUG THIS CATCHES**: Would catch the second overload silently replacing the first.
#[test]
fn given_equal_arity_overloads_when_binder_built_then_duplicate_method_error() {
    let descriptor = ServiceDescriptor::new()
        .method(method("find", ReturnShape::Value, &["a"]))
        .method(method("find", ReturnShape::Value, &["b"]));

    let result = DescriptorBinder::new("Search".into(), descriptor, NameMatchOrder::default());

    match result {
        Err(BindingError::DuplicateMethod { method, .. }) => assert_eq!(method, "Search.find"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("duplicate arity must fail"),
    }
}

/// **VALUE**: Verifies the stub routes streaming methods through the async iterable helper.
#[test]
fn given_value_and_stream_methods_when_js_stub_then_each_uses_right_helper() {
    let descriptor = ServiceDescriptor::new()
        .method(method("get_item", ReturnShape::Value, &["id"]))
        .method(method("watch", ReturnShape::Stream, &[]));
    let binder = DescriptorBinder::new("Search".into(), descriptor, NameMatchOrder::default())
        .expect("binder builds");

    let stub = binder.js_stub();

    assert!(stub.contains(r#"window.agWebView.bridge["Search"]"#));
    assert!(stub.contains(r#""getItem": function(params) { return rpc.invoke("Search.getItem", params); }"#));
    assert!(stub.contains(r#"rpc._createAsyncIterable("Search.watch", params)"#));
    assert!(!binder.is_generated());
}
