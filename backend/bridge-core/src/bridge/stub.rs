//! JS stubs published for exposed services under `window.agWebView.bridge`.

use serde_json::Value;

/// One callable entry on a service stub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubMethod {
    /// Property name on the stub object, e.g. `query$1`.
    pub js_name: String,
    pub wire_name: String,
    pub streaming: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubEvent {
    pub js_name: String,
    pub subscribe: String,
    pub unsubscribe: String,
    pub notification: String,
}

fn literal(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}

pub fn service_stub(service: &str, methods: &[StubMethod], events: &[StubEvent]) -> String {
    let mut members = Vec::with_capacity(methods.len() + events.len());
    for method in methods {
        let call = if method.streaming {
            "rpc._createAsyncIterable"
        } else {
            "rpc.invoke"
        };
        members.push(format!(
            "        {}: function(params) {{ return {}({}, params); }}",
            literal(&method.js_name),
            call,
            literal(&method.wire_name)
        ));
    }
    for event in events {
        members.push(format!(
            "        {name}: {{\n            subscribe: function(handler) {{ rpc.handle({event}, handler); return rpc.invoke({sub}); }},\n            unsubscribe: function() {{ rpc.handle({event}, null); return rpc.invoke({unsub}); }}\n        }}",
            name = literal(&event.js_name),
            event = literal(&event.notification),
            sub = literal(&event.subscribe),
            unsub = literal(&event.unsubscribe),
        ));
    }

    format!(
        "(function() {{\n    if (!window.agWebView) window.agWebView = {{}};\n    if (!window.agWebView.bridge) window.agWebView.bridge = {{}};\n    var rpc = window.agWebView.rpc;\n    window.agWebView.bridge[{}] = {{\n{}\n    }};\n}})();",
        literal(service),
        members.join(",\n")
    )
}

pub fn removal_script(service: &str) -> String {
    format!(
        "(function() {{ if (window.agWebView && window.agWebView.bridge) {{ delete window.agWebView.bridge[{}]; }} }})();",
        literal(service)
    )
}
