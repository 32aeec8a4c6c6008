//! The string channel into the document.
//!
//! The engine never talks to a web view directly: everything it produces is
//! an [`OutboundMessage`] handed to a [`DocumentChannel`]. Script-injecting
//! hosts call [`OutboundMessage::to_script`]; socket transports forward the
//! raw envelope text.

use crate::error::TransportError;

use futures_util::future::BoxFuture;

const RPC_GLOBAL: &str = "window.agWebView && window.agWebView.rpc && window.agWebView.rpc";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    /// A call or notification for the document's handlers.
    Request(String),
    /// A reply (single or batch) for the document's pending calls.
    Response(String),
    /// A raw script such as a service stub.
    Script(String),
}

impl OutboundMessage {
    /// Envelope text, `None` for raw scripts.
    pub fn envelope_json(&self) -> Option<&str> {
        match self {
            OutboundMessage::Request(json) | OutboundMessage::Response(json) => Some(json),
            OutboundMessage::Script(_) => None,
        }
    }

    /// Render as a script to evaluate inside the document.
    pub fn to_script(&self) -> String {
        match self {
            OutboundMessage::Request(json) => {
                format!("{RPC_GLOBAL}._dispatch({})", js_string_literal(json))
            }
            OutboundMessage::Response(json) => {
                format!("{RPC_GLOBAL}._onResponse({})", js_string_literal(json))
            }
            OutboundMessage::Script(script) => script.clone(),
        }
    }
}

fn js_string_literal(text: &str) -> String {
    // A JSON string literal is a valid JS string literal.
    serde_json::Value::String(text.to_string()).to_string()
}

/// Pushes messages into the document.
///
/// Implementations must be cheap to call concurrently; the engine posts from
/// whichever task produced the message.
pub trait DocumentChannel: Send + Sync {
    fn post(&self, message: OutboundMessage) -> BoxFuture<'_, Result<(), TransportError>>;
}
