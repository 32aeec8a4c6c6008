//! Test helpers for bridge integration tests.
//!
//! - [`RecordingChannel`]: a document channel that keeps everything posted
//! - Envelope builders for messages the document would send
//! - Polling helpers for state that settles asynchronously

use bridge_core::error::TransportError;
use bridge_core::rpc::{DocumentChannel, OutboundMessage, RpcEngine};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::{Value, json};

/// How long any helper waits before failing the test.
pub const WAIT_LIMIT: Duration = Duration::from_secs(2);

/// Test helper: channel that records every outbound message.
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<OutboundMessage>>,
}

impl RecordingChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().expect("channel lock").clone()
    }

    /// Parsed envelopes (requests, notifications and replies); scripts are skipped.
    pub fn envelopes(&self) -> Vec<Value> {
        self.messages()
            .iter()
            .filter_map(OutboundMessage::envelope_json)
            .map(|json| serde_json::from_str(json).expect("posted envelope is JSON"))
            .collect()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter_map(|message| match message {
                OutboundMessage::Script(script) => Some(script),
                _ => None,
            })
            .collect()
    }

    /// Wait until at least `count` envelopes have been posted.
    pub async fn wait_for_envelopes(&self, count: usize) -> Vec<Value> {
        wait_until(|| self.envelopes().len() >= count).await;
        self.envelopes()
    }

    /// Wait until at least `count` scripts have been posted.
    pub async fn wait_for_scripts(&self, count: usize) -> Vec<String> {
        wait_until(|| self.scripts().len() >= count).await;
        self.scripts()
    }
}

impl DocumentChannel for RecordingChannel {
    fn post(&self, message: OutboundMessage) -> BoxFuture<'_, Result<(), TransportError>> {
        self.sent.lock().expect("channel lock").push(message);
        async { Ok(()) }.boxed()
    }
}

/// Test helper: channel with no document attached.
pub struct DisconnectedChannel;

impl DocumentChannel for DisconnectedChannel {
    fn post(&self, _message: OutboundMessage) -> BoxFuture<'_, Result<(), TransportError>> {
        async { Err(TransportError::not_connected()) }.boxed()
    }
}

/// Test helper: engine on a fresh recording channel.
pub fn recording_engine() -> (RpcEngine, Arc<RecordingChannel>) {
    let channel = RecordingChannel::new();
    let engine = RpcEngine::new(channel.clone());
    (engine, channel)
}

/// Test helper: request text as the document would send it.
pub fn request(id: i64, method: &str, params: Value) -> String {
    json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }).to_string()
}

pub fn notification(method: &str, params: Value) -> String {
    json!({ "jsonrpc": "2.0", "method": method, "params": params }).to_string()
}

pub fn success_reply(id: &Value, result: Value) -> String {
    json!({ "jsonrpc": "2.0", "id": id, "result": result }).to_string()
}

/// Reply for a handler that returned nothing: only `jsonrpc` and `id`.
pub fn empty_reply(id: &Value) -> String {
    json!({ "jsonrpc": "2.0", "id": id }).to_string()
}

pub fn error_reply(id: &Value, code: i32, message: &str) -> String {
    json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } })
        .to_string()
}

/// Poll `condition` until it holds or [`WAIT_LIMIT`] passes.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let polled = tokio::time::timeout(WAIT_LIMIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "condition not met within {WAIT_LIMIT:?}");
}

/// Error code of a reply envelope, panicking when it is a success.
pub fn error_code(envelope: &Value) -> i64 {
    envelope["error"]["code"]
        .as_i64()
        .unwrap_or_else(|| panic!("expected error reply, got {envelope}"))
}
