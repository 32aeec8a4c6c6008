//! JSON-RPC 2.0 envelopes as they travel over the string channel.
//!
//! Inbound text is classified from the raw [`Value`] rather than through
//! `Deserialize`, so structurally invalid batch items can still be answered
//! with the id they carried.

use crate::error::{RpcError, RpcErrorCode};

use std::fmt::{Display, Formatter, Result as FormatResult};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const JSONRPC_VERSION: &str = "2.0";
pub const CANCEL_REQUEST_METHOD: &str = "$/cancelRequest";
pub const ENUMERATOR_NEXT_PREFIX: &str = "$/enumerator/next/";
pub const ENUMERATOR_ABORT_METHOD: &str = "$/enumerator/abort";

/// Correlation id: the document uses strings, other peers may send integers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Num(i64),
    Str(String),
}

impl RequestId {
    /// Fresh outbound id (UUID v4, simple form).
    pub fn generate() -> Self {
        RequestId::Str(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(RequestId::Str(s.clone())),
            Value::Number(n) => n.as_i64().map(RequestId::Num),
            _ => None,
        }
    }
}

impl Display for RequestId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        match self {
            RequestId::Num(n) => write!(formatter, "{n}"),
            RequestId::Str(s) => write!(formatter, "{s}"),
        }
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        RequestId::Str(value.to_string())
    }
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        RequestId::Num(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i32,
    pub message: String,
}

impl From<&RpcError> for ErrorObject {
    fn from(error: &RpcError) -> Self {
        Self {
            code: error.code(),
            message: error.message().to_string(),
        }
    }
}

/// One wire message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

impl Envelope {
    fn blank(id: Option<RequestId>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: None,
            params: None,
            result: None,
            error: None,
        }
    }

    pub fn request(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            method: Some(method.into()),
            params,
            ..Self::blank(Some(id))
        }
    }

    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            method: Some(method.into()),
            params,
            ..Self::blank(None)
        }
    }

    /// Success reply. A null result omits the `result` member.
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            result: (!result.is_null()).then_some(result),
            ..Self::blank(Some(id))
        }
    }

    pub fn failure(id: RequestId, error: &RpcError) -> Self {
        Self {
            error: Some(ErrorObject::from(error)),
            ..Self::blank(Some(id))
        }
    }

    pub fn to_json(&self) -> Result<String, RpcError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_value(&self) -> Result<Value, RpcError> {
        Ok(serde_json::to_value(self)?)
    }
}

/// What an inbound item turned out to be.
#[derive(Debug)]
pub enum Incoming {
    Request {
        id: RequestId,
        method: String,
        params: Option<Value>,
    },
    Notification {
        method: String,
        params: Option<Value>,
    },
    Reply {
        id: RequestId,
        outcome: Result<Value, RpcError>,
    },
    Invalid {
        id: Option<RequestId>,
        reason: String,
    },
}

impl Incoming {
    /// Classify one decoded item.
    pub fn classify(value: Value) -> Self {
        let Value::Object(mut object) = value else {
            return Incoming::Invalid {
                id: None,
                reason: "message is not an object".to_string(),
            };
        };

        let id = object.get("id").and_then(RequestId::from_value);

        if object.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return Incoming::Invalid {
                id,
                reason: "missing or unsupported jsonrpc version".to_string(),
            };
        }

        if let Some(Value::String(method)) = object.remove("method") {
            let params = object.remove("params");
            return match id {
                Some(id) => Incoming::Request { id, method, params },
                None => Incoming::Notification { method, params },
            };
        }

        // An id without a method is a reply; no result and no error is an empty success.
        match id {
            Some(id) if object.contains_key("error") => Incoming::Reply {
                id,
                outcome: Err(reply_error(&object)),
            },
            Some(id) => Incoming::Reply {
                id,
                outcome: Ok(object.remove("result").unwrap_or(Value::Null)),
            },
            None => Incoming::Invalid {
                id: None,
                reason: "message has neither a method nor an id".to_string(),
            },
        }
    }
}

fn reply_error(object: &Map<String, Value>) -> RpcError {
    let error = object.get("error");
    let code = error
        .and_then(|e| e.get("code"))
        .and_then(Value::as_i64)
        .and_then(|c| i32::try_from(c).ok())
        .unwrap_or(RpcErrorCode::InternalError.code());
    let message = error
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("RPC error");
    RpcError::new(code, message)
}
