//! Protocol-level error carried in reply envelopes.
//!
//! Key design decisions:
//! - The wire pair is `(code, message)`; the location is for logs only
//! - Reserved codes live in [`RpcErrorCode`], anything else is application-defined
//! - `#[track_caller]` constructors capture where the error was raised

use common::ErrorLocation;

use std::fmt::{Display, Formatter, Result as FormatResult};

use thiserror::Error as ThisError;

/// Reserved JSON-RPC error codes used by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum RpcErrorCode {
    InvalidRequest = -32600,
    MethodNotFound = -32601,
    InternalError = -32603,
    Timeout = -32000,
    Cancelled = -32800,
    RateLimited = -32029,
}

impl RpcErrorCode {
    pub const fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -32600 => Some(Self::InvalidRequest),
            -32601 => Some(Self::MethodNotFound),
            -32603 => Some(Self::InternalError),
            -32000 => Some(Self::Timeout),
            -32800 => Some(Self::Cancelled),
            -32029 => Some(Self::RateLimited),
            _ => None,
        }
    }
}

impl Display for RpcErrorCode {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        write!(formatter, "{}", self.code())
    }
}

/// An RPC failure: either received from the document or produced while dispatching.
#[derive(Debug, Clone, ThisError)]
#[error("RPC Error {code}: {message} {location}")]
pub struct RpcError {
    code: i32,
    message: String,
    location: ErrorLocation,
}

impl RpcError {
    #[track_caller]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub fn from_code(code: RpcErrorCode, message: impl Into<String>) -> Self {
        Self::new(code.code(), message)
    }

    #[track_caller]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::from_code(RpcErrorCode::InternalError, message)
    }

    #[track_caller]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::from_code(RpcErrorCode::InvalidRequest, message)
    }

    #[track_caller]
    pub fn method_not_found(method: &str) -> Self {
        Self::from_code(
            RpcErrorCode::MethodNotFound,
            format!("Method not found: {method}"),
        )
    }

    #[track_caller]
    pub fn cancelled() -> Self {
        Self::from_code(RpcErrorCode::Cancelled, "Request cancelled")
    }

    #[track_caller]
    pub fn timeout(method: &str) -> Self {
        Self::from_code(
            RpcErrorCode::Timeout,
            format!("RPC call '{method}' timed out."),
        )
    }

    #[track_caller]
    pub fn rate_limited() -> Self {
        Self::from_code(RpcErrorCode::RateLimited, "Rate limit exceeded")
    }

    #[track_caller]
    pub fn unsupported_shape(method: &str, shape: impl Display) -> Self {
        Self::internal(format!(
            "Imported method '{method}' must complete asynchronously with no value or a value; '{shape}' is not supported"
        ))
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn location(&self) -> ErrorLocation {
        self.location
    }

    /// The reserved code this error carries, if any.
    pub fn kind(&self) -> Option<RpcErrorCode> {
        RpcErrorCode::from_code(self.code)
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == Some(RpcErrorCode::Cancelled)
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == Some(RpcErrorCode::Timeout)
    }
}

impl From<serde_json::Error> for RpcError {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        RpcError::internal(error.to_string())
    }
}
