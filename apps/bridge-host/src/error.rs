use bridge_core::CoreError;

use common::ErrorLocation;

use serde::Serialize;
use thiserror::Error;

/// Errors raised while starting or running the host.
///
/// Library errors are flattened to their message so the whole enum stays
/// serializable for whoever supervises the host process.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum HostError {
    /// Error from this app
    #[error("Host Error: {message} {location}")]
    Host {
        message: String,
        location: ErrorLocation,
    },

    /// Error from bridge-core (engine, binding, transport)
    #[error("Core Error: {message} {location}")]
    Core {
        message: String,
        location: ErrorLocation,
    },

    /// bridge.json could not be loaded
    #[error("Config Error: {message} {location}")]
    Config {
        message: String,
        location: ErrorLocation,
    },
}

impl HostError {
    #[track_caller]
    pub fn host(message: impl Into<String>) -> Self {
        HostError::Host {
            message: message.into(),
            location: ErrorLocation::caller(),
        }
    }
}

impl From<CoreError> for HostError {
    #[track_caller]
    fn from(error: CoreError) -> Self {
        let message = error.to_string();
        let location = ErrorLocation::caller();
        match error {
            CoreError::Config(_) => HostError::Config { message, location },
            _ => HostError::Core { message, location },
        }
    }
}
