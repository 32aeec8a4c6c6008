//! Errors raised while exposing, removing or importing services.
//!
//! These are synchronous and fatal to the call that produced them only;
//! partial registrations are rolled back before they are returned.

use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum BindingError {
    #[error("Not An Interface Error: '{type_name}' must be an interface contract {location}")]
    NotAnInterface {
        type_name: String,
        location: ErrorLocation,
    },

    #[error("Missing Marker Error: '{type_name}' must be marked {marker} {location}")]
    MissingMarker {
        type_name: String,
        marker: &'static str,
        location: ErrorLocation,
    },

    #[error(
        "Already Exposed Error: service '{service}' has already been exposed, remove it first {location}"
    )]
    AlreadyExposed {
        service: String,
        location: ErrorLocation,
    },

    #[error("No Binder Error: no generated binder or descriptor for '{type_name}' {location}")]
    NoBinder {
        type_name: String,
        location: ErrorLocation,
    },

    #[error("Duplicate Method Error: '{method}' is declared twice with the same arity {location}")]
    DuplicateMethod {
        method: String,
        location: ErrorLocation,
    },

    #[error("Registration Error: service '{service}': {message} {location}")]
    Registration {
        service: String,
        message: String,
        location: ErrorLocation,
    },

    #[error("Proxy Error: '{type_name}': {message} {location}")]
    Proxy {
        type_name: String,
        message: String,
        location: ErrorLocation,
    },

    #[error("Disposed Error: the bridge has been disposed {location}")]
    Disposed { location: ErrorLocation },
}

impl BindingError {
    #[track_caller]
    pub fn not_an_interface(type_name: impl Into<String>) -> Self {
        BindingError::NotAnInterface {
            type_name: type_name.into(),
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub fn missing_marker(type_name: impl Into<String>, marker: &'static str) -> Self {
        BindingError::MissingMarker {
            type_name: type_name.into(),
            marker,
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub fn already_exposed(service: impl Into<String>) -> Self {
        BindingError::AlreadyExposed {
            service: service.into(),
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub fn no_binder(type_name: impl Into<String>) -> Self {
        BindingError::NoBinder {
            type_name: type_name.into(),
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub fn duplicate_method(method: impl Into<String>) -> Self {
        BindingError::DuplicateMethod {
            method: method.into(),
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub fn registration(service: impl Into<String>, message: impl Into<String>) -> Self {
        BindingError::Registration {
            service: service.into(),
            message: message.into(),
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub fn proxy(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        BindingError::Proxy {
            type_name: type_name.into(),
            message: message.into(),
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub fn disposed() -> Self {
        BindingError::Disposed {
            location: ErrorLocation::caller(),
        }
    }

    /// Get error category for logs.
    pub fn error_category(&self) -> &'static str {
        match self {
            BindingError::NotAnInterface { .. } => "not_an_interface",
            BindingError::MissingMarker { .. } => "missing_marker",
            BindingError::AlreadyExposed { .. } => "already_exposed",
            BindingError::NoBinder { .. } => "no_binder",
            BindingError::DuplicateMethod { .. } => "duplicate_method",
            BindingError::Registration { .. } => "registration",
            BindingError::Proxy { .. } => "proxy",
            BindingError::Disposed { .. } => "disposed",
        }
    }
}
