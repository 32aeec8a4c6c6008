use common::ErrorLocation;

use thiserror::Error as ThisError;

/// Failures pushing a message into the document.
#[derive(Debug, ThisError)]
pub enum TransportError {
    #[error("Not Connected Error: no document is attached to the channel {location}")]
    NotConnected { location: ErrorLocation },

    #[error("Send Error: {message} {location}")]
    Send {
        message: String,
        location: ErrorLocation,
    },

    #[error("Channel Closed Error: {location}")]
    Closed { location: ErrorLocation },
}

impl TransportError {
    #[track_caller]
    pub fn not_connected() -> Self {
        TransportError::NotConnected {
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub fn send(message: impl Into<String>) -> Self {
        TransportError::Send {
            message: message.into(),
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub fn closed() -> Self {
        TransportError::Closed {
            location: ErrorLocation::caller(),
        }
    }
}
