//! Shared building blocks for the bridge workspace.
//!
//! This crate holds the small pieces every other crate leans on:
//!
//! - [`ErrorLocation`]: call-site capture used by every error enum
//! - [`RedactedToken`]: a secret that never shows up in logs
//!
//! ## Architecture
//!
//! - **common** (this crate): Error plumbing and secret handling
//! - **bridge-core**: RPC engine, service binding, transport
//! - **bridge-host**: Application wiring everything together

pub mod error;
pub mod redacted_token;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use redacted_token::RedactedToken;

#[cfg(test)]
mod tests;
