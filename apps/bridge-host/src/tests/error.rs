// Unit tests for error module
// Tests serialization and conversion from bridge-core errors

use crate::error::HostError;

use bridge_core::error::config::ConfigError;
use bridge_core::{BindingError, CoreError};

/// **VALUE**: Tests that errors serialize with a type tag and data payload.
///
/// **WHY THIS MATTERS**: A supervisor reading the host's failure output needs a
/// stable shape to branch on.
///
/// **BUG THIS CATCHES**: Would catch removing `#[derive(Serialize)]` or changing
/// the tag/content layout.
#[test]
fn given_host_error_when_serialized_then_tagged_with_variant() {
    // GIVEN: A HostError
    let err = HostError::host("Test");

    // WHEN: Serializing to JSON
    let json = serde_json::to_value(&err).expect("Error should be serializable");

    // THEN: Tagged by variant with the message in data
    assert_eq!(json["type"], "Host");
    assert_eq!(json["data"]["message"], "Test");
    assert!(json["data"]["location"]["line"].as_u64().is_some());
}

/// **VALUE**: Verifies config failures stay distinguishable from other core errors.
#[test]
fn given_core_errors_when_converted_then_config_kept_separate() {
    let config: HostError = CoreError::from(ConfigError::validation("bad port")).into();
    let binding: HostError = CoreError::from(BindingError::disposed()).into();

    assert!(matches!(config, HostError::Config { ref message, .. } if message.contains("bad port")));
    assert!(matches!(binding, HostError::Core { .. }));
}
