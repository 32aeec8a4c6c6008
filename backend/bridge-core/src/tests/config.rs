// Unit tests for bridge.json load/save/validate

use crate::bridge::NameMatchOrder;
use crate::config::{BridgeConfig, CONFIG_FILE_NAME};
use crate::error::config::ConfigError;

use std::time::Duration;

use tempfile::TempDir;

/// **VALUE**: Verifies a missing file yields defaults instead of an error.
///
/// **WHY THIS MATTERS**: First launch has no config; the host must still start.
#[test]
fn given_missing_file_when_load_then_defaults() {
    let dir = TempDir::new().expect("temp dir");

    let config = BridgeConfig::load(dir.path()).expect("defaults");

    assert_eq!(config, BridgeConfig::default());
    assert_eq!(config.rpc.call_timeout(), Duration::from_secs(30));
    assert_eq!(config.transport.ipc_port, 19876);
    assert_eq!(config.binding.parameter_match, NameMatchOrder::CamelCaseFirst);
}

/// **VALUE**: Verifies save then load returns the same settings and leaves no temp file.
///
/// **BUG THIS CATCHES**: Would catch the atomic rename step being skipped.
#[test]
fn given_saved_config_when_loaded_then_same_values() {
    let dir = TempDir::new().expect("temp dir");
    let mut config = BridgeConfig::default();
    config.rpc.call_timeout_ms = 5_000;
    config.binding.parameter_match = NameMatchOrder::ExactFirst;
    config.binding.trace_calls = true;

    config.save(dir.path()).expect("save");
    let loaded = BridgeConfig::load(dir.path()).expect("load");

    assert_eq!(loaded, config);
    assert!(!dir.path().join(format!("{CONFIG_FILE_NAME}.tmp")).exists());
}

/// **VALUE**: Verifies partial files fill missing sections with defaults.
#[test]
fn given_partial_file_when_load_then_missing_fields_defaulted() {
    let dir = TempDir::new().expect("temp dir");
    std::fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        r#"{ "rpc": { "call_timeout_ms": 1000 } }"#,
    )
    .expect("write");

    let config = BridgeConfig::load(dir.path()).expect("load");

    assert_eq!(config.rpc.call_timeout_ms, 1000);
    assert_eq!(config.version, 1);
    assert_eq!(config.transport.auth_token_env, "BRIDGE_AUTH_TOKEN");
}

/// **VALUE**: Verifies a corrupt file is an explicit parse error.
///
/// **BUG THIS CATCHES**: Would catch silently replacing a hand-edited file with defaults.
#[test]
fn given_corrupt_file_when_load_then_parse_error() {
    let dir = TempDir::new().expect("temp dir");
    std::fs::write(dir.path().join(CONFIG_FILE_NAME), "{ not json").expect("write");

    let result = BridgeConfig::load(dir.path());

    assert!(matches!(result, Err(ConfigError::ParseError { .. })));
}

/// **VALUE**: Verifies out-of-range values fail validation and are never written.
#[test]
fn given_invalid_values_when_validate_then_validation_error() {
    let dir = TempDir::new().expect("temp dir");
    let mut config = BridgeConfig::default();
    config.rpc.call_timeout_ms = 0;

    let saved = config.save(dir.path());

    assert!(matches!(saved, Err(ConfigError::ValidationError { .. })));
    assert!(!dir.path().join(CONFIG_FILE_NAME).exists());

    let mut config = BridgeConfig::default();
    config.transport.ipc_port = 80;
    assert!(config.validate().is_err());

    let mut config = BridgeConfig::default();
    config.version = 2;
    assert!(config.validate().is_err());
}
