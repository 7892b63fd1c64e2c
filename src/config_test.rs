//! # Engine Config Test Suite

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::telemetry::init_tracing;
use std::time::Duration;
use tracing::Level;

#[test]
fn test_defaults() {
  let config = EngineConfig::default();
  assert_eq!(config.pulse_settle(), Duration::from_millis(50));
  assert_eq!(config.guard_release(), Duration::from_millis(100));
  assert_eq!(config.log_level().unwrap(), Level::INFO);
}

#[test]
fn test_partial_document_keeps_defaults() {
  let config = EngineConfig::from_json_str(r#"{ "guardReleaseMs": 0, "logLevel": "debug" }"#).unwrap();
  assert_eq!(config.guard_release(), Duration::ZERO);
  assert_eq!(config.pulse_settle(), Duration::from_millis(50));
  assert_eq!(config.log_level().unwrap(), Level::DEBUG);
}

#[test]
fn test_malformed_document_is_a_config_error() {
  let err = EngineConfig::from_json_str(r#"{ "pulseSettleMs": "soon" }"#).unwrap_err();
  assert!(matches!(err, EngineError::Config(_)));
}

#[test]
fn test_unknown_log_level_is_rejected() {
  let err = EngineConfig::from_json_str(r#"{ "logLevel": "loud" }"#).unwrap_err();
  assert!(matches!(err, EngineError::Config(message) if message.contains("loud")));
}

#[test]
fn test_builders() {
  let config = EngineConfig::default()
    .with_pulse_settle(Duration::from_millis(5))
    .with_guard_release(Duration::from_millis(7))
    .with_log_level("warn");
  assert_eq!(config.pulse_settle_ms, 5);
  assert_eq!(config.guard_release_ms, 7);
  assert!(config.validate().is_ok());
}

#[test]
fn test_init_tracing_installs_once() {
  let bad = EngineConfig::default().with_log_level("chatty");
  assert!(matches!(init_tracing(&bad), Err(EngineError::Config(_))));

  let config = EngineConfig::default().with_log_level("debug");
  // The first call may lose to another test; the second never succeeds.
  let _ = init_tracing(&config);
  assert!(matches!(init_tracing(&config), Err(EngineError::Config(_))));
}
