//! Engine configuration.
//!
//! Every field has a default, so a partial JSON document is a valid
//! configuration:
//!
//! ```rust
//! use signalweave::config::EngineConfig;
//! use std::time::Duration;
//!
//! let config = EngineConfig::from_json_str(r#"{ "pulseSettleMs": 20 }"#)?;
//! assert_eq!(config.pulse_settle(), Duration::from_millis(20));
//! assert_eq!(config.guard_release(), Duration::from_millis(100));
//! # Ok::<(), signalweave::error::EngineError>(())
//! ```

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

const DEFAULT_PULSE_SETTLE_MS: u64 = 50;
const DEFAULT_GUARD_RELEASE_MS: u64 = 100;

/// Tunables for one engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
  /// Time a pulse stays ON so its ON wave can finish fanning out.
  pub pulse_settle_ms: u64,
  /// Time a recursion-guard entry outlives the propagation step it guards.
  pub guard_release_ms: u64,
  /// Maximum level for [`crate::telemetry::init_tracing`].
  pub log_level: String,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      pulse_settle_ms: DEFAULT_PULSE_SETTLE_MS,
      guard_release_ms: DEFAULT_GUARD_RELEASE_MS,
      log_level: "info".to_string(),
    }
  }
}

impl EngineConfig {
  /// Parses and validates a JSON configuration document.
  pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
    let config: EngineConfig =
      serde_json::from_str(json).map_err(|err| EngineError::Config(err.to_string()))?;
    config.validate()?;
    Ok(config)
  }

  /// Checks that every field is usable.
  pub fn validate(&self) -> Result<(), EngineError> {
    self.log_level().map(|_| ())
  }

  /// Sets the pulse settle delay.
  #[must_use]
  pub fn with_pulse_settle(mut self, settle: Duration) -> Self {
    self.pulse_settle_ms = settle.as_millis() as u64;
    self
  }

  /// Sets the recursion-guard release delay.
  #[must_use]
  pub fn with_guard_release(mut self, release: Duration) -> Self {
    self.guard_release_ms = release.as_millis() as u64;
    self
  }

  /// Sets the log level name (`trace`, `debug`, `info`, `warn`, `error`).
  #[must_use]
  pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
    self.log_level = level.into();
    self
  }

  /// Pulse settle delay.
  pub fn pulse_settle(&self) -> Duration {
    Duration::from_millis(self.pulse_settle_ms)
  }

  /// Recursion-guard release delay.
  pub fn guard_release(&self) -> Duration {
    Duration::from_millis(self.guard_release_ms)
  }

  /// Parsed log level.
  pub fn log_level(&self) -> Result<Level, EngineError> {
    Level::from_str(&self.log_level)
      .map_err(|_| EngineError::Config(format!("unknown log level '{}'", self.log_level)))
  }
}
