//! Logging setup.
//!
//! The crate logs through `tracing` macros. Applications install a subscriber
//! once at startup; [`init_tracing`] installs the default `fmt` subscriber at
//! the configured level.

use crate::config::EngineConfig;
use crate::error::EngineError;

/// Installs a global `tracing-subscriber` fmt subscriber.
///
/// # Errors
///
/// Returns [`EngineError::Config`] if the level is unknown or a global
/// subscriber is already installed.
pub fn init_tracing(config: &EngineConfig) -> Result<(), EngineError> {
  let level = config.log_level()?;
  tracing_subscriber::fmt()
    .with_max_level(level)
    .with_target(true)
    .try_init()
    .map_err(|err| EngineError::Config(err.to_string()))
}
