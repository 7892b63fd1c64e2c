//! Process-wide engine slot.
//!
//! The app runs one visual program at a time, so there is one live engine.
//! Construction is explicit: nothing is created until [`initialize`] runs.

use super::Engine;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::graph::Graph;
use crate::sync::{read, write};
use once_cell::sync::Lazy;
use std::sync::RwLock;
use tracing::info;

static GLOBAL_ENGINE: Lazy<RwLock<Option<Engine>>> = Lazy::new(|| RwLock::new(None));

/// Builds the engine for `graph` with the default configuration and makes it
/// the process-wide instance. A previous instance is reset first.
pub fn initialize(graph: Graph) -> Engine {
  initialize_with(graph, EngineConfig::default())
}

/// Builds the engine for `graph` with `config` and makes it the process-wide
/// instance. A previous instance is reset first.
pub fn initialize_with(graph: Graph, config: EngineConfig) -> Engine {
  let engine = Engine::with_config(graph, config);
  let previous = write(&*GLOBAL_ENGINE).replace(engine.clone());
  if let Some(previous) = previous {
    previous.reset();
  }
  info!(nodes = engine.graph().len(), "signal engine initialized");
  engine
}

/// The process-wide engine.
///
/// # Errors
///
/// Returns [`EngineError::NotInitialized`] before [`initialize`] or after
/// [`reset`].
pub fn get() -> Result<Engine, EngineError> {
  read(&*GLOBAL_ENGINE)
    .clone()
    .ok_or(EngineError::NotInitialized)
}

/// Resets the process-wide engine and empties the slot.
///
/// Handles obtained earlier stay usable but start from a cleared state.
pub fn reset() {
  let previous = write(&*GLOBAL_ENGINE).take();
  if let Some(engine) = previous {
    engine.reset();
    info!("signal engine reset");
  }
}
