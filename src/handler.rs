//! # Handler Registry
//!
//! Each node may register one asynchronous handler. The engine invokes it
//! whenever a signal arrives from any upstream neighbor and uses the returned
//! [`SignalPropagation`] to decide how the wave continues.
//!
//! Handlers are the only place node behavior lives. A node without a handler
//! is a pure pass-through wire.
//!
//! ## Example
//!
//! ```rust
//! use signalweave::handler::handler_fn;
//! use signalweave::signal::{SignalPropagation, SignalState};
//!
//! // Inverts every signal it receives.
//! let inverter = handler_fn(|signal| async move {
//!   Ok(SignalPropagation::pass().with_state(signal.state().toggled()))
//! });
//! # let _ = inverter;
//! ```

use crate::error::HandlerError;
use crate::graph::NodeId;
use crate::signal::{Signal, SignalPropagation};
use crate::sync::{read, write};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

/// Contract every signal-processing node implements.
#[async_trait]
pub trait SignalHandler: Send + Sync {
  /// Processes one inbound signal and decides on forwarding.
  ///
  /// Handlers may await arbitrary I/O. A slow handler only delays its own
  /// branch of the wave.
  async fn handle(&self, signal: Signal) -> Result<SignalPropagation, HandlerError>;

  /// Called when the handler is removed from the registry, replaced by a new
  /// registration, or dropped by an engine reset. Cancel timers here.
  fn on_unregister(&self) {}
}

/// Adapter turning an async closure into a [`SignalHandler`].
pub struct FnHandler<F> {
  f: F,
}

#[async_trait]
impl<F, Fut> SignalHandler for FnHandler<F>
where
  F: Fn(Signal) -> Fut + Send + Sync,
  Fut: Future<Output = Result<SignalPropagation, HandlerError>> + Send,
{
  async fn handle(&self, signal: Signal) -> Result<SignalPropagation, HandlerError> {
    (self.f)(signal).await
  }
}

/// Wraps an async closure as a shareable handler.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn SignalHandler>
where
  F: Fn(Signal) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<SignalPropagation, HandlerError>> + Send + 'static,
{
  Arc::new(FnHandler { f })
}

/// One handler per node; the last registration wins.
#[derive(Default)]
pub struct HandlerRegistry {
  handlers: RwLock<HashMap<NodeId, Arc<dyn SignalHandler>>>,
}

impl HandlerRegistry {
  /// Creates an empty registry.
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers `handler` for `id`, returning the handler it replaced.
  pub fn register(
    &self,
    id: NodeId,
    handler: Arc<dyn SignalHandler>,
  ) -> Option<Arc<dyn SignalHandler>> {
    write(&self.handlers).insert(id, handler)
  }

  /// Removes and returns the handler for `id`.
  pub fn unregister(&self, id: NodeId) -> Option<Arc<dyn SignalHandler>> {
    write(&self.handlers).remove(&id)
  }

  /// Handler registered for `id`.
  pub fn get(&self, id: NodeId) -> Option<Arc<dyn SignalHandler>> {
    read(&self.handlers).get(&id).cloned()
  }

  /// Whether `id` has a handler.
  pub fn contains(&self, id: NodeId) -> bool {
    read(&self.handlers).contains_key(&id)
  }

  /// Ids with a handler, ascending.
  pub fn ids(&self) -> Vec<NodeId> {
    let mut ids: Vec<NodeId> = read(&self.handlers).keys().copied().collect();
    ids.sort();
    ids
  }

  /// Number of registered handlers.
  pub fn len(&self) -> usize {
    read(&self.handlers).len()
  }

  /// Whether no handler is registered.
  pub fn is_empty(&self) -> bool {
    read(&self.handlers).is_empty()
  }

  /// Removes every handler and returns them so the caller can tear them down
  /// outside the lock.
  pub fn drain(&self) -> Vec<Arc<dyn SignalHandler>> {
    write(&self.handlers).drain().map(|(_, handler)| handler).collect()
  }
}
