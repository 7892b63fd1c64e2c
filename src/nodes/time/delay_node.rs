//! # Delay Node
//!
//! Switches ON a fixed time after an upstream source switches ON, provided
//! that source is still ON when the time is up.
//!
//! ## Behavior
//!
//! - ON from a source (re)starts that source's timer. Each source has its
//!   own timer; sources do not cancel one another.
//! - When a timer elapses and its source is still ON, the node switches ON
//!   (force-propagated) with the payload the source sent.
//! - Any OFF from a source cancels that source's pending timer.
//! - An explicit OFF always drives the node OFF and passes the stop
//!   downstream, whether or not the node had fired.
//! - A plain OFF drives the node OFF only if the node fired on that source's
//!   behalf and no other source it fired for is left.
//!
//! The inbound handler never forwards an ON itself; downstream nodes see the
//! ON only when a timer fires. Signals the handler stops merge as ON only
//! for sources the node has fired for, so the node's own state never runs
//! ahead of its timers.

use crate::engine::{Engine, SetOptions, WeakEngine};
use crate::error::{HandlerError, NodeError};
use crate::graph::NodeId;
use crate::handler::SignalHandler;
use crate::nodes::catalog::{NodeFactory, NodeSetup};
use crate::signal::{Signal, SignalPropagation, SignalState};
use crate::sync::lock;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Delay settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DelaySettings {
  /// Time between a source switching ON and the node following it.
  pub delay_ms: u64,
}

impl Default for DelaySettings {
  fn default() -> Self {
    Self { delay_ms: 1000 }
  }
}

impl DelaySettings {
  /// Delay as a [`Duration`].
  pub fn delay(&self) -> Duration {
    Duration::from_millis(self.delay_ms)
  }
}

struct PendingTimer {
  generation: u64,
  handle: JoinHandle<()>,
}

#[derive(Default)]
struct DelayState {
  timers: HashMap<NodeId, PendingTimer>,
  activated_for: BTreeSet<NodeId>,
  generation: u64,
}

impl DelayState {
  fn cancel(&mut self, source: NodeId) -> bool {
    match self.timers.remove(&source) {
      Some(timer) => {
        timer.handle.abort();
        true
      }
      None => false,
    }
  }

  fn cancel_all(&mut self) {
    for (_, timer) in self.timers.drain() {
      timer.handle.abort();
    }
  }
}

struct DelayInner {
  node_id: NodeId,
  engine: WeakEngine,
  settings: DelaySettings,
  state: Mutex<DelayState>,
}

/// Delay handler. Cloning yields another handle to the same node.
#[derive(Clone)]
pub struct DelayNode {
  inner: Arc<DelayInner>,
}

impl DelayNode {
  /// Creates a delay node for `node_id`.
  pub fn new(engine: &Engine, node_id: NodeId, settings: DelaySettings) -> Self {
    Self {
      inner: Arc::new(DelayInner {
        node_id,
        engine: engine.downgrade(),
        settings,
        state: Mutex::new(DelayState::default()),
      }),
    }
  }

  /// The configured delay.
  pub fn delay(&self) -> Duration {
    self.inner.settings.delay()
  }

  /// Number of sources with a pending timer.
  pub fn pending(&self) -> usize {
    lock(&self.inner.state).timers.len()
  }

  fn schedule(&self, source: NodeId, data: Value) {
    let node = self.clone();
    let delay = self.delay();
    let mut state = lock(&self.inner.state);
    state.cancel(source);
    state.generation += 1;
    let generation = state.generation;
    let handle = tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      node.fire(source, generation, data).await;
    });
    state.timers.insert(source, PendingTimer { generation, handle });
    trace!(node = %self.inner.node_id, from = %source, ?delay, "delay armed");
  }

  async fn fire(&self, source: NodeId, generation: u64, data: Value) {
    let Some(engine) = self.inner.engine.upgrade() else {
      return;
    };
    {
      let mut state = lock(&self.inner.state);
      let current = state.timers.get(&source).map(|timer| timer.generation) == Some(generation);
      if !current {
        return;
      }
      state.timers.remove(&source);
      if !engine.is_active(source) {
        debug!(node = %self.inner.node_id, from = %source, "source went OFF; delay dropped");
        return;
      }
      state.activated_for.insert(source);
    }
    debug!(node = %self.inner.node_id, from = %source, "delay elapsed");
    engine
      .set_node_state(
        self.inner.node_id,
        Some(SignalState::On),
        Some(data),
        SetOptions::forced(),
      )
      .await;
    engine.hold_sources(self.inner.node_id, [source]);
  }

  /// Stops the inbound wave, merging ON only for a source the node fired
  /// for. The node's payload is kept.
  fn stop(&self, fired_for_source: bool) -> SignalPropagation {
    let data = self
      .inner
      .engine
      .upgrade()
      .and_then(|engine| engine.node_state(self.inner.node_id))
      .map(|record| record.data)
      .unwrap_or(Value::Null);
    SignalPropagation::halt()
      .with_state(SignalState::from_bool(fired_for_source))
      .with_data(data)
  }
}

#[async_trait]
impl SignalHandler for DelayNode {
  async fn handle(&self, signal: Signal) -> Result<SignalPropagation, HandlerError> {
    let source = signal.source();
    if signal.state().is_on() {
      self.schedule(source, signal.data().clone());
      let fired = lock(&self.inner.state).activated_for.contains(&source);
      return Ok(self.stop(fired));
    }

    let mut state = lock(&self.inner.state);
    if state.cancel(source) {
      debug!(node = %self.inner.node_id, from = %source, "pending delay cancelled");
    }
    let was_activated = state.activated_for.remove(&source);

    if signal.is_explicit_off() {
      state.activated_for.clear();
      return Ok(
        SignalPropagation::pass()
          .with_state(SignalState::Off)
          .forced(),
      );
    }
    if was_activated && state.activated_for.is_empty() {
      return Ok(
        SignalPropagation::pass()
          .with_state(SignalState::Off)
          .forced(),
      );
    }
    drop(state);
    Ok(self.stop(false))
  }

  fn on_unregister(&self) {
    let mut state = lock(&self.inner.state);
    state.cancel_all();
    state.activated_for.clear();
  }
}

/// Installs [`DelayNode`] handlers for `delay` nodes.
pub struct DelayFactory;

impl NodeFactory for DelayFactory {
  fn kind(&self) -> &'static str {
    "delay"
  }

  fn default_settings(&self) -> Value {
    json!({ "delayMs": 1000 })
  }

  fn setup(&self, setup: NodeSetup) -> Result<(), NodeError> {
    let settings: DelaySettings = setup.settings_as()?;
    let node = DelayNode::new(&setup.engine, setup.node_id, settings);
    setup.engine.register_handler(setup.node_id, Arc::new(node));
    Ok(())
  }
}
