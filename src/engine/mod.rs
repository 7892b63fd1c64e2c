//! # Signal Engine
//!
//! The propagation kernel: per-node ON/OFF bookkeeping, recursive delivery of
//! signals along each node's outputs, and the handler contract that node
//! implementations plug into.
//!
//! ## Lifecycle
//!
//! One engine instance exists per running program. [`initialize`] builds it
//! for a graph and stores it in the process-wide slot, [`get`] returns it,
//! and [`reset`] tears it down. Tests build isolated instances with
//! [`Engine::new`] instead.
//!
//! ## Scheduling
//!
//! All public operations are async and return once the wave they started has
//! settled. Nothing runs in parallel inside a wave: neighbors are visited in
//! output-list order, depth first. Handlers that await may let another wave
//! interleave; the recursion guard bounds cycles but does not serialize
//! unrelated waves.
//!
//! ## Example
//!
//! ```rust,no_run
//! use signalweave::engine::Engine;
//! use signalweave::graph::{Graph, GraphNode, NodeId};
//! use signalweave::signal::SignalState;
//!
//! # async fn example() -> Result<(), signalweave::error::EngineError> {
//! let mut graph = Graph::new();
//! graph.add_node(GraphNode::new(NodeId::new(1), "passthrough"))?;
//! graph.add_node(GraphNode::new(NodeId::new(2), "passthrough"))?;
//! graph.connect(NodeId::new(1), NodeId::new(2))?;
//!
//! let engine = Engine::new(graph);
//! engine.activate_node(NodeId::new(1), None).await;
//! assert_eq!(engine.get_state(NodeId::new(2)), SignalState::On);
//! # Ok(())
//! # }
//! ```

mod global;
mod propagation;
mod stats;

#[cfg(test)]
mod engine_test;

pub use global::{get, initialize, initialize_with, reset};
pub use stats::StatsSnapshot;

use crate::config::EngineConfig;
use crate::event::{self, BusEvent, EventBus, ListenerError, Subscription};
use crate::graph::{Graph, NodeId};
use crate::handler::{HandlerRegistry, SignalHandler};
use crate::signal::{ExecutionContext, Signal, SignalState, WaveId};
use crate::state::{NodeState, NodeStateStore};
use crate::sync::lock;
use crate::variables::Variables;
use serde_json::{Value, json};
use stats::EngineStats;
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, info, trace};

/// Options for [`Engine::set_node_state`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
  /// Propagate even when state and payload are unchanged.
  pub force_propagation: bool,
  /// Mark a resulting OFF as a deliberate stop.
  pub explicit_off: bool,
  /// Tag the wave as half of a pulse.
  pub pulse: bool,
}

impl SetOptions {
  /// Options with `force_propagation` set.
  pub fn forced() -> Self {
    Self {
      force_propagation: true,
      ..Self::default()
    }
  }

  /// Options with `explicit_off` set.
  pub fn explicit() -> Self {
    Self {
      explicit_off: true,
      ..Self::default()
    }
  }

  /// Sets `explicit_off`.
  #[must_use]
  pub fn with_explicit_off(mut self, explicit_off: bool) -> Self {
    self.explicit_off = explicit_off;
    self
  }

  /// Sets `pulse`.
  #[must_use]
  pub fn with_pulse(mut self, pulse: bool) -> Self {
    self.pulse = pulse;
    self
  }
}

type GuardKey = (WaveId, NodeId, SignalState);

struct EngineInner {
  graph: Arc<Graph>,
  config: EngineConfig,
  states: NodeStateStore,
  handlers: HandlerRegistry,
  events: EventBus,
  variables: Variables,
  context: Arc<ExecutionContext>,
  guard: Arc<Mutex<HashSet<GuardKey>>>,
  stats: EngineStats,
}

/// Handle to a signal engine. Cloning yields another handle to the same
/// instance.
#[derive(Clone)]
pub struct Engine {
  inner: Arc<EngineInner>,
}

/// Non-owning engine handle for handlers, timers and subscriptions, so that
/// the nodes an engine owns do not keep it alive.
#[derive(Clone)]
pub struct WeakEngine {
  inner: Weak<EngineInner>,
}

impl WeakEngine {
  /// Returns the engine if it is still alive.
  pub fn upgrade(&self) -> Option<Engine> {
    self.inner.upgrade().map(|inner| Engine { inner })
  }
}

impl std::fmt::Debug for Engine {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Engine")
      .field("nodes", &self.inner.graph.len())
      .field("handlers", &self.inner.handlers.len())
      .field("active", &self.inner.states.list_active())
      .finish()
  }
}

impl Engine {
  /// Creates an engine for `graph` with the default configuration.
  pub fn new(graph: Graph) -> Self {
    Self::with_config(graph, EngineConfig::default())
  }

  /// Creates an engine for `graph`.
  pub fn with_config(graph: Graph, config: EngineConfig) -> Self {
    let states = NodeStateStore::new();
    for node in graph.nodes() {
      states.ensure(node.id);
    }
    debug!(nodes = graph.len(), "engine created");
    Engine {
      inner: Arc::new(EngineInner {
        graph: Arc::new(graph),
        config,
        states,
        handlers: HandlerRegistry::new(),
        events: EventBus::new(),
        variables: Variables::new(),
        context: Arc::new(ExecutionContext::new()),
        guard: Arc::new(Mutex::new(HashSet::new())),
        stats: EngineStats::default(),
      }),
    }
  }

  /// Returns a non-owning handle.
  pub fn downgrade(&self) -> WeakEngine {
    WeakEngine {
      inner: Arc::downgrade(&self.inner),
    }
  }

  /// The graph this engine runs.
  pub fn graph(&self) -> &Graph {
    &self.inner.graph
  }

  /// The engine configuration.
  pub fn config(&self) -> &EngineConfig {
    &self.inner.config
  }

  /// The engine's event bus.
  pub fn events(&self) -> &EventBus {
    &self.inner.events
  }

  /// The shared variable store.
  pub fn variables(&self) -> &Variables {
    &self.inner.variables
  }

  /// The shared execution context.
  pub fn context(&self) -> &Arc<ExecutionContext> {
    &self.inner.context
  }

  /// Current counters.
  pub fn stats(&self) -> StatsSnapshot {
    self.inner.stats.snapshot()
  }

  /// Number of handler invocations that failed.
  pub fn failed_signals(&self) -> u64 {
    self.inner.stats.snapshot().failed_signals
  }

  // ── State queries ─────────────────────────────────────────────────────

  /// Current state of `id`; `Off` for unknown ids.
  pub fn get_state(&self, id: NodeId) -> SignalState {
    self.inner.states.get_state(id)
  }

  /// Whether `id` is ON.
  pub fn is_active(&self, id: NodeId) -> bool {
    self.inner.states.is_active(id)
  }

  /// Every ON node, ascending.
  pub fn list_active(&self) -> Vec<NodeId> {
    self.inner.states.list_active()
  }

  /// Copy of the node's state record.
  pub fn node_state(&self, id: NodeId) -> Option<NodeState> {
    self.inner.states.snapshot(id)
  }

  /// Upstream ids currently holding `id` ON.
  pub fn active_sources(&self, id: NodeId) -> BTreeSet<NodeId> {
    self.inner.states.active_sources(id)
  }

  /// Records each of `sources` as holding `id`, which must already be ON.
  ///
  /// Handlers that switch their own node ON outside the inbound wave use
  /// this so later OFFs from those sources merge correctly.
  pub fn hold_sources(&self, id: NodeId, sources: impl IntoIterator<Item = NodeId>) {
    for source in sources {
      self.inner.states.hold(id, source);
    }
  }

  // ── State changes ─────────────────────────────────────────────────────

  /// Sets `id` to `target` (or toggles it when `target` is `None`) and
  /// propagates the change downstream.
  ///
  /// Without [`SetOptions::force_propagation`], a call that leaves both state
  /// and payload unchanged is a no-op. Returns the node's resulting state.
  pub async fn set_node_state(
    &self,
    id: NodeId,
    target: Option<SignalState>,
    data: Option<Value>,
    options: SetOptions,
  ) -> SignalState {
    let (current, current_data) = match self.inner.states.snapshot(id) {
      Some(record) => (record.state, record.data),
      None => (SignalState::Off, Value::Null),
    };
    let target = target.unwrap_or_else(|| current.toggled());
    let data = data.unwrap_or(Value::Null);

    if !options.force_propagation && current == target && current_data == data {
      trace!(node = %id, state = %target, "state unchanged; skipping propagation");
      return target;
    }

    self.inner.states.set_state(id, target, data.clone());
    let signal = Signal::originate(id, target, data, Arc::clone(&self.inner.context))
      .with_explicit_off(options.explicit_off)
      .with_pulse(options.pulse);

    let name = if target.is_on() {
      event::STATE_ON
    } else {
      event::STATE_OFF
    };
    self.inner.events.emit_event(
      name,
      json!({
        "nodeId": id,
        "state": target,
        "data": signal.data(),
        "signalId": signal.id().raw(),
        "wave": signal.wave().raw(),
        "explicitOff": signal.is_explicit_off(),
        "pulse": signal.is_pulse(),
      }),
    );
    self.inner.stats.record_emitted();
    debug!(
      node = %id,
      state = %target,
      wave = signal.wave().raw(),
      explicit_off = signal.is_explicit_off(),
      "node state set"
    );

    self.propagate(signal, id, None).await;
    target
  }

  /// Sets `id` ON.
  pub async fn activate_node(&self, id: NodeId, data: Option<Value>) -> SignalState {
    self
      .set_node_state(id, Some(SignalState::On), data, SetOptions::default())
      .await
  }

  /// Sets `id` OFF as a deliberate stop.
  pub async fn deactivate_node(&self, id: NodeId) -> SignalState {
    self
      .set_node_state(id, Some(SignalState::Off), None, SetOptions::explicit())
      .await
  }

  /// Flips `id`. A resulting OFF counts as a deliberate stop.
  pub async fn toggle_node(&self, id: NodeId) -> SignalState {
    self
      .set_node_state(id, None, None, SetOptions::explicit())
      .await
  }

  /// Emits a momentary ON followed by a non-explicit OFF.
  ///
  /// The node stays ON for [`EngineConfig::pulse_settle`] so the ON wave can
  /// finish fanning out. Both halves are force-propagated.
  pub async fn pulse_node(&self, id: NodeId, data: Option<Value>) {
    let options = SetOptions::forced().with_pulse(true);
    self
      .set_node_state(id, Some(SignalState::On), data.clone(), options)
      .await;
    tokio::time::sleep(self.inner.config.pulse_settle()).await;
    self
      .set_node_state(id, Some(SignalState::Off), data, options)
      .await;
  }

  /// Deactivates every ON node.
  pub async fn stop_all_active_nodes(&self) {
    let active = self.inner.states.list_active();
    info!(count = active.len(), "stopping all active nodes");
    for id in active {
      // Deactivating one node may already have switched later ones off.
      if self.is_active(id) {
        self.deactivate_node(id).await;
      }
    }
  }

  // ── Handlers ──────────────────────────────────────────────────────────

  /// Registers the handler invoked when `id` receives a signal. Replaces any
  /// previous handler, which is torn down.
  pub fn register_handler(&self, id: NodeId, handler: Arc<dyn SignalHandler>) {
    self.inner.states.ensure(id);
    if let Some(previous) = self.inner.handlers.register(id, handler) {
      previous.on_unregister();
    }
    trace!(node = %id, "handler registered");
  }

  /// Removes the handler for `id` and resets the node to OFF.
  pub fn unregister_handler(&self, id: NodeId) -> bool {
    let removed = self.inner.handlers.unregister(id);
    if let Some(handler) = &removed {
      handler.on_unregister();
    }
    self.inner.states.reset_node(id);
    removed.is_some()
  }

  /// Whether `id` has a handler.
  pub fn has_handler(&self, id: NodeId) -> bool {
    self.inner.handlers.contains(id)
  }

  // ── Events ────────────────────────────────────────────────────────────

  /// Emits an event on the engine's bus.
  pub fn emit_event(&self, name: &str, data: Value) {
    self.inner.events.emit_event(name, data);
  }

  /// Subscribes a synchronous listener on the engine's bus.
  pub fn subscribe_to_event<F>(&self, name: &str, owner: impl Into<String>, listener: F) -> Subscription
  where
    F: Fn(&BusEvent) -> Result<(), ListenerError> + Send + Sync + 'static,
  {
    self.inner.events.subscribe_to_event(name, owner, listener)
  }

  // ── Teardown ──────────────────────────────────────────────────────────

  /// Clears handlers, node states, subscriptions, variables and guard
  /// bookkeeping. The graph itself is left untouched.
  pub fn reset(&self) {
    for handler in self.inner.handlers.drain() {
      handler.on_unregister();
    }
    self.inner.states.clear();
    for node in self.inner.graph.nodes() {
      self.inner.states.ensure(node.id);
    }
    self.inner.events.clear();
    self.inner.variables.clear();
    lock(&self.inner.guard).clear();
    self.inner.context.clear();
    self.inner.stats.clear();
    info!("engine reset");
  }
}
