//! # Signals
//!
//! Value types exchanged between the engine and node handlers.
//!
//! - [`SignalState`]: the binary ON/OFF activation state.
//! - [`Signal`]: an immutable message describing a state transition as it is
//!   delivered to one downstream node. A fresh `Signal` is synthesized for
//!   every hop; signals are never mutated and forwarded.
//! - [`SignalPropagation`]: a handler's decision about whether and how the
//!   wave continues past its node.
//! - [`ExecutionContext`]: the engine-wide debug trace and metadata shared by
//!   every signal.
//!
//! Every hop of one propagation wave carries the same [`WaveId`]. The
//! engine's recursion guard keys on it, which is what lets a wave terminate on
//! cyclic graphs while a later wave through the same edges is still admitted.

use crate::graph::NodeId;
use crate::sync::{lock, read, write};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

static NEXT_SIGNAL_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_WAVE_ID: AtomicU64 = AtomicU64::new(1);

/// Binary activation state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalState {
  /// Active.
  On,
  /// Inactive. Every node starts here.
  #[default]
  Off,
}

impl SignalState {
  /// Maps `true` to `On` and `false` to `Off`.
  pub fn from_bool(on: bool) -> Self {
    if on { SignalState::On } else { SignalState::Off }
  }

  /// Whether this is `On`.
  pub fn is_on(self) -> bool {
    self == SignalState::On
  }

  /// The opposite state.
  pub fn toggled(self) -> Self {
    match self {
      SignalState::On => SignalState::Off,
      SignalState::Off => SignalState::On,
    }
  }

  /// `"ON"` or `"OFF"`.
  pub fn as_str(self) -> &'static str {
    match self {
      SignalState::On => "ON",
      SignalState::Off => "OFF",
    }
  }
}

impl fmt::Display for SignalState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Unique id of one signal hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SignalId(u64);

impl SignalId {
  fn next() -> Self {
    SignalId(NEXT_SIGNAL_ID.fetch_add(1, Ordering::Relaxed))
  }

  /// Returns the raw id.
  pub fn raw(self) -> u64 {
    self.0
  }
}

/// Id shared by every hop of one propagation wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct WaveId(u64);

impl WaveId {
  fn next() -> Self {
    WaveId(NEXT_WAVE_ID.fetch_add(1, Ordering::Relaxed))
  }

  /// Returns the raw id.
  pub fn raw(self) -> u64 {
    self.0
  }
}

/// Engine-wide execution trace and free-form metadata.
///
/// The stack records the node ids whose outputs are currently being walked.
/// Concurrent waves interleave on it, so it is a debugging aid and not a
/// per-wave call stack.
#[derive(Debug, Default)]
pub struct ExecutionContext {
  stack: Mutex<Vec<NodeId>>,
  metadata: RwLock<HashMap<String, Value>>,
}

impl ExecutionContext {
  /// Creates an empty context.
  pub fn new() -> Self {
    Self::default()
  }

  /// Creates a context with an empty stack and a copy of this one's metadata.
  pub fn derive(&self) -> Arc<ExecutionContext> {
    Arc::new(ExecutionContext {
      stack: Mutex::new(Vec::new()),
      metadata: RwLock::new(read(&self.metadata).clone()),
    })
  }

  pub(crate) fn push(&self, node: NodeId) {
    lock(&self.stack).push(node);
  }

  pub(crate) fn pop(&self, node: NodeId) {
    let mut stack = lock(&self.stack);
    if let Some(pos) = stack.iter().rposition(|&id| id == node) {
      stack.remove(pos);
    }
  }

  /// Snapshot of the execution stack, oldest first.
  pub fn stack(&self) -> Vec<NodeId> {
    lock(&self.stack).clone()
  }

  /// Sets a metadata entry, returning the previous value.
  pub fn set_metadata(&self, key: impl Into<String>, value: Value) -> Option<Value> {
    write(&self.metadata).insert(key.into(), value)
  }

  /// Reads a metadata entry.
  pub fn metadata(&self, key: &str) -> Option<Value> {
    read(&self.metadata).get(key).cloned()
  }

  pub(crate) fn clear(&self) {
    lock(&self.stack).clear();
    write(&self.metadata).clear();
  }
}

/// An immutable state-transition message delivered to one node.
#[derive(Debug, Clone)]
pub struct Signal {
  id: SignalId,
  wave: WaveId,
  source: NodeId,
  timestamp: DateTime<Utc>,
  state: SignalState,
  data: Value,
  context: Arc<ExecutionContext>,
  explicit_off: bool,
  pulse: bool,
}

impl Signal {
  /// Starts a new wave at `source` with a fresh context.
  ///
  /// Handlers under test use this to build inbound signals directly.
  pub fn new(source: NodeId, state: SignalState, data: Value) -> Self {
    Self::originate(source, state, data, Arc::new(ExecutionContext::new()))
  }

  pub(crate) fn originate(
    source: NodeId,
    state: SignalState,
    data: Value,
    context: Arc<ExecutionContext>,
  ) -> Self {
    Signal {
      id: SignalId::next(),
      wave: WaveId::next(),
      source,
      timestamp: Utc::now(),
      state,
      data,
      context,
      explicit_off: false,
      pulse: false,
    }
  }

  /// Marks an OFF signal as a deliberate stop.
  #[must_use]
  pub fn with_explicit_off(mut self, explicit_off: bool) -> Self {
    self.explicit_off = explicit_off && !self.state.is_on();
    self
  }

  /// Tags the signal as one half of a pulse.
  #[must_use]
  pub fn with_pulse(mut self, pulse: bool) -> Self {
    self.pulse = pulse;
    self
  }

  /// Synthesizes the next hop of this wave, re-sourced to `source`.
  ///
  /// The wave id, context, pulse tag and explicit-off flag carry over; the
  /// explicit-off flag only survives while the relayed state stays OFF.
  pub fn relay(&self, source: NodeId, state: SignalState, data: Value) -> Signal {
    Signal {
      id: SignalId::next(),
      wave: self.wave,
      source,
      timestamp: Utc::now(),
      state,
      data,
      context: Arc::clone(&self.context),
      explicit_off: self.explicit_off && !state.is_on(),
      pulse: self.pulse,
    }
  }

  /// Unique id of this hop.
  pub fn id(&self) -> SignalId {
    self.id
  }

  /// Wave this hop belongs to.
  pub fn wave(&self) -> WaveId {
    self.wave
  }

  /// Node that sent this hop.
  pub fn source(&self) -> NodeId {
    self.source
  }

  /// Creation time.
  pub fn timestamp(&self) -> DateTime<Utc> {
    self.timestamp
  }

  /// Carried state.
  pub fn state(&self) -> SignalState {
    self.state
  }

  /// Carried payload.
  pub fn data(&self) -> &Value {
    &self.data
  }

  /// Shared execution context.
  pub fn context(&self) -> &Arc<ExecutionContext> {
    &self.context
  }

  /// Whether this OFF is a deliberate stop rather than an incidental one.
  pub fn is_explicit_off(&self) -> bool {
    self.explicit_off
  }

  /// Whether this hop belongs to a pulse.
  pub fn is_pulse(&self) -> bool {
    self.pulse
  }
}

/// A handler's decision about the wave past its node.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalPropagation {
  /// Continue downstream?
  pub propagate: bool,
  /// Outgoing state; `None` keeps the received state.
  pub state: Option<SignalState>,
  /// Replacement payload; `None` keeps the received payload.
  pub data: Option<Value>,
  /// Restricts fan-out to this subset of the node's outputs.
  pub target_outputs: Option<Vec<NodeId>>,
  /// Treat the outgoing state as authoritative for the node: it is written
  /// directly instead of merged with other sources, and an OFF is not held
  /// back by other active sources.
  pub force: bool,
}

impl Default for SignalPropagation {
  fn default() -> Self {
    Self::pass()
  }
}

impl SignalPropagation {
  /// Continue with the received state and payload.
  pub fn pass() -> Self {
    Self {
      propagate: true,
      state: None,
      data: None,
      target_outputs: None,
      force: false,
    }
  }

  /// Stop the wave at this node. The node's own state is still merged
  /// from the decision's state, so handlers that drive their output
  /// separately pass that output with [`with_state`](Self::with_state).
  pub fn halt() -> Self {
    Self {
      propagate: false,
      ..Self::pass()
    }
  }

  /// Overrides the outgoing state.
  #[must_use]
  pub fn with_state(mut self, state: SignalState) -> Self {
    self.state = Some(state);
    self
  }

  /// Replaces the outgoing payload.
  #[must_use]
  pub fn with_data(mut self, data: Value) -> Self {
    self.data = Some(data);
    self
  }

  /// Restricts fan-out to `targets`.
  #[must_use]
  pub fn with_targets(mut self, targets: Vec<NodeId>) -> Self {
    self.target_outputs = Some(targets);
    self
  }

  /// Marks the outgoing state as authoritative.
  #[must_use]
  pub fn forced(mut self) -> Self {
    self.force = true;
    self
  }
}
