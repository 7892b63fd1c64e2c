//! # Node State Store
//!
//! Authoritative ON/OFF state and per-upstream-source bookkeeping.
//!
//! ## Multi-source merge rule
//!
//! A node receiving ON from upstream `U` records `U` in its active
//! connections and turns ON. Receiving OFF from `U` removes `U`; the node only
//! turns OFF once no other source is still holding it. In other words a node
//! is ON if any source is ON and OFF only when every source is OFF.
//!
//! Records are created lazily the first time an id is touched and default to
//! OFF. Reads for unknown ids never fail.

use crate::graph::NodeId;
use crate::signal::SignalState;
use crate::sync::lock;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

/// State record for one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeState {
  /// Current state.
  pub state: SignalState,
  /// Last associated payload.
  pub data: Value,
  /// Time of the last mutation.
  pub last_update: DateTime<Utc>,
  /// Upstream ids currently asserting ON into this node.
  pub active_connections: BTreeSet<NodeId>,
}

impl NodeState {
  fn new() -> Self {
    Self {
      state: SignalState::Off,
      data: Value::Null,
      last_update: Utc::now(),
      active_connections: BTreeSet::new(),
    }
  }
}

impl Default for NodeState {
  fn default() -> Self {
    Self::new()
  }
}

/// Result of applying one upstream assertion to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
  /// State before the merge.
  pub previous: SignalState,
  /// State after the merge.
  pub current: SignalState,
  /// Sources still holding the node ON after the merge.
  pub remaining_sources: usize,
}

impl MergeOutcome {
  /// Whether the externally visible state flipped.
  pub fn changed(&self) -> bool {
    self.previous != self.current
  }
}

/// Per-node state records.
#[derive(Debug, Default)]
pub struct NodeStateStore {
  states: Mutex<HashMap<NodeId, NodeState>>,
}

impl NodeStateStore {
  /// Creates an empty store.
  pub fn new() -> Self {
    Self::default()
  }

  /// Current state; `Off` for unknown ids.
  pub fn get_state(&self, id: NodeId) -> SignalState {
    lock(&self.states)
      .get(&id)
      .map(|record| record.state)
      .unwrap_or_default()
  }

  /// Whether the node is ON.
  pub fn is_active(&self, id: NodeId) -> bool {
    self.get_state(id).is_on()
  }

  /// Ids of every ON node, ascending.
  pub fn list_active(&self) -> Vec<NodeId> {
    let mut active: Vec<NodeId> = lock(&self.states)
      .iter()
      .filter(|(_, record)| record.state.is_on())
      .map(|(id, _)| *id)
      .collect();
    active.sort();
    active
  }

  /// Copy of the node's record, if it has one.
  pub fn snapshot(&self, id: NodeId) -> Option<NodeState> {
    lock(&self.states).get(&id).cloned()
  }

  /// Last payload; `Null` for unknown ids.
  pub fn data(&self, id: NodeId) -> Value {
    lock(&self.states)
      .get(&id)
      .map(|record| record.data.clone())
      .unwrap_or(Value::Null)
  }

  /// Upstream ids currently holding the node ON.
  pub fn active_sources(&self, id: NodeId) -> BTreeSet<NodeId> {
    lock(&self.states)
      .get(&id)
      .map(|record| record.active_connections.clone())
      .unwrap_or_default()
  }

  /// Records `from` as holding an ON node. OFF nodes are left untouched.
  ///
  /// Returns whether `from` was recorded.
  pub fn hold(&self, id: NodeId, from: NodeId) -> bool {
    let mut states = lock(&self.states);
    match states.get_mut(&id) {
      Some(record) if record.state.is_on() => {
        record.active_connections.insert(from);
        true
      }
      _ => false,
    }
  }

  /// Creates an OFF record if none exists.
  pub fn ensure(&self, id: NodeId) {
    lock(&self.states).entry(id).or_default();
  }

  /// Overwrites the node's state and payload, returning the previous state.
  ///
  /// Setting OFF directly also drops every active connection, so a node that
  /// is switched off by hand is not left half-held by its upstreams.
  pub fn set_state(&self, id: NodeId, state: SignalState, data: Value) -> SignalState {
    let mut states = lock(&self.states);
    let record = states.entry(id).or_default();
    let previous = record.state;
    record.state = state;
    record.data = data;
    record.last_update = Utc::now();
    if !state.is_on() {
      record.active_connections.clear();
    }
    previous
  }

  /// Applies an assertion from upstream `from` using the merge rule.
  pub fn merge(&self, id: NodeId, from: NodeId, state: SignalState, data: Value) -> MergeOutcome {
    let mut states = lock(&self.states);
    let record = states.entry(id).or_default();
    let previous = record.state;
    match state {
      SignalState::On => {
        record.active_connections.insert(from);
        record.state = SignalState::On;
        record.data = data;
      }
      SignalState::Off => {
        record.active_connections.remove(&from);
        if record.active_connections.is_empty() {
          record.state = SignalState::Off;
          record.data = data;
        }
      }
    }
    record.last_update = Utc::now();
    MergeOutcome {
      previous,
      current: record.state,
      remaining_sources: record.active_connections.len(),
    }
  }

  /// Writes an authoritative state computed by the node's handler.
  ///
  /// ON records `from` as the holding source; OFF clears every source.
  pub fn force(&self, id: NodeId, from: NodeId, state: SignalState, data: Value) -> MergeOutcome {
    let mut states = lock(&self.states);
    let record = states.entry(id).or_default();
    let previous = record.state;
    match state {
      SignalState::On => {
        record.active_connections.insert(from);
      }
      SignalState::Off => record.active_connections.clear(),
    }
    record.state = state;
    record.data = data;
    record.last_update = Utc::now();
    MergeOutcome {
      previous,
      current: state,
      remaining_sources: record.active_connections.len(),
    }
  }

  /// Resets one node to OFF with no sources.
  pub fn reset_node(&self, id: NodeId) {
    let mut states = lock(&self.states);
    let record = states.entry(id).or_default();
    record.state = SignalState::Off;
    record.data = Value::Null;
    record.active_connections.clear();
    record.last_update = Utc::now();
  }

  /// Drops every record.
  pub fn clear(&self) {
    lock(&self.states).clear();
  }

  /// Number of nodes with a record.
  pub fn len(&self) -> usize {
    lock(&self.states).len()
  }

  /// Whether no node has a record.
  pub fn is_empty(&self) -> bool {
    lock(&self.states).is_empty()
  }
}
