//! # Logic Gate
//!
//! Combines the ON/OFF signals of several upstream nodes with a boolean
//! function and drives its own output with the result.
//!
//! ## Inputs
//!
//! Upstream sources are assigned to labeled slots (`input_a`, `input_b`, ...)
//! in order of first contact. The assignment is stable for the gate's
//! lifetime. A signal from a source that finds every slot taken is ignored.
//!
//! Each slot holds the last truth value its source reported: `data.inputValue`
//! when it is a boolean, otherwise whether the signal is ON.
//!
//! ## Evaluation
//!
//! - AND resolves to OFF as soon as any slot is false.
//! - Every other gate waits until every slot has reported.
//! - Results are authoritative for the gate's own state; they are not merged
//!   with per-source bookkeeping.
//! - An explicit OFF from any source wipes the slot values and drives the
//!   output OFF.
//! - With `resetAfterEval`, slot values are wiped after each evaluation.
//! - While the gate waits, or ignores a source, the inbound merge repeats
//!   the last result so the gate's state does not follow its raw inputs.

use crate::error::{HandlerError, NodeError};
use crate::graph::NodeId;
use crate::handler::SignalHandler;
use crate::nodes::boolean_logic::common::{GateKind, input_label};
use crate::nodes::catalog::{NodeFactory, NodeSetup};
use crate::nodes::common::{INPUT_VALUE_KEY, input_truth};
use crate::signal::{Signal, SignalPropagation, SignalState};
use crate::sync::lock;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

/// Logic gate settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LogicGateSettings {
  /// Boolean function to apply.
  pub gate_type: GateKind,
  /// Slot count; defaults to the node's configured input count.
  pub input_count: Option<usize>,
  /// Wipe slot values after every evaluation.
  pub reset_after_eval: bool,
}

#[derive(Debug, Default)]
struct GateMemory {
  assignments: BTreeMap<NodeId, usize>,
  values: Vec<Option<bool>>,
  last_output: Option<bool>,
}

impl GateMemory {
  fn with_slots(slots: usize) -> Self {
    Self {
      assignments: BTreeMap::new(),
      values: vec![None; slots],
      last_output: None,
    }
  }

  fn slot_for(&mut self, source: NodeId) -> Option<usize> {
    if let Some(&slot) = self.assignments.get(&source) {
      return Some(slot);
    }
    let next = self.assignments.len();
    if next >= self.values.len() {
      return None;
    }
    self.assignments.insert(source, next);
    Some(next)
  }

  fn wipe(&mut self) {
    self.values.iter_mut().for_each(|value| *value = None);
  }
}

/// Logic gate handler.
pub struct LogicGate {
  node_id: NodeId,
  settings: LogicGateSettings,
  memory: Mutex<GateMemory>,
}

impl LogicGate {
  /// Creates a gate for `node_id` with `configured_inputs` graph inputs.
  pub fn new(node_id: NodeId, settings: LogicGateSettings, configured_inputs: usize) -> Self {
    let slots = settings
      .gate_type
      .slot_count(settings.input_count.unwrap_or(configured_inputs));
    Self {
      node_id,
      settings,
      memory: Mutex::new(GateMemory::with_slots(slots)),
    }
  }

  /// The gate's function.
  pub fn kind(&self) -> GateKind {
    self.settings.gate_type
  }

  /// Number of input slots.
  pub fn slot_count(&self) -> usize {
    lock(&self.memory).values.len()
  }

  /// Label assigned to `source`, if it has made contact.
  pub fn label_of(&self, source: NodeId) -> Option<String> {
    lock(&self.memory)
      .assignments
      .get(&source)
      .map(|&slot| input_label(slot))
  }

  /// Current slot values keyed by label; slots that have not reported are
  /// absent.
  pub fn inputs(&self) -> BTreeMap<String, bool> {
    let memory = lock(&self.memory);
    memory
      .values
      .iter()
      .enumerate()
      .filter_map(|(slot, value)| value.map(|value| (input_label(slot), value)))
      .collect()
  }

  /// Last result the gate drove, if it has evaluated.
  pub fn last_output(&self) -> Option<bool> {
    lock(&self.memory).last_output
  }

  fn output(&self, result: bool) -> SignalPropagation {
    lock(&self.memory).last_output = Some(result);
    SignalPropagation::pass()
      .with_state(SignalState::from_bool(result))
      .with_data(self.payload(result))
      .forced()
  }

  fn unchanged(&self) -> SignalPropagation {
    match self.last_output() {
      Some(result) => SignalPropagation::halt()
        .with_state(SignalState::from_bool(result))
        .with_data(self.payload(result)),
      None => SignalPropagation::halt().with_state(SignalState::Off),
    }
  }

  fn payload(&self, result: bool) -> Value {
    json!({ INPUT_VALUE_KEY: result, "gate": self.settings.gate_type })
  }

  fn record(&self, signal: &Signal) -> Option<Option<bool>> {
    let mut memory = lock(&self.memory);
    let slot = memory.slot_for(signal.source())?;
    memory.values[slot] = Some(input_truth(signal));

    let kind = self.settings.gate_type;
    let result = if kind == GateKind::And && memory.values.contains(&Some(false)) {
      Some(false)
    } else if memory.values.iter().all(Option::is_some) {
      let inputs: Vec<bool> = memory.values.iter().map(|value| value.unwrap_or(false)).collect();
      Some(kind.evaluate(&inputs))
    } else {
      None
    };

    if result.is_some() && self.settings.reset_after_eval {
      memory.wipe();
    }
    Some(result)
  }
}

#[async_trait]
impl SignalHandler for LogicGate {
  async fn handle(&self, signal: Signal) -> Result<SignalPropagation, HandlerError> {
    if signal.is_explicit_off() {
      lock(&self.memory).wipe();
      debug!(node = %self.node_id, from = %signal.source(), "explicit OFF resets gate");
      return Ok(self.output(false));
    }

    match self.record(&signal) {
      None => {
        debug!(node = %self.node_id, from = %signal.source(), "no free input slot");
        Ok(self.unchanged())
      }
      Some(None) => {
        trace!(node = %self.node_id, "waiting for remaining inputs");
        Ok(self.unchanged())
      }
      Some(Some(result)) => {
        trace!(node = %self.node_id, gate = %self.settings.gate_type, result, "gate evaluated");
        Ok(self.output(result))
      }
    }
  }

  fn on_unregister(&self) {
    let mut memory = lock(&self.memory);
    memory.assignments.clear();
    memory.wipe();
    memory.last_output = None;
  }
}

/// Installs [`LogicGate`] handlers for `logicGate` nodes.
pub struct LogicGateFactory;

impl NodeFactory for LogicGateFactory {
  fn kind(&self) -> &'static str {
    "logicGate"
  }

  fn default_settings(&self) -> Value {
    json!({ "gateType": "AND", "resetAfterEval": false })
  }

  fn setup(&self, setup: NodeSetup) -> Result<(), NodeError> {
    let settings: LogicGateSettings = setup.settings_as()?;
    let gate = LogicGate::new(setup.node_id, settings, setup.input_count);
    setup.engine.register_handler(setup.node_id, Arc::new(gate));
    Ok(())
  }
}
