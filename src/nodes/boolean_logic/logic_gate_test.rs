//! # Logic Gate Test Suite
//!
//! Handler-level tests drive [`LogicGate`] with hand-built signals; the
//! engine-level tests wire gates into a graph.

use crate::engine::Engine;
use crate::graph::{Graph, GraphNode, NodeId};
use crate::nodes::boolean_logic::{GateKind, LogicGate, LogicGateSettings, input_label};
use crate::handler::{SignalHandler, handler_fn};
use crate::signal::{Signal, SignalPropagation, SignalState};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

const A: NodeId = NodeId::new(1);
const B: NodeId = NodeId::new(2);
const GATE: NodeId = NodeId::new(10);
const OUT: NodeId = NodeId::new(20);

fn gate(kind: GateKind, inputs: usize) -> LogicGate {
  let settings = LogicGateSettings {
    gate_type: kind,
    ..Default::default()
  };
  LogicGate::new(GATE, settings, inputs)
}

fn on(source: NodeId) -> Signal {
  Signal::new(source, SignalState::On, Value::Null)
}

fn value(source: NodeId, input: bool) -> Signal {
  Signal::new(source, SignalState::On, json!({ "inputValue": input }))
}

fn off(source: NodeId) -> Signal {
  Signal::new(source, SignalState::Off, Value::Null)
}

fn explicit_off(source: NodeId) -> Signal {
  off(source).with_explicit_off(true)
}

// ============================================================================
// Truth Functions
// ============================================================================

#[test]
fn test_truth_tables() {
  let cases = [
    (GateKind::And, [false, false, false, true]),
    (GateKind::Or, [false, true, true, true]),
    (GateKind::Xor, [false, true, true, false]),
    (GateKind::Xnor, [true, false, false, true]),
    (GateKind::Nand, [true, true, true, false]),
    (GateKind::Nor, [true, false, false, false]),
  ];
  let inputs = [[false, false], [false, true], [true, false], [true, true]];
  for (kind, expected) in cases {
    for (input, want) in inputs.iter().zip(expected) {
      assert_eq!(kind.evaluate(input), want, "{kind} {input:?}");
    }
  }
  assert!(GateKind::Not.evaluate(&[false]));
  assert!(!GateKind::Not.evaluate(&[true, false]));
}

#[test]
fn test_xor_is_odd_parity() {
  assert!(GateKind::Xor.evaluate(&[true, true, true]));
  assert!(!GateKind::Xor.evaluate(&[true, true, false]));
}

#[test]
fn test_labels_and_settings_shape() {
  assert_eq!(input_label(0), "input_a");
  assert_eq!(input_label(25), "input_z");
  assert_eq!(input_label(26), "input_26");

  let settings: LogicGateSettings =
    serde_json::from_value(json!({ "gateType": "XNOR", "resetAfterEval": true })).unwrap();
  assert_eq!(settings.gate_type, GateKind::Xnor);
  assert!(settings.reset_after_eval);
  assert_eq!(settings.input_count, None);
}

// ============================================================================
// Handler Behavior
// ============================================================================

#[tokio::test]
async fn test_labels_follow_first_contact() {
  let gate = gate(GateKind::Or, 2);
  gate.handle(on(B)).await.unwrap();
  gate.handle(on(A)).await.unwrap();
  gate.handle(on(B)).await.unwrap();
  assert_eq!(gate.label_of(B).as_deref(), Some("input_a"));
  assert_eq!(gate.label_of(A).as_deref(), Some("input_b"));
}

#[tokio::test]
async fn test_extra_source_is_ignored() {
  let gate = gate(GateKind::Or, 1);
  gate.handle(on(A)).await.unwrap();
  let decision = gate.handle(on(B)).await.unwrap();
  assert!(!decision.propagate);
  assert_eq!(gate.label_of(B), None);
}

#[tokio::test]
async fn test_and_waits_then_resolves() {
  let gate = gate(GateKind::And, 2);

  let first = gate.handle(value(A, true)).await.unwrap();
  assert!(!first.propagate);
  assert_eq!(first.state, Some(SignalState::Off));
  assert_eq!(gate.last_output(), None);

  let second = gate.handle(value(B, true)).await.unwrap();
  assert!(second.propagate);
  assert!(second.force);
  assert_eq!(second.state, Some(SignalState::On));
  assert_eq!(second.data, Some(json!({ "inputValue": true, "gate": "AND" })));
}

#[tokio::test]
async fn test_and_short_circuits_on_false() {
  let gate = gate(GateKind::And, 2);
  let decision = gate.handle(value(A, false)).await.unwrap();
  assert!(decision.propagate);
  assert_eq!(decision.state, Some(SignalState::Off));
}

#[tokio::test]
async fn test_or_waits_for_every_slot() {
  let gate = gate(GateKind::Or, 2);
  assert!(!gate.handle(on(A)).await.unwrap().propagate);
  let decision = gate.handle(off(B)).await.unwrap();
  assert_eq!(decision.state, Some(SignalState::On));
}

#[tokio::test]
async fn test_not_inverts_single_input() {
  let gate = gate(GateKind::Not, 3);
  assert_eq!(gate.slot_count(), 1);
  let decision = gate.handle(on(A)).await.unwrap();
  assert_eq!(decision.state, Some(SignalState::Off));
  let decision = gate.handle(off(A)).await.unwrap();
  assert_eq!(decision.state, Some(SignalState::On));
}

#[tokio::test]
async fn test_explicit_off_resets_memory() {
  let gate = gate(GateKind::Or, 2);
  gate.handle(on(A)).await.unwrap();
  gate.handle(on(B)).await.unwrap();
  assert_eq!(gate.inputs().len(), 2);

  let decision = gate.handle(explicit_off(A)).await.unwrap();
  assert_eq!(decision.state, Some(SignalState::Off));
  assert!(decision.force);
  assert!(gate.inputs().is_empty());
  assert_eq!(gate.label_of(A).as_deref(), Some("input_a"));
}

#[tokio::test]
async fn test_reset_after_eval() {
  let settings = LogicGateSettings {
    gate_type: GateKind::Or,
    input_count: Some(2),
    reset_after_eval: true,
  };
  let gate = LogicGate::new(GATE, settings, 0);
  gate.handle(on(A)).await.unwrap();
  gate.handle(on(B)).await.unwrap();
  assert!(gate.inputs().is_empty());
  assert!(!gate.handle(on(A)).await.unwrap().propagate);
}

#[tokio::test]
async fn test_waiting_repeats_last_result() {
  let settings = LogicGateSettings {
    gate_type: GateKind::Or,
    input_count: Some(2),
    reset_after_eval: true,
  };
  let gate = LogicGate::new(GATE, settings, 0);
  gate.handle(on(A)).await.unwrap();
  gate.handle(on(B)).await.unwrap();
  assert_eq!(gate.last_output(), Some(true));

  let waiting = gate.handle(off(A)).await.unwrap();
  assert!(!waiting.propagate);
  assert_eq!(waiting.state, Some(SignalState::On));
  assert_eq!(waiting.data, Some(json!({ "inputValue": true, "gate": "OR" })));
}

#[tokio::test]
async fn test_configured_input_count_wins() {
  let settings = LogicGateSettings {
    gate_type: GateKind::And,
    input_count: Some(3),
    reset_after_eval: false,
  };
  let gate = LogicGate::new(GATE, settings, 2);
  assert_eq!(gate.slot_count(), 3);
}

// ============================================================================
// Engine Integration
// ============================================================================

fn gate_graph(kind: GateKind) -> (Engine, Arc<Mutex<Vec<SignalState>>>) {
  let mut graph = Graph::new();
  for id in [A, B, GATE, OUT] {
    graph.add_node(GraphNode::new(id, "passthrough")).unwrap();
  }
  graph.connect(A, GATE).unwrap();
  graph.connect(B, GATE).unwrap();
  graph.connect(GATE, OUT).unwrap();

  let engine = Engine::new(graph);
  engine.register_handler(GATE, Arc::new(gate(kind, 2)));

  let seen = Arc::new(Mutex::new(Vec::new()));
  let sink = Arc::clone(&seen);
  engine.register_handler(
    OUT,
    handler_fn(move |signal| {
      let sink = Arc::clone(&sink);
      async move {
        sink.lock().unwrap().push(signal.state());
        Ok(SignalPropagation::pass())
      }
    }),
  );
  (engine, seen)
}

#[tokio::test]
async fn test_and_gate_in_graph() {
  let (engine, seen) = gate_graph(GateKind::And);

  engine.activate_node(A, Some(json!({ "inputValue": true }))).await;
  assert!(!engine.is_active(GATE));
  engine.activate_node(B, Some(json!({ "inputValue": true }))).await;
  assert!(engine.is_active(GATE));
  assert!(engine.is_active(OUT));

  engine.deactivate_node(A).await;
  assert!(!engine.is_active(GATE));
  assert!(!engine.is_active(OUT));
  assert_eq!(*seen.lock().unwrap(), vec![SignalState::On, SignalState::Off]);
}

#[tokio::test]
async fn test_xor_gate_in_graph() {
  let (engine, seen) = gate_graph(GateKind::Xor);

  engine.activate_node(A, Some(json!({ "inputValue": true }))).await;
  engine.activate_node(B, Some(json!({ "inputValue": true }))).await;
  assert!(!engine.is_active(GATE));
  assert!(seen.lock().unwrap().is_empty());

  engine.activate_node(B, Some(json!({ "inputValue": false }))).await;
  assert!(engine.is_active(GATE));
  assert_eq!(*seen.lock().unwrap(), vec![SignalState::On]);
}
