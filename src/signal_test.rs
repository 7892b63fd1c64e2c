//! # Signal Test Suite

use crate::graph::NodeId;
use crate::signal::{ExecutionContext, Signal, SignalPropagation, SignalState};
use serde_json::{Value, json};
use std::sync::Arc;

#[test]
fn test_state_helpers() {
  assert_eq!(SignalState::default(), SignalState::Off);
  assert_eq!(SignalState::from_bool(true), SignalState::On);
  assert_eq!(SignalState::On.toggled(), SignalState::Off);
  assert_eq!(SignalState::Off.to_string(), "OFF");
  assert_eq!(serde_json::to_value(SignalState::On).unwrap(), json!("ON"));
}

#[test]
fn test_relay_keeps_wave_and_context() {
  let origin = Signal::new(NodeId::new(1), SignalState::On, json!({ "n": 1 })).with_pulse(true);
  let hop = origin.relay(NodeId::new(2), SignalState::On, Value::Null);

  assert_eq!(hop.wave(), origin.wave());
  assert_ne!(hop.id(), origin.id());
  assert_eq!(hop.source(), NodeId::new(2));
  assert!(hop.is_pulse());
  assert!(Arc::ptr_eq(hop.context(), origin.context()));
}

#[test]
fn test_new_signals_start_new_waves() {
  let a = Signal::new(NodeId::new(1), SignalState::On, Value::Null);
  let b = Signal::new(NodeId::new(1), SignalState::On, Value::Null);
  assert_ne!(a.wave(), b.wave());
}

#[test]
fn test_explicit_off_only_applies_to_off() {
  let on = Signal::new(NodeId::new(1), SignalState::On, Value::Null).with_explicit_off(true);
  assert!(!on.is_explicit_off());

  let off = Signal::new(NodeId::new(1), SignalState::Off, Value::Null).with_explicit_off(true);
  assert!(off.is_explicit_off());
  assert!(off.relay(NodeId::new(2), SignalState::Off, Value::Null).is_explicit_off());
  assert!(!off.relay(NodeId::new(2), SignalState::On, Value::Null).is_explicit_off());
}

#[test]
fn test_propagation_builders() {
  let decision = SignalPropagation::pass();
  assert!(decision.propagate);
  assert_eq!(decision, SignalPropagation::default());

  let decision = SignalPropagation::halt()
    .with_state(SignalState::On)
    .with_data(json!(5))
    .with_targets(vec![NodeId::new(3)])
    .forced();
  assert!(!decision.propagate);
  assert_eq!(decision.state, Some(SignalState::On));
  assert_eq!(decision.data, Some(json!(5)));
  assert_eq!(decision.target_outputs, Some(vec![NodeId::new(3)]));
  assert!(decision.force);
}

#[test]
fn test_context_stack_and_metadata() {
  let context = ExecutionContext::new();
  context.push(NodeId::new(1));
  context.push(NodeId::new(2));
  context.push(NodeId::new(1));
  context.pop(NodeId::new(1));
  assert_eq!(context.stack(), vec![NodeId::new(1), NodeId::new(2)]);

  assert_eq!(context.set_metadata("run", json!("a")), None);
  let derived = context.derive();
  assert_eq!(derived.metadata("run"), Some(json!("a")));
  assert!(derived.stack().is_empty());

  context.clear();
  assert!(context.stack().is_empty());
  assert_eq!(context.metadata("run"), None);
  assert_eq!(derived.metadata("run"), Some(json!("a")));
}
