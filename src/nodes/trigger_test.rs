//! # Trigger Node Test Suite

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::graph::{Graph, GraphNode, NodeId};
use crate::nodes::trigger::{TRIGGER_FIRE, TriggerFactory, TriggerNode, TriggerSettings};
use crate::nodes::{NodeCatalog, PassThroughFactory};
use crate::signal::SignalState;
use serde_json::json;
use std::time::Duration;

const T: NodeId = NodeId::new(1);
const LAMP: NodeId = NodeId::new(2);

fn engine(trigger_settings: serde_json::Value) -> Engine {
  let mut graph = Graph::new();
  graph
    .add_node(GraphNode::new(T, "trigger").with_settings(trigger_settings))
    .unwrap();
  graph.add_node(GraphNode::new(LAMP, "passthrough")).unwrap();
  graph.connect(T, LAMP).unwrap();
  let config = EngineConfig::default().with_pulse_settle(Duration::from_millis(10));
  Engine::with_config(graph, config)
}

#[tokio::test]
async fn test_momentary_trigger_pulses() {
  let engine = engine(json!({}));
  let trigger = TriggerNode::new(&engine, T, TriggerSettings::default());

  let state = trigger.fire(None).await.unwrap();
  assert_eq!(state, SignalState::Off);
  assert!(!engine.is_active(LAMP));

  let stats = engine.stats();
  assert_eq!(stats.signals_emitted, 2);
}

#[tokio::test]
async fn test_latching_trigger_toggles() {
  let engine = engine(json!({}));
  let trigger = TriggerNode::new(&engine, T, TriggerSettings { latch: true });

  assert_eq!(trigger.fire(None).await.unwrap(), SignalState::On);
  assert!(engine.is_active(LAMP));
  assert_eq!(trigger.fire(None).await.unwrap(), SignalState::Off);
  assert!(!engine.is_active(LAMP));
}

#[tokio::test]
async fn test_latching_trigger_activates_with_data() {
  let engine = engine(json!({}));
  let trigger = TriggerNode::new(&engine, T, TriggerSettings { latch: true });

  trigger.fire(Some(json!({ "scene": "night" }))).await.unwrap();
  assert_eq!(engine.node_state(LAMP).unwrap().data, json!({ "scene": "night" }));

  // Already ON: data no longer forces an activation, the latch flips.
  assert_eq!(
    trigger.fire(Some(json!({ "scene": "day" }))).await.unwrap(),
    SignalState::Off
  );
}

#[tokio::test]
async fn test_fire_after_engine_dropped() {
  let engine = engine(json!({}));
  let trigger = TriggerNode::new(&engine, T, TriggerSettings::default());
  drop(engine);
  assert_eq!(trigger.fire(None).await, Err(EngineError::NotInitialized));
}

#[tokio::test]
async fn test_fire_event_targets_node() {
  let engine = engine(json!({ "latch": true }));
  let mut catalog = NodeCatalog::new();
  catalog.register(PassThroughFactory).register(TriggerFactory);
  catalog.install(&engine).unwrap();

  engine.emit_event(TRIGGER_FIRE, json!({ "nodeId": 99 }));
  tokio::time::sleep(Duration::from_millis(20)).await;
  assert!(!engine.is_active(T));

  engine.emit_event(TRIGGER_FIRE, json!({ "nodeId": 1, "data": { "from": "ui" } }));
  tokio::time::sleep(Duration::from_millis(20)).await;
  assert!(engine.is_active(T));
  assert_eq!(engine.node_state(LAMP).unwrap().data, json!({ "from": "ui" }));
}
