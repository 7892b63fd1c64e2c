//! # Engine Test Suite
//!
//! Covers the public state operations, handler registration, reset and the
//! process-wide instance. Propagation rules have their own suite.

use crate::config::EngineConfig;
use crate::engine::{self, Engine, SetOptions};
use crate::error::EngineError;
use crate::event::{BusEvent, STATE_OFF, STATE_ON};
use crate::graph::{Graph, GraphNode, NodeId};
use crate::handler::{SignalHandler, handler_fn};
use crate::signal::{Signal, SignalPropagation, SignalState};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const A: NodeId = NodeId::new(1);
const B: NodeId = NodeId::new(2);
const C: NodeId = NodeId::new(3);

// ============================================================================
// Helpers
// ============================================================================

fn chain(ids: &[NodeId]) -> Graph {
  let mut graph = Graph::new();
  for &id in ids {
    graph.add_node(GraphNode::new(id, "passthrough")).unwrap();
  }
  for pair in ids.windows(2) {
    graph.connect(pair[0], pair[1]).unwrap();
  }
  graph
}

fn fast_config() -> EngineConfig {
  EngineConfig::default()
    .with_pulse_settle(Duration::from_millis(10))
    .with_guard_release(Duration::from_millis(10))
}

fn capture(engine: &Engine, name: &str) -> Arc<Mutex<Vec<Value>>> {
  let events = Arc::new(Mutex::new(Vec::new()));
  let sink = Arc::clone(&events);
  engine.subscribe_to_event(name, "test", move |event: &BusEvent| {
    sink.lock().unwrap().push(event.data.clone());
    Ok(())
  });
  events
}

fn counting_handler(count: &Arc<AtomicUsize>) -> Arc<dyn SignalHandler> {
  let count = Arc::clone(count);
  handler_fn(move |_signal| {
    let count = Arc::clone(&count);
    async move {
      count.fetch_add(1, Ordering::SeqCst);
      Ok(SignalPropagation::pass())
    }
  })
}

/// Handler that counts its own teardown.
struct TeardownProbe {
  unregistered: Arc<AtomicUsize>,
}

#[async_trait]
impl SignalHandler for TeardownProbe {
  async fn handle(&self, _signal: Signal) -> Result<SignalPropagation, crate::error::HandlerError> {
    Ok(SignalPropagation::pass())
  }

  fn on_unregister(&self) {
    self.unregistered.fetch_add(1, Ordering::SeqCst);
  }
}

// ============================================================================
// State Operations
// ============================================================================

#[tokio::test]
async fn test_every_graph_node_starts_off() {
  let engine = Engine::new(chain(&[A, B]));
  assert_eq!(engine.get_state(A), SignalState::Off);
  assert!(engine.node_state(B).is_some());
  assert!(engine.list_active().is_empty());
  assert_eq!(engine.get_state(NodeId::new(99)), SignalState::Off);
}

#[tokio::test]
async fn test_set_node_state_is_idempotent() {
  let engine = Engine::new(chain(&[A, B]));
  let on_events = capture(&engine, STATE_ON);

  engine.activate_node(A, Some(json!({ "level": 1 }))).await;
  engine.activate_node(A, Some(json!({ "level": 1 }))).await;

  assert_eq!(on_events.lock().unwrap().len(), 1);
  assert_eq!(engine.stats().signals_emitted, 1);
}

#[tokio::test]
async fn test_changed_payload_is_not_a_no_op() {
  let engine = Engine::new(chain(&[A]));
  let on_events = capture(&engine, STATE_ON);

  engine.activate_node(A, Some(json!(1))).await;
  engine.activate_node(A, Some(json!(2))).await;

  assert_eq!(on_events.lock().unwrap().len(), 2);
  assert_eq!(engine.node_state(A).unwrap().data, json!(2));
}

#[tokio::test]
async fn test_force_propagation_repeats_identical_state() {
  let engine = Engine::new(chain(&[A]));
  let on_events = capture(&engine, STATE_ON);

  for _ in 0..3 {
    engine
      .set_node_state(A, Some(SignalState::On), None, SetOptions::forced())
      .await;
  }
  assert_eq!(on_events.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_toggle_flips_and_marks_off_explicit() {
  let engine = Engine::new(chain(&[A]));
  let off_events = capture(&engine, STATE_OFF);

  assert_eq!(engine.toggle_node(A).await, SignalState::On);
  assert_eq!(engine.toggle_node(A).await, SignalState::Off);

  let off_events = off_events.lock().unwrap();
  assert_eq!(off_events.len(), 1);
  assert_eq!(off_events[0]["explicitOff"], json!(true));
  assert_eq!(off_events[0]["nodeId"], json!(1));
}

#[tokio::test]
async fn test_state_event_payload() {
  let engine = Engine::new(chain(&[A]));
  let on_events = capture(&engine, STATE_ON);

  engine.activate_node(A, Some(json!({ "source": "test" }))).await;

  let on_events = on_events.lock().unwrap();
  let event = &on_events[0];
  assert_eq!(event["state"], json!("ON"));
  assert_eq!(event["data"], json!({ "source": "test" }));
  assert_eq!(event["pulse"], json!(false));
  assert!(event["signalId"].is_u64());
  assert!(event["wave"].is_u64());
}

#[tokio::test]
async fn test_pulse_emits_one_on_then_one_plain_off() {
  let engine = Engine::with_config(chain(&[A, B]), fast_config());
  let on_events = capture(&engine, STATE_ON);
  let off_events = capture(&engine, STATE_OFF);

  engine.pulse_node(A, None).await;

  let on_events = on_events.lock().unwrap();
  let off_events = off_events.lock().unwrap();
  assert_eq!(on_events.len(), 1);
  assert_eq!(off_events.len(), 1);
  assert_eq!(off_events[0]["explicitOff"], json!(false));
  assert_eq!(off_events[0]["pulse"], json!(true));
  assert_eq!(engine.get_state(A), SignalState::Off);
  assert_eq!(engine.get_state(B), SignalState::Off);
}

#[tokio::test]
async fn test_pulse_reaches_downstream_handler_twice() {
  let engine = Engine::with_config(chain(&[A, B]), fast_config());
  let count = Arc::new(AtomicUsize::new(0));
  engine.register_handler(B, counting_handler(&count));

  engine.pulse_node(A, None).await;
  assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_stop_all_active_nodes() {
  let engine = Engine::new(chain(&[A, B, C]));
  engine.activate_node(A, None).await;
  engine.activate_node(C, None).await;
  assert_eq!(engine.list_active(), vec![A, B, C]);

  engine.stop_all_active_nodes().await;
  assert!(engine.list_active().is_empty());
}

// ============================================================================
// Handler Registration
// ============================================================================

#[tokio::test]
async fn test_register_handler_creates_state_for_unknown_node() {
  let engine = Engine::new(Graph::new());
  let count = Arc::new(AtomicUsize::new(0));
  engine.register_handler(NodeId::new(50), counting_handler(&count));
  assert!(engine.has_handler(NodeId::new(50)));
  assert!(engine.node_state(NodeId::new(50)).is_some());
}

#[tokio::test]
async fn test_reregistering_tears_down_previous_handler() {
  let engine = Engine::new(chain(&[A, B]));
  let unregistered = Arc::new(AtomicUsize::new(0));
  engine.register_handler(
    B,
    Arc::new(TeardownProbe {
      unregistered: Arc::clone(&unregistered),
    }),
  );
  let count = Arc::new(AtomicUsize::new(0));
  engine.register_handler(B, counting_handler(&count));

  assert_eq!(unregistered.load(Ordering::SeqCst), 1);
  engine.activate_node(A, None).await;
  assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unregister_handler_resets_node() {
  let engine = Engine::new(chain(&[A, B]));
  let count = Arc::new(AtomicUsize::new(0));
  engine.register_handler(B, counting_handler(&count));
  engine.activate_node(A, None).await;
  assert!(engine.is_active(B));

  assert!(engine.unregister_handler(B));
  assert!(!engine.unregister_handler(B));
  assert!(!engine.is_active(B));
  assert!(!engine.has_handler(B));
}

// ============================================================================
// Reset
// ============================================================================

#[tokio::test]
async fn test_reset_clears_runtime_state() {
  let engine = Engine::new(chain(&[A, B]));
  let unregistered = Arc::new(AtomicUsize::new(0));
  engine.register_handler(
    B,
    Arc::new(TeardownProbe {
      unregistered: Arc::clone(&unregistered),
    }),
  );
  let on_events = capture(&engine, STATE_ON);
  engine.variables().set("armed", true);
  engine.activate_node(A, None).await;

  engine.reset();

  assert_eq!(unregistered.load(Ordering::SeqCst), 1);
  assert!(!engine.has_handler(B));
  assert!(engine.list_active().is_empty());
  assert!(engine.node_state(A).is_some());
  assert!(engine.variables().is_empty());
  assert_eq!(engine.stats(), Default::default());

  engine.activate_node(A, None).await;
  assert_eq!(on_events.lock().unwrap().len(), 1);
  assert_eq!(engine.graph().len(), 2);
}

#[tokio::test]
async fn test_global_instance_lifecycle() {
  engine::reset();
  assert_eq!(engine::get().unwrap_err(), EngineError::NotInitialized);

  let first = engine::initialize(chain(&[A, B]));
  first.activate_node(A, None).await;
  assert!(engine::get().unwrap().is_active(B));

  let second = engine::initialize_with(chain(&[A]), fast_config());
  assert!(!first.is_active(A));
  assert_eq!(engine::get().unwrap().graph().len(), 1);
  assert_eq!(second.config().pulse_settle_ms, 10);

  engine::reset();
  assert!(matches!(engine::get(), Err(EngineError::NotInitialized)));
}
