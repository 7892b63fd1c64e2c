//! # Node Catalog Test Suite

use crate::engine::Engine;
use crate::error::NodeError;
use crate::graph::{Graph, GraphNode, NodeId};
use crate::nodes::catalog::{NodeCatalog, NodeFactory, NodeSetup};
use crate::nodes::hardware::MemoryDevices;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

const A: NodeId = NodeId::new(1);
const B: NodeId = NodeId::new(2);

fn single(kind: &str, settings: Value) -> Engine {
  let mut graph = Graph::new();
  graph
    .add_node(GraphNode::new(A, kind).with_settings(settings))
    .unwrap();
  Engine::new(graph)
}

/// Records the settings each node was installed with.
struct Probe {
  seen: Arc<Mutex<Vec<(NodeId, Value, usize)>>>,
}

impl NodeFactory for Probe {
  fn kind(&self) -> &'static str {
    "probe"
  }

  fn default_settings(&self) -> Value {
    json!({ "level": 1, "nested": { "keep": true, "replace": "old" } })
  }

  fn setup(&self, setup: NodeSetup) -> Result<(), NodeError> {
    self
      .seen
      .lock()
      .unwrap()
      .push((setup.node_id, setup.settings.clone(), setup.input_count));
    Ok(())
  }
}

#[test]
fn test_builtin_kinds() {
  let catalog = NodeCatalog::builtin(MemoryDevices::new().devices());
  assert_eq!(
    catalog.kinds(),
    vec![
      "colorScreen",
      "delay",
      "flashlight",
      "logicGate",
      "notification",
      "passthrough",
      "trigger",
      "vibration",
      "voiceKeyword",
      "volume",
    ]
  );
  assert!(catalog.get("delay").is_some());
  assert!(catalog.get("teleporter").is_none());
}

#[test]
fn test_install_merges_defaults_under_saved_settings() {
  let seen = Arc::new(Mutex::new(Vec::new()));
  let mut graph = Graph::new();
  graph.add_node(GraphNode::new(A, "probe")).unwrap();
  graph
    .add_node(GraphNode::new(B, "probe").with_settings(json!({ "nested": { "replace": "new" } })))
    .unwrap();
  graph.connect(A, B).unwrap();
  let engine = Engine::new(graph);

  let mut catalog = NodeCatalog::new();
  catalog.register(Probe {
    seen: Arc::clone(&seen),
  });
  assert_eq!(catalog.install(&engine).unwrap(), 2);

  let seen = seen.lock().unwrap();
  assert_eq!(seen[0], (A, json!({ "level": 1, "nested": { "keep": true, "replace": "old" } }), 0));
  assert_eq!(seen[1], (B, json!({ "level": 1, "nested": { "keep": true, "replace": "new" } }), 1));
}

#[test]
fn test_install_rejects_unknown_kind() {
  let engine = single("teleporter", json!({}));
  let catalog = NodeCatalog::builtin(MemoryDevices::new().devices());
  match catalog.install(&engine) {
    Err(NodeError::UnknownKind { node, kind }) => {
      assert_eq!(node, A);
      assert_eq!(kind, "teleporter");
    }
    other => panic!("expected UnknownKind, got {other:?}"),
  }
}

#[test]
fn test_install_rejects_invalid_settings() {
  let engine = single("delay", json!({ "delayMs": "soon" }));
  let catalog = NodeCatalog::builtin(MemoryDevices::new().devices());
  let err = catalog.install(&engine).unwrap_err();
  assert!(matches!(err, NodeError::InvalidSettings { node, .. } if node == A));
  assert!(err.to_string().contains("invalid settings for node"));
}

#[test]
fn test_handler_nodes_register_handlers() {
  let catalog = NodeCatalog::builtin(MemoryDevices::new().devices());
  for (kind, registers) in [
    ("passthrough", false),
    ("trigger", false),
    ("voiceKeyword", false),
    ("logicGate", true),
    ("delay", true),
    ("flashlight", true),
    ("volume", true),
  ] {
    let engine = single(kind, json!({}));
    catalog.install(&engine).unwrap();
    assert_eq!(engine.has_handler(A), registers, "{kind}");
  }
}

#[test]
fn test_register_replaces_same_tag() {
  let first = Arc::new(Mutex::new(Vec::new()));
  let second = Arc::new(Mutex::new(Vec::new()));
  let mut catalog = NodeCatalog::new();
  catalog
    .register(Probe {
      seen: Arc::clone(&first),
    })
    .register(Probe {
      seen: Arc::clone(&second),
    });
  assert_eq!(catalog.kinds(), vec!["probe"]);

  catalog.install(&single("probe", json!({}))).unwrap();
  assert!(first.lock().unwrap().is_empty());
  assert_eq!(second.lock().unwrap().len(), 1);
}
