//! # Graph
//!
//! Static description of an automation program: nodes keyed by id, each with
//! a type tag, a settings payload and ordered input/output lists, plus a flat
//! edge list for external tooling.
//!
//! The engine consumes a [`Graph`] read-only. Propagation walks each node's
//! own `outputs` list; `edges` is kept in sync by the builder methods but is
//! never consulted by the engine.
//!
//! ## Example
//!
//! ```rust
//! use signalweave::graph::{Graph, GraphNode, NodeId};
//!
//! let mut graph = Graph::new();
//! graph.add_node(GraphNode::new(NodeId::new(1), "trigger"))?;
//! graph.add_node(GraphNode::new(NodeId::new(2), "flashlight"))?;
//! graph.connect(NodeId::new(1), NodeId::new(2))?;
//!
//! assert_eq!(graph.outputs(NodeId::new(1)), &[NodeId::new(2)]);
//! # Ok::<(), signalweave::error::EngineError>(())
//! ```

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Integer identifier of a node, unique within one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
  /// Wraps a raw id.
  pub const fn new(raw: u64) -> Self {
    NodeId(raw)
  }

  /// Returns the raw id.
  pub const fn raw(self) -> u64 {
    self.0
  }
}

impl From<u64> for NodeId {
  fn from(raw: u64) -> Self {
    NodeId(raw)
  }
}

impl fmt::Display for NodeId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "N{}", self.0)
  }
}

/// Immutable description of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
  /// Node id.
  pub id: NodeId,
  /// Type tag used to pick the node's handler implementation.
  #[serde(rename = "type")]
  pub kind: String,
  /// Saved settings overrides; merged with the type's defaults at setup time.
  #[serde(default)]
  pub settings: Value,
  /// Upstream node ids, in order.
  #[serde(default)]
  pub inputs: Vec<NodeId>,
  /// Downstream node ids, in order. Propagation visits them in this order.
  #[serde(default)]
  pub outputs: Vec<NodeId>,
}

impl GraphNode {
  /// Creates a node with empty settings and no connections.
  pub fn new(id: NodeId, kind: impl Into<String>) -> Self {
    Self {
      id,
      kind: kind.into(),
      settings: Value::Object(Default::default()),
      inputs: Vec::new(),
      outputs: Vec::new(),
    }
  }

  /// Replaces the node's settings payload.
  #[must_use]
  pub fn with_settings(mut self, settings: Value) -> Self {
    self.settings = settings;
    self
  }
}

/// A directed connection between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
  /// Upstream node.
  pub from: NodeId,
  /// Downstream node.
  pub to: NodeId,
}

/// Serialized shape of a graph: nodes as a list rather than a map.
#[derive(Serialize, Deserialize)]
struct GraphDocument {
  nodes: Vec<GraphNode>,
  #[serde(default)]
  edges: Vec<Edge>,
}

/// Nodes keyed by id plus the edge list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "GraphDocument", into = "GraphDocument")]
pub struct Graph {
  nodes: HashMap<NodeId, GraphNode>,
  edges: Vec<Edge>,
}

impl From<GraphDocument> for Graph {
  fn from(doc: GraphDocument) -> Self {
    Graph {
      nodes: doc.nodes.into_iter().map(|node| (node.id, node)).collect(),
      edges: doc.edges,
    }
  }
}

impl From<Graph> for GraphDocument {
  fn from(graph: Graph) -> Self {
    let mut nodes: Vec<GraphNode> = graph.nodes.into_values().collect();
    nodes.sort_by_key(|node| node.id);
    GraphDocument {
      nodes,
      edges: graph.edges,
    }
  }
}

impl Graph {
  /// Creates an empty graph.
  pub fn new() -> Self {
    Self::default()
  }

  /// Builds a graph from fully described nodes, deriving the edge list from
  /// each node's `outputs`.
  pub fn from_nodes(nodes: impl IntoIterator<Item = GraphNode>) -> Result<Self, EngineError> {
    let mut graph = Graph::new();
    for node in nodes {
      for &to in &node.outputs {
        graph.edges.push(Edge { from: node.id, to });
      }
      graph.add_node(node)?;
    }
    graph.validate()?;
    Ok(graph)
  }

  /// Adds a node.
  ///
  /// # Errors
  ///
  /// Returns [`EngineError::InvalidGraph`] if the id is already taken.
  pub fn add_node(&mut self, node: GraphNode) -> Result<(), EngineError> {
    if self.nodes.contains_key(&node.id) {
      return Err(EngineError::InvalidGraph(format!(
        "duplicate node id {}",
        node.id
      )));
    }
    self.nodes.insert(node.id, node);
    Ok(())
  }

  /// Connects `from` to `to`, updating both nodes' lists and the edge list.
  ///
  /// # Errors
  ///
  /// Returns [`EngineError::UnknownNode`] if either endpoint is missing.
  pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), EngineError> {
    if !self.nodes.contains_key(&to) {
      return Err(EngineError::UnknownNode(to));
    }
    let source = self
      .nodes
      .get_mut(&from)
      .ok_or(EngineError::UnknownNode(from))?;
    if !source.outputs.contains(&to) {
      source.outputs.push(to);
    }
    if let Some(target) = self.nodes.get_mut(&to) {
      if !target.inputs.contains(&from) {
        target.inputs.push(from);
      }
    }
    let edge = Edge { from, to };
    if !self.edges.contains(&edge) {
      self.edges.push(edge);
    }
    Ok(())
  }

  /// Checks that every referenced id exists.
  pub fn validate(&self) -> Result<(), EngineError> {
    for node in self.nodes.values() {
      for id in node.inputs.iter().chain(node.outputs.iter()) {
        if !self.nodes.contains_key(id) {
          return Err(EngineError::InvalidGraph(format!(
            "node {} references missing node {}",
            node.id, id
          )));
        }
      }
    }
    for edge in &self.edges {
      if !self.nodes.contains_key(&edge.from) || !self.nodes.contains_key(&edge.to) {
        return Err(EngineError::InvalidGraph(format!(
          "edge {} -> {} references a missing node",
          edge.from, edge.to
        )));
      }
    }
    Ok(())
  }

  /// Returns the node with the given id.
  pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
    self.nodes.get(&id)
  }

  /// Returns the node's output list, or an empty slice for unknown ids.
  pub fn outputs(&self, id: NodeId) -> &[NodeId] {
    self
      .nodes
      .get(&id)
      .map(|node| node.outputs.as_slice())
      .unwrap_or(&[])
  }

  /// Returns the node's input list, or an empty slice for unknown ids.
  pub fn inputs(&self, id: NodeId) -> &[NodeId] {
    self
      .nodes
      .get(&id)
      .map(|node| node.inputs.as_slice())
      .unwrap_or(&[])
  }

  /// Iterates over nodes in ascending id order.
  pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
    let mut nodes: Vec<&GraphNode> = self.nodes.values().collect();
    nodes.sort_by_key(|node| node.id);
    nodes.into_iter()
  }

  /// Returns the edge list.
  pub fn edges(&self) -> &[Edge] {
    &self.edges
  }

  /// Number of nodes.
  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  /// Whether the graph has no nodes.
  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }
}
