//! # SignalWeave
//!
//! ON/OFF signal propagation for visual automation graphs.
//!
//! A program is a graph of nodes (triggers, conditions, actions). Every node
//! holds a binary state. Changing a node's state starts a wave that travels
//! along the node's outputs: plain nodes follow their inputs, and nodes with
//! a registered handler decide what to forward.
//!
//! ## Key Features
//!
//! - **Multi-source merging**: a node stays ON while any upstream source
//!   holds it ON
//! - **Cycle safety**: every wave visits each node at most once
//! - **Async handlers**: node behavior plugs in through [`handler::SignalHandler`]
//! - **Side channel**: state changes and propagation steps are announced on
//!   the [`event::EventBus`]
//! - **Node library**: logic gates, delays, condition gates, triggers and
//!   device-backed action nodes
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use signalweave::engine;
//! use signalweave::graph::{Graph, GraphNode, NodeId};
//! use signalweave::nodes::NodeCatalog;
//! use signalweave::nodes::hardware::MemoryDevices;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut graph = Graph::new();
//! graph.add_node(GraphNode::new(NodeId::new(1), "trigger"))?;
//! graph.add_node(
//!   GraphNode::new(NodeId::new(2), "delay").with_settings(json!({ "delayMs": 500 })),
//! )?;
//! graph.add_node(GraphNode::new(NodeId::new(3), "flashlight"))?;
//! graph.connect(NodeId::new(1), NodeId::new(2))?;
//! graph.connect(NodeId::new(2), NodeId::new(3))?;
//!
//! let engine = engine::initialize(graph);
//! NodeCatalog::builtin(MemoryDevices::new().devices()).install(&engine)?;
//! engine.activate_node(NodeId::new(1), None).await;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

/// Engine configuration.
pub mod config;
/// Propagation engine and the process-wide instance.
pub mod engine;
/// Error types.
pub mod error;
/// Side-channel event bus.
pub mod event;
/// Static node graph model.
pub mod graph;
/// Node handler contract and registry.
pub mod handler;
/// Built-in node implementations.
pub mod nodes;
/// Signal value types.
pub mod signal;
/// Per-node state bookkeeping.
pub mod state;
/// Logging setup.
pub mod telemetry;
/// Shared variable store.
pub mod variables;

mod sync;

#[cfg(test)]
mod config_test;
#[cfg(test)]
mod signal_test;
