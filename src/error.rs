//! # Error Handling
//!
//! Error types for the signal engine and the node handler library.
//!
//! ## Taxonomy
//!
//! - **EngineError**: configuration-level failures surfaced to the immediate
//!   caller (engine not initialized, malformed graph, bad configuration).
//! - **HandlerError**: failures raised by a node's registered handler. The
//!   engine catches these per neighbor during propagation; they never cross
//!   the recursion and only show up as counters and `signal.blocked` events.
//! - **HardwareError**: failures reported by device capabilities. Handlers
//!   decide whether to keep propagating; most do, flagging the payload.
//! - **NodeError**: failures while installing a node from a graph description.
//!
//! Cycles in the graph are not errors. They are bounded by the recursion guard.

use crate::graph::NodeId;
use thiserror::Error;

/// Errors returned by engine-level operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
  /// An operation needed the global engine but none has been initialized.
  #[error("signal engine is not initialized")]
  NotInitialized,
  /// A node id was referenced that the graph does not contain.
  #[error("node {0} is not part of the graph")]
  UnknownNode(NodeId),
  /// The graph description is inconsistent.
  #[error("invalid graph: {0}")]
  InvalidGraph(String),
  /// The engine configuration could not be parsed or is out of range.
  #[error("configuration error: {0}")]
  Config(String),
}

/// Errors reported by device capabilities (torch, vibration motor, ...).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HardwareError {
  /// The user or platform denied access to the capability.
  #[error("permission denied for {0}")]
  PermissionDenied(String),
  /// The capability exists but could not perform the request.
  #[error("{capability} unavailable: {reason}")]
  Unavailable {
    /// Capability name.
    capability: String,
    /// Reason reported by the device layer.
    reason: String,
  },
}

/// Errors raised by a node's signal handler.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HandlerError {
  /// The handler's settings do not describe a usable node.
  #[error("invalid settings for node {node}: {reason}")]
  InvalidSettings {
    /// Node whose settings were rejected.
    node: NodeId,
    /// What was wrong with them.
    reason: String,
  },
  /// A device capability failed and the handler chose not to absorb it.
  #[error(transparent)]
  Hardware(#[from] HardwareError),
  /// Any other handler failure.
  #[error("{0}")]
  Failed(String),
}

impl HandlerError {
  /// Creates a generic handler failure from a message.
  pub fn failed(message: impl Into<String>) -> Self {
    HandlerError::Failed(message.into())
  }
}

/// Errors raised while installing nodes from a graph description.
#[derive(Error, Debug)]
pub enum NodeError {
  /// The node's type tag has no registered factory.
  #[error("node {node} has unknown type '{kind}'")]
  UnknownKind {
    /// Node carrying the unknown tag.
    node: NodeId,
    /// The tag itself.
    kind: String,
  },
  /// Settings could not be deserialized into the node's settings type.
  #[error("invalid settings for node {node}: {source}")]
  InvalidSettings {
    /// Node whose settings were rejected.
    node: NodeId,
    /// Underlying deserialization error.
    #[source]
    source: serde_json::Error,
  },
  /// The engine rejected the operation.
  #[error(transparent)]
  Engine(#[from] EngineError),
}

/// Convenience alias for engine results.
pub type EngineResult<T> = Result<T, EngineError>;
