//! # Node Catalog
//!
//! Maps graph type tags to node implementations and installs them on an
//! engine.
//!
//! Each [`NodeFactory`] receives a [`NodeSetup`] during installation: the
//! node id, its settings (type defaults merged with the graph's saved
//! overrides), the number of configured inputs, the engine, and a `tracing`
//! span that serves as the node's logging sink. Factories register a handler
//! under the node's id, subscribe to events, or both.

use crate::engine::Engine;
use crate::error::NodeError;
use crate::graph::NodeId;
use crate::nodes::boolean_logic::LogicGateFactory;
use crate::nodes::common::{merge_settings, node_owner};
use crate::nodes::hardware::{
  ColorScreenFactory, Devices, FlashLightFactory, NotificationFactory, VibrationFactory,
  VoiceKeywordFactory, VolumeFactory,
};
use crate::nodes::time::DelayFactory;
use crate::nodes::trigger::TriggerFactory;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{Span, debug, info_span};

/// Everything a node implementation receives when it is installed.
pub struct NodeSetup {
  /// Id of the node being installed.
  pub node_id: NodeId,
  /// Resolved settings: type defaults merged with saved overrides.
  pub settings: Value,
  /// Number of configured inputs.
  pub input_count: usize,
  /// Engine the node registers against.
  pub engine: Engine,
  /// Logging sink for the node.
  pub span: Span,
}

impl NodeSetup {
  /// Creates a setup record with a fresh `node` span.
  pub fn new(engine: &Engine, node_id: NodeId, settings: Value, input_count: usize) -> Self {
    Self {
      node_id,
      settings,
      input_count,
      engine: engine.clone(),
      span: info_span!("node", id = node_id.raw()),
    }
  }

  /// Deserializes the resolved settings into the node's settings type.
  pub fn settings_as<T: DeserializeOwned>(&self) -> Result<T, NodeError> {
    serde_json::from_value(self.settings.clone()).map_err(|source| NodeError::InvalidSettings {
      node: self.node_id,
      source,
    })
  }

  /// Event-bus owner name for this node's subscriptions.
  pub fn owner(&self) -> String {
    node_owner(self.node_id)
  }
}

/// A node type that can be installed from a graph description.
pub trait NodeFactory: Send + Sync {
  /// Type tag this factory handles.
  fn kind(&self) -> &'static str;

  /// Default settings merged under the graph's saved overrides.
  fn default_settings(&self) -> Value {
    json!({})
  }

  /// Wires the node into the engine.
  fn setup(&self, setup: NodeSetup) -> Result<(), NodeError>;
}

/// A plain wire: no handler, so signals pass straight through.
pub struct PassThroughFactory;

impl NodeFactory for PassThroughFactory {
  fn kind(&self) -> &'static str {
    "passthrough"
  }

  fn setup(&self, _setup: NodeSetup) -> Result<(), NodeError> {
    Ok(())
  }
}

/// Registry of node factories keyed by type tag.
#[derive(Default, Clone)]
pub struct NodeCatalog {
  factories: HashMap<String, Arc<dyn NodeFactory>>,
}

impl NodeCatalog {
  /// Creates an empty catalog.
  pub fn new() -> Self {
    Self::default()
  }

  /// Creates a catalog with every built-in node type, wired to `devices`.
  pub fn builtin(devices: Devices) -> Self {
    let mut catalog = Self::new();
    catalog
      .register(PassThroughFactory)
      .register(TriggerFactory)
      .register(LogicGateFactory)
      .register(DelayFactory)
      .register(FlashLightFactory::new(Arc::clone(&devices.torch)))
      .register(VibrationFactory::new(Arc::clone(&devices.vibrator)))
      .register(VolumeFactory::new(Arc::clone(&devices.volume)))
      .register(NotificationFactory::new(Arc::clone(&devices.notifier)))
      .register(ColorScreenFactory::new(Arc::clone(&devices.screen)))
      .register(VoiceKeywordFactory);
    catalog
  }

  /// Adds a factory, replacing any factory with the same tag.
  pub fn register<F: NodeFactory + 'static>(&mut self, factory: F) -> &mut Self {
    self
      .factories
      .insert(factory.kind().to_string(), Arc::new(factory));
    self
  }

  /// Factory for `kind`.
  pub fn get(&self, kind: &str) -> Option<Arc<dyn NodeFactory>> {
    self.factories.get(kind).cloned()
  }

  /// Registered tags, sorted.
  pub fn kinds(&self) -> Vec<String> {
    let mut kinds: Vec<String> = self.factories.keys().cloned().collect();
    kinds.sort();
    kinds
  }

  /// Installs every node of the engine's graph, in id order.
  ///
  /// # Errors
  ///
  /// Stops at the first node whose type is unknown or whose setup fails.
  pub fn install(&self, engine: &Engine) -> Result<usize, NodeError> {
    let mut installed = 0;
    for node in engine.graph().nodes() {
      let factory = self.get(&node.kind).ok_or_else(|| NodeError::UnknownKind {
        node: node.id,
        kind: node.kind.clone(),
      })?;
      let settings = merge_settings(&factory.default_settings(), &node.settings);
      let setup = NodeSetup::new(engine, node.id, settings, node.inputs.len());
      let span = setup.span.clone();
      let _entered = span.enter();
      factory.setup(setup)?;
      debug!(kind = %node.kind, "node installed");
      installed += 1;
    }
    Ok(installed)
  }
}
