//! # Trigger Node
//!
//! Manual source node. Firing a momentary trigger pulses it; firing a
//! latching trigger toggles it. Triggers are fired either directly through
//! [`TriggerNode::fire`] or by emitting [`TRIGGER_FIRE`] with
//! `{"nodeId": <id>}` on the engine's bus.

use crate::engine::{Engine, WeakEngine};
use crate::error::{EngineError, NodeError};
use crate::event::ListenerError;
use crate::graph::NodeId;
use crate::nodes::catalog::{NodeFactory, NodeSetup};
use crate::signal::SignalState;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

/// Event that fires the trigger named in `data.nodeId`.
pub const TRIGGER_FIRE: &str = "trigger.fire";

/// Trigger settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TriggerSettings {
  /// Toggle on each fire instead of pulsing.
  pub latch: bool,
}

/// Handle to a trigger node.
#[derive(Clone)]
pub struct TriggerNode {
  node_id: NodeId,
  engine: WeakEngine,
  settings: TriggerSettings,
}

impl TriggerNode {
  /// Creates a trigger for `node_id`.
  pub fn new(engine: &Engine, node_id: NodeId, settings: TriggerSettings) -> Self {
    Self {
      node_id,
      engine: engine.downgrade(),
      settings,
    }
  }

  /// Node this trigger drives.
  pub fn node_id(&self) -> NodeId {
    self.node_id
  }

  /// Fires the trigger and returns the node's state afterwards.
  ///
  /// # Errors
  ///
  /// Returns [`EngineError::NotInitialized`] once the engine has been
  /// dropped.
  pub async fn fire(&self, data: Option<Value>) -> Result<SignalState, EngineError> {
    let engine = self.engine.upgrade().ok_or(EngineError::NotInitialized)?;
    debug!(node = %self.node_id, latch = self.settings.latch, "trigger fired");
    if self.settings.latch {
      if data.is_some() && !engine.is_active(self.node_id) {
        return Ok(engine.activate_node(self.node_id, data).await);
      }
      return Ok(engine.toggle_node(self.node_id).await);
    }
    engine.pulse_node(self.node_id, data).await;
    Ok(engine.get_state(self.node_id))
  }
}

/// Wires `trigger` nodes to [`TRIGGER_FIRE`] events.
pub struct TriggerFactory;

impl NodeFactory for TriggerFactory {
  fn kind(&self) -> &'static str {
    "trigger"
  }

  fn default_settings(&self) -> Value {
    json!({ "latch": false })
  }

  fn setup(&self, setup: NodeSetup) -> Result<(), NodeError> {
    let settings: TriggerSettings = setup.settings_as()?;
    let trigger = TriggerNode::new(&setup.engine, setup.node_id, settings);
    let own_id = setup.node_id.raw();
    setup
      .engine
      .events()
      .subscribe_to_event_async(TRIGGER_FIRE, setup.owner(), move |event| {
        let trigger = trigger.clone();
        let targeted = event.data.get("nodeId").and_then(Value::as_u64) == Some(own_id);
        let payload = event.data.get("data").cloned();
        Box::pin(async move {
          if targeted {
            trigger.fire(payload).await?;
          }
          Ok::<(), ListenerError>(())
        })
      });
    Ok(())
  }
}
