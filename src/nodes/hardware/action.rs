//! Action nodes: follow the input and apply it to a device.

use super::{Notifier, ScreenOverlay, Torch, Vibrator};
use crate::engine::{Engine, WeakEngine};
use crate::error::{HandlerError, HardwareError, NodeError};
use crate::graph::NodeId;
use crate::handler::SignalHandler;
use crate::nodes::catalog::{NodeFactory, NodeSetup};
use crate::nodes::common::{HARDWARE_APPLIED_KEY, with_flag};
use crate::signal::{Signal, SignalPropagation};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

/// A device effect switched by an action node.
#[async_trait]
pub trait DeviceAction: Send + Sync {
  /// Capability name used in logs.
  fn capability(&self) -> &'static str;

  /// Applies ON (`true`) or OFF (`false`). `data` is the inbound payload.
  async fn apply(&self, on: bool, data: &Value) -> Result<(), HardwareError>;
}

/// Handler shared by every action node.
///
/// ON is always applied. A plain OFF is applied only when no other upstream
/// source still holds the node ON; an explicit OFF is applied and drives the
/// node OFF regardless. The signal propagates whether or not the device call
/// succeeded, with `data.hardwareApplied` recording the outcome.
pub struct ActionNode {
  node_id: NodeId,
  engine: WeakEngine,
  action: Arc<dyn DeviceAction>,
}

impl ActionNode {
  /// Creates an action node for `node_id`.
  pub fn new(engine: &Engine, node_id: NodeId, action: Arc<dyn DeviceAction>) -> Self {
    Self {
      node_id,
      engine: engine.downgrade(),
      action,
    }
  }

  fn held_by_others(&self, source: NodeId) -> bool {
    self
      .engine
      .upgrade()
      .map(|engine| engine.active_sources(self.node_id).iter().any(|&id| id != source))
      .unwrap_or(false)
  }
}

#[async_trait]
impl SignalHandler for ActionNode {
  async fn handle(&self, signal: Signal) -> Result<SignalPropagation, HandlerError> {
    let on = signal.state().is_on();
    if !on && !signal.is_explicit_off() && self.held_by_others(signal.source()) {
      debug!(node = %self.node_id, capability = self.action.capability(), "OFF ignored; node still held");
      return Ok(SignalPropagation::pass());
    }

    let applied = match self.action.apply(on, signal.data()).await {
      Ok(()) => true,
      Err(err) => {
        warn!(
          node = %self.node_id,
          capability = self.action.capability(),
          error = %err,
          "device action failed"
        );
        false
      }
    };

    let decision =
      SignalPropagation::pass().with_data(with_flag(signal.data(), HARDWARE_APPLIED_KEY, applied));
    if !on && signal.is_explicit_off() {
      return Ok(decision.forced());
    }
    Ok(decision)
  }
}

// ── Flashlight ─────────────────────────────────────────────────────────────

struct TorchAction {
  torch: Arc<dyn Torch>,
}

#[async_trait]
impl DeviceAction for TorchAction {
  fn capability(&self) -> &'static str {
    "torch"
  }

  async fn apply(&self, on: bool, _data: &Value) -> Result<(), HardwareError> {
    if !self.torch.has_permission().await {
      return Err(HardwareError::PermissionDenied("camera".to_string()));
    }
    if self.torch.is_on() == on {
      return Ok(());
    }
    self.torch.set_torch(on).await
  }
}

/// Installs `flashlight` nodes.
pub struct FlashLightFactory {
  torch: Arc<dyn Torch>,
}

impl FlashLightFactory {
  /// Creates the factory over `torch`.
  pub fn new(torch: Arc<dyn Torch>) -> Self {
    Self { torch }
  }
}

impl NodeFactory for FlashLightFactory {
  fn kind(&self) -> &'static str {
    "flashlight"
  }

  fn setup(&self, setup: NodeSetup) -> Result<(), NodeError> {
    let action = Arc::new(TorchAction {
      torch: Arc::clone(&self.torch),
    });
    let node = ActionNode::new(&setup.engine, setup.node_id, action);
    setup.engine.register_handler(setup.node_id, Arc::new(node));
    Ok(())
  }
}

// ── Vibration ──────────────────────────────────────────────────────────────

/// Vibration settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VibrationSettings {
  /// Alternating wait/vibrate durations in milliseconds.
  pub pattern: Vec<u64>,
}

impl Default for VibrationSettings {
  fn default() -> Self {
    Self {
      pattern: vec![0, 500],
    }
  }
}

struct VibrateAction {
  vibrator: Arc<dyn Vibrator>,
  settings: VibrationSettings,
}

#[async_trait]
impl DeviceAction for VibrateAction {
  fn capability(&self) -> &'static str {
    "vibrator"
  }

  async fn apply(&self, on: bool, _data: &Value) -> Result<(), HardwareError> {
    if on {
      self.vibrator.vibrate(&self.settings.pattern).await
    } else {
      self.vibrator.cancel().await
    }
  }
}

/// Installs `vibration` nodes.
pub struct VibrationFactory {
  vibrator: Arc<dyn Vibrator>,
}

impl VibrationFactory {
  /// Creates the factory over `vibrator`.
  pub fn new(vibrator: Arc<dyn Vibrator>) -> Self {
    Self { vibrator }
  }
}

impl NodeFactory for VibrationFactory {
  fn kind(&self) -> &'static str {
    "vibration"
  }

  fn default_settings(&self) -> Value {
    json!({ "pattern": [0, 500] })
  }

  fn setup(&self, setup: NodeSetup) -> Result<(), NodeError> {
    let settings: VibrationSettings = setup.settings_as()?;
    let action = Arc::new(VibrateAction {
      vibrator: Arc::clone(&self.vibrator),
      settings,
    });
    let node = ActionNode::new(&setup.engine, setup.node_id, action);
    setup.engine.register_handler(setup.node_id, Arc::new(node));
    Ok(())
  }
}

// ── Notification ───────────────────────────────────────────────────────────

/// Notification settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NotificationSettings {
  /// Notification title.
  pub title: String,
  /// Body posted on ON. A string `data.message` on the signal overrides it.
  pub message: String,
  /// Body posted on OFF; nothing is posted on OFF when unset.
  pub off_message: Option<String>,
}

impl Default for NotificationSettings {
  fn default() -> Self {
    Self {
      title: "Signal".to_string(),
      message: "Node activated".to_string(),
      off_message: None,
    }
  }
}

struct NotifyAction {
  notifier: Arc<dyn Notifier>,
  settings: NotificationSettings,
}

#[async_trait]
impl DeviceAction for NotifyAction {
  fn capability(&self) -> &'static str {
    "notifications"
  }

  async fn apply(&self, on: bool, data: &Value) -> Result<(), HardwareError> {
    let body = if on {
      data
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or(self.settings.message.as_str())
    } else {
      match &self.settings.off_message {
        Some(message) => message.as_str(),
        None => return Ok(()),
      }
    };
    self.notifier.notify(&self.settings.title, body).await
  }
}

/// Installs `notification` nodes.
pub struct NotificationFactory {
  notifier: Arc<dyn Notifier>,
}

impl NotificationFactory {
  /// Creates the factory over `notifier`.
  pub fn new(notifier: Arc<dyn Notifier>) -> Self {
    Self { notifier }
  }
}

impl NodeFactory for NotificationFactory {
  fn kind(&self) -> &'static str {
    "notification"
  }

  fn default_settings(&self) -> Value {
    json!({ "title": "Signal", "message": "Node activated" })
  }

  fn setup(&self, setup: NodeSetup) -> Result<(), NodeError> {
    let settings: NotificationSettings = setup.settings_as()?;
    let action = Arc::new(NotifyAction {
      notifier: Arc::clone(&self.notifier),
      settings,
    });
    let node = ActionNode::new(&setup.engine, setup.node_id, action);
    setup.engine.register_handler(setup.node_id, Arc::new(node));
    Ok(())
  }
}

// ── Color screen ───────────────────────────────────────────────────────────

/// Color screen settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ColorScreenSettings {
  /// Overlay color, `#RRGGBB`.
  pub color: String,
}

impl Default for ColorScreenSettings {
  fn default() -> Self {
    Self {
      color: "#FF0000".to_string(),
    }
  }
}

struct OverlayAction {
  screen: Arc<dyn ScreenOverlay>,
  settings: ColorScreenSettings,
}

#[async_trait]
impl DeviceAction for OverlayAction {
  fn capability(&self) -> &'static str {
    "screen"
  }

  async fn apply(&self, on: bool, _data: &Value) -> Result<(), HardwareError> {
    if on {
      self.screen.show(&self.settings.color).await
    } else {
      self.screen.hide().await
    }
  }
}

/// Installs `colorScreen` nodes.
pub struct ColorScreenFactory {
  screen: Arc<dyn ScreenOverlay>,
}

impl ColorScreenFactory {
  /// Creates the factory over `screen`.
  pub fn new(screen: Arc<dyn ScreenOverlay>) -> Self {
    Self { screen }
  }
}

impl NodeFactory for ColorScreenFactory {
  fn kind(&self) -> &'static str {
    "colorScreen"
  }

  fn default_settings(&self) -> Value {
    json!({ "color": "#FF0000" })
  }

  fn setup(&self, setup: NodeSetup) -> Result<(), NodeError> {
    let settings: ColorScreenSettings = setup.settings_as()?;
    let action = Arc::new(OverlayAction {
      screen: Arc::clone(&self.screen),
      settings,
    });
    let node = ActionNode::new(&setup.engine, setup.node_id, action);
    setup.engine.register_handler(setup.node_id, Arc::new(node));
    Ok(())
  }
}
