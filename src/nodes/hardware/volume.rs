//! Volume condition: passes the input through while the media volume is
//! above or below a threshold.

use super::{VOLUME_CHANGED, VolumeControl};
use crate::error::NodeError;
use crate::nodes::catalog::{NodeFactory, NodeSetup};
use crate::nodes::condition::{Condition, ConditionGate, ConditionSettings, EventTrigger};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::warn;

/// Which side of the threshold satisfies the condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeComparison {
  /// Volume at or above the threshold.
  #[default]
  Above,
  /// Volume at or below the threshold.
  Below,
}

impl VolumeComparison {
  /// Applies the comparison.
  pub fn holds(self, volume: u8, threshold: u8) -> bool {
    match self {
      VolumeComparison::Above => volume >= threshold,
      VolumeComparison::Below => volume <= threshold,
    }
  }
}

/// Volume node settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VolumeSettings {
  /// Threshold, 0 to 100.
  pub threshold: u8,
  /// Side of the threshold that satisfies the condition.
  pub comparison: VolumeComparison,
  /// Gate behavior.
  #[serde(flatten)]
  pub gate: ConditionSettings,
}

impl Default for VolumeSettings {
  fn default() -> Self {
    Self {
      threshold: 50,
      comparison: VolumeComparison::Above,
      gate: ConditionSettings::default(),
    }
  }
}

/// Reads the volume from a [`VolumeControl`] and from
/// [`VOLUME_CHANGED`] events.
pub struct VolumeCondition {
  control: Arc<dyn VolumeControl>,
  threshold: u8,
  comparison: VolumeComparison,
}

impl VolumeCondition {
  /// Creates the condition.
  pub fn new(control: Arc<dyn VolumeControl>, threshold: u8, comparison: VolumeComparison) -> Self {
    Self {
      control,
      threshold,
      comparison,
    }
  }
}

#[async_trait]
impl Condition for VolumeCondition {
  async fn check(&self) -> bool {
    match self.control.volume().await {
      Ok(volume) => self.comparison.holds(volume, self.threshold),
      Err(err) => {
        warn!(error = %err, "volume unavailable; condition treated as unmet");
        false
      }
    }
  }

  fn trigger(&self) -> Option<EventTrigger> {
    let threshold = self.threshold;
    let comparison = self.comparison;
    Some(EventTrigger::new(VOLUME_CHANGED, move |data: &Value| {
      data
        .get("volume")
        .and_then(Value::as_u64)
        .map(|volume| comparison.holds(u8::try_from(volume).unwrap_or(u8::MAX), threshold))
    }))
  }
}

/// Installs `volume` nodes.
pub struct VolumeFactory {
  control: Arc<dyn VolumeControl>,
}

impl VolumeFactory {
  /// Creates the factory over `control`.
  pub fn new(control: Arc<dyn VolumeControl>) -> Self {
    Self { control }
  }
}

impl NodeFactory for VolumeFactory {
  fn kind(&self) -> &'static str {
    "volume"
  }

  fn default_settings(&self) -> Value {
    json!({ "threshold": 50, "comparison": "above", "mode": "continuous" })
  }

  fn setup(&self, setup: NodeSetup) -> Result<(), NodeError> {
    let settings: VolumeSettings = setup.settings_as()?;
    let condition = VolumeCondition::new(
      Arc::clone(&self.control),
      settings.threshold.min(100),
      settings.comparison,
    );
    ConditionGate::install(&setup.engine, setup.node_id, Arc::new(condition), settings.gate);
    Ok(())
  }
}
