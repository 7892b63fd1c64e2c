//! # Hardware Nodes
//!
//! Nodes whose effect is a device side effect, or whose signal comes from a
//! device.
//!
//! The device itself sits behind a capability trait ([`Torch`], [`Vibrator`],
//! [`VolumeControl`], [`Notifier`], [`ScreenOverlay`]). The host app supplies
//! real implementations through [`Devices`]; [`MemoryDevices`] provides
//! in-memory ones that record every call.
//!
//! ## Node types
//!
//! | Tag            | Role      | Capability      |
//! |----------------|-----------|-----------------|
//! | `flashlight`   | action    | [`Torch`]         |
//! | `vibration`    | action    | [`Vibrator`]      |
//! | `notification` | action    | [`Notifier`]      |
//! | `colorScreen`  | action    | [`ScreenOverlay`] |
//! | `volume`       | condition | [`VolumeControl`] |
//! | `voiceKeyword` | source    | bus events        |
//!
//! Action nodes follow their input. A device failure does not stop the
//! signal: it propagates with `data.hardwareApplied = false`.

mod action;
mod memory;
mod voice_keyword;
mod volume;


pub use action::{
  ActionNode, ColorScreenFactory, ColorScreenSettings, DeviceAction, FlashLightFactory,
  NotificationFactory, NotificationSettings, VibrationFactory, VibrationSettings,
};
pub use memory::{
  MemoryDevices, MemoryNotifier, MemoryScreen, MemoryTorch, MemoryVibrator, MemoryVolume,
};
pub use voice_keyword::{VoiceKeywordFactory, VoiceKeywordSettings};
pub use volume::{VolumeComparison, VolumeCondition, VolumeFactory, VolumeSettings};

use crate::error::HardwareError;
use async_trait::async_trait;
use std::sync::Arc;

/// Event carrying a fresh volume reading: `{"volume": <0-100>}`.
pub const VOLUME_CHANGED: &str = "hardware.volume.changed";

/// Event carrying a recognized phrase: `{"keyword": "<text>"}`.
pub const KEYWORD_DETECTED: &str = "voice.keyword.detected";

/// Camera flashlight.
#[async_trait]
pub trait Torch: Send + Sync {
  /// Whether the app may use the camera flash.
  async fn has_permission(&self) -> bool;
  /// Switches the flash.
  async fn set_torch(&self, on: bool) -> Result<(), HardwareError>;
  /// Whether the flash is lit.
  fn is_on(&self) -> bool;
}

/// Vibration motor.
#[async_trait]
pub trait Vibrator: Send + Sync {
  /// Starts vibrating with an on/off pattern in milliseconds.
  async fn vibrate(&self, pattern: &[u64]) -> Result<(), HardwareError>;
  /// Stops vibrating.
  async fn cancel(&self) -> Result<(), HardwareError>;
}

/// Media volume reader.
#[async_trait]
pub trait VolumeControl: Send + Sync {
  /// Current volume, 0 to 100.
  async fn volume(&self) -> Result<u8, HardwareError>;
}

/// Local notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
  /// Posts a notification.
  async fn notify(&self, title: &str, body: &str) -> Result<(), HardwareError>;
}

/// Full-screen color overlay.
#[async_trait]
pub trait ScreenOverlay: Send + Sync {
  /// Covers the screen with `color` (`#RRGGBB`).
  async fn show(&self, color: &str) -> Result<(), HardwareError>;
  /// Removes the overlay.
  async fn hide(&self) -> Result<(), HardwareError>;
}

/// The device capabilities built-in nodes are wired to.
#[derive(Clone)]
pub struct Devices {
  /// Flashlight.
  pub torch: Arc<dyn Torch>,
  /// Vibration motor.
  pub vibrator: Arc<dyn Vibrator>,
  /// Volume reader.
  pub volume: Arc<dyn VolumeControl>,
  /// Notifications.
  pub notifier: Arc<dyn Notifier>,
  /// Color overlay.
  pub screen: Arc<dyn ScreenOverlay>,
}
