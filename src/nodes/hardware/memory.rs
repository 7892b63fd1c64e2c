//! In-memory device capabilities.
//!
//! Each fake records the calls it receives and can be told to fail, so node
//! behavior can be exercised without a device.

use super::{Devices, Notifier, ScreenOverlay, Torch, Vibrator, VolumeControl};
use crate::error::HardwareError;
use crate::sync::lock;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

/// Flashlight fake. Permission is granted by default.
#[derive(Debug)]
pub struct MemoryTorch {
  permission: AtomicBool,
  lit: AtomicBool,
  calls: Mutex<Vec<bool>>,
}

impl Default for MemoryTorch {
  fn default() -> Self {
    Self {
      permission: AtomicBool::new(true),
      lit: AtomicBool::new(false),
      calls: Mutex::new(Vec::new()),
    }
  }
}

impl MemoryTorch {
  /// Grants or revokes camera permission.
  pub fn set_permission(&self, granted: bool) {
    self.permission.store(granted, Ordering::SeqCst);
  }

  /// Every `set_torch` value received, in order.
  pub fn calls(&self) -> Vec<bool> {
    lock(&self.calls).clone()
  }
}

#[async_trait]
impl Torch for MemoryTorch {
  async fn has_permission(&self) -> bool {
    self.permission.load(Ordering::SeqCst)
  }

  async fn set_torch(&self, on: bool) -> Result<(), HardwareError> {
    lock(&self.calls).push(on);
    self.lit.store(on, Ordering::SeqCst);
    Ok(())
  }

  fn is_on(&self) -> bool {
    self.lit.load(Ordering::SeqCst)
  }
}

/// Vibration fake.
#[derive(Debug, Default)]
pub struct MemoryVibrator {
  vibrating: AtomicBool,
  patterns: Mutex<Vec<Vec<u64>>>,
  cancels: Mutex<usize>,
}

impl MemoryVibrator {
  /// Whether the motor is running.
  pub fn is_vibrating(&self) -> bool {
    self.vibrating.load(Ordering::SeqCst)
  }

  /// Every pattern started, in order.
  pub fn patterns(&self) -> Vec<Vec<u64>> {
    lock(&self.patterns).clone()
  }

  /// Number of `cancel` calls.
  pub fn cancels(&self) -> usize {
    *lock(&self.cancels)
  }
}

#[async_trait]
impl Vibrator for MemoryVibrator {
  async fn vibrate(&self, pattern: &[u64]) -> Result<(), HardwareError> {
    lock(&self.patterns).push(pattern.to_vec());
    self.vibrating.store(true, Ordering::SeqCst);
    Ok(())
  }

  async fn cancel(&self) -> Result<(), HardwareError> {
    *lock(&self.cancels) += 1;
    self.vibrating.store(false, Ordering::SeqCst);
    Ok(())
  }
}

/// Volume fake. Starts at 50.
#[derive(Debug)]
pub struct MemoryVolume {
  level: AtomicU8,
}

impl Default for MemoryVolume {
  fn default() -> Self {
    Self {
      level: AtomicU8::new(50),
    }
  }
}

impl MemoryVolume {
  /// Sets the reported volume, clamped to 100.
  pub fn set_level(&self, level: u8) {
    self.level.store(level.min(100), Ordering::SeqCst);
  }
}

#[async_trait]
impl VolumeControl for MemoryVolume {
  async fn volume(&self) -> Result<u8, HardwareError> {
    Ok(self.level.load(Ordering::SeqCst))
  }
}

/// Notification fake.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
  sent: Mutex<Vec<(String, String)>>,
  fail: AtomicBool,
}

impl MemoryNotifier {
  /// Makes subsequent `notify` calls fail as unavailable.
  pub fn set_failing(&self, fail: bool) {
    self.fail.store(fail, Ordering::SeqCst);
  }

  /// Every `(title, body)` posted, in order.
  pub fn sent(&self) -> Vec<(String, String)> {
    lock(&self.sent).clone()
  }
}

#[async_trait]
impl Notifier for MemoryNotifier {
  async fn notify(&self, title: &str, body: &str) -> Result<(), HardwareError> {
    if self.fail.load(Ordering::SeqCst) {
      return Err(HardwareError::Unavailable {
        capability: "notifications".to_string(),
        reason: "disabled".to_string(),
      });
    }
    lock(&self.sent).push((title.to_string(), body.to_string()));
    Ok(())
  }
}

/// Overlay fake.
#[derive(Debug, Default)]
pub struct MemoryScreen {
  showing: Mutex<Option<String>>,
}

impl MemoryScreen {
  /// Color currently shown, if any.
  pub fn showing(&self) -> Option<String> {
    lock(&self.showing).clone()
  }
}

#[async_trait]
impl ScreenOverlay for MemoryScreen {
  async fn show(&self, color: &str) -> Result<(), HardwareError> {
    *lock(&self.showing) = Some(color.to_string());
    Ok(())
  }

  async fn hide(&self) -> Result<(), HardwareError> {
    *lock(&self.showing) = None;
    Ok(())
  }
}

/// One of each fake, kept typed so tests can inspect them.
#[derive(Debug, Clone, Default)]
pub struct MemoryDevices {
  /// Flashlight.
  pub torch: Arc<MemoryTorch>,
  /// Vibration motor.
  pub vibrator: Arc<MemoryVibrator>,
  /// Volume reader.
  pub volume: Arc<MemoryVolume>,
  /// Notifications.
  pub notifier: Arc<MemoryNotifier>,
  /// Color overlay.
  pub screen: Arc<MemoryScreen>,
}

impl MemoryDevices {
  /// Creates a fresh set of fakes.
  pub fn new() -> Self {
    Self::default()
  }

  /// The fakes as a [`Devices`] set.
  pub fn devices(&self) -> Devices {
    Devices {
      torch: self.torch.clone(),
      vibrator: self.vibrator.clone(),
      volume: self.volume.clone(),
      notifier: self.notifier.clone(),
      screen: self.screen.clone(),
    }
  }
}
