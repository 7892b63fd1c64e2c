//! Propagation counters exposed for diagnostics.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub(crate) struct EngineStats {
  signals_emitted: AtomicU64,
  signals_propagated: AtomicU64,
  signals_blocked: AtomicU64,
  failed_signals: AtomicU64,
}

impl EngineStats {
  pub(crate) fn record_emitted(&self) {
    self.signals_emitted.fetch_add(1, Ordering::Relaxed);
  }

  pub(crate) fn record_propagated(&self) {
    self.signals_propagated.fetch_add(1, Ordering::Relaxed);
  }

  pub(crate) fn record_blocked(&self) {
    self.signals_blocked.fetch_add(1, Ordering::Relaxed);
  }

  pub(crate) fn record_failed(&self) {
    self.failed_signals.fetch_add(1, Ordering::Relaxed);
  }

  pub(crate) fn snapshot(&self) -> StatsSnapshot {
    StatsSnapshot {
      signals_emitted: self.signals_emitted.load(Ordering::Relaxed),
      signals_propagated: self.signals_propagated.load(Ordering::Relaxed),
      signals_blocked: self.signals_blocked.load(Ordering::Relaxed),
      failed_signals: self.failed_signals.load(Ordering::Relaxed),
    }
  }

  pub(crate) fn clear(&self) {
    self.signals_emitted.store(0, Ordering::Relaxed);
    self.signals_propagated.store(0, Ordering::Relaxed);
    self.signals_blocked.store(0, Ordering::Relaxed);
    self.failed_signals.store(0, Ordering::Relaxed);
  }
}

/// Point-in-time copy of the engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
  /// Top-level state changes that started a wave.
  pub signals_emitted: u64,
  /// Deliveries to a downstream node.
  pub signals_propagated: u64,
  /// Waves stopped by a handler's decision or error.
  pub signals_blocked: u64,
  /// Handler invocations that returned an error.
  pub failed_signals: u64,
}
