//! The recursive propagation step.
//!
//! Given a signal conceptually arriving at `current`, every downstream
//! neighbor in `current`'s output list (optionally narrowed by a handler's
//! `target_outputs`) is visited in order, depth first:
//!
//! 1. The (wave, node, state) triple is entered into the recursion guard; a
//!    wave that reaches a node it is already forwarding in the same state
//!    stops there. A node can therefore forward once per outgoing state per
//!    wave. Entries are released after
//!    [`EngineConfig::guard_release`](crate::config::EngineConfig::guard_release).
//! 2. Neighbors with a handler get the signal, and the returned decision is
//!    applied through the merge rule, even when the handler stops the wave.
//!    An OFF that other sources still override goes no further.
//! 3. Neighbors without a handler merge the signal directly and forward the
//!    same signal on a visible transition.
//! 4. Handler errors are counted, announced, and stop only that branch.

use super::{Engine, GuardKey};
use crate::event::{BLOCKED, PROPAGATED};
use crate::graph::NodeId;
use crate::handler::SignalHandler;
use crate::signal::{Signal, SignalState};
use crate::sync::lock;
use futures::future::BoxFuture;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, trace};

impl Engine {
  pub(super) fn propagate(
    &self,
    signal: Signal,
    current: NodeId,
    targets: Option<Vec<NodeId>>,
  ) -> BoxFuture<'_, ()> {
    Box::pin(async move {
      let key = (signal.wave(), current, signal.state());
      if !self.enter_guard(key) {
        trace!(node = %current, wave = signal.wave().raw(), "wave already passed this node");
        return;
      }
      signal.context().push(current);

      for target in self.select_outputs(current, targets.as_deref()) {
        match self.inner.handlers.get(target) {
          Some(handler) => self.deliver(&signal, current, target, handler).await,
          None => self.pass_through(&signal, current, target).await,
        }
      }

      signal.context().pop(current);
      self.release_guard(key);
    })
  }

  fn select_outputs(&self, current: NodeId, targets: Option<&[NodeId]>) -> Vec<NodeId> {
    let outputs = self.inner.graph.outputs(current);
    match targets {
      Some(targets) => outputs
        .iter()
        .copied()
        .filter(|id| targets.contains(id))
        .collect(),
      None => outputs.to_vec(),
    }
  }

  async fn deliver(
    &self,
    signal: &Signal,
    current: NodeId,
    target: NodeId,
    handler: Arc<dyn SignalHandler>,
  ) {
    // Pass-through hops keep the original sender; handlers always see the
    // node the signal actually arrived from.
    let inbound = if signal.source() == current {
      signal.clone()
    } else {
      signal.relay(current, signal.state(), signal.data().clone())
    };

    let decision = match handler.handle(inbound.clone()).await {
      Ok(decision) => decision,
      Err(err) => {
        self.inner.stats.record_failed();
        self.inner.stats.record_blocked();
        error!(from = %current, to = %target, error = %err, "handler failed");
        self.inner.events.emit_event(
          BLOCKED,
          json!({
            "from": current,
            "to": target,
            "wave": inbound.wave().raw(),
            "reason": "error",
            "error": err.to_string(),
          }),
        );
        return;
      }
    };

    let state = decision.state.unwrap_or(inbound.state());
    self.inner.stats.record_propagated();
    self.inner.events.emit_event(
      PROPAGATED,
      json!({
        "from": current,
        "to": target,
        "state": state,
        "wave": inbound.wave().raw(),
      }),
    );

    let data = decision
      .data
      .unwrap_or_else(|| inbound.data().clone());
    let outcome = if decision.force {
      self.inner.states.force(target, current, state, data.clone())
    } else {
      self.inner.states.merge(target, current, state, data.clone())
    };

    if !decision.propagate {
      self.inner.stats.record_blocked();
      trace!(from = %current, to = %target, state = %outcome.current, "handler stopped propagation");
      self.inner.events.emit_event(
        BLOCKED,
        json!({
          "from": current,
          "to": target,
          "wave": inbound.wave().raw(),
          "reason": "handler",
        }),
      );
      return;
    }

    if state == SignalState::Off && !decision.force && outcome.remaining_sources > 0 {
      debug!(
        node = %target,
        sources = outcome.remaining_sources,
        "OFF held back by other active sources"
      );
      return;
    }

    let proceed = outcome.changed()
      || state.is_on()
      || inbound.is_pulse()
      || (decision.force && inbound.is_explicit_off());
    if !proceed {
      trace!(node = %target, state = %state, "no visible change; wave ends");
      return;
    }

    let next = inbound.relay(target, state, data);
    self.propagate(next, target, decision.target_outputs).await;
  }

  async fn pass_through(&self, signal: &Signal, current: NodeId, target: NodeId) {
    let outcome = self
      .inner
      .states
      .merge(target, current, signal.state(), signal.data().clone());
    if !outcome.changed() {
      trace!(node = %target, state = %outcome.current, "pass-through unchanged");
      return;
    }

    self.inner.stats.record_propagated();
    self.inner.events.emit_event(
      PROPAGATED,
      json!({
        "from": current,
        "to": target,
        "state": outcome.current,
        "wave": signal.wave().raw(),
      }),
    );
    self.propagate(signal.clone(), target, None).await;
  }

  fn enter_guard(&self, key: GuardKey) -> bool {
    lock(&self.inner.guard).insert(key)
  }

  fn release_guard(&self, key: GuardKey) {
    let delay = self.inner.config.guard_release();
    if delay.is_zero() {
      lock(&self.inner.guard).remove(&key);
      return;
    }
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
      lock(&self.inner.guard).remove(&key);
      return;
    };
    let guard = Arc::clone(&self.inner.guard);
    runtime.spawn(async move {
      tokio::time::sleep(delay).await;
      lock(&guard).remove(&key);
    });
  }
}
