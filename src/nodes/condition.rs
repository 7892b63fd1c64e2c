//! # Condition Gate
//!
//! The shared shape behind condition nodes (hardware-state gates,
//! volume gates, variable checks). A concrete condition supplies:
//!
//! - a [`Condition::check`] predicate,
//! - optionally an [`EventTrigger`]: an event name plus an extractor that
//!   reads a truth value from the event payload,
//! - [`ConditionSettings`]: the interaction mode and `invert_signal`.
//!
//! [`ConditionGate`] does the rest. It remembers which upstream sources are
//! currently asserting ON, independent of whether the condition holds at
//! this moment, re-evaluates when either the input or the trigger event
//! changes, and drives its own output through the engine.
//!
//! ## Modes
//!
//! - **Continuous**: output mirrors the condition while the input stays ON.
//! - **Timer**: each rising edge switches the output ON and (re)arms a timer
//!   that switches it OFF after `timer_duration_ms`.
//! - **Switch**: each rising edge toggles the output.
//!
//! The arrival of an ON input counts as a rising edge when the condition
//! already holds. The input counts as OFF once every asserting source has
//! sent OFF, or on any explicit OFF; that cancels the timer and switches the
//! output OFF.
//!
//! The gate's inbound handler always stops the engine's wave; downstream
//! nodes only ever see the waves the gate starts from its own output. The
//! inbound merge carries the gate's own output state, so the engine's record
//! of the node matches what downstream saw.

use crate::engine::{Engine, SetOptions, WeakEngine};
use crate::error::HandlerError;
use crate::event::{ListenerError, Subscription};
use crate::graph::NodeId;
use crate::handler::SignalHandler;
use crate::nodes::common::node_owner;
use crate::signal::{Signal, SignalPropagation, SignalState};
use crate::sync::lock;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// How a condition gate maps condition edges to output changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionMode {
  /// Output mirrors the condition while the input is ON.
  #[default]
  Continuous,
  /// Output switches ON on a rising edge and back OFF after a fixed time.
  Timer,
  /// Output toggles on every rising edge.
  Switch,
}

/// Settings shared by every condition node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConditionSettings {
  /// Interaction mode.
  pub mode: ConditionMode,
  /// Output hold time in timer mode.
  pub timer_duration_ms: u64,
  /// Invert the condition's result.
  pub invert_signal: bool,
}

impl Default for ConditionSettings {
  fn default() -> Self {
    Self {
      mode: ConditionMode::Continuous,
      timer_duration_ms: 1000,
      invert_signal: false,
    }
  }
}

impl ConditionSettings {
  /// Timer-mode hold time.
  pub fn timer_duration(&self) -> Duration {
    Duration::from_millis(self.timer_duration_ms)
  }
}

/// Reads a truth value out of an event payload; `None` ignores the event.
pub type TruthExtractor = Arc<dyn Fn(&Value) -> Option<bool> + Send + Sync>;

/// External event that re-evaluates a condition.
#[derive(Clone)]
pub struct EventTrigger {
  /// Event name to subscribe to.
  pub event: String,
  /// Extracts the condition's value from the payload.
  pub extract: TruthExtractor,
}

impl EventTrigger {
  /// Creates a trigger for `event`.
  pub fn new<F>(event: impl Into<String>, extract: F) -> Self
  where
    F: Fn(&Value) -> Option<bool> + Send + Sync + 'static,
  {
    Self {
      event: event.into(),
      extract: Arc::new(extract),
    }
  }
}

/// A condition a [`ConditionGate`] evaluates.
#[async_trait]
pub trait Condition: Send + Sync {
  /// Evaluates the condition now.
  async fn check(&self) -> bool;

  /// Event that carries fresh condition values, if any.
  fn trigger(&self) -> Option<EventTrigger> {
    None
  }
}

/// Condition backed by a synchronous predicate.
pub struct FnCondition<F> {
  predicate: F,
  trigger: Option<EventTrigger>,
}

/// Wraps a predicate as a [`Condition`].
pub fn condition_fn<F>(predicate: F) -> FnCondition<F>
where
  F: Fn() -> bool + Send + Sync,
{
  FnCondition {
    predicate,
    trigger: None,
  }
}

impl<F> FnCondition<F> {
  /// Adds an event trigger.
  #[must_use]
  pub fn with_trigger(mut self, trigger: EventTrigger) -> Self {
    self.trigger = Some(trigger);
    self
  }
}

#[async_trait]
impl<F> Condition for FnCondition<F>
where
  F: Fn() -> bool + Send + Sync,
{
  async fn check(&self) -> bool {
    (self.predicate)()
  }

  fn trigger(&self) -> Option<EventTrigger> {
    self.trigger.clone()
  }
}

#[derive(Default)]
struct GateRuntime {
  sources: BTreeSet<NodeId>,
  output_on: bool,
  last_met: bool,
  input_data: Value,
  timer: Option<JoinHandle<()>>,
}

impl GateRuntime {
  fn cancel_timer(&mut self) {
    if let Some(timer) = self.timer.take() {
      timer.abort();
    }
  }
}

struct GateInner {
  node_id: NodeId,
  engine: WeakEngine,
  condition: Arc<dyn Condition>,
  settings: ConditionSettings,
  runtime: Mutex<GateRuntime>,
  subscription: Mutex<Option<Subscription>>,
}

enum GateAction {
  Nothing,
  Activate { arm_timer: bool },
  Rearm,
  Deactivate,
}

/// Reusable handler for condition nodes. Cloning yields another handle to
/// the same gate.
#[derive(Clone)]
pub struct ConditionGate {
  inner: Arc<GateInner>,
}

impl ConditionGate {
  /// Creates a gate for `node_id` without registering it.
  pub fn new(
    engine: &Engine,
    node_id: NodeId,
    condition: Arc<dyn Condition>,
    settings: ConditionSettings,
  ) -> Self {
    Self {
      inner: Arc::new(GateInner {
        node_id,
        engine: engine.downgrade(),
        condition,
        settings,
        runtime: Mutex::new(GateRuntime::default()),
        subscription: Mutex::new(None),
      }),
    }
  }

  /// Creates the gate, registers it as `node_id`'s handler and subscribes
  /// to the condition's trigger event.
  pub fn install(
    engine: &Engine,
    node_id: NodeId,
    condition: Arc<dyn Condition>,
    settings: ConditionSettings,
  ) -> Self {
    let gate = Self::new(engine, node_id, condition, settings);
    engine.register_handler(node_id, Arc::new(gate.clone()));
    gate.subscribe(engine);
    gate
  }

  fn subscribe(&self, engine: &Engine) {
    let Some(trigger) = self.inner.condition.trigger() else {
      return;
    };
    // The bus must not keep the gate alive after it is unregistered.
    let gate: Weak<GateInner> = Arc::downgrade(&self.inner);
    let extract = Arc::clone(&trigger.extract);
    let subscription = engine.events().subscribe_to_event_async(
      &trigger.event,
      node_owner(self.inner.node_id),
      move |event| {
        let gate = gate.clone();
        let observed = extract(&event.data);
        Box::pin(async move {
          if let (Some(inner), Some(value)) = (gate.upgrade(), observed) {
            ConditionGate { inner }.evaluate(Some(value)).await;
          }
          Ok::<(), ListenerError>(())
        })
      },
    );
    *lock(&self.inner.subscription) = Some(subscription);
  }

  /// Node this gate drives.
  pub fn node_id(&self) -> NodeId {
    self.inner.node_id
  }

  /// Whether an upstream source is currently asserting ON.
  pub fn has_active_input(&self) -> bool {
    !lock(&self.inner.runtime).sources.is_empty()
  }

  /// Upstream sources currently asserting ON.
  pub fn active_inputs(&self) -> BTreeSet<NodeId> {
    lock(&self.inner.runtime).sources.clone()
  }

  /// Whether the gate's output is ON.
  pub fn output_active(&self) -> bool {
    lock(&self.inner.runtime).output_on
  }

  async fn on_input(&self, signal: &Signal) {
    if signal.state().is_on() {
      {
        let mut runtime = lock(&self.inner.runtime);
        runtime.sources.insert(signal.source());
        runtime.input_data = signal.data().clone();
      }
      self.evaluate(None).await;
      return;
    }

    let was_on = {
      let mut runtime = lock(&self.inner.runtime);
      runtime.sources.remove(&signal.source());
      if signal.is_explicit_off() {
        runtime.sources.clear();
      } else if !runtime.sources.is_empty() {
        trace!(
          node = %self.inner.node_id,
          from = %signal.source(),
          remaining = runtime.sources.len(),
          "input still held by other sources"
        );
        return;
      }
      runtime.last_met = false;
      runtime.cancel_timer();
      std::mem::replace(&mut runtime.output_on, false)
    };
    if was_on {
      self.deactivate_output(signal.is_explicit_off()).await;
    }
  }

  async fn evaluate(&self, observed: Option<bool>) {
    let raw = match observed {
      Some(value) => value,
      None => self.inner.condition.check().await,
    };
    let met = raw != self.inner.settings.invert_signal;

    let action = {
      let mut runtime = lock(&self.inner.runtime);
      if runtime.sources.is_empty() {
        GateAction::Nothing
      } else {
        let rising = met && !runtime.last_met;
        runtime.last_met = met;
        match self.inner.settings.mode {
          ConditionMode::Continuous if met && !runtime.output_on => {
            runtime.output_on = true;
            GateAction::Activate { arm_timer: false }
          }
          ConditionMode::Continuous if !met && runtime.output_on => {
            runtime.output_on = false;
            GateAction::Deactivate
          }
          ConditionMode::Continuous => GateAction::Nothing,
          ConditionMode::Timer if rising => {
            if std::mem::replace(&mut runtime.output_on, true) {
              GateAction::Rearm
            } else {
              GateAction::Activate { arm_timer: true }
            }
          }
          ConditionMode::Timer => GateAction::Nothing,
          ConditionMode::Switch if rising => {
            runtime.output_on = !runtime.output_on;
            if runtime.output_on {
              GateAction::Activate { arm_timer: false }
            } else {
              GateAction::Deactivate
            }
          }
          ConditionMode::Switch => GateAction::Nothing,
        }
      }
    };

    trace!(node = %self.inner.node_id, met, "condition evaluated");
    match action {
      GateAction::Activate { arm_timer } => {
        if arm_timer {
          self.arm_timer();
        }
        self.activate_output().await;
      }
      GateAction::Rearm => self.arm_timer(),
      GateAction::Deactivate => self.deactivate_output(false).await,
      GateAction::Nothing => {}
    }
  }

  fn arm_timer(&self) {
    let gate = self.clone();
    let duration = self.inner.settings.timer_duration();
    let handle = tokio::spawn(async move {
      tokio::time::sleep(duration).await;
      gate.timer_elapsed().await;
    });
    let mut runtime = lock(&self.inner.runtime);
    runtime.cancel_timer();
    runtime.timer = Some(handle);
  }

  async fn timer_elapsed(&self) {
    let was_on = {
      let mut runtime = lock(&self.inner.runtime);
      // Dropping the handle detaches it; this task is the one finishing.
      runtime.timer = None;
      std::mem::replace(&mut runtime.output_on, false)
    };
    if was_on {
      debug!(node = %self.inner.node_id, "condition timer elapsed");
      self.deactivate_output(false).await;
    }
  }

  async fn activate_output(&self) {
    let Some(engine) = self.inner.engine.upgrade() else {
      return;
    };
    let data = lock(&self.inner.runtime).input_data.clone();
    engine
      .set_node_state(
        self.inner.node_id,
        Some(SignalState::On),
        Some(data),
        SetOptions::forced(),
      )
      .await;
    let sources = self.active_inputs();
    engine.hold_sources(self.inner.node_id, sources);
  }

  async fn deactivate_output(&self, explicit: bool) {
    let Some(engine) = self.inner.engine.upgrade() else {
      return;
    };
    engine
      .set_node_state(
        self.inner.node_id,
        Some(SignalState::Off),
        None,
        SetOptions::forced().with_explicit_off(explicit),
      )
      .await;
  }
}

#[async_trait]
impl SignalHandler for ConditionGate {
  async fn handle(&self, signal: Signal) -> Result<SignalPropagation, HandlerError> {
    self.on_input(&signal).await;
    let holding = signal.state().is_on() && self.output_active();
    Ok(SignalPropagation::halt().with_state(SignalState::from_bool(holding)))
  }

  fn on_unregister(&self) {
    {
      let mut runtime = lock(&self.inner.runtime);
      runtime.cancel_timer();
      runtime.sources.clear();
      runtime.output_on = false;
      runtime.last_met = false;
    }
    if let Some(subscription) = lock(&self.inner.subscription).take() {
      subscription.unsubscribe();
    }
  }
}
