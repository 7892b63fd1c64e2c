//! # Common Node Utilities
//!
//! Shared helpers for node implementations.

use crate::graph::NodeId;
use crate::signal::Signal;
use serde_json::{Map, Value};

/// Payload key carrying an explicit boolean input value.
pub const INPUT_VALUE_KEY: &str = "inputValue";

/// Payload key set by hardware nodes to report whether the device action
/// actually happened.
pub const HARDWARE_APPLIED_KEY: &str = "hardwareApplied";

/// Deep-merges saved `overrides` onto a node type's `defaults`.
///
/// Objects merge key by key; any other override value replaces the default.
/// A `null` override keeps the default.
pub fn merge_settings(defaults: &Value, overrides: &Value) -> Value {
  match (defaults, overrides) {
    (Value::Object(defaults), Value::Object(overrides)) => {
      let mut merged: Map<String, Value> = defaults.clone();
      for (key, value) in overrides {
        let next = match merged.get(key) {
          Some(existing) => merge_settings(existing, value),
          None => value.clone(),
        };
        merged.insert(key.clone(), next);
      }
      Value::Object(merged)
    }
    (defaults, Value::Null) => defaults.clone(),
    (_, overrides) => overrides.clone(),
  }
}

/// Boolean value a signal contributes to a logic input.
///
/// OFF is always `false`. ON is `data.inputValue` when that is a boolean and
/// `true` otherwise.
pub fn input_truth(signal: &Signal) -> bool {
  if !signal.state().is_on() {
    return false;
  }
  signal
    .data()
    .get(INPUT_VALUE_KEY)
    .and_then(Value::as_bool)
    .unwrap_or(true)
}

/// Returns `data` with `key` set to `value`. Non-object payloads are wrapped
/// under `"value"`.
pub fn with_flag(data: &Value, key: &str, value: bool) -> Value {
  let mut object = match data {
    Value::Object(object) => object.clone(),
    Value::Null => Map::new(),
    other => {
      let mut object = Map::new();
      object.insert("value".to_string(), other.clone());
      object
    }
  };
  object.insert(key.to_string(), Value::Bool(value));
  Value::Object(object)
}

/// Event-bus owner name used by a node's subscriptions.
pub fn node_owner(id: NodeId) -> String {
  format!("node:{}", id.raw())
}
