//! # Common Node Utilities Test Suite

use crate::graph::NodeId;
use crate::nodes::common::{HARDWARE_APPLIED_KEY, input_truth, merge_settings, node_owner, with_flag};
use crate::signal::{Signal, SignalState};
use serde_json::{Value, json};

#[test]
fn test_merge_settings_is_deep() {
  let defaults = json!({ "mode": "continuous", "timer": { "ms": 1000, "repeat": false } });
  let overrides = json!({ "timer": { "ms": 250 } });
  assert_eq!(
    merge_settings(&defaults, &overrides),
    json!({ "mode": "continuous", "timer": { "ms": 250, "repeat": false } })
  );
}

#[test]
fn test_merge_settings_null_keeps_defaults() {
  let defaults = json!({ "delayMs": 1000 });
  assert_eq!(merge_settings(&defaults, &Value::Null), defaults);
}

#[test]
fn test_merge_settings_scalar_replaces() {
  assert_eq!(merge_settings(&json!({ "a": 1 }), &json!(5)), json!(5));
  assert_eq!(
    merge_settings(&json!({ "list": [1, 2] }), &json!({ "list": [3] })),
    json!({ "list": [3] })
  );
}

#[test]
fn test_input_truth() {
  let source = NodeId::new(1);
  assert!(input_truth(&Signal::new(source, SignalState::On, Value::Null)));
  assert!(!input_truth(&Signal::new(source, SignalState::Off, json!({ "inputValue": true }))));
  assert!(!input_truth(&Signal::new(source, SignalState::On, json!({ "inputValue": false }))));
  assert!(input_truth(&Signal::new(source, SignalState::On, json!({ "inputValue": "yes" }))));
}

#[test]
fn test_with_flag_wraps_non_objects() {
  assert_eq!(
    with_flag(&json!({ "a": 1 }), HARDWARE_APPLIED_KEY, true),
    json!({ "a": 1, "hardwareApplied": true })
  );
  assert_eq!(
    with_flag(&Value::Null, HARDWARE_APPLIED_KEY, false),
    json!({ "hardwareApplied": false })
  );
  assert_eq!(
    with_flag(&json!(3), HARDWARE_APPLIED_KEY, false),
    json!({ "value": 3, "hardwareApplied": false })
  );
}

#[test]
fn test_node_owner() {
  assert_eq!(node_owner(NodeId::new(8)), "node:8");
}
