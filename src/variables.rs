//! Engine-wide variable store for coordination between node handlers.
//!
//! A flat `String -> serde_json::Value` map reachable by every handler.
//! There is no ownership discipline: the last writer wins. Handlers that need
//! stronger guarantees encode them through the engine's active-connection
//! tracking instead.

use crate::sync::{read, write};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Shared variable store. Cloning yields another handle to the same map.
///
/// # Example
///
/// ```rust
/// use signalweave::variables::Variables;
///
/// let vars = Variables::new();
/// vars.set("counter", 42);
/// let value: Option<i32> = vars.get_as("counter");
/// assert_eq!(value, Some(42));
/// ```
#[derive(Clone, Debug, Default)]
pub struct Variables {
  variables: Arc<RwLock<HashMap<String, Value>>>,
}

impl Variables {
  /// Creates an empty store.
  pub fn new() -> Self {
    Self::default()
  }

  /// Sets a variable, returning the value it replaced.
  pub fn set(&self, name: &str, value: impl Into<Value>) -> Option<Value> {
    write(&self.variables).insert(name.to_string(), value.into())
  }

  /// Reads a variable.
  pub fn get(&self, name: &str) -> Option<Value> {
    read(&self.variables).get(name).cloned()
  }

  /// Reads a variable and deserializes it into `T`.
  ///
  /// Returns `None` if the variable is missing or has a different shape.
  pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
    self
      .get(name)
      .and_then(|value| serde_json::from_value(value).ok())
  }

  /// Reads a variable, or stores the factory's value if it does not exist.
  pub fn get_or_set<F>(&self, name: &str, factory: F) -> Value
  where
    F: FnOnce() -> Value,
  {
    if let Some(value) = read(&self.variables).get(name) {
      return value.clone();
    }
    write(&self.variables)
      .entry(name.to_string())
      .or_insert_with(factory)
      .clone()
  }

  /// Removes a variable; `true` if it existed.
  pub fn remove(&self, name: &str) -> bool {
    write(&self.variables).remove(name).is_some()
  }

  /// Whether a variable exists.
  pub fn contains(&self, name: &str) -> bool {
    read(&self.variables).contains_key(name)
  }

  /// Variable names, sorted.
  pub fn keys(&self) -> Vec<String> {
    let mut keys: Vec<String> = read(&self.variables).keys().cloned().collect();
    keys.sort();
    keys
  }

  /// Copy of the whole map.
  pub fn snapshot(&self) -> HashMap<String, Value> {
    read(&self.variables).clone()
  }

  /// Number of variables.
  pub fn len(&self) -> usize {
    read(&self.variables).len()
  }

  /// Whether the store is empty.
  pub fn is_empty(&self) -> bool {
    read(&self.variables).is_empty()
  }

  /// Removes every variable.
  pub fn clear(&self) {
    write(&self.variables).clear();
  }
}
