//! # Event Bus
//!
//! Fire-and-forget publish/subscribe for side-channel notifications such as
//! visualization bridges, debug tools, and hardware change broadcasts.
//!
//! Emitting never fails and never blocks on subscribers:
//!
//! - synchronous listeners run inline, their errors are logged and dropped;
//! - asynchronous listeners are spawned on the tokio runtime and resolve on
//!   their own.
//!
//! Delivery order between subscribers, and relative to engine state, is not
//! guaranteed. The bus also remembers the last emitted event name for
//! diagnostic polling.
//!
//! ## Reserved names
//!
//! The engine emits [`STATE_ON`], [`STATE_OFF`], [`PROPAGATED`] and
//! [`BLOCKED`]. A `signal.propagated` event fires whenever a handler
//! processes a signal, whether or not the neighbor's state flips.

use crate::sync::{lock, read, write};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use tracing::{trace, warn};

/// A node was set ON.
pub const STATE_ON: &str = "signal.state.on";
/// A node was set OFF.
pub const STATE_OFF: &str = "signal.state.off";
/// A handler processed a signal from one node to another.
pub const PROPAGATED: &str = "signal.propagated";
/// A wave stopped at a node (handler decision or handler error).
pub const BLOCKED: &str = "signal.blocked";

/// Error type listeners may return.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

type SyncListener = Arc<dyn Fn(&BusEvent) -> Result<(), ListenerError> + Send + Sync>;
type AsyncListener =
  Arc<dyn Fn(BusEvent) -> BoxFuture<'static, Result<(), ListenerError>> + Send + Sync>;

/// One emitted event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusEvent {
  /// Event name.
  pub name: String,
  /// Free-form payload.
  pub data: Value,
  /// Emission time.
  pub timestamp: DateTime<Utc>,
}

#[derive(Clone)]
enum Listener {
  Sync(SyncListener),
  Async(AsyncListener),
}

#[derive(Clone)]
struct Subscriber {
  id: u64,
  owner: String,
  listener: Listener,
}

#[derive(Default)]
struct BusInner {
  subscribers: RwLock<HashMap<String, Vec<Subscriber>>>,
  next_id: AtomicU64,
  last_event: Mutex<Option<String>>,
  emitted: AtomicU64,
}

impl BusInner {
  fn remove(&self, name: &str, id: u64) -> bool {
    let mut subscribers = write(&self.subscribers);
    let Some(list) = subscribers.get_mut(name) else {
      return false;
    };
    let before = list.len();
    list.retain(|subscriber| subscriber.id != id);
    let removed = list.len() != before;
    if list.is_empty() {
      subscribers.remove(name);
    }
    removed
  }
}

/// Handle returned by a subscription; call [`Subscription::unsubscribe`] to
/// stop receiving events. Dropping the handle keeps the subscription alive.
#[derive(Debug, Clone)]
pub struct Subscription {
  bus: Weak<BusInner>,
  name: String,
  id: u64,
}

impl std::fmt::Debug for BusInner {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("BusInner")
      .field("emitted", &self.emitted.load(Ordering::Relaxed))
      .finish_non_exhaustive()
  }
}

impl Subscription {
  /// Event name this subscription listens to.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Removes the subscription. Returns `false` if it was already gone.
  pub fn unsubscribe(&self) -> bool {
    match self.bus.upgrade() {
      Some(bus) => bus.remove(&self.name, self.id),
      None => false,
    }
  }
}

/// N:M event bus. Cloning yields another handle to the same bus.
#[derive(Clone, Default)]
pub struct EventBus {
  inner: Arc<BusInner>,
}

impl EventBus {
  /// Creates an empty bus.
  pub fn new() -> Self {
    Self::default()
  }

  /// Emits `name` with `data` to every current subscriber.
  pub fn emit_event(&self, name: &str, data: Value) {
    *lock(&self.inner.last_event) = Some(name.to_string());
    self.inner.emitted.fetch_add(1, Ordering::Relaxed);

    let subscribers: Vec<Subscriber> = read(&self.inner.subscribers)
      .get(name)
      .cloned()
      .unwrap_or_default();
    if subscribers.is_empty() {
      trace!(event = name, "no subscribers");
      return;
    }

    let event = BusEvent {
      name: name.to_string(),
      data,
      timestamp: Utc::now(),
    };
    for subscriber in subscribers {
      match subscriber.listener {
        Listener::Sync(listener) => {
          if let Err(err) = listener(&event) {
            warn!(event = name, owner = %subscriber.owner, error = %err, "event listener failed");
          }
        }
        Listener::Async(listener) => {
          let future = listener(event.clone());
          let owner = subscriber.owner;
          let name = event.name.clone();
          match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
              runtime.spawn(async move {
                if let Err(err) = future.await {
                  warn!(event = %name, owner = %owner, error = %err, "async event listener failed");
                }
              });
            }
            Err(_) => {
              warn!(event = %name, owner = %owner, "no tokio runtime; async listener skipped");
            }
          }
        }
      }
    }
  }

  /// Subscribes a synchronous listener to `name` on behalf of `owner`.
  pub fn subscribe_to_event<F>(&self, name: &str, owner: impl Into<String>, listener: F) -> Subscription
  where
    F: Fn(&BusEvent) -> Result<(), ListenerError> + Send + Sync + 'static,
  {
    self.add(name, owner.into(), Listener::Sync(Arc::new(listener)))
  }

  /// Subscribes an asynchronous listener; each delivery is spawned.
  pub fn subscribe_to_event_async<F>(
    &self,
    name: &str,
    owner: impl Into<String>,
    listener: F,
  ) -> Subscription
  where
    F: Fn(BusEvent) -> BoxFuture<'static, Result<(), ListenerError>> + Send + Sync + 'static,
  {
    self.add(name, owner.into(), Listener::Async(Arc::new(listener)))
  }

  fn add(&self, name: &str, owner: String, listener: Listener) -> Subscription {
    let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
    write(&self.inner.subscribers)
      .entry(name.to_string())
      .or_default()
      .push(Subscriber {
        id,
        owner,
        listener,
      });
    Subscription {
      bus: Arc::downgrade(&self.inner),
      name: name.to_string(),
      id,
    }
  }

  /// Removes every subscription held by `owner`, returning how many.
  pub fn unsubscribe_owner(&self, owner: &str) -> usize {
    let mut subscribers = write(&self.inner.subscribers);
    let mut removed = 0;
    for list in subscribers.values_mut() {
      let before = list.len();
      list.retain(|subscriber| subscriber.owner != owner);
      removed += before - list.len();
    }
    subscribers.retain(|_, list| !list.is_empty());
    removed
  }

  /// Number of subscribers for `name`.
  pub fn subscriber_count(&self, name: &str) -> usize {
    read(&self.inner.subscribers)
      .get(name)
      .map(Vec::len)
      .unwrap_or(0)
  }

  /// Name of the most recently emitted event.
  pub fn last_event(&self) -> Option<String> {
    lock(&self.inner.last_event).clone()
  }

  /// Total number of emitted events.
  pub fn emitted_count(&self) -> u64 {
    self.inner.emitted.load(Ordering::Relaxed)
  }

  /// Drops every subscription and the diagnostic state.
  pub fn clear(&self) {
    write(&self.inner.subscribers).clear();
    *lock(&self.inner.last_event) = None;
    self.inner.emitted.store(0, Ordering::Relaxed);
  }
}
