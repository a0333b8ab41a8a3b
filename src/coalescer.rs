//! Debounced background push of full collection snapshots.
//!
//! Every local write enqueues the whole collection under its name. A burst
//! of enqueues within the debounce window collapses into one POST of the
//! *last* snapshot to `/{collection}/sync`; earlier snapshots from the same
//! burst are discarded. The push replaces the remote's view of the
//! collection wholesale, so a push from stale local data can clobber newer
//! writes made by another client (known last-write-wins weakness, kept as
//! the observed contract). A failed push leaves the queue in place with no
//! retry; the next mutation re-arms the timer.

use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::warn;

use crate::remote::Gateway;

#[derive(Default)]
struct KeyState {
  /// Snapshots accumulated during the current burst
  queue: Vec<Value>,
  /// Bumped on every enqueue; stale timers see a newer generation and bail
  generation: u64,
  in_flight: bool,
  last_error: Option<String>,
}

pub struct SyncCoalescer<G> {
  gateway: Arc<G>,
  window: Duration,
  keys: Arc<Mutex<HashMap<String, KeyState>>>,
}

impl<G> Clone for SyncCoalescer<G> {
  fn clone(&self) -> Self {
    Self {
      gateway: Arc::clone(&self.gateway),
      window: self.window,
      keys: Arc::clone(&self.keys),
    }
  }
}

impl<G: Gateway> SyncCoalescer<G> {
  pub fn new(gateway: Arc<G>, window: Duration) -> Self {
    Self {
      gateway,
      window,
      keys: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  fn lock_keys(&self) -> MutexGuard<'_, HashMap<String, KeyState>> {
    match self.keys.lock() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    }
  }

  /// Queue a snapshot for `collection` and (re)start its debounce timer.
  ///
  /// The timer is reset, not extended: a continuous stream of edits keeps
  /// postponing the push.
  pub fn enqueue<T: Serialize>(&self, collection: &str, snapshot: &[T]) {
    let snapshot = match serde_json::to_value(snapshot) {
      Ok(value) => value,
      Err(e) => {
        warn!(collection, error = %e, "failed to serialize snapshot for sync");
        return;
      }
    };

    let generation = {
      let mut keys = self.lock_keys();
      let state = keys.entry(collection.to_string()).or_default();
      state.queue.push(snapshot);
      state.generation += 1;
      state.generation
    };

    let this = self.clone();
    let key = collection.to_string();
    tokio::spawn(async move {
      tokio::time::sleep(this.window).await;
      this.flush_if_current(&key, generation).await;
    });
  }

  /// Number of snapshots still queued for a key (non-empty after a failed push).
  pub fn pending(&self, collection: &str) -> usize {
    self
      .lock_keys()
      .get(collection)
      .map(|state| state.queue.len())
      .unwrap_or(0)
  }

  /// Error from the most recent push attempt for a key, if it failed.
  pub fn last_error(&self, collection: &str) -> Option<String> {
    self
      .lock_keys()
      .get(collection)
      .and_then(|state| state.last_error.clone())
  }

  async fn flush_if_current(&self, key: &str, generation: u64) {
    let snapshot = {
      let mut keys = self.lock_keys();
      let state = match keys.get_mut(key) {
        Some(state) => state,
        None => return,
      };
      // A newer enqueue superseded this timer, or a push is already out
      if state.generation != generation || state.in_flight {
        return;
      }
      let snapshot = match state.queue.last() {
        Some(snapshot) => snapshot.clone(),
        None => return,
      };
      state.in_flight = true;
      snapshot
    };

    let resp: crate::remote::ApiResponse<Value> = self
      .gateway
      .post(&format!("/{}/sync", key), json!({ "data": snapshot }))
      .await;

    let mut keys = self.lock_keys();
    if let Some(state) = keys.get_mut(key) {
      state.in_flight = false;
      if resp.is_success() {
        state.queue.clear();
        state.last_error = None;
      } else {
        let message = resp.error.unwrap_or_else(|| "sync failed".to_string());
        warn!(collection = key, error = %message, "background sync push failed");
        state.last_error = Some(message);
      }
    }
  }
}
