//! Cross-context change notification.
//!
//! A write in one context stores a monotonically increasing millisecond
//! timestamp under `sync-<collection>` in the shared cache store. Sibling
//! contexts poll those keys and reload the collection when the stamp moves.
//! There is no payload beyond "something changed": granularity is the whole
//! collection. A context never reacts to its own writes.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::cache::CacheStore;

/// Well-known key a collection's change stamp lives under.
pub fn signal_key(collection: &str) -> String {
  format!("sync-{}", collection)
}

pub struct ChangeSignal<C> {
  store: Arc<C>,
  poll_interval: Duration,
  /// Stamps this context wrote itself; the poller skips them
  sent: Arc<Mutex<HashMap<String, String>>>,
}

impl<C> Clone for ChangeSignal<C> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      poll_interval: self.poll_interval,
      sent: Arc::clone(&self.sent),
    }
  }
}

impl<C: CacheStore> ChangeSignal<C> {
  pub fn new(store: Arc<C>, poll_interval: Duration) -> Self {
    Self {
      store,
      poll_interval,
      sent: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  fn lock_sent(&self) -> MutexGuard<'_, HashMap<String, String>> {
    match self.sent.lock() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    }
  }

  /// Record that `collection` changed in this context.
  ///
  /// The stamp is strictly greater than the previous one even if the wall
  /// clock has not advanced, so sibling pollers always see a new value.
  pub fn notify(&self, collection: &str) {
    let key = signal_key(collection);
    let previous = self
      .store
      .get_raw(&key)
      .and_then(|raw| raw.parse::<i64>().ok())
      .unwrap_or(0);
    let stamp = Utc::now().timestamp_millis().max(previous + 1).to_string();

    self.store.set_raw(&key, &stamp);
    self.lock_sent().insert(collection.to_string(), stamp);
  }

  /// Subscribe to changes made by *other* contexts.
  ///
  /// Returns one collection name per observed change. The baseline is taken
  /// synchronously, so only changes after this call are reported. Dropping
  /// the receiver stops the polling task.
  pub fn subscribe(&self, collections: &[&str]) -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    let collections: Vec<String> = collections.iter().map(|c| c.to_string()).collect();

    let mut seen: HashMap<String, Option<String>> = collections
      .iter()
      .map(|c| (c.clone(), self.store.get_raw(&signal_key(c))))
      .collect();

    let this = self.clone();
    tokio::spawn(async move {
      let mut ticker = tokio::time::interval(this.poll_interval);
      loop {
        ticker.tick().await;
        for collection in &collections {
          let current = this.store.get_raw(&signal_key(collection));
          if current.is_none() || seen.get(collection) == Some(&current) {
            continue;
          }
          seen.insert(collection.clone(), current.clone());

          let own_write = match (&current, this.lock_sent().get(collection)) {
            (Some(stamp), Some(sent)) => stamp == sent,
            _ => false,
          };
          if own_write {
            continue;
          }
          if tx.send(collection.clone()).is_err() {
            return;
          }
        }
      }
    });

    rx
  }
}
