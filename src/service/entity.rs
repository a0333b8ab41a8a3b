//! Read-through / write-through service over one entity collection.
//!
//! Reads degrade silently: a failed remote fetch falls back to the last
//! cached snapshot (or an empty list) and records a single human-readable
//! error per collection. Writes are optimistic: the local cache is updated
//! whether or not the remote call succeeded, and the caller always gets a
//! valid entity back without being told whether it is remote-confirmed.
//! Every local write enqueues a coalesced background push and fires the
//! cross-context change signal.

use chrono::Utc;
use color_eyre::Result;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

use crate::cache::CacheStore;
use crate::coalescer::SyncCoalescer;
use crate::model::Entity;
use crate::remote::{ApiResponse, Gateway};
use crate::signal::ChangeSignal;

pub struct EntityService<T, C, G> {
  cache: Arc<C>,
  gateway: Arc<G>,
  coalescer: SyncCoalescer<G>,
  signal: ChangeSignal<C>,
  last_error: Arc<Mutex<Option<String>>>,
  _entity: PhantomData<fn() -> T>,
}

impl<T, C, G> Clone for EntityService<T, C, G> {
  fn clone(&self) -> Self {
    Self {
      cache: Arc::clone(&self.cache),
      gateway: Arc::clone(&self.gateway),
      coalescer: self.coalescer.clone(),
      signal: self.signal.clone(),
      last_error: Arc::clone(&self.last_error),
      _entity: PhantomData,
    }
  }
}

fn to_wire<T: Serialize>(entity: &T) -> Value {
  serde_json::to_value(entity).unwrap_or(Value::Null)
}

fn upsert<T: Entity>(list: &mut Vec<T>, entity: T) {
  match list.iter_mut().find(|e| e.id() == entity.id()) {
    Some(slot) => *slot = entity,
    None => list.push(entity),
  }
}

impl<T: Entity, C: CacheStore, G: Gateway> EntityService<T, C, G> {
  pub fn new(
    cache: Arc<C>,
    gateway: Arc<G>,
    coalescer: SyncCoalescer<G>,
    signal: ChangeSignal<C>,
  ) -> Self {
    Self {
      cache,
      gateway,
      coalescer,
      signal,
      last_error: Arc::new(Mutex::new(None)),
      _entity: PhantomData,
    }
  }

  fn base_path() -> String {
    format!("/{}", T::collection())
  }

  fn item_path(id: &str) -> String {
    format!("/{}/{}", T::collection(), id)
  }

  /// The cached snapshot, without touching the network.
  pub fn cached(&self) -> Vec<T> {
    self.cache.get(T::collection()).unwrap_or_default()
  }

  /// Fetch the whole collection.
  ///
  /// On remote success the cache entry is overwritten with the result; on
  /// any failure the most recent cached snapshot (or an empty list) is
  /// returned instead. Never fails outward.
  pub async fn get_all(&self) -> Vec<T> {
    let resp: ApiResponse<Vec<T>> = self.gateway.get(&Self::base_path()).await;
    match resp.data {
      Some(list) => {
        self.cache.set(T::collection(), &list);
        self.set_error(None);
        list
      }
      None => {
        debug!(
          collection = T::collection(),
          error = ?resp.error,
          "remote fetch failed, serving cached snapshot"
        );
        self.set_error(Some(format!("Failed to load {}", T::collection())));
        self.cached()
      }
    }
  }

  /// Fetch a single entity, falling back to the cached copy.
  pub async fn get(&self, id: &str) -> Option<T> {
    let resp: ApiResponse<T> = self.gateway.get(&Self::item_path(id)).await;
    if let Some(entity) = resp.data {
      let mut list = self.cached();
      upsert(&mut list, entity.clone());
      self.cache.set(T::collection(), &list);
      return Some(entity);
    }
    self.cached().into_iter().find(|e| e.id() == id)
  }

  /// Create an entity.
  ///
  /// Validation runs before any network call and is the only error this
  /// returns. The id and timestamps are assigned locally; if the remote
  /// accepts the record its returned copy wins, otherwise the local record
  /// is kept as-is. Either way the entity lands in the cache and a
  /// background sync is fired.
  pub async fn create(&self, mut entity: T) -> Result<T> {
    entity.validate()?;

    let now = Utc::now();
    *entity.id_mut() = Uuid::new_v4().to_string();
    entity.stamp_created(now);
    entity.stamp_updated(now);

    let resp: ApiResponse<T> = self.gateway.post(&Self::base_path(), to_wire(&entity)).await;
    let stored = match resp.data {
      Some(remote) => {
        self.set_error(None);
        remote
      }
      None => {
        debug!(
          collection = T::collection(),
          error = ?resp.error,
          "remote create failed, keeping local record"
        );
        self.set_error(Some(format!("Failed to save {}", T::collection())));
        entity
      }
    };

    let mut list = self.cached();
    upsert(&mut list, stored.clone());
    self.commit(&list);
    Ok(stored)
  }

  /// Apply a mutation to an entity.
  ///
  /// Same dual-path optimistic semantics as `create`: the remote's returned
  /// record wins when the call succeeds, the locally patched record is kept
  /// when it fails. Returns `None` only when the entity is found neither in
  /// the cache nor remotely.
  pub async fn update(&self, id: &str, apply: impl FnOnce(&mut T)) -> Option<T> {
    let current = match self.cached().into_iter().find(|e| e.id() == id) {
      Some(entity) => entity,
      None => self.get(id).await?,
    };

    let mut patched = current;
    apply(&mut patched);
    patched.stamp_updated(Utc::now());

    let resp: ApiResponse<T> = self
      .gateway
      .put(&Self::item_path(id), to_wire(&patched))
      .await;
    let stored = match resp.data {
      Some(remote) => {
        self.set_error(None);
        remote
      }
      None => {
        debug!(
          collection = T::collection(),
          id,
          error = ?resp.error,
          "remote update failed, keeping local patch"
        );
        self.set_error(Some(format!("Failed to save {}", T::collection())));
        patched
      }
    };

    let mut list = self.cached();
    upsert(&mut list, stored.clone());
    self.commit(&list);
    Some(stored)
  }

  /// Remove an entity from the collection.
  ///
  /// The cached copy goes away regardless of whether the remote delete
  /// succeeded; a remote failure is logged, not surfaced.
  pub async fn delete(&self, id: &str) {
    let resp: ApiResponse<Value> = self.gateway.delete(&Self::item_path(id)).await;
    if !resp.is_success() {
      debug!(
        collection = T::collection(),
        id,
        error = ?resp.error,
        "remote delete failed, removing locally anyway"
      );
    }

    let mut list = self.cached();
    list.retain(|e| e.id() != id);
    self.commit(&list);
  }

  /// Single coarse error message for this collection, if the last remote
  /// interaction failed.
  pub fn last_error(&self) -> Option<String> {
    match self.last_error.lock() {
      Ok(guard) => guard.clone(),
      Err(poisoned) => poisoned.into_inner().clone(),
    }
  }

  pub fn clear_error(&self) {
    self.set_error(None);
  }

  fn set_error(&self, message: Option<String>) {
    let mut guard = match self.last_error.lock() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    };
    *guard = message;
  }

  /// Persist a new snapshot locally and kick off background propagation.
  fn commit(&self, list: &[T]) {
    self.cache.set(T::collection(), list);
    self.coalescer.enqueue(T::collection(), list);
    self.signal.notify(T::collection());
  }
}
