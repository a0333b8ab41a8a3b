//! In-memory test doubles shared by the unit tests.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::cache::SqliteCache;
use crate::coalescer::SyncCoalescer;
use crate::model::Entity;
use crate::remote::{ApiResponse, Gateway};
use crate::service::EntityService;
use crate::signal::ChangeSignal;

/// Programmable in-memory remote.
///
/// Canned replies are keyed by "METHOD path". Without a canned reply,
/// POST/PUT echo the request body back (the common success shape for
/// create/update), DELETE succeeds with an empty body, and GET misses with
/// a 404. Offline mode fails every call the way a dead network does.
pub struct MockGateway {
  online: AtomicBool,
  replies: Mutex<HashMap<String, Value>>,
  calls: Mutex<Vec<(String, String, Value)>>,
}

impl MockGateway {
  pub fn online() -> Self {
    Self {
      online: AtomicBool::new(true),
      replies: Mutex::new(HashMap::new()),
      calls: Mutex::new(Vec::new()),
    }
  }

  pub fn offline() -> Self {
    let gateway = Self::online();
    gateway.set_online(false);
    gateway
  }

  pub fn set_online(&self, online: bool) {
    self.online.store(online, Ordering::SeqCst);
  }

  pub fn set_reply(&self, method: &str, path: &str, data: Value) {
    self
      .replies
      .lock()
      .unwrap()
      .insert(format!("{} {}", method, path), data);
  }

  /// Request bodies recorded for a method/path pair (Null for bodyless calls).
  pub fn calls_to(&self, method: &str, path: &str) -> Vec<Value> {
    self
      .calls
      .lock()
      .unwrap()
      .iter()
      .filter(|(m, p, _)| m == method && p == path)
      .map(|(_, _, body)| body.clone())
      .collect()
  }

  fn respond<T: DeserializeOwned>(
    &self,
    method: &str,
    path: &str,
    body: Option<Value>,
  ) -> ApiResponse<T> {
    self.calls.lock().unwrap().push((
      method.to_string(),
      path.to_string(),
      body.clone().unwrap_or(Value::Null),
    ));

    if !self.online.load(Ordering::SeqCst) {
      return ApiResponse::failure("connection refused", 500);
    }

    let canned = self
      .replies
      .lock()
      .unwrap()
      .get(&format!("{} {}", method, path))
      .cloned();
    if let Some(data) = canned {
      return ApiResponse {
        data: serde_json::from_value(data).ok(),
        error: None,
        status: 200,
      };
    }

    match method {
      "POST" | "PUT" => ApiResponse {
        data: body.and_then(|b| serde_json::from_value(b).ok()),
        error: None,
        status: 200,
      },
      "DELETE" => ApiResponse {
        data: None,
        error: None,
        status: 200,
      },
      _ => ApiResponse::failure("not found", 404),
    }
  }
}

impl Gateway for MockGateway {
  async fn get<T: DeserializeOwned + Send>(&self, path: &str) -> ApiResponse<T> {
    self.respond("GET", path, None)
  }

  async fn post<T: DeserializeOwned + Send>(&self, path: &str, body: Value) -> ApiResponse<T> {
    self.respond("POST", path, Some(body))
  }

  async fn put<T: DeserializeOwned + Send>(&self, path: &str, body: Value) -> ApiResponse<T> {
    self.respond("PUT", path, Some(body))
  }

  async fn delete<T: DeserializeOwned + Send>(&self, path: &str) -> ApiResponse<T> {
    self.respond("DELETE", path, None)
  }
}

/// An entity service wired to the given cache and gateway with test-friendly
/// defaults (1 s debounce window, 250 ms signal poll).
pub fn service<T: Entity>(
  cache: &Arc<SqliteCache>,
  gateway: &Arc<MockGateway>,
) -> EntityService<T, SqliteCache, MockGateway> {
  let coalescer = SyncCoalescer::new(Arc::clone(gateway), Duration::from_millis(1000));
  let signal = ChangeSignal::new(Arc::clone(cache), Duration::from_millis(250));
  EntityService::new(Arc::clone(cache), Arc::clone(gateway), coalescer, signal)
}
