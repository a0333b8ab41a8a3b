//! HTTP gateway to the remote store.
//!
//! Every call resolves to an [`ApiResponse`]; nothing in here returns `Err`
//! to the caller. Timeouts map to status 408, transport failures to 500,
//! and non-2xx responses carry the server's error message when the body
//! parses as the standard `{data, error}` envelope. No automatic retries.

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::debug;

use crate::config::RemoteConfig;
use color_eyre::{eyre::eyre, Result};

/// Bearer credential shared with the ambient session collaborator.
pub type SessionToken = Arc<RwLock<Option<String>>>;

/// Normalized outcome of a remote call.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
  pub data: Option<T>,
  pub error: Option<String>,
  /// HTTP-style status code (408 for timeout, 500 for transport errors)
  pub status: u16,
}

impl<T> ApiResponse<T> {
  pub fn failure(error: impl Into<String>, status: u16) -> Self {
    Self {
      data: None,
      error: Some(error.into()),
      status,
    }
  }

  /// 2xx with no error reported by the server.
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status) && self.error.is_none()
  }
}

/// Response body shape used by every remote endpoint.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
  data: Option<T>,
  error: Option<String>,
}

/// Narrow request interface the services consume.
///
/// Kept as a trait so tests can substitute an in-memory remote.
pub trait Gateway: Send + Sync + 'static {
  fn get<T: DeserializeOwned + Send>(
    &self,
    path: &str,
  ) -> impl Future<Output = ApiResponse<T>> + Send;

  fn post<T: DeserializeOwned + Send>(
    &self,
    path: &str,
    body: Value,
  ) -> impl Future<Output = ApiResponse<T>> + Send;

  fn put<T: DeserializeOwned + Send>(
    &self,
    path: &str,
    body: Value,
  ) -> impl Future<Output = ApiResponse<T>> + Send;

  fn delete<T: DeserializeOwned + Send>(
    &self,
    path: &str,
  ) -> impl Future<Output = ApiResponse<T>> + Send;
}

/// reqwest-backed gateway with a fixed per-request timeout.
#[derive(Clone)]
pub struct HttpGateway {
  client: reqwest::Client,
  base_url: String,
  token: SessionToken,
}

impl HttpGateway {
  pub fn new(config: &RemoteConfig, token: SessionToken) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to build HTTP client: {}", e))?;

    Ok(Self {
      client,
      base_url: config.base_url.trim_end_matches('/').to_string(),
      token,
    })
  }

  /// Handle to the shared session credential.
  pub fn session(&self) -> SessionToken {
    Arc::clone(&self.token)
  }

  async fn request<T: DeserializeOwned>(
    &self,
    method: Method,
    path: &str,
    body: Option<Value>,
  ) -> ApiResponse<T> {
    let url = format!("{}{}", self.base_url, path);
    let mut req = self.client.request(method, &url);

    let token = self
      .token
      .read()
      .ok()
      .and_then(|guard| guard.clone());
    if let Some(token) = token {
      req = req.bearer_auth(token);
    }
    if let Some(body) = body {
      req = req.json(&body);
    }

    match req.send().await {
      Ok(resp) => {
        let status = resp.status().as_u16();
        let bytes = resp.bytes().await.unwrap_or_default();
        decode_envelope(status, &bytes)
      }
      Err(e) if e.is_timeout() => ApiResponse::failure("Request timeout", 408),
      Err(e) => {
        debug!(path, error = %e, "request failed");
        let status = e.status().map(|s| s.as_u16()).unwrap_or(500);
        ApiResponse::failure(e.to_string(), status)
      }
    }
  }
}

/// Decode a `{data, error}` envelope, folding the HTTP status in.
fn decode_envelope<T: DeserializeOwned>(status: u16, bytes: &[u8]) -> ApiResponse<T> {
  // Some endpoints (delete) respond with an empty body on success
  if bytes.is_empty() {
    if (200..300).contains(&status) {
      return ApiResponse {
        data: None,
        error: None,
        status,
      };
    }
    return ApiResponse::failure(format!("HTTP {}", status), status);
  }

  let envelope: Envelope<T> = match serde_json::from_slice(bytes) {
    Ok(envelope) => envelope,
    Err(e) => {
      if (200..300).contains(&status) {
        return ApiResponse::failure(format!("Invalid response body: {}", e), 500);
      }
      // Non-JSON error page; keep the status, synthesize a message
      return ApiResponse::failure(format!("HTTP {}", status), status);
    }
  };

  if !(200..300).contains(&status) {
    let message = envelope.error.unwrap_or_else(|| format!("HTTP {}", status));
    return ApiResponse::failure(message, status);
  }

  ApiResponse {
    data: envelope.data,
    error: envelope.error,
    status,
  }
}

impl Gateway for HttpGateway {
  async fn get<T: DeserializeOwned + Send>(&self, path: &str) -> ApiResponse<T> {
    self.request(Method::GET, path, None).await
  }

  async fn post<T: DeserializeOwned + Send>(&self, path: &str, body: Value) -> ApiResponse<T> {
    self.request(Method::POST, path, Some(body)).await
  }

  async fn put<T: DeserializeOwned + Send>(&self, path: &str, body: Value) -> ApiResponse<T> {
    self.request(Method::PUT, path, Some(body)).await
  }

  async fn delete<T: DeserializeOwned + Send>(&self, path: &str) -> ApiResponse<T> {
    self.request(Method::DELETE, path, None).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::Task;

  #[test]
  fn test_decode_success_envelope() {
    let task = serde_json::to_string(&serde_json::json!({
      "data": [],
      "error": null
    }))
    .unwrap();

    let resp: ApiResponse<Vec<Task>> = decode_envelope(200, task.as_bytes());
    assert!(resp.is_success());
    assert_eq!(resp.data.unwrap().len(), 0);
  }

  #[test]
  fn test_decode_server_error_message() {
    let body = br#"{"data": null, "error": "task not found"}"#;
    let resp: ApiResponse<Task> = decode_envelope(404, body);
    assert!(!resp.is_success());
    assert_eq!(resp.status, 404);
    assert_eq!(resp.error.as_deref(), Some("task not found"));
  }

  #[test]
  fn test_decode_non_json_error_body() {
    let resp: ApiResponse<Task> = decode_envelope(502, b"<html>Bad Gateway</html>");
    assert_eq!(resp.status, 502);
    assert_eq!(resp.error.as_deref(), Some("HTTP 502"));
  }

  #[test]
  fn test_decode_empty_body_on_success() {
    let resp: ApiResponse<serde_json::Value> = decode_envelope(204, b"");
    assert!(resp.is_success());
    assert!(resp.data.is_none());
  }
}
