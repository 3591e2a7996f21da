//! HTTP client abstraction for talking to the content API and the site backend.
//!
//! This module defines the `HttpClient` trait to abstract HTTP request execution,
//! enabling testability with mock implementations.

use crate::error::{KaizenError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// An outgoing HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// HTTP method (e.g., "POST", "GET")
    pub method: String,
    /// The base URL (e.g., <https://site2025.agenciakaizen.com.br/api/v1>)
    pub endpoint: String,
    /// Path plus query string (e.g., "/articles?page=2&limit=12")
    pub path: String,
    /// JSON body, if any
    pub body: Option<String>,
    /// Extra headers
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn get(endpoint: &str, path: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            endpoint: endpoint.to_string(),
            path: path.into(),
            body: None,
            headers: Vec::new(),
        }
    }

    /// Build a POST request with `body` serialized as JSON.
    pub fn post_json<B: Serialize + ?Sized>(
        endpoint: &str,
        path: impl Into<String>,
        body: &B,
    ) -> Result<Self> {
        Ok(Self {
            method: "POST".to_string(),
            endpoint: endpoint.to_string(),
            path: path.into(),
            body: Some(serde_json::to_string(body)?),
            headers: Vec::new(),
        })
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn url(&self) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), self.path)
    }
}

/// Response from an HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as a string
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for executing HTTP requests.
///
/// This abstraction allows for different implementations (production vs. testing)
/// and keeps the loader and wizard logic testable without making real HTTP calls.
///
/// # Example
/// ```ignore
/// let client = ReqwestHttpClient::new();
/// let response = client.execute(&HttpRequest::get(base, "/articles"), Some(5000)).await?;
/// println!("Status: {}, Body: {}", response.status, response.body);
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync + Clone {
    /// Execute an HTTP request.
    ///
    /// A non-2xx status is *not* an error at this level; callers decide what a
    /// status means for them.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The request fails due to network issues
    /// - The request times out (`KaizenError::Timeout`)
    /// - The method or URL is invalid
    async fn execute(&self, request: &HttpRequest, timeout_ms: Option<u64>)
    -> Result<HttpResponse>;
}

// ============================================================================
// Production Implementation using reqwest
// ============================================================================

/// Production HTTP client using reqwest.
#[derive(Clone, Default)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an already configured reqwest client (proxies, custom TLS roots).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    #[tracing::instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    async fn execute(
        &self,
        request: &HttpRequest,
        timeout_ms: Option<u64>,
    ) -> Result<HttpResponse> {
        let url = request.url();

        tracing::debug!(url = %url, timeout_ms = ?timeout_ms, "Executing HTTP request");

        let method = reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|e| {
            tracing::error!(method = %request.method, error = %e, "Invalid HTTP method");
            anyhow::anyhow!("Invalid HTTP method '{}': {}", request.method, e)
        })?;

        let mut req = self
            .client
            .request(method, &url)
            .header("Accept", "application/json");

        if let Some(timeout_ms) = timeout_ms {
            req = req.timeout(Duration::from_millis(timeout_ms));
        }

        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }

        if let Some(body) = &request.body {
            req = req
                .header("Content-Type", "application/json")
                .body(body.clone());
            tracing::trace!(body_len = body.len(), "Added request body");
        }

        let response = req.send().await.map_err(|e| {
            tracing::warn!(url = %url, error = %e, "HTTP request failed");
            match timeout_ms {
                Some(ms) if e.is_timeout() => KaizenError::Timeout(ms),
                _ => KaizenError::HttpClient(e),
            }
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| match timeout_ms {
            Some(ms) if e.is_timeout() => KaizenError::Timeout(ms),
            _ => KaizenError::HttpClient(e),
        })?;

        tracing::debug!(
            status = status,
            response_len = body.len(),
            "HTTP request completed"
        );

        Ok(HttpResponse { status, body })
    }
}

// ============================================================================
// Test/Mock Implementation
// ============================================================================

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::oneshot;

/// Mock HTTP client for testing.
///
/// Allows configuring predetermined responses for specific requests without
/// making actual HTTP calls.
///
/// # Example
/// ```ignore
/// let mock = MockHttpClient::new();
/// mock.add_response(
///     "POST /franchise/api/step1/",
///     Ok(HttpResponse::new(200, r#"{"success": true, "application_id": "abc123"}"#)),
/// );
/// ```
#[derive(Clone, Default)]
pub struct MockHttpClient {
    responses: Arc<Mutex<HashMap<String, Vec<MockResponse>>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    in_flight: Arc<AtomicUsize>,
}

/// A mock response that can optionally wait for a trigger before completing.
enum MockResponse {
    Immediate(Result<HttpResponse>),
    /// Waits for the paired sender to fire (or be dropped) before completing
    Triggered {
        response: Result<HttpResponse>,
        trigger: oneshot::Receiver<()>,
    },
}

/// Record of a call made to the mock HTTP client.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub method: String,
    pub endpoint: String,
    pub path: String,
    pub body: Option<String>,
    pub headers: Vec<(String, String)>,
    pub timeout_ms: Option<u64>,
}

impl MockCall {
    /// Parse the recorded body as JSON. Panics if there is no body.
    pub fn json_body(&self) -> serde_json::Value {
        let body = self.body.as_deref().expect("mock call has no body");
        serde_json::from_str(body).expect("mock call body is not JSON")
    }
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predetermined response for a specific method and path.
    ///
    /// The key is formatted as "{method} {path}" where the path includes the
    /// query string. Multiple responses for the same key are returned in FIFO order.
    pub fn add_response(&self, key: &str, response: Result<HttpResponse>) {
        self.responses
            .lock()
            .entry(key.to_string())
            .or_default()
            .push(MockResponse::Immediate(response));
    }

    /// Convenience wrapper around [`add_response`](Self::add_response) for JSON bodies.
    pub fn add_json(&self, key: &str, status: u16, body: serde_json::Value) {
        self.add_response(key, Ok(HttpResponse::new(status, body.to_string())));
    }

    /// Add a response that will wait for a manual trigger before completing.
    ///
    /// Returns a sender that when triggered (by sending `()` or dropping) will
    /// cause the HTTP request to complete with the given response.
    pub fn add_response_with_trigger(
        &self,
        key: &str,
        response: Result<HttpResponse>,
    ) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.responses
            .lock()
            .entry(key.to_string())
            .or_default()
            .push(MockResponse::Triggered {
                response,
                trigger: rx,
            });
        tx
    }

    /// Get all calls that have been made to this mock client.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Calls whose method and path match `key`.
    pub fn calls_for(&self, key: &str) -> Vec<MockCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| format!("{} {}", c.method, c.path) == key)
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Number of requests currently waiting on a response.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn execute(
        &self,
        request: &HttpRequest,
        timeout_ms: Option<u64>,
    ) -> Result<HttpResponse> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);

        // Decrement even if the caller drops this future mid-flight
        let _guard = InFlightGuard {
            in_flight: self.in_flight.clone(),
        };

        self.calls.lock().push(MockCall {
            method: request.method.clone(),
            endpoint: request.endpoint.clone(),
            path: request.path.clone(),
            body: request.body.clone(),
            headers: request.headers.clone(),
            timeout_ms,
        });

        let key = format!("{} {}", request.method, request.path);
        let mock_response = {
            let mut responses = self.responses.lock();
            match responses.get_mut(&key) {
                Some(queue) if !queue.is_empty() => Some(queue.remove(0)),
                _ => None,
            }
        };

        match mock_response {
            Some(MockResponse::Immediate(response)) => response,
            Some(MockResponse::Triggered { response, trigger }) => {
                // Proceed whether the sender fired or was dropped
                let _ = trigger.await;
                response
            }
            None => Err(KaizenError::Other(anyhow::anyhow!(
                "No mock response configured for {}",
                key
            ))),
        }
    }
}

/// Guard that decrements the in-flight counter when dropped.
struct InFlightGuard {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
