//! Remote API client
//!
//! The reconciliation engine and the two-phase mutation path talk to the
//! server through [`RemoteApi`]. [`HttpRemote`] is the real implementation;
//! tests substitute scripted fakes.

use crate::client::config::Config;
use crate::client::offline::queue::{HttpMethod, SyncQueueItem};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failures that never produced an HTTP status
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RemoteError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// A mutation to send
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequest {
    pub method: HttpMethod,
    /// Path relative to the server root
    pub path: String,
    pub body: Option<Value>,
}

impl RemoteRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.into(),
            body,
        }
    }

    /// The request a queue item replays
    pub fn from_item(item: &SyncQueueItem) -> Self {
        let body = match (&item.method, &item.payload) {
            (HttpMethod::Delete, _) | (_, Value::Null) => None,
            (_, payload) => Some(payload.clone()),
        };
        Self::new(item.method, item.endpoint.clone(), body)
    }
}

/// Status and decoded JSON body of a response
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResponse {
    pub status: u16,
    /// `None` for empty or non-JSON bodies
    pub body: Option<Value>,
}

impl RemoteResponse {
    pub fn new(status: u16, body: Option<Value>) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Record id in the response body, either top-level or under `data`
    pub fn record_id(&self) -> Option<String> {
        let body = self.body.as_ref()?;
        let id = body
            .get("id")
            .or_else(|| body.get("data").and_then(|data| data.get("id")))?;
        match id {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Transport to the remote API
#[async_trait]
pub trait RemoteApi: Send + Sync + fmt::Debug {
    async fn send(&self, request: &RemoteRequest) -> Result<RemoteResponse, RemoteError>;
}

/// reqwest-backed remote API client
#[derive(Debug, Clone)]
pub struct HttpRemote {
    config: Config,
    client: Client,
    timeout: Duration,
}

impl HttpRemote {
    pub fn new(config: Config) -> Result<Self, RemoteError> {
        let timeout = config.app().request_timeout;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            client,
            timeout,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn send(&self, request: &RemoteRequest) -> Result<RemoteResponse, RemoteError> {
        let url = self.config.api_url(&request.path);

        let mut builder = match request.method {
            HttpMethod::Post => self.client.post(&url),
            HttpMethod::Patch => self.client.patch(&url),
            HttpMethod::Delete => self.client.delete(&url),
        };
        if let Some(token) = self.config.get_token() {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                RemoteError::Timeout(self.timeout)
            } else {
                RemoteError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;
        let body = if text.trim().is_empty() {
            None
        } else {
            serde_json::from_str(&text).ok()
        };

        tracing::debug!("{} {} -> {}", request.method, request.path, status);
        Ok(RemoteResponse { status, body })
    }
}
