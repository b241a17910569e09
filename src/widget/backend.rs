use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::Value;
use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;

use crate::models::chat::ChatRequest;
use crate::proxy::ChatProxy;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("chat request failed: {0}")]
    Transport(String),
    #[error("chat service answered {status}: {body}")]
    Status {
        status: u16,
        body: String,
    },
    #[error("chat response is not valid JSON: {0}")]
    Decode(String),
}

/// Where the widget sends its requests. Implementations never carry the
/// upstream credential; that stays with the proxy.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<Value, BackendError>;
}

/// Calls the chat proxy over HTTP, as the browser widget does.
pub struct ProxyBackend {
    http: HttpClient,
    url: String,
}

impl ProxyBackend {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Box::new(e) as Box<dyn StdError + Send + Sync>)?;
        Ok(Self { http, url: url.into() })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChatBackend for ProxyBackend {
    async fn complete(&self, request: &ChatRequest) -> Result<Value, BackendError> {
        let response = self.http
            .post(&self.url)
            .json(request)
            .send().await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| BackendError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))
    }
}

/// In-process binding: a host that embeds the proxy can hand it to the widget directly.
#[async_trait]
impl ChatBackend for ChatProxy {
    async fn complete(&self, request: &ChatRequest) -> Result<Value, BackendError> {
        let reply = self.forward(request.clone()).await.map_err(|e| BackendError::Status {
            status: e.status().as_u16(),
            body: e.body_json(),
        })?;
        serde_json::from_slice(&reply.body).map_err(|e| BackendError::Decode(e.to_string()))
    }
}
