pub mod zhipu;

use async_trait::async_trait;
use reqwest::StatusCode;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{ Credential, ProxyConfig };
use crate::models::chat::UpstreamChatRequest;
use self::zhipu::ZhipuChatClient;

/// Raw reply from the upstream API. The body is kept as bytes so it can be
/// relayed without re-encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl UpstreamReply {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self { status, body: body.into() }
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("upstream request timed out after {0:?}")]
    Timeout(Duration),
    #[error("upstream request failed: {0}")]
    Request(String),
}

/// One outbound chat-completions call. Non-2xx statuses are returned as
/// replies, not errors; only transport failures are errors.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn send(
        &self,
        request: &UpstreamChatRequest,
        credential: &Credential
    ) -> Result<UpstreamReply, TransportError>;
}

pub fn new_client(
    config: &ProxyConfig
) -> Result<Arc<dyn UpstreamClient>, Box<dyn StdError + Send + Sync>> {
    let client = ZhipuChatClient::from_config(config)?;
    Ok(Arc::new(client))
}
