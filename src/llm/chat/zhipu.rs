use async_trait::async_trait;
use log::{ debug, info };
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE } };
use std::error::Error as StdError;
use std::time::Duration;

use super::{ TransportError, UpstreamClient, UpstreamReply };
use crate::config::{ Credential, ProxyConfig };
use crate::models::chat::UpstreamChatRequest;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for Zhipu's OpenAI-compatible chat-completions endpoint.
pub struct ZhipuChatClient {
    http: HttpClient,
    url: String,
    timeout: Duration,
}

impl ZhipuChatClient {
    pub fn new(url: String, timeout: Duration) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = HttpClient::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .build()
            .map_err(|e| Box::new(e) as Box<dyn StdError + Send + Sync>)?;

        Ok(Self { http, url, timeout })
    }

    pub fn from_config(config: &ProxyConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        Self::new(config.upstream_url.clone(), config.upstream_timeout)
    }

    fn classify(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

#[async_trait]
impl UpstreamClient for ZhipuChatClient {
    async fn send(
        &self,
        request: &UpstreamChatRequest,
        credential: &Credential
    ) -> Result<UpstreamReply, TransportError> {
        debug!(
            "Sending {} messages to {} (model={}, temperature={}, top_p={})",
            request.messages.len(),
            self.url,
            request.model,
            request.temperature,
            request.top_p
        );

        let response = self.http
            .post(&self.url)
            .bearer_auth(credential.expose())
            .json(request)
            .send().await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        info!("Upstream AI service responded with status {}", status);

        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        Ok(UpstreamReply::new(status, body.to_vec()))
    }
}
