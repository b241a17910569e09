//! The chat-proxy contract, implemented once and shared by every host.
//!
//! `ChatProxy::handle` takes an HTTP method and a raw body and either
//! relays the upstream reply or returns a [`ProxyError`] that the host
//! turns into its own response shape. Validation and configuration
//! failures are raised before any outbound call.

pub mod error;
#[cfg(test)]
pub mod test_utils;

use log::{ error, info, warn };
use reqwest::{ Method, StatusCode };
use serde_json::{ Map, Value };
use std::error::Error;
use std::sync::Arc;

use crate::config::{ Credential, ProxyConfig };
use crate::llm::chat::{ new_client, TransportError, UpstreamClient, UpstreamReply };
use crate::models::chat::{
    ChatMessage,
    ChatRequest,
    UpstreamChatRequest,
    DEFAULT_TEMPERATURE,
    DEFAULT_TOP_P,
};

pub use self::error::ProxyError;
use self::error::{ INVALID_JSON, INVALID_MESSAGE, MESSAGES_REQUIRED };

/// A successful upstream reply, relayed verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayedReply {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

pub struct ChatProxy {
    config: ProxyConfig,
    client: Arc<dyn UpstreamClient>,
}

impl ChatProxy {
    pub fn new(config: ProxyConfig, client: Arc<dyn UpstreamClient>) -> Self {
        Self { config, client }
    }

    pub fn from_config(config: ProxyConfig) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let client = new_client(&config)?;
        Ok(Self::new(config, client))
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn is_configured(&self) -> bool {
        self.config.credential.is_some()
    }

    pub async fn handle(&self, method: &Method, body: &[u8]) -> Result<RelayedReply, ProxyError> {
        if *method != Method::POST {
            warn!("Rejected {} request to chat endpoint", method);
            return Err(ProxyError::MethodNotAllowed);
        }
        let request = parse_chat_request(body)?;
        self.forward(request).await
    }

    /// Forwards an already validated request. Each call is one independent
    /// upstream generation; nothing is cached.
    pub async fn forward(&self, request: ChatRequest) -> Result<RelayedReply, ProxyError> {
        if request.messages.is_empty() {
            return Err(ProxyError::BadRequest(MESSAGES_REQUIRED.to_string()));
        }

        let credential = self.config.credential.as_ref().ok_or_else(|| {
            error!("ZHIPU_API_KEY is not configured; refusing to call the AI service");
            ProxyError::ServerConfiguration
        })?;

        info!(
            "Forwarding chat request: {} messages, temperature={}, top_p={}",
            request.messages.len(),
            request.temperature,
            request.top_p
        );
        let upstream_request = UpstreamChatRequest::from_request(&self.config.model, request);
        let reply = match self.config.request_deadline {
            Some(deadline) =>
                tokio::time
                    ::timeout(deadline, self.send_with_retry(&upstream_request, credential)).await
                    .map_err(|_| {
                        error!("Chat request exceeded its overall deadline of {:?}", deadline);
                        ProxyError::GatewayTimeout
                    })??,
            None => self.send_with_retry(&upstream_request, credential).await?,
        };

        if reply.status.is_success() {
            Ok(RelayedReply {
                status: StatusCode::OK,
                body: reply.body,
            })
        } else {
            let details = reply.body_text();
            error!("AI service error: {} {}", reply.status, details);
            Err(ProxyError::Upstream {
                status: reply.status,
                details,
            })
        }
    }

    async fn send_with_retry(
        &self,
        request: &UpstreamChatRequest,
        credential: &Credential
    ) -> Result<UpstreamReply, ProxyError> {
        let policy = &self.config.retry;
        let mut attempt = 0;
        loop {
            let reply = self.send_once(request, credential).await?;
            if attempt < policy.max_retries && policy.is_retryable(reply.status) {
                let backoff = policy.backoff_for(attempt);
                attempt += 1;
                warn!(
                    "AI service returned {}; retry {}/{} in {:?}",
                    reply.status,
                    attempt,
                    policy.max_retries,
                    backoff
                );
                tokio::time::sleep(backoff).await;
                continue;
            }
            return Ok(reply);
        }
    }

    async fn send_once(
        &self,
        request: &UpstreamChatRequest,
        credential: &Credential
    ) -> Result<UpstreamReply, ProxyError> {
        let deadline = self.config.upstream_timeout;
        match tokio::time::timeout(deadline, self.client.send(request, credential)).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(TransportError::Timeout(elapsed))) => {
                error!("AI service timed out after {:?}", elapsed);
                Err(ProxyError::GatewayTimeout)
            }
            Ok(Err(e)) => {
                error!("Chat API error: {}", e);
                Err(ProxyError::Internal(e.to_string()))
            }
            Err(_) => {
                error!("AI service did not answer within {:?}", deadline);
                Err(ProxyError::GatewayTimeout)
            }
        }
    }
}

/// Parses and validates an inbound `/api/chat` body, applying defaults for
/// `temperature` and `top_p`. Any caller-supplied `model` is ignored.
pub fn parse_chat_request(body: &[u8]) -> Result<ChatRequest, ProxyError> {
    let value: Value = serde_json
        ::from_slice(body)
        .map_err(|_| ProxyError::BadRequest(INVALID_JSON.to_string()))?;

    let object = match value.as_object() {
        Some(object) => object,
        None => return Err(ProxyError::BadRequest(MESSAGES_REQUIRED.to_string())),
    };

    let items = match object.get("messages") {
        Some(Value::Array(items)) if !items.is_empty() => items,
        _ => return Err(ProxyError::BadRequest(MESSAGES_REQUIRED.to_string())),
    };

    let messages = items
        .iter()
        .map(|item| serde_json::from_value::<ChatMessage>(item.clone()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ProxyError::BadRequest(INVALID_MESSAGE.to_string()))?;

    Ok(ChatRequest {
        messages,
        temperature: numeric_field(object, "temperature", DEFAULT_TEMPERATURE)?,
        top_p: numeric_field(object, "top_p", DEFAULT_TOP_P)?,
    })
}

fn numeric_field(object: &Map<String, Value>, key: &str, default: f64) -> Result<f64, ProxyError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(value) =>
            value.as_f64().ok_or_else(|| ProxyError::BadRequest(format!("{} must be a number", key))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::test_utils::{ capture_logs, logged, FakeUpstream };
    use crate::models::chat::Role;
    use crate::config::RetryPolicy;
    use std::time::Duration;

    const VALID_BODY: &str = r#"{"messages":[{"role":"user","content":"hi"}]}"#;

    fn proxy_with(fake: &Arc<FakeUpstream>, credential: Option<&str>) -> ChatProxy {
        let config = ProxyConfig::new(credential.map(Credential::new));
        ChatProxy::new(config, fake.clone())
    }

    #[test]
    fn parse_applies_defaults() {
        let request = parse_chat_request(VALID_BODY.as_bytes()).unwrap();
        assert_eq!(request.messages, vec![ChatMessage::user("hi")]);
        assert_eq!(request.temperature, 0.7);
        assert_eq!(request.top_p, 0.9);
    }

    #[test]
    fn parse_keeps_explicit_sampling_and_order() {
        let body = r#"{
            "messages": [
                {"role":"system","content":"rules"},
                {"role":"user","content":"q1"},
                {"role":"assistant","content":"a1"},
                {"role":"user","content":"q2"}
            ],
            "temperature": 0.2,
            "top_p": 1,
            "model": "caller-choice"
        }"#;
        let request = parse_chat_request(body.as_bytes()).unwrap();
        let roles: Vec<Role> = request.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(request.temperature, 0.2);
        assert_eq!(request.top_p, 1.0);
    }

    #[test]
    fn parse_rejects_missing_empty_or_non_array_messages() {
        for body in [r#"{}"#, r#"{"messages":[]}"#, r#"{"messages":"hi"}"#, r#"{"messages":null}"#, r#"[1]"#] {
            match parse_chat_request(body.as_bytes()) {
                Err(ProxyError::BadRequest(message)) => assert_eq!(message, MESSAGES_REQUIRED, "{}", body),
                other => panic!("expected bad request for {}, got {:?}", body, other),
            }
        }
    }

    #[test]
    fn parse_rejects_invalid_json_and_bad_fields() {
        assert!(matches!(parse_chat_request(b"not json"), Err(ProxyError::BadRequest(_))));
        assert!(matches!(parse_chat_request(b""), Err(ProxyError::BadRequest(_))));
        assert!(
            matches!(
                parse_chat_request(br#"{"messages":[{"role":"robot","content":"x"}]}"#),
                Err(ProxyError::BadRequest(_))
            )
        );
        assert!(
            matches!(
                parse_chat_request(br#"{"messages":[{"role":"user","content":"x"}],"temperature":"hot"}"#),
                Err(ProxyError::BadRequest(_))
            )
        );
    }

    #[tokio::test]
    async fn validation_failures_never_reach_upstream() {
        let fake = Arc::new(FakeUpstream::new());
        let proxy = proxy_with(&fake, Some("secret"));

        for body in [r#"{}"#, r#"{"messages":[]}"#, "garbage"] {
            let err = proxy.handle(&Method::POST, body.as_bytes()).await.unwrap_err();
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        }
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test]
    async fn non_post_methods_are_rejected() {
        let fake = Arc::new(FakeUpstream::new());
        let proxy = proxy_with(&fake, Some("secret"));

        for method in [Method::GET, Method::PUT, Method::DELETE, Method::PATCH, Method::OPTIONS] {
            let err = proxy.handle(&method, VALID_BODY.as_bytes()).await.unwrap_err();
            assert!(matches!(err, ProxyError::MethodNotAllowed));
            assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
        }
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test]
    async fn missing_credential_fails_without_upstream_call() {
        let fake = Arc::new(FakeUpstream::new());
        let proxy = proxy_with(&fake, None);

        let err = proxy.handle(&Method::POST, VALID_BODY.as_bytes()).await.unwrap_err();
        assert!(matches!(err, ProxyError::ServerConfiguration));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test]
    async fn success_body_is_relayed_unchanged() {
        let upstream_body = r#"{"choices":[{"message":{"role":"assistant","content":"hello"}}]}"#;
        let fake = Arc::new(FakeUpstream::new().reply(200, upstream_body));
        let proxy = proxy_with(&fake, Some("secret"));

        let reply = proxy.handle(&Method::POST, VALID_BODY.as_bytes()).await.unwrap();
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body, upstream_body.as_bytes());
        assert_eq!(fake.calls(), 1);
    }

    #[tokio::test]
    async fn upstream_request_uses_server_model_and_credential() {
        let fake = Arc::new(FakeUpstream::new());
        let proxy = proxy_with(&fake, Some("server-secret"));
        let body = r#"{"messages":[{"role":"user","content":"hi"}],"model":"gpt-evil","temperature":0.3}"#;

        proxy.handle(&Method::POST, body.as_bytes()).await.unwrap();

        let sent = fake.last_request().unwrap();
        assert_eq!(sent.model, "glm-4.5-air");
        assert_eq!(sent.temperature, 0.3);
        assert_eq!(sent.top_p, 0.9);
        assert_eq!(fake.last_credential().as_deref(), Some("server-secret"));
    }

    #[tokio::test]
    async fn upstream_error_keeps_status_and_details() {
        let fake = Arc::new(FakeUpstream::new().reply(429, r#"{"error":"rate_limited"}"#));
        let proxy = proxy_with(&fake, Some("secret"));

        let err = proxy.handle(&Method::POST, VALID_BODY.as_bytes()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(err.body().details.unwrap().contains("rate_limited"));
        assert_eq!(fake.calls(), 1, "retries are disabled by default");
    }

    #[tokio::test]
    async fn transport_failure_becomes_generic_internal_error() {
        capture_logs();
        let detail = "connection reset by peer (10.0.0.7:443)";
        let fake = Arc::new(FakeUpstream::new().fail(TransportError::Request(detail.into())));
        let proxy = proxy_with(&fake, Some("secret"));

        let err = proxy.handle(&Method::POST, VALID_BODY.as_bytes()).await.unwrap_err();
        assert!(matches!(err, ProxyError::Internal(_)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.body_json().contains("connection reset"));
        assert!(!err.body_json().contains("10.0.0.7"));
        assert_eq!(logged(log::Level::Error, detail).len(), 1, "transport detail is logged as an error");
    }

    #[tokio::test]
    async fn overall_deadline_bounds_retries() {
        let fake = Arc::new(
            FakeUpstream::new()
                .with_delay(Duration::from_millis(80))
                .reply(503, "busy")
                .reply(503, "busy")
                .reply(503, "busy")
        );
        let mut config = ProxyConfig::new(Some(Credential::new("secret")));
        config.upstream_timeout = Duration::from_millis(100);
        config.retry = RetryPolicy {
            max_retries: 2,
            initial_backoff: Duration::from_millis(50),
        };
        config.request_deadline = Some(Duration::from_millis(200));
        let proxy = ChatProxy::new(config, fake.clone());

        let started = std::time::Instant::now();
        let err = proxy.handle(&Method::POST, VALID_BODY.as_bytes()).await.unwrap_err();

        assert!(matches!(err, ProxyError::GatewayTimeout));
        assert!(started.elapsed() < Duration::from_millis(350), "took {:?}", started.elapsed());
        assert_eq!(fake.calls(), 2);
    }

    #[tokio::test]
    async fn slow_upstream_maps_to_gateway_timeout() {
        let fake = Arc::new(FakeUpstream::new().with_delay(Duration::from_secs(5)));
        let mut config = ProxyConfig::new(Some(Credential::new("secret")));
        config.upstream_timeout = Duration::from_millis(50);
        let proxy = ChatProxy::new(config, fake.clone());

        let err = proxy.handle(&Method::POST, VALID_BODY.as_bytes()).await.unwrap_err();
        assert!(matches!(err, ProxyError::GatewayTimeout));
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn client_timeout_maps_to_gateway_timeout() {
        let fake = Arc::new(
            FakeUpstream::new().fail(TransportError::Timeout(Duration::from_secs(30)))
        );
        let proxy = proxy_with(&fake, Some("secret"));

        let err = proxy.handle(&Method::POST, VALID_BODY.as_bytes()).await.unwrap_err();
        assert!(matches!(err, ProxyError::GatewayTimeout));
    }

    #[tokio::test]
    async fn bounded_retry_recovers_from_unavailable() {
        let fake = Arc::new(
            FakeUpstream::new()
                .reply(503, "busy")
                .reply(200, r#"{"choices":[]}"#)
        );
        let mut config = ProxyConfig::new(Some(Credential::new("secret")));
        config.retry = RetryPolicy {
            max_retries: 2,
            initial_backoff: Duration::from_millis(1),
        };
        let proxy = ChatProxy::new(config, fake.clone());

        let reply = proxy.handle(&Method::POST, VALID_BODY.as_bytes()).await.unwrap();
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(fake.calls(), 2);
    }

    #[tokio::test]
    async fn retries_stop_at_the_limit_and_skip_other_errors() {
        let fake = Arc::new(
            FakeUpstream::new()
                .reply(429, "slow down")
                .reply(429, "slow down")
                .reply(429, "still no")
        );
        let mut config = ProxyConfig::new(Some(Credential::new("secret")));
        config.retry = RetryPolicy {
            max_retries: 1,
            initial_backoff: Duration::from_millis(1),
        };
        let proxy = ChatProxy::new(config.clone(), fake.clone());

        let err = proxy.handle(&Method::POST, VALID_BODY.as_bytes()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(fake.calls(), 2);

        let fake = Arc::new(FakeUpstream::new().reply(500, "boom"));
        let proxy = ChatProxy::new(config, fake.clone());
        let err = proxy.handle(&Method::POST, VALID_BODY.as_bytes()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(fake.calls(), 1);
    }

    #[tokio::test]
    async fn identical_requests_are_forwarded_independently() {
        let fake = Arc::new(FakeUpstream::new());
        let proxy = proxy_with(&fake, Some("secret"));

        proxy.handle(&Method::POST, VALID_BODY.as_bytes()).await.unwrap();
        proxy.handle(&Method::POST, VALID_BODY.as_bytes()).await.unwrap();
        assert_eq!(fake.calls(), 2);
    }
}
