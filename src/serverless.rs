//! Serverless host for the chat proxy.
//!
//! A platform hands over one HTTP event and expects one response object.
//! This module maps that shape onto `ChatProxy::handle` and back.

use base64::{ engine::general_purpose::STANDARD as BASE64, Engine };
use log::{ info, warn };
use reqwest::Method;
use serde::{ Deserialize, Serialize };
use std::collections::{ BTreeMap, HashMap };

use crate::proxy::{ ChatProxy, ProxyError };
use crate::proxy::error::INVALID_JSON;

/// Platform limit for one invocation; the function binary caps the proxy's
/// overall request deadline at this value.
pub const MAX_DURATION_SECS: u64 = 30;

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct FunctionEvent {
    pub http_method: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: Option<bool>,
}

impl FunctionEvent {
    /// Header lookup, case-insensitive. Platforms may send `headers: null`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .as_ref()?
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl FunctionResponse {
    pub fn json(status_code: u16, body: String) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        Self { status_code, headers, body }
    }

    pub fn from_error(err: &ProxyError) -> Self {
        let mut response = Self::json(err.status().as_u16(), err.body_json());
        if let ProxyError::MethodNotAllowed = err {
            response.headers.insert("allow".to_string(), "POST".to_string());
        }
        response
    }
}

pub async fn handle_event(proxy: &ChatProxy, event: FunctionEvent) -> FunctionResponse {
    info!(
        "{} {} (serverless, content-type={})",
        event.http_method,
        event.path.as_deref().unwrap_or("/api/chat"),
        event.header("content-type").unwrap_or("-")
    );

    let method = match Method::from_bytes(event.http_method.trim().to_uppercase().as_bytes()) {
        Ok(method) => method,
        Err(_) => {
            warn!("Unparseable HTTP method '{}'", event.http_method);
            return FunctionResponse::from_error(&ProxyError::MethodNotAllowed);
        }
    };

    let body = match decode_body(&event) {
        Ok(body) => body,
        Err(e) => return FunctionResponse::from_error(&e),
    };

    match proxy.handle(&method, &body).await {
        Ok(reply) =>
            FunctionResponse::json(reply.status.as_u16(), String::from_utf8_lossy(&reply.body).into_owned()),
        Err(e) => FunctionResponse::from_error(&e),
    }
}

/// Parses a raw event document, answering malformed events with a 400 response.
pub async fn handle_raw_event(proxy: &ChatProxy, raw: &str) -> FunctionResponse {
    match serde_json::from_str::<FunctionEvent>(raw) {
        Ok(event) => handle_event(proxy, event).await,
        Err(e) => {
            warn!("Malformed function event: {}", e);
            FunctionResponse::from_error(&ProxyError::BadRequest(INVALID_JSON.to_string()))
        }
    }
}

fn decode_body(event: &FunctionEvent) -> Result<Vec<u8>, ProxyError> {
    let raw = event.body.as_deref().unwrap_or("");
    if event.is_base64_encoded.unwrap_or(false) {
        BASE64.decode(raw).map_err(|_| ProxyError::BadRequest(INVALID_JSON.to_string()))
    } else {
        Ok(raw.as_bytes().to_vec())
    }
}
