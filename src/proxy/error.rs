use reqwest::StatusCode;
use thiserror::Error;

use crate::models::error::ErrorBody;

pub const MESSAGES_REQUIRED: &str = "Messages array is required and must not be empty";
pub const INVALID_JSON: &str = "Request body must be valid JSON";
pub const INVALID_MESSAGE: &str =
    "Each message must have a role of system, user or assistant and string content";

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("upstream API key is not configured")]
    ServerConfiguration,
    #[error("upstream returned {status}: {details}")]
    Upstream {
        status: StatusCode,
        details: String,
    },
    #[error("upstream did not respond in time")]
    GatewayTimeout,
    /// The detail is for server logs only and never reaches the caller.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::ServerConfiguration => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::Upstream { status, .. } => *status,
            ProxyError::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody {
        match self {
            ProxyError::BadRequest(message) => ErrorBody::new("Bad request", message.clone()),
            ProxyError::MethodNotAllowed =>
                ErrorBody::new("Method not allowed", "Only POST requests are accepted"),
            ProxyError::ServerConfiguration =>
                ErrorBody::new("Server configuration error", "API service is not properly configured"),
            ProxyError::Upstream { status, details } =>
                ErrorBody::new(
                    "AI service error",
                    format!("Failed to call AI service: {}", status.as_u16())
                ).with_details(details.clone()),
            ProxyError::GatewayTimeout =>
                ErrorBody::new("Gateway timeout", "The AI service did not respond in time"),
            ProxyError::Internal(_) =>
                ErrorBody::new(
                    "Internal server error",
                    "An unexpected error occurred while processing your request"
                ),
        }
    }

    /// Serialized envelope, ready to be written as a response body.
    pub fn body_json(&self) -> String {
        serde_json::to_string(&self.body()).unwrap_or_else(|_| {
            r#"{"error":"Internal server error","message":"An unexpected error occurred while processing your request"}"#.to_string()
        })
    }
}
