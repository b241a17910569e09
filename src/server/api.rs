use crate::proxy::{ ChatProxy, ProxyError, RelayedReply };
use std::sync::Arc;
use axum::{
    body::Bytes,
    routing::{ any, get },
    Router,
    Json,
    extract::State,
    response::{ IntoResponse, Response },
    http::{ header::{ ALLOW, CONTENT_TYPE }, HeaderValue, Method, Uri },
};
use serde::{ Deserialize, Serialize };
use tower_http::cors::{ Any, CorsLayer };
use tower_http::limit::RequestBodyLimitLayer;
use log::info;

pub const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

#[derive(Clone)]
struct AppState {
    proxy: Arc<ChatProxy>,
    service_name: String,
}

/// Builds the chat routes. With a dev prefix the same routes are also
/// reachable under it, so a front-end dev server can proxy one path.
pub fn chat_router(proxy: Arc<ChatProxy>, service_name: &str, dev_prefix: Option<&str>) -> Router {
    let app_state = AppState {
        proxy,
        service_name: service_name.to_string(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let routes = Router::new()
        .route("/health", get(health_handler))
        .route("/api/chat", any(chat_handler));

    let app = match dev_prefix.and_then(normalize_dev_prefix) {
        Some(prefix) => {
            info!("Dev mount enabled: chat routes also served under {}", prefix);
            routes.clone().nest(&prefix, routes)
        }
        None => routes,
    };

    app.layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)).layer(cors).with_state(app_state)
}

/// Turns "zhipu-api/" into "/zhipu-api"; blank or root prefixes disable the mount.
pub fn normalize_dev_prefix(prefix: &str) -> Option<String> {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(format!("/{}", trimmed))
    }
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        service: state.service_name.clone(),
    })
}

async fn chat_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    info!("{} {} ({} bytes)", method, uri.path(), body.len());
    match state.proxy.handle(&method, &body).await {
        Ok(reply) => relay(reply),
        Err(e) => e.into_response(),
    }
}

fn relay(reply: RelayedReply) -> Response {
    (reply.status, [(CONTENT_TYPE, HeaderValue::from_static("application/json"))], reply.body).into_response()
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), Json(self.body())).into_response();
        if let ProxyError::MethodNotAllowed = self {
            response.headers_mut().insert(ALLOW, HeaderValue::from_static("POST"));
        }
        response
    }
}
