pub mod site;

use crate::cli::ProxyArgs;
use log::warn;
use reqwest::StatusCode;
use std::error::Error;
use std::fmt;
use std::time::Duration;
use url::Url;

pub const DEFAULT_UPSTREAM_URL: &str = "https://open.bigmodel.cn/api/paas/v4/chat/completions";
pub const DEFAULT_MODEL: &str = "glm-4.5-air";
pub const DEFAULT_SERVICE_NAME: &str = "zhipu-ai-proxy";
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Bearer secret for the upstream API.
///
/// Formatting never reveals the value; use [`Credential::expose`] only when
/// building the outbound authorization header.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` for missing or blank values so an empty env var counts as unset.
    pub fn from_optional(value: Option<String>) -> Option<Self> {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(Credential)
    }

    pub fn new(value: impl Into<String>) -> Self {
        Credential(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::from_millis(500),
        }
    }

    /// 429 and 503 mean no generation was started upstream.
    pub fn is_retryable(&self, status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE
    }

    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.initial_backoff.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub credential: Option<Credential>,
    pub upstream_url: String,
    pub model: String,
    pub upstream_timeout: Duration,
    pub retry: RetryPolicy,
    /// Bound on a whole `forward` call, retries included.
    pub request_deadline: Option<Duration>,
}

impl ProxyConfig {
    pub fn new(credential: Option<Credential>) -> Self {
        Self {
            credential,
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
            retry: RetryPolicy::disabled(),
            request_deadline: None,
        }
    }

    pub fn from_args(args: &ProxyArgs) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let url = Url::parse(&args.upstream_url).map_err(|e|
            format!("Invalid upstream URL '{}': {}", args.upstream_url, e)
        )?;
        if url.scheme() != "https" {
            warn!("Upstream URL '{}' does not use HTTPS; the API key will travel in clear text.", url);
        }
        if args.chat_model.trim().is_empty() {
            return Err("Chat model must not be empty".into());
        }
        if args.upstream_timeout_secs == 0 {
            return Err("Upstream timeout must be at least one second".into());
        }
        if args.request_deadline_secs == Some(0) {
            return Err("Request deadline must be at least one second".into());
        }

        Ok(Self {
            credential: Credential::from_optional(args.api_key.clone()),
            upstream_url: url.to_string(),
            model: args.chat_model.trim().to_string(),
            upstream_timeout: Duration::from_secs(args.upstream_timeout_secs),
            retry: RetryPolicy {
                max_retries: args.upstream_max_retries,
                initial_backoff: Duration::from_millis(args.upstream_retry_backoff_ms),
            },
            request_deadline: args.request_deadline_secs.map(Duration::from_secs),
        })
    }

    /// Caps the overall request deadline, e.g. at a platform's maximum
    /// invocation time.
    pub fn cap_request_deadline(&mut self, limit: Duration) {
        self.request_deadline = Some(self.request_deadline.map_or(limit, |d| d.min(limit)));
    }
}
