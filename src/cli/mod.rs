use clap::{ Args as ClapArgs, Parser };

use crate::config::{ DEFAULT_MODEL, DEFAULT_SERVICE_NAME, DEFAULT_UPSTREAM_URL };

/// Settings shared by every host that runs the chat proxy.
#[derive(ClapArgs, Debug, Clone)]
pub struct ProxyArgs {
    /// API key for the upstream chat-completions service. Never sent to clients.
    #[arg(long = "api-key", env = "ZHIPU_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Upstream chat-completions endpoint.
    #[arg(long, env = "UPSTREAM_URL", default_value = DEFAULT_UPSTREAM_URL)]
    pub upstream_url: String,

    /// Model identifier sent upstream. Callers cannot override it.
    #[arg(long, env = "CHAT_MODEL", default_value = DEFAULT_MODEL)]
    pub chat_model: String,

    /// Deadline in seconds for a single upstream call.
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value = "30")]
    pub upstream_timeout_secs: u64,

    /// Extra attempts on upstream 429/503 responses. 0 disables retries.
    #[arg(long, env = "UPSTREAM_MAX_RETRIES", default_value = "0")]
    pub upstream_max_retries: u32,

    /// Initial backoff in milliseconds between retries; doubles on each attempt.
    #[arg(long, env = "UPSTREAM_RETRY_BACKOFF_MS", default_value = "500")]
    pub upstream_retry_backoff_ms: u64,

    /// Overall deadline in seconds for one chat request, covering every
    /// attempt and backoff. Unset means only the per-call timeout applies.
    #[arg(long, env = "REQUEST_DEADLINE_SECS")]
    pub request_deadline_secs: Option<u64>,

    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Chat proxy for the portfolio site", long_about = None)]
pub struct Args {
    #[command(flatten)]
    pub proxy: ProxyArgs,

    /// Interface the HTTP server binds to.
    #[arg(long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port the HTTP server listens on.
    #[arg(long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// Name reported by the health endpoint.
    #[arg(long, env = "SERVICE_NAME", default_value = DEFAULT_SERVICE_NAME)]
    pub service_name: String,

    /// Also mount the chat routes under this prefix (e.g. /zhipu-api) for the front-end dev server.
    #[arg(long, env = "DEV_PREFIX")]
    pub dev_prefix: Option<String>,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

/// Arguments for the serverless function host, which reads one event from stdin.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Serverless chat proxy function", long_about = None)]
pub struct FunctionArgs {
    #[command(flatten)]
    pub proxy: ProxyArgs,
}

/// Arguments for the terminal chat client.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Terminal chat client for the portfolio proxy", long_about = None)]
pub struct CliArgs {
    /// URL of the chat proxy endpoint.
    #[arg(long, env = "PROXY_URL", default_value = "http://localhost:3000/api/chat")]
    pub proxy_url: String,

    /// JSON file describing the site, used to build the system prompt.
    #[arg(long, env = "SITE_CONTEXT_PATH")]
    pub site_context_path: Option<String>,

    /// Client-side request deadline in seconds.
    #[arg(long, env = "CLIENT_TIMEOUT_SECS", default_value = "60")]
    pub timeout_secs: u64,

    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,
}
