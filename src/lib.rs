pub mod cli;
pub mod config;
pub mod llm;
pub mod models;
pub mod proxy;
pub mod server;
pub mod serverless;
pub mod widget;

use cli::Args;
use config::ProxyConfig;
use log::info;
use proxy::ChatProxy;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = ProxyConfig::from_args(&args.proxy)?;

    info!("--- Core Configuration ---");
    info!("Listen Address: {}:{}", args.host, args.port);
    info!("Service Name: {}", args.service_name);
    info!("Upstream URL: {}", config.upstream_url);
    info!("Chat Model: {}", config.model);
    info!("API Key Configured: {}", config.credential.is_some());
    info!("Upstream Timeout: {:?}", config.upstream_timeout);
    info!("Upstream Max Retries: {}", config.retry.max_retries);
    if config.retry.max_retries > 0 {
        info!("Upstream Retry Backoff: {:?}", config.retry.initial_backoff);
    }
    if let Some(deadline) = config.request_deadline {
        info!("Request Deadline: {:?}", deadline);
    }
    info!("Dev Prefix: {}", args.dev_prefix.as_deref().unwrap_or("(none)"));
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let proxy = Arc::new(ChatProxy::from_config(config)?);
    let server = Server::new(args, proxy)?;
    server.run().await
}
