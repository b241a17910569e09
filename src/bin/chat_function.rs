//! Serverless entry point: reads one HTTP event (JSON) from stdin and
//! writes one response object (JSON) to stdout. Logs go to stderr.

use clap::Parser;
use dotenv::dotenv;
use log::error;
use portfolio_chat::cli::FunctionArgs;
use portfolio_chat::config::ProxyConfig;
use portfolio_chat::proxy::ChatProxy;
use portfolio_chat::serverless::{ handle_raw_event, MAX_DURATION_SECS };
use std::error::Error;
use std::time::Duration;
use tokio::io::{ AsyncReadExt, AsyncWriteExt };

#[tokio::main]
async fn main() {
    dotenv().ok();
    let args = FunctionArgs::parse();
    let default_filter = if args.proxy.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    if let Err(e) = invoke(args).await {
        error!("Chat function failed: {}", e);
        std::process::exit(1);
    }
}

async fn invoke(args: FunctionArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut config = ProxyConfig::from_args(&args.proxy)?;
    let max_duration = Duration::from_secs(MAX_DURATION_SECS);
    config.upstream_timeout = config.upstream_timeout.min(max_duration);
    config.cap_request_deadline(max_duration);
    let proxy = ChatProxy::from_config(config)?;

    let mut raw = String::new();
    tokio::io::stdin().read_to_string(&mut raw).await?;

    let response = handle_raw_event(&proxy, &raw).await;
    let mut out = serde_json::to_vec(&response)?;
    out.push(b'\n');

    let mut stdout = tokio::io::stdout();
    stdout.write_all(&out).await?;
    stdout.flush().await?;
    Ok(())
}
