use clap::Parser;
use dotenv::dotenv;
use log::{ error, info, warn };
use portfolio_chat::cli::CliArgs;
use portfolio_chat::config::site::{ load_site_context, SiteContext };
use portfolio_chat::widget::backend::ProxyBackend;
use portfolio_chat::widget::state::PanelEvent;
use portfolio_chat::widget::ChatWidget;
use std::error::Error;
use std::time::Duration;
use tokio::io::{ AsyncBufReadExt, AsyncWriteExt, BufReader };

const HELP: &str =
    "Commands: /clear to reset the conversation, /refresh to reload site information, /quit to exit.";

#[tokio::main]
async fn main() {
    dotenv().ok();
    let args = CliArgs::parse();
    let default_filter = if args.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    if let Err(e) = chat(args).await {
        error!("Chat client failed: {}", e);
        std::process::exit(1);
    }
}

async fn chat(args: CliArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    let site = read_site(&args)?;
    let backend = ProxyBackend::new(args.proxy_url.clone(), Duration::from_secs(args.timeout_secs))?;
    info!("Using chat proxy at {}", backend.url());

    let mut widget = ChatWidget::new(site);
    widget.dispatch(PanelEvent::Open);

    let mut stdout = tokio::io::stdout();
    stdout.write_all(format!("{}\n", HELP).as_bytes()).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };

        match line.trim() {
            "/quit" | "/exit" => break,
            "/clear" => {
                widget.clear();
                stdout.write_all(b"(conversation cleared)\n").await?;
            }
            "/refresh" => {
                match read_site(&args) {
                    Ok(site) => {
                        let confirmation = widget.refresh_site(site);
                        stdout.write_all(format!("assistant: {}\n", confirmation.content).as_bytes()).await?;
                    }
                    Err(e) => {
                        warn!("Could not reload site information: {}", e);
                        stdout.write_all(b"(site information unchanged)\n").await?;
                    }
                }
            }
            text => {
                if let Some(reply) = widget.submit(text, &backend).await {
                    stdout.write_all(format!("assistant: {}\n", reply.content).as_bytes()).await?;
                }
            }
        }
    }

    widget.dispatch(PanelEvent::Close);
    Ok(())
}

fn read_site(args: &CliArgs) -> Result<SiteContext, Box<dyn Error + Send + Sync>> {
    match &args.site_context_path {
        Some(path) => Ok(load_site_context(path)?),
        None => Ok(SiteContext::default()),
    }
}
