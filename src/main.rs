use clap::Parser;
use dotenv::dotenv;
use log::error;
use portfolio_chat::cli::Args;

#[tokio::main]
async fn main() {
    dotenv().ok();
    let args = Args::parse();
    let default_filter = if args.proxy.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    if let Err(e) = portfolio_chat::run(args).await {
        error!("Chat proxy failed: {}", e);
        std::process::exit(1);
    }
}
