pub mod api;

use crate::cli::Args;
use crate::proxy::ChatProxy;
use axum::Router;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use log::{ info, warn, error };

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

pub struct Server {
    addr: SocketAddr,
    app: Router,
    args: Args,
}

impl Server {
    pub fn new(args: Args, proxy: Arc<ChatProxy>) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let addr = format!("{}:{}", args.host, args.port)
            .parse::<SocketAddr>()
            .map_err(|e| format!("Invalid listen address '{}:{}': {}", args.host, args.port, e))?;

        if !proxy.is_configured() {
            warn!("ZHIPU_API_KEY is not set. /api/chat will answer 500 until it is configured.");
        }

        let app = api::chat_router(proxy, &args.service_name, args.dev_prefix.as_deref());
        Ok(Self { addr, app, args })
    }

    pub async fn run(self) -> Result<(), Box<dyn Error + Send + Sync>> {
        if self.args.enable_tls {
            let (cert_path, key_path) = match (&self.args.tls_cert_path, &self.args.tls_key_path) {
                (Some(cert_path), Some(key_path)) => (cert_path.clone(), key_path.clone()),
                (Some(_), None) | (None, Some(_)) => {
                    error!("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.");
                    return Err("Missing TLS certificate or key path".into());
                }
                (None, None) => {
                    error!("--enable-tls was set but no certificate/key paths provided.");
                    return Err("TLS enabled without cert/key".into());
                }
            };
            self.run_tls(&cert_path, &key_path).await
        } else {
            self.run_plain().await
        }
    }

    async fn run_plain(self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let listener = tokio::net::TcpListener
            ::bind(self.addr).await
            .map_err(|e| format!("Failed to bind HTTP server to {}: {}. Try a different port.", self.addr, e))?;

        info!("Chat proxy listening on: http://{}", self.addr);
        info!("Health check: http://{}/health", self.addr);
        info!("Chat API: http://{}/api/chat", self.addr);

        axum::serve(listener, self.app.into_make_service())
            .with_graceful_shutdown(shutdown_signal()).await?;

        info!("Chat proxy stopped");
        Ok(())
    }

    async fn run_tls(self, cert_path: &str, key_path: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        info!("TLS enabled. Loading certificate from '{}' and key from '{}'", cert_path, key_path);
        let tls_config = axum_server::tls_rustls::RustlsConfig
            ::from_pem_file(cert_path, key_path).await
            .map_err(|e| format!("Failed to load TLS certificate/key: {}", e))?;

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown_handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        });

        info!("Chat proxy listening on: https://{}", self.addr);
        axum_server::bind_rustls(self.addr, tls_config)
            .handle(handle)
            .serve(self.app.into_make_service()).await
            .map_err(|e| format!("HTTPS server error on {}: {}", self.addr, e))?;

        info!("Chat proxy stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections");
}
