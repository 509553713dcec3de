//! Switchboard gateway binary.
//!
//! ```bash
//! # Run with the built-in provider set
//! switchboard-gateway
//!
//! # Custom configuration and listener
//! switchboard-gateway --config gateway.toml --host 127.0.0.1 --port 9000
//! ```
//!
//! Provider credentials are environment variables named by each provider's
//! `credential_ref` (e.g. `OPENAI_API_KEY`, `SILICONFLOW_API_KEY`); a
//! provider whose variable is unset is skipped for the whole run.
//!
//! The process serves until interrupted, then stops the health prober with
//! a bounded wait before exiting.

use std::net::SocketAddr;

use clap::Parser;
use switchboard_gateway::{config::Config, server::create_server};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Built-in defaults are used when
    /// the file does not exist.
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Override the configured listener host.
    #[arg(long)]
    host: Option<String>,

    /// Override the configured listener port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Logging filter, e.g. "info" or "switchboard_relay=debug".
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let mut config = Config::load_or_default(&args.config)?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let configured = config
        .providers
        .iter()
        .filter(|p| p.is_configured())
        .count();
    tracing::info!(
        providers = config.providers.len(),
        configured,
        "loaded provider registry"
    );

    let (app, prober_handle) = create_server(&config)?;

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    tracing::info!("listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    prober_handle.shutdown().await;
    Ok(())
}
