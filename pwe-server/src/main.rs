//! pwe-server - static site host for Philly Wings Express
//!
//! Serves the customer-facing SPA from its build directory, the menu admin
//! pages, and `/health`. Runs until Ctrl+C or SIGTERM.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pwe_common::config::load_config;
use pwe_server::build_router;
use tokio::signal;
use tracing::{error, info, warn};

/// Command-line arguments for pwe-server
#[derive(Parser, Debug)]
#[command(name = "pwe-server")]
#[command(about = "Static site host for Philly Wings Express")]
#[command(version)]
struct Args {
    /// Config file (default: $PWE_CONFIG, then ~/.config/pwe/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address (overrides config and PWE_BIND)
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// SPA build output directory
    #[arg(long)]
    dist_dir: Option<PathBuf>,

    /// Directory holding the admin pages
    #[arg(long)]
    admin_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting pwe-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let mut server = load_config(args.config.as_deref())
        .context("Failed to load configuration")?
        .server;
    if let Some(bind) = args.bind {
        server.bind = bind;
    }
    if let Some(dir) = args.dist_dir {
        server.dist_dir = dir;
    }
    if let Some(dir) = args.admin_dir {
        server.admin_dir = dir;
    }

    if !server.dist_dir.join("index.html").is_file() {
        warn!(
            "{} has no index.html; client routes will answer 404",
            server.dist_dir.display()
        );
    }
    info!("Serving SPA from {}", server.dist_dir.display());
    info!("Serving admin pages from {}", server.admin_dir.display());

    let app = build_router(&server);

    let listener = tokio::net::TcpListener::bind(server.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", server.bind))?;
    info!("pwe-server listening on http://{}", server.bind);
    info!("Health check: http://{}/health", server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_bind_override_parses() {
        let args = Args::try_parse_from(["pwe-server", "--bind", "0.0.0.0:8080"]).unwrap();
        assert_eq!(args.bind, Some("0.0.0.0:8080".parse().unwrap()));
        assert_eq!(args.dist_dir, None);
    }
}
