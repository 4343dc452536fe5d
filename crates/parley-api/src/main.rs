use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser};
use tracing::info;
use tracing_subscriber::EnvFilter;

use parley_core::{Config, Database, Messenger};

mod routes;

use routes::AppState;

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn try_main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli
        .common
        .config
        .unwrap_or_else(Config::default_config_path);
    let config = Config::ensure_at(&config_path)?;

    let db = Database::open(&config.database).await?;

    let host = cli.common.host.unwrap_or_else(|| config.api.host.clone());
    let port = cli.common.port.unwrap_or(config.api.port);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;

    if !config.messaging_enabled {
        info!("Messaging is disabled; /messages routes will answer 404");
    }

    let state = AppState {
        config: Arc::new(config),
        messenger: Messenger::new(db),
    };
    let app = routes::router(state);

    info!("Starting API server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Debug, Parser)]
#[command(author, version, about = "HTTP API server for parley direct messaging")]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Override the config file path
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Interface to bind (defaults to the configured host)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (defaults to the configured port)
    #[arg(short, long)]
    port: Option<u16>,
}
