//! RFS server daemon
//!
//! Usage:
//!   rfsd                        Serve with config-file / default settings
//!   rfsd --root ./data -p 2024  Override individual settings

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use tokio::signal;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use rfs_core::Config;
use rfs_daemon::{RfsServer, ServerConfig};

#[derive(Parser)]
#[command(name = "rfsd")]
#[command(about = "Remote file service daemon", long_about = None)]
struct Cli {
    /// Config file path (default: platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Bind address
    #[arg(short, long)]
    bind: Option<IpAddr>,

    /// Directory under which served files are stored
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Maximum concurrent client sessions
    #[arg(long)]
    max_connections: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };

    let server_config = ServerConfig {
        bind_addr: SocketAddr::new(
            cli.bind.unwrap_or(config.server.bind),
            cli.port.unwrap_or(config.server.port),
        ),
        storage_root: cli.root.unwrap_or(config.server.storage_root),
        max_connections: cli
            .max_connections
            .unwrap_or(config.server.max_connections),
    };

    info!("Starting rfsd...");
    info!("  Storage root: {:?}", server_config.storage_root);
    info!("  Listening on: {}", server_config.bind_addr);
    info!("  Session limit: {}", server_config.max_connections);

    let server = RfsServer::bind(server_config).await?;

    tokio::select! {
        result = server.serve() => {
            if let Err(e) = result {
                error!("Server error: {:?}", e);
            }
        }
        _ = signal::ctrl_c() => {
            info!("Shutting down...");
        }
    }

    Ok(())
}
