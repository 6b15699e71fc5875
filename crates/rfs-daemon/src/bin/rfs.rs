//! RFS client CLI
//!
//! Usage:
//!   rfs write <localFile> <remoteName> [--ro]
//!   rfs get <remoteName> <localFile>
//!   rfs rm <remoteName>

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use rfs_core::{Permission, DEFAULT_PORT};
use rfs_daemon::RfsClient;

#[derive(Parser)]
#[command(name = "rfs")]
#[command(about = "Remote file service client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Server address
    #[arg(short, long, default_value_t = default_addr())]
    addr: SocketAddr,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

fn default_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT))
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a local file under a remote name
    Write {
        /// Local file to read
        local: PathBuf,

        /// Remote name to store it under
        remote: String,

        /// Latch the remote file read-only on first write
        #[arg(long)]
        ro: bool,
    },

    /// Download a remote file
    Get {
        /// Remote name to fetch
        remote: String,

        /// Local file to write
        local: PathBuf,
    },

    /// Delete a remote file
    Rm {
        /// Remote name to delete
        remote: String,
    },
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

    let client = RfsClient::new(cli.addr);

    match cli.command {
        Commands::Write { local, remote, ro } => {
            let data = std::fs::read(&local)
                .with_context(|| format!("reading local file {:?}", local))?;
            let hint = if ro {
                Permission::ReadOnly
            } else {
                Permission::ReadWrite
            };
            client.write_file(&remote, &data, hint).await?;
            info!("wrote {:?} ({} bytes) as {:?}", local, data.len(), remote);
        }
        Commands::Get { remote, local } => {
            let data = client.get_file(&remote).await?;
            std::fs::write(&local, &data)
                .with_context(|| format!("writing local file {:?}", local))?;
            info!("fetched {:?} ({} bytes) into {:?}", remote, data.len(), local);
        }
        Commands::Rm { remote } => {
            client.remove_file(&remote).await?;
            info!("removed {:?}", remote);
        }
    }

    Ok(())
}
