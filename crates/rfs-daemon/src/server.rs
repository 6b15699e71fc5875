//! Connection acceptor
//!
//! Owns the listening socket and hands each accepted connection to a
//! dispatcher task. Concurrency is bounded by a semaphore rather than being
//! one unbounded thread per connection; within a permit each session still
//! runs as its own worker from accept to close.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use rfs_core::DEFAULT_PORT;

use crate::dispatch::{handle_session, ServerState};
use crate::session::TransportSession;

/// Runtime server configuration.
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub storage_root: PathBuf,
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            storage_root: PathBuf::from("server_data"),
            max_connections: 64,
        }
    }
}

/// Setup failures. These happen before any session exists and are the only
/// process-fatal error class; everything later is session-scoped.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to create storage root {path:?}: {source}")]
    Storage { path: PathBuf, source: io::Error },

    #[error("failed to bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },
}

/// The RFS server: listener plus the state shared by all sessions.
pub struct RfsServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    state: Arc<ServerState>,
    semaphore: Arc<Semaphore>,
}

impl RfsServer {
    /// Create the storage root if needed and bind the listening socket.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        std::fs::create_dir_all(&config.storage_root).map_err(|source| ServerError::Storage {
            path: config.storage_root.clone(),
            source,
        })?;

        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr,
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| ServerError::Bind {
            addr: config.bind_addr,
            source,
        })?;

        info!(
            "rfs listening on {} serving {:?}",
            local_addr, config.storage_root
        );

        Ok(Self {
            listener,
            local_addr,
            state: Arc::new(ServerState::new(config.storage_root)),
            semaphore: Arc::new(Semaphore::new(config.max_connections)),
        })
    }

    /// The bound address; useful when binding port 0 in tests.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until the process is stopped.
    ///
    /// Each session takes one semaphore permit for its lifetime; at the
    /// connection limit new clients wait in the accept backlog.
    pub async fn serve(self) -> Result<(), ServerError> {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("accept failed: {}", e);
                    continue;
                }
            };

            let permit = match self.semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            debug!("accepted connection from {}", peer);
            let state = self.state.clone();
            tokio::spawn(async move {
                handle_session(TransportSession::new(stream, peer), state).await;
                drop(permit);
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let dir = TempDir::new().unwrap();
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            storage_root: dir.path().join("data"),
            max_connections: 4,
        };

        let server = RfsServer::bind(config).await.unwrap();
        assert_ne!(server.local_addr().port(), 0);
        assert!(dir.path().join("data").is_dir());
    }

    #[tokio::test]
    async fn test_bind_rejects_bad_storage_root() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file in the way").unwrap();

        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            storage_root: blocker.join("data"),
            max_connections: 4,
        };

        assert!(matches!(
            RfsServer::bind(config).await,
            Err(ServerError::Storage { .. })
        ));
    }
}
