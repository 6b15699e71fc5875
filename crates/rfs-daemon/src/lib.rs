//! RFS Daemon - remote file service over TCP
//!
//! This crate provides:
//! - The server: a semaphore-gated accept loop handing each connection to a
//!   per-session command dispatcher (one command per connection)
//! - A write-once permission table latching files read-only on first WRITE
//! - Advisory file locking (`flock`) serializing conflicting file access
//! - A small client library used by the `rfs` CLI and the integration tests
//!
//! # Concurrency
//!
//! Two independent lock domains exist and are never both held across a
//! blocking call:
//!
//! - the permission table's mutex, held only for in-memory lookups/inserts
//! - the per-file advisory lock, held only around filesystem work and the
//!   payload transfer
//!
//! Filesystem and `flock` calls block, so they run on the blocking thread
//! pool via `spawn_blocking`; socket I/O stays on the async runtime.

pub mod client;
pub mod dispatch;
pub mod flock;
pub mod permissions;
pub mod server;
pub mod session;

pub use client::{ClientError, RfsClient};
pub use dispatch::{handle_session, ServerState, SessionError};
pub use flock::{FileLockGuard, LockError, LockMode};
pub use permissions::PermissionTable;
pub use server::{RfsServer, ServerConfig, ServerError};
pub use session::TransportSession;
