//! Per-session command dispatch
//!
//! Reads one command line, validates it, and routes to the WRITE/GET/RM
//! handler. Exactly one command per connection: the session ends after the
//! response, or after the error token when anything fails. Worker failures
//! are session-scoped and never affect other connections.
//!
//! Permission checks consult the table before any filesystem work; the
//! per-file advisory lock then serializes the work itself. The table mutex
//! and the file lock are never both held across a blocking call.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::task;
use tracing::{debug, info, warn};

use rfs_core::{parse_command, Command, Permission, ProtocolError, Reply, TRANSFER_UNIT};

use crate::flock::{FileLockGuard, LockError, LockMode};
use crate::permissions::PermissionTable;
use crate::session::TransportSession;

/// Shared state injected into every session.
pub struct ServerState {
    storage_root: PathBuf,
    pub permissions: PermissionTable,
}

impl ServerState {
    pub fn new(storage_root: PathBuf) -> Self {
        Self {
            storage_root,
            permissions: PermissionTable::default(),
        }
    }

    /// Resolve a validated file name under the storage root.
    fn file_path(&self, name: &str) -> PathBuf {
        self.storage_root.join(name)
    }
}

/// Everything that can end a session early.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("file is read-only")]
    ReadOnly,

    #[error("file not found")]
    NotFound,

    #[error("open failed: {0}")]
    Open(#[source] io::Error),

    #[error("lock acquisition failed: {0}")]
    Lock(#[source] io::Error),

    #[error("failed to receive file data")]
    Recv,

    #[error("storage write failed: {0}")]
    WriteFailed(#[source] io::Error),

    #[error("remove failed: {0}")]
    RemoveFailed(#[source] io::Error),

    #[error("session i/o: {0}")]
    Io(#[from] io::Error),

    #[error("worker task failed: {0}")]
    Worker(#[from] task::JoinError),
}

impl SessionError {
    /// Wire token reported for this failure.
    ///
    /// `None` for socket-level failures, where no reply can reach the peer;
    /// the session just closes.
    pub fn reply(&self) -> Option<Reply> {
        match self {
            SessionError::Protocol(e) => Some(e.reply()),
            SessionError::ReadOnly => Some(Reply::FileIsReadOnly),
            SessionError::NotFound => Some(Reply::FileNotFound),
            SessionError::Open(_) => Some(Reply::OpenFailed),
            SessionError::Lock(_) => Some(Reply::FlockFailed),
            SessionError::Recv => Some(Reply::RecvFileData),
            SessionError::WriteFailed(_) => Some(Reply::WriteFailed),
            SessionError::RemoveFailed(_) => Some(Reply::RemoveFailed),
            SessionError::Io(_) | SessionError::Worker(_) => None,
        }
    }
}

fn lock_to_session(e: LockError) -> SessionError {
    match e {
        LockError::Open(err) => SessionError::Open(err),
        LockError::Flock(err) => SessionError::Lock(err),
    }
}

/// GET lock failures: only a missing file is the not-found case; any other
/// open failure keeps its own token.
fn get_lock_error(e: LockError) -> SessionError {
    if e.is_not_found() {
        return SessionError::NotFound;
    }
    lock_to_session(e)
}

/// Run one session to completion.
///
/// Consumes the session; on failure the matching error token is sent if the
/// socket still works, and the connection closes either way.
pub async fn handle_session(mut session: TransportSession, state: Arc<ServerState>) {
    let peer = session.peer();
    match run_command(&mut session, &state).await {
        Ok(()) => debug!("session {} completed", peer),
        Err(e) => match e.reply() {
            Some(reply) => {
                debug!("session {} failed: {} -> {}", peer, e, reply);
                if let Err(send_err) = session.send_reply(reply).await {
                    debug!("session {}: could not report {}: {}", peer, reply, send_err);
                }
            }
            None => warn!("session {} aborted: {}", peer, e),
        },
    }
}

async fn run_command(
    session: &mut TransportSession,
    state: &ServerState,
) -> Result<(), SessionError> {
    let line = session.read_command().await?;
    let command = parse_command(&line)?;
    debug!("session {}: {:?}", session.peer(), command);

    match command {
        Command::Write { name, hint } => handle_write(session, state, name, hint).await,
        Command::Get { name } => handle_get(session, state, name).await,
        Command::Remove { name } => handle_remove(session, state, name).await,
    }
}

/// WRITE: permission check, latch the hint for new names, then receive one
/// unit into the file under an exclusive lock.
async fn handle_write(
    session: &mut TransportSession,
    state: &ServerState,
    name: String,
    hint: Permission,
) -> Result<(), SessionError> {
    if state.permissions.get(&name) == Permission::ReadOnly {
        return Err(SessionError::ReadOnly);
    }
    // First successful WRITE fixes the policy for the process lifetime.
    state.permissions.set_if_absent(&name, hint);

    session.send_reply(Reply::ReadyToReceive).await?;

    let path = state.file_path(&name);
    let mut guard =
        task::spawn_blocking(move || FileLockGuard::acquire(&path, LockMode::Exclusive, true))
            .await?
            .map_err(lock_to_session)?;

    let data = session.recv_unit().await.map_err(|_| SessionError::Recv)?;
    if data.is_empty() {
        return Err(SessionError::Recv);
    }
    let len = data.len();

    task::spawn_blocking(move || -> Result<(), SessionError> {
        let file = guard.file_mut();
        file.set_len(0).map_err(SessionError::WriteFailed)?;
        file.seek(SeekFrom::Start(0)).map_err(SessionError::WriteFailed)?;
        file.write_all(&data).map_err(SessionError::WriteFailed)?;
        file.flush().map_err(SessionError::WriteFailed)?;
        // guard drops here, releasing the lock before the reply goes out
        Ok(())
    })
    .await??;

    session.send_reply(Reply::WriteOk).await?;
    info!("wrote {} bytes to {:?}", len, name);
    Ok(())
}

/// GET: no permission check (reads are always allowed). Missing files are
/// reported before any lock is taken; larger files are truncated to one
/// unit in the response.
async fn handle_get(
    session: &mut TransportSession,
    state: &ServerState,
    name: String,
) -> Result<(), SessionError> {
    let path = state.file_path(&name);

    let (guard, data) =
        task::spawn_blocking(move || -> Result<(FileLockGuard, Vec<u8>), SessionError> {
            let mut guard =
                FileLockGuard::acquire(&path, LockMode::Shared, false).map_err(get_lock_error)?;

            let mut buf = vec![0u8; TRANSFER_UNIT];
            let mut filled = 0;
            while filled < TRANSFER_UNIT {
                let n = guard.file_mut().read(&mut buf[filled..])?;
                if n == 0 {
                    break;
                }
                filled += n;
            }
            buf.truncate(filled);
            Ok((guard, buf))
        })
        .await??;

    session.send_reply(Reply::SendingFile).await?;
    session.send_bytes(&data).await?;
    // Shared lock is held across the transfer
    drop(guard);

    info!("sent {} bytes of {:?}", data.len(), name);
    Ok(())
}

/// RM: permission check, then delete under an exclusive lock. A missing
/// target is a remove failure, not a distinct not-found case.
async fn handle_remove(
    session: &mut TransportSession,
    state: &ServerState,
    name: String,
) -> Result<(), SessionError> {
    if state.permissions.get(&name) == Permission::ReadOnly {
        return Err(SessionError::ReadOnly);
    }

    let path = state.file_path(&name);
    task::spawn_blocking(move || -> Result<(), SessionError> {
        let guard =
            FileLockGuard::acquire(&path, LockMode::Exclusive, false).map_err(|e| match e {
                LockError::Open(err) => SessionError::RemoveFailed(err),
                LockError::Flock(err) => SessionError::Lock(err),
            })?;
        std::fs::remove_file(&path).map_err(SessionError::RemoveFailed)?;
        drop(guard);
        Ok(())
    })
    .await??;

    session.send_reply(Reply::RmOk).await?;
    info!("removed {:?}", name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_reply_mapping() {
        assert_eq!(
            SessionError::ReadOnly.reply(),
            Some(Reply::FileIsReadOnly)
        );
        assert_eq!(SessionError::NotFound.reply(), Some(Reply::FileNotFound));
        assert_eq!(SessionError::Recv.reply(), Some(Reply::RecvFileData));
        assert_eq!(
            SessionError::Protocol(ProtocolError::BadArgs).reply(),
            Some(Reply::BadArgs)
        );

        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "gone");
        assert_eq!(SessionError::Io(io_err).reply(), None);
    }

    #[test]
    fn test_get_lock_errors_keep_distinct_tokens() {
        let missing = LockError::Open(io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(get_lock_error(missing).reply(), Some(Reply::FileNotFound));

        let denied = LockError::Open(io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(get_lock_error(denied).reply(), Some(Reply::OpenFailed));

        let conflict = LockError::Flock(io::Error::new(io::ErrorKind::WouldBlock, "held"));
        assert_eq!(get_lock_error(conflict).reply(), Some(Reply::FlockFailed));
    }

    #[test]
    fn test_file_path_stays_under_root() {
        let state = ServerState::new(PathBuf::from("/srv/rfs"));
        assert_eq!(state.file_path("a.txt"), PathBuf::from("/srv/rfs/a.txt"));
    }
}
