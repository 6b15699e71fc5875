//! Scoped advisory file locking
//!
//! Wraps `flock(2)` in an RAII guard: the guard owns the open descriptor and
//! releases the lock on every exit path, including error paths. Exclusive
//! locks (write, remove) conflict with everything; shared locks (get) may
//! coexist with other shared locks.
//!
//! Advisory locks are honored only by cooperating processes; they serialize
//! RFS sessions against each other, not against arbitrary local writers.
//! Acquisition blocks with no timeout.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

/// Lock flavor, matching the operation being serialized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockMode {
    /// Multiple readers may hold this simultaneously.
    Shared,
    /// Mutually exclusive with any other lock on the same path.
    Exclusive,
}

impl LockMode {
    fn flock_op(self) -> libc::c_int {
        match self {
            LockMode::Shared => libc::LOCK_SH,
            LockMode::Exclusive => libc::LOCK_EX,
        }
    }
}

/// Errors from lock acquisition, split so the dispatcher can report the
/// open failure and the flock failure as distinct wire tokens.
#[derive(Error, Debug)]
pub enum LockError {
    #[error("open failed: {0}")]
    Open(#[source] io::Error),

    #[error("flock failed: {0}")]
    Flock(#[source] io::Error),
}

impl LockError {
    /// True when the underlying file did not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, LockError::Open(e) if e.kind() == io::ErrorKind::NotFound)
    }
}

/// An acquired advisory lock on one file.
///
/// Dropping the guard unlocks and closes the descriptor.
#[derive(Debug)]
pub struct FileLockGuard {
    file: File,
}

impl FileLockGuard {
    /// Open `path` and block until the advisory lock is granted.
    ///
    /// `create` opens write-capable and creates the file if missing (WRITE);
    /// without it the open fails with `NotFound` for missing paths, before
    /// any lock is taken (GET, RM).
    pub fn acquire(path: &Path, mode: LockMode, create: bool) -> Result<Self, LockError> {
        let file = match mode {
            LockMode::Exclusive => OpenOptions::new()
                .read(true)
                .write(true)
                .create(create)
                .open(path),
            LockMode::Shared => OpenOptions::new().read(true).open(path),
        }
        .map_err(LockError::Open)?;

        flock_blocking(file.as_raw_fd(), mode.flock_op()).map_err(LockError::Flock)?;
        debug!("acquired {:?} lock on {:?}", mode, path);

        Ok(Self { file })
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        // Closing the descriptor would release the lock anyway; unlock
        // explicitly so the release does not wait on a delayed close.
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
    }
}

/// Blocking `flock`, retrying on EINTR.
fn flock_blocking(fd: libc::c_int, op: libc::c_int) -> io::Result<()> {
    loop {
        if unsafe { libc::flock(fd, op) } == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::EINTR) {
            return Err(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    #[test]
    fn test_exclusive_acquire_and_reacquire() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f");

        let guard = FileLockGuard::acquire(&path, LockMode::Exclusive, true).unwrap();
        drop(guard);

        // Released on drop, so a second acquisition does not block
        let _guard = FileLockGuard::acquire(&path, LockMode::Exclusive, true).unwrap();
    }

    #[test]
    fn test_shared_locks_coexist() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"data").unwrap();

        let _a = FileLockGuard::acquire(&path, LockMode::Shared, false).unwrap();
        let _b = FileLockGuard::acquire(&path, LockMode::Shared, false).unwrap();
    }

    #[test]
    fn test_exclusive_blocks_until_release() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f");

        let guard = FileLockGuard::acquire(&path, LockMode::Exclusive, true).unwrap();

        let (tx, rx) = mpsc::channel();
        let contender_path = path.clone();
        let handle = std::thread::spawn(move || {
            let start = Instant::now();
            let _g = FileLockGuard::acquire(&contender_path, LockMode::Exclusive, true).unwrap();
            tx.send(start.elapsed()).unwrap();
        });

        std::thread::sleep(Duration::from_millis(100));
        drop(guard);

        let waited = rx.recv().unwrap();
        handle.join().unwrap();
        assert!(waited >= Duration::from_millis(50), "waited {:?}", waited);
    }

    #[test]
    fn test_missing_path_is_not_found() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing");

        let err = FileLockGuard::acquire(&path, LockMode::Shared, false).unwrap_err();
        assert!(err.is_not_found());

        let err = FileLockGuard::acquire(&path, LockMode::Exclusive, false).unwrap_err();
        assert!(err.is_not_found());
    }
}
