//! Write-once permission table
//!
//! Process-wide mapping from file name to permission. A file's policy is
//! latched by the first successful WRITE naming it and never changes for the
//! process lifetime; absent entries default to read-write. The table is
//! in-memory only and resets on restart.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::{debug, warn};

use rfs_core::{Permission, MAX_TRACKED_FILES};

/// Permission table guarded by a single mutex.
///
/// The mutex is held only for the map lookup/insert, never across file or
/// socket I/O, so it cannot couple with the per-file advisory lock.
pub struct PermissionTable {
    entries: Mutex<HashMap<String, Permission>>,
    capacity: usize,
}

impl PermissionTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    /// Look up the permission for a file name.
    ///
    /// Absence is not an error: unknown names are read-write.
    pub fn get(&self, name: &str) -> Permission {
        self.entries
            .lock()
            .get(name)
            .copied()
            .unwrap_or(Permission::ReadWrite)
    }

    /// Insert a permission only if no entry exists for the name.
    ///
    /// Existing entries are never overwritten (write-once semantics). At
    /// capacity the insert is dropped and the file keeps the read-write
    /// default.
    pub fn set_if_absent(&self, name: &str, permission: Permission) {
        let mut entries = self.entries.lock();

        if entries.contains_key(name) {
            return;
        }

        if entries.len() >= self.capacity {
            warn!(
                "permission table full ({} entries), {:?} keeps read-write default",
                self.capacity, name
            );
            return;
        }

        debug!("latched permission for {:?}: {:?}", name, permission);
        entries.insert(name.to_string(), permission);
    }

    /// Number of tracked names.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for PermissionTable {
    fn default() -> Self {
        Self::new(MAX_TRACKED_FILES)
    }
}
