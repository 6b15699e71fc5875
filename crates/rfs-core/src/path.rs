//! File-name validation
//!
//! The storage namespace is flat: a file name is a single path component
//! under the storage root. Names are validated before any filesystem access
//! so a client-supplied name can never escape the root.

use crate::error::ProtocolError;
use crate::MAX_FILENAME_LEN;

/// Validate a file name (single flat path component).
pub fn validate_filename(name: &str) -> Result<(), ProtocolError> {
    if name.is_empty() {
        return Err(ProtocolError::InvalidFileName("empty name".into()));
    }

    if name.contains('\0') {
        return Err(ProtocolError::InvalidFileName(
            "name contains null byte".into(),
        ));
    }

    if name.len() > MAX_FILENAME_LEN {
        return Err(ProtocolError::InvalidFileName(format!(
            "name too long: {} bytes (max {})",
            name.len(),
            MAX_FILENAME_LEN
        )));
    }

    if name == "." || name == ".." {
        return Err(ProtocolError::InvalidFileName(
            "special directory names not allowed".into(),
        ));
    }

    if name.contains('/') || name.contains('\\') {
        return Err(ProtocolError::InvalidFileName(
            "name contains path separator".into(),
        ));
    }

    Ok(())
}
