//! RFS Core - Protocol grammar, configuration, and error types
//!
//! This crate contains the foundational types shared by the RFS daemon and
//! client. It has no dependencies on networking or filesystem code.

pub mod config;
pub mod error;
pub mod path;
pub mod protocol;

pub use config::{Config, ServerSection};
pub use error::ProtocolError;
pub use protocol::{parse_command, Command, Permission, Reply};

/// Transfer unit in bytes.
///
/// The protocol moves payloads as a single bounded chunk of this size; a GET
/// of a larger file truncates the response to one unit. Kept at the original
/// service's buffer size for wire compatibility.
pub const TRANSFER_UNIT: usize = 1024;

/// Well-known server port.
pub const DEFAULT_PORT: u16 = 2024;

/// Maximum number of distinct file names tracked by the permission table.
///
/// Beyond this, new names silently keep the read-write default.
pub const MAX_TRACKED_FILES: usize = 256;

/// Maximum file name length in bytes.
pub const MAX_FILENAME_LEN: usize = 255;
