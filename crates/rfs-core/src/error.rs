//! Error types for the RFS protocol

use thiserror::Error;

use crate::protocol::Reply;

/// Errors produced while parsing or validating a command line.
///
/// Every variant maps to exactly one wire reply token; the session closes
/// after the token is sent and nothing on disk is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("missing or malformed arguments")]
    BadArgs,

    #[error("invalid file name: {0}")]
    InvalidFileName(String),

    #[error("empty command line")]
    EmptyCommand,
}

impl ProtocolError {
    /// The wire token reported to the client for this error.
    pub fn reply(&self) -> Reply {
        match self {
            ProtocolError::UnknownCommand(_) => Reply::UnknownCmd,
            ProtocolError::BadArgs
            | ProtocolError::InvalidFileName(_)
            | ProtocolError::EmptyCommand => Reply::BadArgs,
        }
    }
}
