//! Wire protocol definitions
//!
//! The protocol is line-oriented text: one whitespace-delimited command line
//! per connection, answered with literal ASCII reply tokens. Payloads travel
//! as a single raw transfer unit with no further framing.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::path::validate_filename;

/// Per-file access policy.
///
/// Latched by the first successful WRITE naming the file and immutable for
/// the process lifetime afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Permission {
    ReadWrite,
    ReadOnly,
}

impl Permission {
    /// Interpret a WRITE permission hint token.
    ///
    /// `RO` (case-insensitive) latches read-only; anything else, including
    /// no hint at all, is the read-write default.
    pub fn from_hint(token: Option<&str>) -> Self {
        match token {
            Some(t) if t.eq_ignore_ascii_case("RO") => Permission::ReadOnly,
            _ => Permission::ReadWrite,
        }
    }
}

/// A parsed client command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Write { name: String, hint: Permission },
    Get { name: String },
    Remove { name: String },
}

impl Command {
    /// The file name the command targets.
    pub fn file_name(&self) -> &str {
        match self {
            Command::Write { name, .. } | Command::Get { name } | Command::Remove { name } => name,
        }
    }
}

/// Reply tokens sent to the client.
///
/// These are the literal bytes on the wire; the token set is fixed for
/// compatibility with existing clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reply {
    ReadyToReceive,
    WriteOk,
    SendingFile,
    RmOk,
    FileIsReadOnly,
    FileNotFound,
    OpenFailed,
    FlockFailed,
    RecvFileData,
    WriteFailed,
    RemoveFailed,
    BadArgs,
    UnknownCmd,
}

impl Reply {
    /// The literal wire token.
    pub const fn token(self) -> &'static str {
        match self {
            Reply::ReadyToReceive => "OK_READY_TO_RECEIVE",
            Reply::WriteOk => "WRITE_OK",
            Reply::SendingFile => "OK_SENDING_FILE",
            Reply::RmOk => "RM_OK",
            Reply::FileIsReadOnly => "ERR_FILE_IS_READ_ONLY",
            Reply::FileNotFound => "ERR_FILE_NOT_FOUND",
            Reply::OpenFailed => "ERR_OPEN",
            Reply::FlockFailed => "ERR_FLOCK_FAILED",
            Reply::RecvFileData => "ERR_RECV_FILE_DATA",
            Reply::WriteFailed => "ERR_WRITE_FAILED",
            Reply::RemoveFailed => "ERR_REMOVE_FAILED",
            Reply::BadArgs => "ERR_BAD_ARGS",
            Reply::UnknownCmd => "ERR_UNKNOWN_CMD",
        }
    }

    /// Parse a wire token back into a reply (client side).
    pub fn from_token(token: &str) -> Option<Reply> {
        let all = [
            Reply::ReadyToReceive,
            Reply::WriteOk,
            Reply::SendingFile,
            Reply::RmOk,
            Reply::FileIsReadOnly,
            Reply::FileNotFound,
            Reply::OpenFailed,
            Reply::FlockFailed,
            Reply::RecvFileData,
            Reply::WriteFailed,
            Reply::RemoveFailed,
            Reply::BadArgs,
            Reply::UnknownCmd,
        ];
        all.into_iter().find(|r| r.token() == token)
    }

    /// True for the `ERR_*` tokens.
    pub fn is_error(self) -> bool {
        self.token().starts_with("ERR_")
    }
}

impl std::fmt::Display for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// Parse one command line into a [`Command`].
///
/// The verb is case-insensitive and tokens are whitespace-delimited. Trailing
/// tokens beyond what a verb consumes are ignored, matching the original
/// service. File names are validated here, before any filesystem access.
pub fn parse_command(line: &str) -> Result<Command, ProtocolError> {
    let mut tokens = line.split_whitespace();
    let verb = tokens.next().ok_or(ProtocolError::EmptyCommand)?;

    if verb.eq_ignore_ascii_case("WRITE") {
        let name = tokens.next().ok_or(ProtocolError::BadArgs)?;
        validate_filename(name)?;
        Ok(Command::Write {
            name: name.to_string(),
            hint: Permission::from_hint(tokens.next()),
        })
    } else if verb.eq_ignore_ascii_case("GET") {
        let name = tokens.next().ok_or(ProtocolError::BadArgs)?;
        validate_filename(name)?;
        Ok(Command::Get {
            name: name.to_string(),
        })
    } else if verb.eq_ignore_ascii_case("RM") {
        let name = tokens.next().ok_or(ProtocolError::BadArgs)?;
        validate_filename(name)?;
        Ok(Command::Remove {
            name: name.to_string(),
        })
    } else {
        Err(ProtocolError::UnknownCommand(verb.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_write() {
        let cmd = parse_command("WRITE notes.txt").unwrap();
        assert_eq!(
            cmd,
            Command::Write {
                name: "notes.txt".into(),
                hint: Permission::ReadWrite,
            }
        );
    }

    #[test]
    fn test_parse_write_readonly_hint() {
        let cmd = parse_command("WRITE notes.txt RO").unwrap();
        assert_eq!(
            cmd,
            Command::Write {
                name: "notes.txt".into(),
                hint: Permission::ReadOnly,
            }
        );

        // Any other hint token is the read-write default
        let cmd = parse_command("WRITE notes.txt RW").unwrap();
        assert_eq!(
            cmd,
            Command::Write {
                name: "notes.txt".into(),
                hint: Permission::ReadWrite,
            }
        );
        let cmd = parse_command("WRITE notes.txt BOGUS").unwrap();
        assert!(matches!(
            cmd,
            Command::Write {
                hint: Permission::ReadWrite,
                ..
            }
        ));
    }

    #[test]
    fn test_verb_case_insensitive() {
        assert!(parse_command("write f").is_ok());
        assert!(parse_command("Get f").is_ok());
        assert!(parse_command("rm f").is_ok());
    }

    #[test]
    fn test_parse_get_and_rm() {
        assert_eq!(
            parse_command("GET data.bin").unwrap(),
            Command::Get {
                name: "data.bin".into()
            }
        );
        assert_eq!(
            parse_command("RM data.bin").unwrap(),
            Command::Remove {
                name: "data.bin".into()
            }
        );
    }

    #[test]
    fn test_unknown_verb() {
        assert_eq!(
            parse_command("FOO bar"),
            Err(ProtocolError::UnknownCommand("FOO".into()))
        );
    }

    #[test]
    fn test_missing_args() {
        assert_eq!(parse_command("WRITE"), Err(ProtocolError::BadArgs));
        assert_eq!(parse_command("GET"), Err(ProtocolError::BadArgs));
        assert_eq!(parse_command("RM   "), Err(ProtocolError::BadArgs));
        assert_eq!(parse_command("   "), Err(ProtocolError::EmptyCommand));
    }

    #[test]
    fn test_rejects_traversal_names() {
        assert!(matches!(
            parse_command("GET ../etc/passwd"),
            Err(ProtocolError::InvalidFileName(_))
        ));
        assert!(matches!(
            parse_command("WRITE .."),
            Err(ProtocolError::InvalidFileName(_))
        ));
    }

    #[test]
    fn test_reply_tokens_roundtrip() {
        for reply in [
            Reply::ReadyToReceive,
            Reply::WriteOk,
            Reply::SendingFile,
            Reply::RmOk,
            Reply::FileIsReadOnly,
            Reply::FileNotFound,
            Reply::OpenFailed,
            Reply::FlockFailed,
            Reply::RecvFileData,
            Reply::WriteFailed,
            Reply::RemoveFailed,
            Reply::BadArgs,
            Reply::UnknownCmd,
        ] {
            assert_eq!(Reply::from_token(reply.token()), Some(reply));
        }
        assert_eq!(Reply::from_token("NOT_A_TOKEN"), None);
    }

    #[test]
    fn test_reply_is_error() {
        assert!(!Reply::WriteOk.is_error());
        assert!(!Reply::ReadyToReceive.is_error());
        assert!(Reply::FileIsReadOnly.is_error());
        assert!(Reply::UnknownCmd.is_error());
    }
}
