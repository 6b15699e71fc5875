//! RFS client library
//!
//! One TCP connection per operation, mirroring the server's
//! command-per-connection model. Used by the `rfs` CLI and the integration
//! tests.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use rfs_core::{Permission, Reply, TRANSFER_UNIT};

/// Client-side failures.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("connect failed: {0}")]
    Connect(#[source] io::Error),

    #[error("i/o: {0}")]
    Io(#[from] io::Error),

    /// The server reported an `ERR_*` token.
    #[error("server replied {0}")]
    Server(Reply),

    #[error("unexpected reply: {0:?}")]
    Unexpected(String),

    #[error("payload of {0} bytes exceeds one transfer unit")]
    PayloadTooLarge(usize),
}

/// A client for one RFS server address.
pub struct RfsClient {
    addr: SocketAddr,
}

impl RfsClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    async fn connect(&self) -> Result<TcpStream, ClientError> {
        TcpStream::connect(self.addr)
            .await
            .map_err(ClientError::Connect)
    }

    /// Store `data` under `name`, optionally latching it read-only.
    pub async fn write_file(
        &self,
        name: &str,
        data: &[u8],
        hint: Permission,
    ) -> Result<(), ClientError> {
        if data.len() > TRANSFER_UNIT {
            return Err(ClientError::PayloadTooLarge(data.len()));
        }

        let mut stream = self.connect().await?;
        let line = match hint {
            Permission::ReadOnly => format!("WRITE {} RO\n", name),
            Permission::ReadWrite => format!("WRITE {} RW\n", name),
        };
        stream.write_all(line.as_bytes()).await?;
        expect_reply(&mut stream, Reply::ReadyToReceive).await?;

        stream.write_all(data).await?;
        // Half-close marks the end of the single-unit payload
        stream.shutdown().await?;

        expect_reply(&mut stream, Reply::WriteOk).await?;
        debug!("wrote {} bytes to {:?}", data.len(), name);
        Ok(())
    }

    /// Fetch the stored contents of `name` (at most one transfer unit).
    pub async fn get_file(&self, name: &str) -> Result<Vec<u8>, ClientError> {
        let mut stream = self.connect().await?;
        stream
            .write_all(format!("GET {}\n", name).as_bytes())
            .await?;

        // The server closes after the payload, so the whole response is
        // token-then-bytes with no delimiter.
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await?;

        let ok = Reply::SendingFile.token().as_bytes();
        if response.starts_with(ok) {
            debug!("fetched {} bytes of {:?}", response.len() - ok.len(), name);
            return Ok(response[ok.len()..].to_vec());
        }
        Err(error_from_response(&response))
    }

    /// Delete `name` on the server.
    pub async fn remove_file(&self, name: &str) -> Result<(), ClientError> {
        let mut stream = self.connect().await?;
        stream.write_all(format!("RM {}\n", name).as_bytes()).await?;

        let mut response = Vec::new();
        stream.read_to_end(&mut response).await?;

        let token = String::from_utf8_lossy(&response);
        match Reply::from_token(token.trim()) {
            Some(Reply::RmOk) => {
                debug!("removed {:?}", name);
                Ok(())
            }
            Some(reply) if reply.is_error() => Err(ClientError::Server(reply)),
            _ => Err(ClientError::Unexpected(token.into_owned())),
        }
    }
}

/// Read one reply token from the stream.
async fn read_reply(stream: &mut TcpStream) -> Result<Reply, ClientError> {
    let mut buf = [0u8; 64];
    let n = stream.read(&mut buf).await?;
    if n == 0 {
        return Err(ClientError::Unexpected(
            "connection closed before a reply".into(),
        ));
    }
    let token = String::from_utf8_lossy(&buf[..n]).trim().to_string();
    Reply::from_token(&token).ok_or(ClientError::Unexpected(token))
}

async fn expect_reply(stream: &mut TcpStream, expected: Reply) -> Result<(), ClientError> {
    let reply = read_reply(stream).await?;
    if reply == expected {
        Ok(())
    } else if reply.is_error() {
        Err(ClientError::Server(reply))
    } else {
        Err(ClientError::Unexpected(reply.token().into()))
    }
}

fn error_from_response(response: &[u8]) -> ClientError {
    let token = String::from_utf8_lossy(response);
    match Reply::from_token(token.trim()) {
        Some(reply) if reply.is_error() => ClientError::Server(reply),
        _ => ClientError::Unexpected(token.into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_oversized_payload_rejected_before_connect() {
        // Unroutable address: the size check must fire first
        let client = RfsClient::new("127.0.0.1:1".parse().unwrap());
        let big = vec![0u8; TRANSFER_UNIT + 1];

        match client.write_file("f", &big, Permission::ReadWrite).await {
            Err(ClientError::PayloadTooLarge(n)) => assert_eq!(n, TRANSFER_UNIT + 1),
            other => panic!("expected PayloadTooLarge, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_error_from_response() {
        match error_from_response(b"ERR_FILE_NOT_FOUND") {
            ClientError::Server(Reply::FileNotFound) => {}
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            error_from_response(b"garbage"),
            ClientError::Unexpected(_)
        ));
    }
}
