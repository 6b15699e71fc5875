//! Transport session framing
//!
//! Wraps one established TCP connection and frames whole protocol messages:
//! a command line, a reply token, or one payload transfer unit. Every
//! message is bounded by [`TRANSFER_UNIT`]; there is no length prefix or
//! multi-chunk framing.

use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::trace;

use rfs_core::{Reply, TRANSFER_UNIT};

/// A duplex byte-stream connection to one client.
pub struct TransportSession {
    stream: TcpStream,
    peer: SocketAddr,
}

impl TransportSession {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self { stream, peer }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Receive the command message and return its first line.
    ///
    /// One read of at most a transfer unit; the command is the bytes up to
    /// the first newline (or the whole message if none). The client sends
    /// nothing else until it has seen a reply, so nothing useful can follow
    /// the line in this message.
    pub async fn read_command(&mut self) -> io::Result<String> {
        let mut buf = vec![0u8; TRANSFER_UNIT];
        let n = self.stream.read(&mut buf).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before a command was received",
            ));
        }
        buf.truncate(n);

        let line_end = buf.iter().position(|&b| b == b'\n').unwrap_or(buf.len());
        let line = String::from_utf8_lossy(&buf[..line_end])
            .trim_end_matches('\r')
            .to_string();
        trace!("{}: command line {:?}", self.peer, line);
        Ok(line)
    }

    /// Receive one payload transfer unit.
    ///
    /// Reads until the peer half-closes or the unit is full. Returns however
    /// many bytes arrived; zero bytes is the caller's empty-payload case.
    pub async fn recv_unit(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; TRANSFER_UNIT];
        let mut filled = 0;
        while filled < TRANSFER_UNIT {
            let n = self.stream.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);
        trace!("{}: received {} payload bytes", self.peer, buf.len());
        Ok(buf)
    }

    /// Send a reply token.
    pub async fn send_reply(&mut self, reply: Reply) -> io::Result<()> {
        trace!("{}: reply {}", self.peer, reply);
        self.stream.write_all(reply.token().as_bytes()).await
    }

    /// Send raw payload bytes.
    pub async fn send_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        self.stream.write_all(data).await
    }
}
