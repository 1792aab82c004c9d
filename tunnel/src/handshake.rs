//! The authentication record a client writes once at the start of every
//! control connection: a single JSON object terminated by a newline.
//!
//! The edge never answers it. A rejected client only learns about the
//! rejection from the connection being closed.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound for one handshake line, newline excluded.
pub const MAX_HANDSHAKE_LEN: u64 = 4096;

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AuthMessage {
    pub secret: String,
    pub service: String,
    pub public_port: u16,
}

// keeps secrets out of log lines
impl std::fmt::Debug for AuthMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthMessage")
            .field("service", &self.service)
            .field("public_port", &self.public_port)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("connection closed before a complete handshake was received")]
    Closed,

    #[error("handshake exceeds {} bytes", MAX_HANDSHAKE_LEN)]
    TooLong,

    #[error("malformed handshake: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("handshake requested public port 0")]
    InvalidPort,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub async fn write_auth<W>(writer: &mut W, msg: &AuthMessage) -> Result<(), HandshakeError>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(msg)?;
    line.push(b'\n');

    writer.write_all(&line).await?;
    writer.flush().await?;

    Ok(())
}

/// Reads exactly one handshake line from `reader`.
///
/// Anything the peer sent after the newline stays in the reader's buffer.
pub async fn read_auth<R>(reader: &mut R) -> Result<AuthMessage, HandshakeError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let read = (&mut *reader)
        .take(MAX_HANDSHAKE_LEN + 1)
        .read_until(b'\n', &mut line)
        .await?;

    if line.last() != Some(&b'\n') {
        return Err(if read as u64 > MAX_HANDSHAKE_LEN {
            HandshakeError::TooLong
        } else {
            HandshakeError::Closed
        });
    }

    let msg: AuthMessage = serde_json::from_slice(&line)?;
    if msg.public_port == 0 {
        return Err(HandshakeError::InvalidPort);
    }

    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, BufReader};

    fn web() -> AuthMessage {
        AuthMessage {
            secret: "s3cr3t".to_string(),
            service: "web".to_string(),
            public_port: 9000,
        }
    }

    #[tokio::test]
    async fn bytes_after_the_handshake_stay_buffered() {
        let (mut client, server) = duplex(1024);

        write_auth(&mut client, &web()).await.unwrap();
        client.write_all(b"GET / HTTP/1.0\r\n\r\n").await.unwrap();
        drop(client);

        let mut reader = BufReader::new(server);
        assert_eq!(read_auth(&mut reader).await.unwrap(), web());

        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"GET / HTTP/1.0\r\n\r\n");
    }

    #[tokio::test]
    async fn wire_format_is_one_json_line() {
        let mut out = Vec::new();
        write_auth(&mut out, &web()).await.unwrap();

        assert_eq!(out.last(), Some(&b'\n'));
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["secret"], "s3cr3t");
        assert_eq!(value["service"], "web");
        assert_eq!(value["public_port"], 9000);
    }

    #[tokio::test]
    async fn rejects_port_zero() {
        let mut reader = &b"{\"secret\":\"x\",\"service\":\"web\",\"public_port\":0}\n"[..];
        assert!(matches!(
            read_auth(&mut reader).await,
            Err(HandshakeError::InvalidPort)
        ));
    }

    #[tokio::test]
    async fn rejects_out_of_range_port() {
        let mut reader = &b"{\"secret\":\"x\",\"service\":\"web\",\"public_port\":70000}\n"[..];
        assert!(matches!(
            read_auth(&mut reader).await,
            Err(HandshakeError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn rejects_garbage() {
        let mut reader = &b"hello there\n"[..];
        assert!(matches!(
            read_auth(&mut reader).await,
            Err(HandshakeError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn rejects_oversized_line() {
        let line = vec![b'a'; MAX_HANDSHAKE_LEN as usize + 10];
        let mut reader = &line[..];
        assert!(matches!(
            read_auth(&mut reader).await,
            Err(HandshakeError::TooLong)
        ));
    }

    #[tokio::test]
    async fn reports_early_close() {
        let mut empty = &b""[..];
        assert!(matches!(
            read_auth(&mut empty).await,
            Err(HandshakeError::Closed)
        ));

        let mut truncated = &b"{\"secret\":\"x\""[..];
        assert!(matches!(
            read_auth(&mut truncated).await,
            Err(HandshakeError::Closed)
        ));
    }
}
