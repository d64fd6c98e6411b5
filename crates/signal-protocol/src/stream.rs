//! Message-per-read transport wrapper

use crate::{ProtocolError, MAX_PAYLOAD};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Wraps a byte stream with the protocol's message discipline: one read
/// call yields one message of at most [`MAX_PAYLOAD`] bytes, one send
/// writes one message whole.
///
/// The discipline holds because every exchange alternates strictly
/// between request and response; neither side sends again before the
/// reply to its previous message arrived.
#[derive(Debug)]
pub struct MessageStream<S> {
    io: S,
}

impl<S: AsyncRead + AsyncWrite + Unpin> MessageStream<S> {
    /// Wrap a connected transport.
    pub fn new(io: S) -> Self {
        Self { io }
    }

    /// Receive one message. An empty result means the peer closed the
    /// connection.
    pub async fn recv(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = vec![0u8; MAX_PAYLOAD];
        let n = self.io.read(&mut buf).await?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Receive one message, failing if the peer stalls longer than
    /// `timeout`. `None` waits indefinitely.
    pub async fn recv_timeout(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>, ProtocolError> {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, self.recv())
                .await
                .map_err(|_| ProtocolError::Timeout(limit))?,
            None => self.recv().await,
        }
    }

    /// Send one message.
    pub async fn send(&mut self, payload: &[u8]) -> Result<(), ProtocolError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(ProtocolError::Oversized(payload.len()));
        }
        self.io.write_all(payload).await?;
        self.io.flush().await?;
        Ok(())
    }

    /// Send a text token.
    pub async fn send_text(&mut self, text: &str) -> Result<(), ProtocolError> {
        self.send(text.as_bytes()).await
    }

    /// Consume the wrapper, returning the transport.
    pub fn into_inner(self) -> S {
        self.io
    }
}
