//! Chunked frame transfer
//!
//! Moves a single binary frame across the size-limited message
//! transport. The sender declares the total length in an `OK {filesize}`
//! header, then ships chunks of at most [`MAX_PAYLOAD`] bytes, each
//! individually acknowledged. A length mismatch earns a `NOK` and the
//! sender repeats the same chunk, giving at-least-once delivery per
//! chunk without sequence numbers.

use crate::{MessageStream, ProtocolError, ACK, MAX_PAYLOAD, NACK};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Build the transfer header for a frame of `len` bytes.
pub fn transfer_header(len: usize) -> String {
    format!("{ACK} {len}")
}

/// Parse a transfer header message into the declared file size.
///
/// A header carrying `NOK` means the sender could not prepare the frame;
/// anything that is not `OK {decimal}` is malformed.
pub fn parse_transfer_header(msg: &[u8]) -> Result<u64, ProtocolError> {
    let text = std::str::from_utf8(msg)
        .map_err(|_| ProtocolError::BadHeader(String::from_utf8_lossy(msg).into_owned()))?;
    if text.contains(NACK) {
        return Err(ProtocolError::Rejected);
    }
    let mut parts = text.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(ACK), Some(size), None) => size
            .parse::<u64>()
            .map_err(|_| ProtocolError::BadHeader(text.to_string())),
        _ => Err(ProtocolError::BadHeader(text.to_string())),
    }
}

/// Receive the body of a transfer whose header declared `filesize`
/// bytes, appending verified chunks to `dest`.
///
/// The caller has already parsed the header and acknowledged it. Each
/// received chunk must match the expected size `min(512, remaining)`
/// exactly; a mismatch is answered with `NOK` and the chunk is awaited
/// again without advancing the byte counter. A zero-length read aborts
/// the transfer; `dest` keeps whatever was written so far and the caller
/// must treat the frame as invalid.
pub async fn receive_frame_body<S, W>(
    stream: &mut MessageStream<S>,
    dest: &mut W,
    filesize: u64,
    read_timeout: Option<Duration>,
) -> Result<u64, ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut received: u64 = 0;
    while received < filesize {
        let expected = (filesize - received).min(MAX_PAYLOAD as u64) as usize;
        let chunk = stream.recv_timeout(read_timeout).await?;
        if chunk.is_empty() {
            return Err(ProtocolError::ConnectionClosed);
        }
        if chunk.len() == expected {
            dest.write_all(&chunk).await?;
            stream.send_text(ACK).await?;
            received += expected as u64;
        } else {
            debug!(
                got = chunk.len(),
                expected, "chunk length mismatch, requesting resend"
            );
            stream.send_text(NACK).await?;
        }
    }
    dest.flush().await?;
    Ok(received)
}

/// Send a whole frame: header, then acknowledged chunks.
///
/// A `NOK` reply to the header aborts (the receiver could not prepare
/// storage). A `NOK` reply to a chunk resends that same chunk. A
/// zero-length reply at any point means the peer is gone.
pub async fn send_frame<S>(
    stream: &mut MessageStream<S>,
    data: &[u8],
) -> Result<(), ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.send_text(&transfer_header(data.len())).await?;
    let reply = stream.recv().await?;
    if reply.is_empty() {
        return Err(ProtocolError::ConnectionClosed);
    }
    if contains_nack(&reply) {
        return Err(ProtocolError::Rejected);
    }

    let mut sent = 0;
    while sent < data.len() {
        let end = (sent + MAX_PAYLOAD).min(data.len());
        loop {
            stream.send(&data[sent..end]).await?;
            let reply = stream.recv().await?;
            if reply.is_empty() {
                return Err(ProtocolError::ConnectionClosed);
            }
            if !contains_nack(&reply) {
                break;
            }
            // receiver saw a short or torn chunk, repeat it
        }
        sent = end;
    }
    Ok(())
}

/// The transfer acknowledgement check is containment, not equality,
/// matching the deployed device firmware.
fn contains_nack(msg: &[u8]) -> bool {
    msg.windows(NACK.len()).any(|w| w == NACK.as_bytes())
}
