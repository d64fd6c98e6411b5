//! Protocol Error Types

use thiserror::Error;

/// Errors that can occur on the device wire.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Underlying transport error.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// Peer closed the connection (zero-length read).
    #[error("peer closed the connection")]
    ConnectionClosed,

    /// Read timed out; the peer stalled mid-exchange.
    #[error("read timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Transfer header did not parse as `OK {filesize}`.
    #[error("malformed transfer header {0:?}")]
    BadHeader(String),

    /// Peer answered the transfer header with a negative acknowledgement.
    #[error("transfer rejected by peer")]
    Rejected,

    /// Outgoing message exceeds the payload cap.
    #[error("message of {0} bytes exceeds the {max}-byte payload limit", max = crate::MAX_PAYLOAD)]
    Oversized(usize),
}
