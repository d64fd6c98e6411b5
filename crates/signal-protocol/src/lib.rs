//! Device Session Wire Protocol
//!
//! The text/binary protocol spoken between edge signal heads and the
//! controller: short ASCII command tokens, and a chunked, per-chunk
//! acknowledged transfer for moving a camera frame over a transport
//! whose messages are capped at [`MAX_PAYLOAD`] bytes.
//!
//! Message boundaries are those of individual send/receive calls; there
//! is no internal length framing beyond the transfer's own header.
//! Correctness of the transfer relies on strict request/response
//! alternation (no pipelining).

mod command;
mod error;
mod stream;
mod transfer;

pub use command::Command;
pub use error::ProtocolError;
pub use stream::MessageStream;
pub use transfer::{parse_transfer_header, receive_frame_body, send_frame, transfer_header};

/// Maximum payload of a single message.
pub const MAX_PAYLOAD: usize = 512;

/// Device-side message buffers are one byte larger to allow a
/// terminator; servers never rely on one being present.
pub const MSG_BUF: usize = MAX_PAYLOAD + 1;

/// Positive acknowledgement token.
pub const ACK: &str = "OK";

/// Negative acknowledgement token.
pub const NACK: &str = "NOK";
