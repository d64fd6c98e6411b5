//! Device session handler
//!
//! One handler per accepted connection. The first message is the
//! claimed approach identity; a failed claim closes the connection
//! without a reply. A successful claim receives the device's polling
//! interval and enters the command loop until `/exit`, disconnect, or a
//! transfer failure. The registry slot is released by the session
//! handle's drop, exactly once, whatever way the handler ends.

use approach_registry::{Registry, SessionHandle};
use chrono::Utc;
use reporting::SiteLayout;
use signal_protocol::{
    parse_transfer_header, receive_frame_body, Command, MessageStream, ProtocolError, ACK,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{error, info, warn};

/// Shared dependencies of every session handler.
#[derive(Clone)]
pub(crate) struct SessionContext {
    pub registry: Arc<Registry>,
    pub layout: SiteLayout,
    pub poll_interval: u32,
    pub read_timeout: Option<Duration>,
}

/// Errors that end a session.
#[derive(Debug, Error)]
pub(crate) enum SessionError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("frame storage failed: {0}")]
    Storage(#[from] std::io::Error),
}

/// Serve one connection to completion.
pub(crate) async fn handle_session<S>(io: S, ctx: SessionContext)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = MessageStream::new(io);

    let claim = match stream.recv_timeout(ctx.read_timeout).await {
        Ok(msg) if !msg.is_empty() => msg,
        Ok(_) => return,
        Err(e) => {
            warn!(error = %e, "connection lost before registration");
            return;
        }
    };

    let name = String::from_utf8_lossy(&claim);
    let handle = match ctx.registry.bind(&name) {
        Ok(handle) => handle,
        Err(e) => {
            // silent rejection: no reply, the device sees only the close
            warn!(error = %e, "registration rejected");
            return;
        }
    };

    info!(approach = %handle.id(), "signal head connected");
    match serve(&mut stream, &handle, &ctx).await {
        Ok(()) => info!(approach = %handle.id(), "signal head disconnected"),
        Err(e) => error!(approach = %handle.id(), error = %e, "session failed"),
    }
    // dropping `handle` releases the registry slot
}

/// The command loop of a registered session.
async fn serve<S>(
    stream: &mut MessageStream<S>,
    handle: &SessionHandle,
    ctx: &SessionContext,
) -> Result<(), SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // the device paces its uploads by this token
    stream.send_text(&ctx.poll_interval.to_string()).await?;

    loop {
        let msg = stream.recv_timeout(ctx.read_timeout).await?;
        if msg.is_empty() {
            // peer closed without /exit
            return Ok(());
        }
        match Command::parse(&msg) {
            Some(Command::SendImage) => {
                stream.send_text(ACK).await?;
                receive_image(stream, handle, ctx).await?;
            }
            Some(Command::GetLed) => {
                stream.send_text(&handle.leds().to_wire()).await?;
            }
            Some(Command::Exit) => {
                stream.send_text(ACK).await?;
                return Ok(());
            }
            // unrecognized content is not an error
            None => {}
        }
    }
}

/// Receiving side of the frame transfer. Any failure here is fatal for
/// the session; a partially written frame stays on disk and is treated
/// as invalid by its consumers.
async fn receive_image<S>(
    stream: &mut MessageStream<S>,
    handle: &SessionHandle,
    ctx: &SessionContext,
) -> Result<(), SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let header = stream.recv_timeout(ctx.read_timeout).await?;
    if header.is_empty() {
        return Err(ProtocolError::ConnectionClosed.into());
    }
    let filesize = parse_transfer_header(&header)?;

    let stamp = Utc::now().timestamp();
    let path = ctx.layout.frame_path(handle.id(), stamp);
    // a storage failure aborts before any reply is sent
    let mut file = tokio::fs::File::create(&path).await?;
    handle.set_frame_stamp(stamp);

    stream.send_text(ACK).await?;
    let received = receive_frame_body(stream, &mut file, filesize, ctx.read_timeout).await?;
    info!(
        approach = %handle.id(),
        received,
        declared = filesize,
        "frame stored"
    );
    Ok(())
}
