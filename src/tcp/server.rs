use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::SinkExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_stream::StreamExt;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, warn};

use crate::ack::{requires_ack, Ack};
use crate::types::{Frame, Gt06Error, SessionId};
use crate::Gt06FrameCodec as Codec;

/// Collection server accepting GT06 terminals.
///
/// Every decoded frame is passed to the handler; login, location, alarm and
/// heartbeat frames are acknowledged first. Corrupt bytes on the line are
/// skipped by the codec, so a session only ends when the terminal hangs up or
/// the socket fails.
pub struct Gt06TcpServer {
    listener: TcpListener,
    sessions: Arc<AtomicU64>,
}

impl Gt06TcpServer {
    pub async fn bind(addr: &str) -> Result<Self, Gt06Error> {
        let listener = TcpListener::bind(addr).await?;
        info!("GT06 collection server listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            sessions: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Gt06Error> {
        self.listener.local_addr().map_err(Gt06Error::Io)
    }

    /// Accept terminals until the task is dropped, one spawned session each
    pub async fn run<F, Fut>(self, handler: F) -> Result<(), Gt06Error>
    where
        F: Fn(SessionId, Frame) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        loop {
            let (socket, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Failed to accept terminal: {}", e);
                    continue;
                }
            };

            let session_id = self.sessions.fetch_add(1, Ordering::Relaxed) + 1;
            info!("Session {} opened by {}", session_id, peer);

            let handler = handler.clone();
            tokio::spawn(async move {
                match serve_terminal(session_id, socket, handler).await {
                    Ok(frames) => info!("Session {} closed after {} frames", session_id, frames),
                    Err(e) => error!("Session {} failed: {}", session_id, e),
                }
            });
        }
    }
}

/// Acknowledge and dispatch frames from one terminal, returning how many
/// frames it sent
async fn serve_terminal<F, Fut>(
    session_id: SessionId,
    socket: TcpStream,
    handler: F,
) -> Result<u64, Gt06Error>
where
    F: Fn(SessionId, Frame) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut framed = Framed::new(socket, Codec::new());
    let mut frames = 0u64;

    while let Some(frame) = framed.next().await {
        let frame = frame?;
        frames += 1;
        debug!(
            "Session {} received {:?}, serial {}, {} payload bytes",
            session_id,
            frame.kind,
            frame.serial,
            frame.payload.len()
        );

        if requires_ack(frame.kind) {
            framed.send(Ack::for_frame(&frame)).await?;
        } else {
            warn!(
                "Session {} sent unacknowledged kind 0x{:02X}",
                session_id,
                frame.kind.as_u8()
            );
        }

        handler(session_id, frame).await;
    }

    Ok(frames)
}
