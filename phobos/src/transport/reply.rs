use super::{ReplyEndpoint, MAX_REQUEST_BYTES};
use crate::error::TransportError;
use futures::{SinkExt, StreamExt};
use std::{net::SocketAddr, time::Duration};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    runtime::Handle,
    sync::{
        mpsc::{self, error::TryRecvError},
        oneshot,
    },
};
use tokio_util::{
    codec::{Framed, LinesCodec, LinesCodecError},
    sync::CancellationToken,
};

/// How long a connection that sent an unreadable line is drained before
/// it is closed.
const LINGER: Duration = Duration::from_secs(1);

/// A request read off a connection, with the way back to that connection.
/// Lines that could not be decoded are still queued so the owner sees them.
struct InboundRequest {
    payload: Result<String, LinesCodecError>,
    reply: PendingReply,
}

/// The way back to the connection a request came from.
struct PendingReply {
    peer: SocketAddr,
    sender: oneshot::Sender<String>,
}

/// Reply socket bound on a TCP port.
///
/// Connections are served by tasks on a tokio runtime. Each connection
/// reads one line, queues it, and does not read the next line until the
/// reply has been written. A client sending a second request before its
/// first reply therefore waits at the transport, it is never dropped.
pub struct TcpReplySocket {
    local_addr: SocketAddr,
    inbound: mpsc::UnboundedReceiver<InboundRequest>,
    pending: Option<PendingReply>,
    shutdown: CancellationToken,
}

impl TcpReplySocket {
    /// Bind the socket and start accepting connections on `runtime`.
    ///
    /// * `runtime`: handle of the runtime serving the connections. Must not
    ///   be called from inside that runtime.
    /// * `addr`: address to bind, e.g. `0.0.0.0:5000`.
    pub fn bind(runtime: &Handle, addr: &str) -> Result<Self, TransportError> {
        let listener =
            runtime
                .block_on(TcpListener::bind(addr))
                .map_err(|source| TransportError::Bind {
                    addr: addr.to_string(),
                    source,
                })?;
        let local_addr = listener.local_addr()?;
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        runtime.spawn(accept_connections(listener, inbound_tx, shutdown.clone()));
        tracing::debug!(%local_addr, "reply socket bound");

        Ok(Self {
            local_addr,
            inbound,
            pending: None,
            shutdown,
        })
    }

    /// Address the socket ended up bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl ReplyEndpoint for TcpReplySocket {
    fn try_recv(&mut self) -> Result<Option<String>, TransportError> {
        if self.pending.is_some() {
            return Err(TransportError::OutOfSequence(
                "receive while a reply is still owed",
            ));
        }
        match self.inbound.try_recv() {
            Ok(InboundRequest { payload, reply }) => {
                self.pending = Some(reply);
                payload.map(Some).map_err(TransportError::from)
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(TransportError::Closed),
        }
    }

    fn send(&mut self, reply: &str) -> Result<(), TransportError> {
        let pending = self
            .pending
            .take()
            .ok_or(TransportError::OutOfSequence("reply without a request"))?;
        pending.sender.send(reply.to_string()).map_err(|_| {
            tracing::debug!(peer = %pending.peer, "peer left before its reply");
            TransportError::PeerGone
        })
    }

    fn abandon(&mut self) {
        if let Some(pending) = self.pending.take() {
            tracing::debug!(peer = %pending.peer, "abandoning request, closing connection");
        }
    }
}

impl Drop for TcpReplySocket {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn accept_connections(
    listener: TcpListener,
    inbound: mpsc::UnboundedSender<InboundRequest>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::debug!(%peer, "reply socket accepted connection");
                    tokio::spawn(serve_connection(stream, peer, inbound.clone(), shutdown.clone()));
                }
                Err(e) => tracing::warn!(error = %e, "reply socket accept failed"),
            },
        }
    }
}

/// Serve one connection in strict request/reply lockstep.
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    inbound: mpsc::UnboundedSender<InboundRequest>,
    shutdown: CancellationToken,
) {
    let mut lines = Framed::new(stream, LinesCodec::new_with_max_length(MAX_REQUEST_BYTES));
    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => break,
            next = lines.next() => next,
        };
        let Some(payload) = next else {
            break;
        };
        // The framing cannot recover from a bad line, this is the last request.
        let unreadable = payload.is_err();
        if let Err(e) = &payload {
            tracing::warn!(%peer, error = %e, "unreadable request");
        }

        let (sender, reply_rx) = oneshot::channel();
        let request = InboundRequest {
            payload,
            reply: PendingReply { peer, sender },
        };
        if inbound.send(request).is_err() {
            break;
        }

        let reply = tokio::select! {
            _ = shutdown.cancelled() => break,
            reply = reply_rx => reply,
        };
        let answered = match reply {
            Ok(reply) => {
                if let Err(e) = lines.send(reply).await {
                    tracing::warn!(%peer, error = %e, "failed to write reply");
                    break;
                }
                true
            }
            // The owner abandoned the request, the peer gets no reply.
            Err(_) => false,
        };
        if unreadable {
            linger_close(lines).await;
            break;
        }
        if !answered {
            break;
        }
    }
    tracing::debug!(%peer, "reply socket connection closed");
}

/// Close a connection whose peer may still be sending, without a reset
/// wiping out the reply already written. The write half is shut down, then
/// whatever the peer still sends is discarded until it closes or `LINGER`
/// runs out.
async fn linger_close(lines: Framed<TcpStream, LinesCodec>) {
    let mut stream = lines.into_inner();
    if stream.shutdown().await.is_err() {
        return;
    }
    let mut discard = [0u8; 4096];
    let drain = async {
        while let Ok(read) = stream.read(&mut discard).await {
            if read == 0 {
                break;
            }
        }
    };
    let _ = tokio::time::timeout(LINGER, drain).await;
}
