use crate::error::TransportError;
use futures::SinkExt;
use std::net::SocketAddr;
use tokio::{
    net::{TcpListener, TcpStream},
    runtime::Handle,
    sync::broadcast::{self, error::RecvError},
};
use tokio_util::{
    codec::{Framed, LinesCodec},
    sync::CancellationToken,
};

/// Messages buffered per subscriber before the slowest one starts losing them.
const SUBSCRIBER_BACKLOG: usize = 64;

/// Publish socket bound on a TCP port. Every connected subscriber gets
/// every line published after it connected. Nothing is read back.
pub struct TcpBroadcastSocket {
    local_addr: SocketAddr,
    publisher: broadcast::Sender<String>,
    shutdown: CancellationToken,
}

impl TcpBroadcastSocket {
    /// Bind the socket and start accepting subscribers on `runtime`.
    ///
    /// * `runtime`: handle of the runtime serving the subscribers.
    /// * `addr`: address to bind, e.g. `0.0.0.0:5001`.
    pub fn bind(runtime: &Handle, addr: &str) -> Result<Self, TransportError> {
        let listener =
            runtime
                .block_on(TcpListener::bind(addr))
                .map_err(|source| TransportError::Bind {
                    addr: addr.to_string(),
                    source,
                })?;
        let local_addr = listener.local_addr()?;
        let (publisher, _) = broadcast::channel(SUBSCRIBER_BACKLOG);
        let shutdown = CancellationToken::new();

        runtime.spawn(accept_subscribers(
            listener,
            publisher.clone(),
            shutdown.clone(),
        ));
        tracing::debug!(%local_addr, "broadcast socket bound");

        Ok(Self {
            local_addr,
            publisher,
            shutdown,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Publish one line to every subscriber. Returns how many subscribers
    /// it was queued for.
    pub fn publish(&self, message: &str) -> usize {
        self.publisher.send(message.to_string()).unwrap_or(0)
    }

    /// Number of currently connected subscribers.
    pub fn subscribers(&self) -> usize {
        self.publisher.receiver_count()
    }
}

impl Drop for TcpBroadcastSocket {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn accept_subscribers(
    listener: TcpListener,
    publisher: broadcast::Sender<String>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::debug!(%peer, "broadcast socket accepted subscriber");
                    let messages = publisher.subscribe();
                    tokio::spawn(serve_subscriber(stream, peer, messages, shutdown.clone()));
                }
                Err(e) => tracing::warn!(error = %e, "broadcast socket accept failed"),
            },
        }
    }
}

async fn serve_subscriber(
    stream: TcpStream,
    peer: SocketAddr,
    mut messages: broadcast::Receiver<String>,
    shutdown: CancellationToken,
) {
    let mut lines = Framed::new(stream, LinesCodec::new());
    loop {
        let message = tokio::select! {
            _ = shutdown.cancelled() => break,
            message = messages.recv() => message,
        };
        match message {
            Ok(message) => {
                if let Err(e) = lines.send(message).await {
                    tracing::debug!(%peer, error = %e, "subscriber went away");
                    break;
                }
            }
            Err(RecvError::Lagged(missed)) => {
                tracing::warn!(%peer, missed, "subscriber fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
