use crate::error::TransportError;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};

/// Client side of a reply socket. Every request waits for its reply, so a
/// connection can never have two requests in flight.
pub struct TcpRequestSocket {
    lines: Framed<TcpStream, LinesCodec>,
}

impl TcpRequestSocket {
    /// Connect to a reply socket.
    ///
    /// * `addr`: address of the server, e.g. `127.0.0.1:5000`.
    pub async fn connect(addr: &str) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr).await?;
        // Replies carry whole images, so no line limit on this side.
        Ok(Self {
            lines: Framed::new(stream, LinesCodec::new()),
        })
    }

    /// Send one request and wait for its reply.
    ///
    /// * `payload`: single line of JSON text.
    pub async fn request(&mut self, payload: &str) -> Result<String, TransportError> {
        self.lines.send(payload).await?;
        match self.lines.next().await {
            Some(reply) => Ok(reply?),
            None => Err(TransportError::Closed),
        }
    }
}
