use crate::error::TransportError;

/// Reply-pattern server socket over TCP with newline delimited JSON.
pub mod reply;
/// Broadcast-pattern publisher over TCP with newline delimited JSON.
pub mod broadcast;
/// Request-pattern client socket, the counterpart of [`reply`].
pub mod request;
/// Duplex in-process channel between the control loop and the camera relay.
pub mod relay;

/// Largest request line a reply socket accepts before dropping the peer.
pub const MAX_REQUEST_BYTES: usize = 64 * 1024;

/// Server side of a request/reply exchange, polled from a synchronous loop.
///
/// Implementations enforce strict alternation: after `try_recv` hands out
/// a request, the next call must be `send`, and `send` is only valid with a
/// request outstanding.
pub trait ReplyEndpoint {
    /// Take the next pending request without blocking. `Ok(None)` when no
    /// request is waiting.
    ///
    /// A request that arrived but could not be decoded as a line yields
    /// [`TransportError::Codec`] and still counts as outstanding: the owner
    /// must `send` a reply or `abandon` it.
    fn try_recv(&mut self) -> Result<Option<String>, TransportError>;

    /// Reply to the outstanding request.
    fn send(&mut self, reply: &str) -> Result<(), TransportError>;

    /// Give up on the outstanding request without replying. The peer that
    /// sent it is disconnected so it is not left waiting forever.
    fn abandon(&mut self);
}
