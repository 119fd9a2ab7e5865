use crate::error::RelayError;
use crate::messages::relay::{ToControl, ToRelay};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

/// One end of the relay channel: sends `Tx`, receives `Rx`. Messages are
/// delivered in order and moved across, never shared.
pub struct RelayEndpoint<Tx, Rx> {
    sender: Sender<Tx>,
    receiver: Receiver<Rx>,
}

/// Control loop end, sends frames and receives camera requests.
pub type ControlEnd = RelayEndpoint<ToRelay, ToControl>;

/// Camera relay end, sends camera requests and receives frames.
pub type RelayEnd = RelayEndpoint<ToControl, ToRelay>;

/// Create both ends of a fresh relay channel.
pub fn relay_channel() -> (ControlEnd, RelayEnd) {
    let (to_relay_tx, to_relay_rx) = mpsc::channel();
    let (to_control_tx, to_control_rx) = mpsc::channel();
    (
        RelayEndpoint {
            sender: to_relay_tx,
            receiver: to_control_rx,
        },
        RelayEndpoint {
            sender: to_control_tx,
            receiver: to_relay_rx,
        },
    )
}

impl<Tx, Rx> RelayEndpoint<Tx, Rx> {
    pub fn send(&self, message: Tx) -> Result<(), RelayError> {
        self.sender
            .send(message)
            .map_err(|_| RelayError::Disconnected)
    }

    /// Take the next message without blocking, `Ok(None)` if none is waiting.
    pub fn try_recv(&self) -> Result<Option<Rx>, RelayError> {
        match self.receiver.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(RelayError::Disconnected),
        }
    }
}
