use crate::error::{RelayError, RoverError, TransportError};
use crate::messages::{
    control::camera::{CameraReply, CameraRequest, ErrorKind},
    relay::{FrameBundle, ToControl, ToRelay},
};
use crate::transport::{relay::RelayEnd, ReplyEndpoint};
use crate::utils::image::encode_bundle;
use std::{
    thread::{self, JoinHandle},
    time::Duration,
};
use uuid::Uuid;

/// Sleep between polls that found nothing to do.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Whether the relay has a client request in flight.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RelayState {
    /// Ready to accept the next client request.
    Idle,
    /// A request was forwarded and its frames have not come back yet. No
    /// client request is read in this state.
    AwaitingFrames,
}

/// What a single poll of the relay did.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RelayPoll {
    /// Nothing happened.
    Idle,
    /// A request or reply was handled.
    Busy,
    /// The relay is done and must not be polled again.
    Terminated,
}

/// Bridges the camera socket to the control loop. Client requests are
/// forwarded one at a time and answered with the encoded frames the
/// control loop sends back.
pub struct CameraRelay<S> {
    /// Unique id of the relay, tagged on its logs.
    uuid: Uuid,
    socket: S,
    link: RelayEnd,
    state: RelayState,
    poll_interval: Duration,
}

impl<S: ReplyEndpoint> CameraRelay<S> {
    /// * `socket`: camera reply socket.
    /// * `link`: relay end of the channel to the control loop.
    /// * `poll_interval`: sleep between idle polls in [`CameraRelay::run`].
    pub fn new(socket: S, link: RelayEnd, poll_interval: Duration) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            socket,
            link,
            state: RelayState::Idle,
            poll_interval,
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Handle whatever the control loop sent, then, only if no request is in
    /// flight, take the next client request.
    pub fn poll(&mut self) -> RelayPoll {
        let mut busy = false;

        match self.link.try_recv() {
            Ok(None) => {}
            Ok(Some(ToRelay::Terminate)) => {
                tracing::info!(relay = %self.uuid, "camera relay told to terminate");
                return RelayPoll::Terminated;
            }
            Ok(Some(ToRelay::Frames(bundle))) => {
                busy = true;
                self.reply_frames(bundle);
            }
            Ok(Some(ToRelay::CaptureFailed(e))) => {
                busy = true;
                self.finish(&CameraReply::from(&e));
            }
            Err(RelayError::Disconnected) => {
                tracing::warn!(relay = %self.uuid, "control loop went away");
                return RelayPoll::Terminated;
            }
        }

        if self.state == RelayState::AwaitingFrames {
            return if busy { RelayPoll::Busy } else { RelayPoll::Idle };
        }

        match self.socket.try_recv() {
            Ok(None) => {}
            Ok(Some(raw)) => {
                busy = true;
                if self.forward(&raw).is_err() {
                    tracing::warn!(relay = %self.uuid, "control loop went away");
                    return RelayPoll::Terminated;
                }
            }
            Err(TransportError::Codec(e)) => {
                busy = true;
                tracing::warn!(relay = %self.uuid, error = %e, "unreadable camera request");
                self.reply(&CameraReply::error(
                    ErrorKind::MalformedRequest,
                    format!("unreadable request: {e}"),
                ));
            }
            Err(e) => {
                tracing::warn!(relay = %self.uuid, error = %e, "failed to receive camera request");
            }
        }

        if busy {
            RelayPoll::Busy
        } else {
            RelayPoll::Idle
        }
    }

    /// Poll until terminated, sleeping whenever a poll found nothing to do.
    pub fn run(mut self) {
        tracing::info!(relay = %self.uuid, "camera relay running");
        loop {
            match self.poll() {
                RelayPoll::Terminated => break,
                RelayPoll::Idle => thread::sleep(self.poll_interval),
                RelayPoll::Busy => {}
            }
        }
        tracing::info!(relay = %self.uuid, "camera relay stopped");
    }

    fn forward(&mut self, raw: &str) -> Result<(), RelayError> {
        let request = match serde_json::from_str::<CameraRequest>(raw) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(relay = %self.uuid, error = %e, "malformed camera request");
                self.reply(&CameraReply::error(ErrorKind::MalformedRequest, e.to_string()));
                return Ok(());
            }
        };

        tracing::debug!(
            relay = %self.uuid,
            cameras = ?request.cameras,
            format = request.format.name(),
            "forwarding camera request"
        );
        if let Err(e) = self.link.send(ToControl::CameraRequest(request)) {
            self.socket.abandon();
            return Err(e);
        }
        self.state = RelayState::AwaitingFrames;
        Ok(())
    }

    fn reply_frames(&mut self, bundle: FrameBundle) {
        if self.state != RelayState::AwaitingFrames {
            tracing::warn!(relay = %self.uuid, "dropping frames with no request in flight");
            return;
        }
        let reply = match encode_bundle(bundle) {
            Ok(frames) => CameraReply::Frames(frames),
            Err(e) => {
                tracing::warn!(relay = %self.uuid, error = %e, "failed to encode frames");
                CameraReply::from(&e)
            }
        };
        self.finish(&reply);
    }

    /// Answer the request in flight and go back to idle.
    fn finish(&mut self, reply: &CameraReply) {
        if self.state != RelayState::AwaitingFrames {
            tracing::warn!(relay = %self.uuid, "dropping reply with no request in flight");
            return;
        }
        self.state = RelayState::Idle;
        self.reply(reply);
    }

    fn reply(&mut self, reply: &CameraReply) {
        match serde_json::to_string(reply) {
            Ok(text) => {
                if let Err(e) = self.socket.send(&text) {
                    tracing::warn!(relay = %self.uuid, error = %e, "failed to send camera reply");
                }
            }
            Err(e) => {
                tracing::error!(relay = %self.uuid, error = %e, "failed to serialise camera reply");
                self.socket.abandon();
            }
        }
    }
}

/// Unit struct to run a camera relay on its own thread.
pub struct CameraRelayController;

impl CameraRelayController {
    /// Spawn the relay thread. It ends on [`ToRelay::Terminate`] or when the
    /// control loop drops its end of the channel.
    ///
    /// * `relay`: relay to run.
    pub fn start<S>(relay: CameraRelay<S>) -> Result<JoinHandle<()>, RoverError>
    where
        S: ReplyEndpoint + Send + 'static,
    {
        thread::Builder::new()
            .name(String::from("camera-relay"))
            .spawn(move || relay.run())
            .map_err(RoverError::Spawn)
    }
}
