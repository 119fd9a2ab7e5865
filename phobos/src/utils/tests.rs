/// Macro that helps to check test file exist at compile time.
/// [link](https://stackoverflow.com/questions/30003921/how-can-i-locate-resources-for-testing-with-cargo)
/// [link](https://stackoverflow.com/questions/73187970/compile-time-check-if-file-at-path-exists-like-include-str)
#[macro_export]
macro_rules! test_file_path {
    ($arg1:expr) => {{
        let _ = include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), $arg1));
        concat!(env!("CARGO_MANIFEST_DIR"), $arg1)
    }};
}

#[cfg(test)]
pub use doubles::*;

/// Test doubles that record what the controller does to them, in order.
#[cfg(test)]
mod doubles {
    use crate::devices::hardware::motor::Motor;
    use crate::error::TransportError;
    use crate::transport::ReplyEndpoint;
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
    };
    use tokio_util::codec::LinesCodecError;

    /// One observable interaction with a double.
    #[derive(Clone, Debug, PartialEq)]
    pub enum Call {
        Recv(String),
        Reply(String),
        Abandon,
        Position(&'static str, f64),
        Velocity(&'static str, f64),
    }

    /// Log shared between doubles so ordering across them can be checked.
    pub type CallLog = Arc<Mutex<Vec<Call>>>;

    pub fn call_log() -> CallLog {
        Arc::new(Mutex::new(Vec::new()))
    }

    /// What the next receive on a [`RecordingReplySocket`] produces.
    enum Inbound {
        Request(String),
        /// A request arrived that could not be decoded as a line.
        Unreadable,
        /// The socket itself failed.
        Broken(std::io::ErrorKind),
    }

    #[derive(Default)]
    struct SocketState {
        inbound: VecDeque<Inbound>,
        pending: bool,
        recv_attempts: usize,
        replies: Vec<String>,
    }

    /// Reply socket fed from a queue. Enforces the same alternation as the
    /// TCP socket and counts every receive attempt.
    #[derive(Clone)]
    pub struct RecordingReplySocket {
        state: Arc<Mutex<SocketState>>,
        log: CallLog,
    }

    impl RecordingReplySocket {
        pub fn new(log: CallLog) -> Self {
            Self {
                state: Arc::default(),
                log,
            }
        }

        /// Queue a request as if a client had sent it.
        pub fn push_request(&self, request: &str) {
            self.state
                .lock()
                .unwrap()
                .inbound
                .push_back(Inbound::Request(request.to_string()));
        }

        /// Queue a request whose line could not be decoded, e.g. one that
        /// was not UTF-8. It is outstanding once received.
        pub fn push_unreadable_request(&self) {
            self.state
                .lock()
                .unwrap()
                .inbound
                .push_back(Inbound::Unreadable);
        }

        /// Make the next receive fail at the socket layer.
        pub fn push_transport_error(&self, kind: std::io::ErrorKind) {
            self.state
                .lock()
                .unwrap()
                .inbound
                .push_back(Inbound::Broken(kind));
        }

        pub fn replies(&self) -> Vec<String> {
            self.state.lock().unwrap().replies.clone()
        }

        /// Requests still waiting to be received.
        pub fn queued(&self) -> usize {
            self.state.lock().unwrap().inbound.len()
        }

        pub fn recv_attempts(&self) -> usize {
            self.state.lock().unwrap().recv_attempts
        }
    }

    impl ReplyEndpoint for RecordingReplySocket {
        fn try_recv(&mut self) -> Result<Option<String>, TransportError> {
            let mut state = self.state.lock().unwrap();
            state.recv_attempts += 1;
            if state.pending {
                return Err(TransportError::OutOfSequence("receive while a reply is owed"));
            }
            match state.inbound.pop_front() {
                Some(Inbound::Request(request)) => {
                    state.pending = true;
                    self.log.lock().unwrap().push(Call::Recv(request.clone()));
                    Ok(Some(request))
                }
                Some(Inbound::Unreadable) => {
                    state.pending = true;
                    Err(TransportError::Codec(LinesCodecError::MaxLineLengthExceeded))
                }
                Some(Inbound::Broken(kind)) => Err(TransportError::Io(kind.into())),
                None => Ok(None),
            }
        }

        fn send(&mut self, reply: &str) -> Result<(), TransportError> {
            let mut state = self.state.lock().unwrap();
            if !state.pending {
                return Err(TransportError::OutOfSequence("reply without a request"));
            }
            state.pending = false;
            state.replies.push(reply.to_string());
            self.log.lock().unwrap().push(Call::Reply(reply.to_string()));
            Ok(())
        }

        fn abandon(&mut self) {
            self.state.lock().unwrap().pending = false;
            self.log.lock().unwrap().push(Call::Abandon);
        }
    }

    /// Motor that only records its setpoints.
    #[derive(Clone)]
    pub struct RecordingMotor {
        name: &'static str,
        log: CallLog,
    }

    impl RecordingMotor {
        pub fn new(name: &'static str, log: CallLog) -> Self {
            Self { name, log }
        }
    }

    impl Motor for RecordingMotor {
        fn set_position(&mut self, position_rad: f64) {
            self.log
                .lock()
                .unwrap()
                .push(Call::Position(self.name, position_rad));
        }

        fn set_velocity(&mut self, speed_rads: f64) {
            self.log
                .lock()
                .unwrap()
                .push(Call::Velocity(self.name, speed_rads));
        }
    }
}
