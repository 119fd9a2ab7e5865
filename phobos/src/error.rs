//! Error types for the rover bridge.
//!
//! Errors are split by the path they travel on. Anything on the command
//! path ([`CommandError`]) ends the run, while errors on the camera path
//! ([`EncodeError`], [`CaptureError`]) are reported back to the requesting
//! client and the relay keeps serving.

use crate::devices::hardware::camera::CameraId;
use std::path::PathBuf;
use thiserror::Error;
use tokio_util::codec::LinesCodecError;

/// Result type alias for the rover start-up and shutdown.
pub type Result<T, E = RoverError> = std::result::Result<T, E>;

/// Failures of the request/reply and broadcast sockets.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to bind {addr}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("socket io failed")]
    Io(#[from] std::io::Error),

    #[error("line framing failed")]
    Codec(#[from] LinesCodecError),

    /// A reply socket was used out of its receive/send alternation.
    #[error("reply socket used out of sequence: {0}")]
    OutOfSequence(&'static str),

    /// The peer that sent the pending request disconnected before the reply.
    #[error("peer disconnected before the reply was sent")]
    PeerGone,

    #[error("socket closed")]
    Closed,
}

/// Anything that stops a demand from being received and acknowledged.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("command transport failed")]
    Transport(#[from] TransportError),

    #[error("malformed demand")]
    Malformed(#[from] serde_json::Error),
}

/// The other end of the relay channel has gone away.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RelayError {
    #[error("relay channel disconnected")]
    Disconnected,
}

/// Failures while turning a raw framebuffer into a client payload.
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("unsupported image format {0:?}")]
    UnsupportedFormat(String),

    #[error("{camera} frame holds {actual} bytes, expected {expected}")]
    InvalidFrame {
        camera: CameraId,
        expected: usize,
        actual: usize,
    },

    #[error("failed to encode {camera} frame")]
    Image {
        camera: CameraId,
        #[source]
        source: image::ImageError,
    },
}

/// Failures while reading a camera on the control side.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("camera {0} is not fitted to this rover")]
    UnknownCamera(CameraId),

    #[error("camera {0} has not sampled a frame yet")]
    NoFrame(CameraId),
}

/// The simulation host is missing equipment the rover expects.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DeviceError {
    #[error("simulation host has no motor named {0:?}")]
    MissingMotor(&'static str),

    #[error("simulation host has no camera named {0:?}")]
    MissingCamera(&'static str),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not locate the config file {0:?}")]
    NotFound(PathBuf),

    #[error("failed to parse config file")]
    Parse(#[from] config::ConfigError),
}

/// Top level error for bringing the rover up and down.
#[derive(Error, Debug)]
pub enum RoverError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to build the async runtime")]
    Runtime(#[source] std::io::Error),

    #[error("failed to spawn the camera relay thread")]
    Spawn(#[source] std::io::Error),

    #[error("camera relay thread panicked")]
    RelayPanicked,
}
