use crate::devices::hardware::camera::CameraId;
use crate::error::CaptureError;
use crate::messages::control::camera::CameraRequest;
use crate::utils::image::FormatSpec;
use std::collections::BTreeMap;

/// One raw camera capture, in the simulator's B,G,R,A layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// `height * width * 4` bytes, rows top to bottom.
    pub data: Vec<u8>,
    /// Capture time in milliseconds since the unix epoch.
    pub timestamp: i64,
    pub height: u32,
    pub width: u32,
}

/// Raw frames captured for one forwarded camera request.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBundle {
    /// Format spec carried over from the client request.
    pub format: FormatSpec,
    pub frames: BTreeMap<CameraId, RawFrame>,
}

/// Sent from the camera relay to the control loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ToControl {
    /// A client request waiting for frames.
    CameraRequest(CameraRequest),
}

/// Sent from the control loop to the camera relay.
#[derive(Debug, Clone, PartialEq)]
pub enum ToRelay {
    /// Frames for the request in flight.
    Frames(FrameBundle),
    /// The request in flight could not be captured.
    CaptureFailed(CaptureError),
    /// The run is over, the relay must shut down.
    Terminate,
}
