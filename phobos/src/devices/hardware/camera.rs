use crate::error::CaptureError;
use crate::messages::relay::RawFrame;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// Cameras that clients can ask for by name.
#[derive(
    EnumString,
    IntoStaticStr,
    Display,
    EnumIter,
    Deserialize,
    Serialize,
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
)]
pub enum CameraId {
    /// Left navigation camera.
    LeftNav,
    /// Right navigation camera.
    RightNav,
    /// Left depth camera (range finder).
    LeftDepth,
}

impl CameraId {
    /// Name of the device inside the simulation world.
    pub fn device_name(self) -> &'static str {
        match self {
            CameraId::LeftNav => "l_cam",
            CameraId::RightNav => "r_cam",
            CameraId::LeftDepth => "l_depth",
        }
    }
}

/// A camera exposed by the simulation host. Frames are in the simulator's
/// native layout: `height * width` pixels of B,G,R,A bytes.
pub trait CameraDevice {
    /// Start sampling every `sample_period_ms` of simulated time.
    fn enable(&mut self, sample_period_ms: u32);

    /// Latest sampled framebuffer, `None` until the first sample lands.
    fn image(&self) -> Option<Vec<u8>>;

    fn width(&self) -> u32;

    fn height(&self) -> u32;
}

/// Read the latest frame out of a camera and stamp it with the wall clock.
///
/// * `id`: camera the frame is reported under.
/// * `camera`: device to read.
pub fn capture<C: CameraDevice>(id: CameraId, camera: &C) -> Result<RawFrame, CaptureError> {
    let data = camera.image().ok_or(CaptureError::NoFrame(id))?;
    Ok(RawFrame {
        data,
        timestamp: Utc::now().timestamp_millis(),
        height: camera.height(),
        width: camera.width(),
    })
}
