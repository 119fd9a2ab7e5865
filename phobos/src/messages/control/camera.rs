use crate::devices::hardware::camera::CameraId;
use crate::error::{CaptureError, EncodeError};
use crate::utils::image::FormatSpec;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum_macros::Display;

/// A client's request for the latest frame from one or more cameras.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct CameraRequest {
    /// Cameras to capture, each appears once in the reply.
    pub cameras: Vec<CameraId>,
    /// Image format every frame is encoded in.
    pub format: FormatSpec,
}

/// One encoded frame in a camera reply.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct EncodedFrame {
    /// Capture time in milliseconds since the unix epoch.
    pub timestamp: i64,
    /// Format from the request, echoed in the shape it was sent.
    pub format: FormatSpec,
    /// Encoded image bytes as standard base64 text.
    pub b64_data: String,
}

impl EncodedFrame {
    /// Decode the base64 payload back into encoded image bytes.
    pub fn image_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.b64_data)
    }
}

/// Encoded frames keyed by camera, the successful camera reply.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct EncodedFrameSet(pub BTreeMap<CameraId, EncodedFrame>);

/// Why a camera request could not be served.
#[derive(Deserialize, Serialize, Display, Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedRequest,
    UnsupportedFormat,
    InvalidFrame,
    EncodeFailed,
    CaptureFailed,
}

/// Body of an error reply on the camera socket.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ErrorReply {
    pub kind: ErrorKind,
    pub message: String,
}

/// Everything the camera socket can reply with. A reply is sent for every
/// request, so a client is never left waiting on its socket.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum CameraReply {
    Error { error: ErrorReply },
    Frames(EncodedFrameSet),
}

impl CameraReply {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        CameraReply::Error {
            error: ErrorReply {
                kind,
                message: message.into(),
            },
        }
    }
}

impl From<&EncodeError> for CameraReply {
    fn from(e: &EncodeError) -> Self {
        let kind = match e {
            EncodeError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            EncodeError::InvalidFrame { .. } => ErrorKind::InvalidFrame,
            EncodeError::Image { .. } => ErrorKind::EncodeFailed,
        };
        CameraReply::error(kind, e.to_string())
    }
}

impl From<&CaptureError> for CameraReply {
    fn from(e: &CaptureError) -> Self {
        CameraReply::error(ErrorKind::CaptureFailed, e.to_string())
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(r#"{"cameras": ["LeftNav"], "format": "png"}"#)]
    #[case(r#"{"cameras": ["LeftNav", "RightNav", "LeftDepth"], "format": "PNG"}"#)]
    #[case(r#"{"cameras": [], "format": {"jpeg": {"quality": 80}}}"#)]
    #[case(r#"{"cameras": ["RightNav"], "format": {"png": null}}"#)]
    fn test_parse_camera_request(#[case] raw_string: &str) {
        let _parsed: CameraRequest = serde_json::from_str(raw_string).unwrap();
    }

    #[rstest]
    #[case(r#"{"cameras": ["FrontHaz"], "format": "png"}"#)]
    #[case(r#"{"cameras": ["LeftNav"]}"#)]
    #[case(r#"{"cameras": ["LeftNav"], "format": {}}"#)]
    #[case(r#"{"cameras": "LeftNav", "format": "png"}"#)]
    #[case("not json")]
    fn test_reject_malformed_camera_request(#[case] raw_string: &str) {
        assert!(serde_json::from_str::<CameraRequest>(raw_string).is_err());
    }

    #[test]
    fn test_frame_set_serialises_keyed_by_camera() {
        let mut frames = EncodedFrameSet::default();
        frames.0.insert(
            CameraId::LeftNav,
            EncodedFrame {
                timestamp: 1_700_000_000_000,
                format: FormatSpec::from_name("png"),
                b64_data: String::from("AAAA"),
            },
        );
        let value = serde_json::to_value(CameraReply::Frames(frames.clone())).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "LeftNav": {"timestamp": 1_700_000_000_000_i64, "format": "png", "b64_data": "AAAA"}
            })
        );

        let parsed: CameraReply = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, CameraReply::Frames(frames));
    }

    #[test]
    fn test_error_reply_shape() {
        let reply = CameraReply::from(&EncodeError::UnsupportedFormat(String::from("xyz")));
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["error"]["kind"], "UnsupportedFormat");

        let parsed: CameraReply = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, reply);
    }
}
