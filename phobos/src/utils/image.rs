use crate::devices::hardware::camera::CameraId;
use crate::error::EncodeError;
use crate::messages::control::camera::{EncodedFrame, EncodedFrameSet};
use crate::messages::relay::{FrameBundle, RawFrame};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat, ImageOutputFormat, RgbaImage};
use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Serialize, Serializer,
};
use serde_json::Value;
use std::io::Cursor;

/// Bytes per pixel in the simulator framebuffer.
pub const BGRA_CHANNELS: usize = 4;

/// JPEG quality used when a request does not name one.
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// Requested image format. Clients either send a bare name, `"png"`, or a
/// single entry map from name to options, `{"jpeg": {"quality": 80}}`.
/// Both shapes are kept so replies can echo the spec exactly as sent.
#[derive(Clone, Debug, PartialEq)]
pub enum FormatSpec {
    Name(String),
    NamedWithOptions(String, Value),
}

impl FormatSpec {
    pub fn from_name(name: impl Into<String>) -> Self {
        FormatSpec::Name(name.into())
    }

    /// Format name regardless of the shape it was sent in.
    pub fn name(&self) -> &str {
        match self {
            FormatSpec::Name(name) | FormatSpec::NamedWithOptions(name, _) => name,
        }
    }

    pub fn options(&self) -> Option<&Value> {
        match self {
            FormatSpec::Name(_) => None,
            FormatSpec::NamedWithOptions(_, options) => Some(options),
        }
    }

    /// Resolve the name against the image codecs, case insensitive.
    pub fn image_format(&self) -> Result<ImageFormat, EncodeError> {
        ImageFormat::from_extension(self.name())
            .ok_or_else(|| EncodeError::UnsupportedFormat(self.name().to_string()))
    }

    /// File extension for saving frames encoded with this spec.
    pub fn extension(&self) -> Result<&'static str, EncodeError> {
        let extensions = self.image_format()?.extensions_str();
        Ok(extensions.first().copied().unwrap_or("img"))
    }

    fn jpeg_quality(&self) -> u8 {
        self.options()
            .and_then(|options| options.get("quality"))
            .and_then(Value::as_u64)
            .map_or(DEFAULT_JPEG_QUALITY, |quality| quality.clamp(1, 100) as u8)
    }

    /// Encoder settings for the spec, failing for formats the codecs can
    /// read but not write.
    fn output_format(&self) -> Result<ImageOutputFormat, EncodeError> {
        match self.image_format()? {
            ImageFormat::Jpeg => Ok(ImageOutputFormat::Jpeg(self.jpeg_quality())),
            format => match ImageOutputFormat::from(format) {
                ImageOutputFormat::Unsupported(_) => {
                    Err(EncodeError::UnsupportedFormat(self.name().to_string()))
                }
                output => Ok(output),
            },
        }
    }
}

impl Serialize for FormatSpec {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            FormatSpec::Name(name) => serializer.serialize_str(name),
            FormatSpec::NamedWithOptions(name, options) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(name, options)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for FormatSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_any(FormatSpecVisitor {})
    }
}

/// Wrapper type for serde implementation.
struct FormatSpecVisitor {}

impl<'de> Visitor<'de> for FormatSpecVisitor {
    type Value = FormatSpec;

    fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("a format name or a single entry map of format name to options")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Ok(FormatSpec::Name(v.to_string()))
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let Some((name, options)) = map.next_entry::<String, Value>()? else {
            return Err(serde::de::Error::custom("format map has no format name"));
        };
        if map.next_key::<String>()?.is_some() {
            return Err(serde::de::Error::custom(
                "format map must hold exactly one format name",
            ));
        }
        Ok(FormatSpec::NamedWithOptions(name, options))
    }
}

/// Reorder B,G,R,A pixels into R,G,B,A in place.
pub fn bgra_to_rgba(mut data: Vec<u8>) -> Vec<u8> {
    for pixel in data.chunks_exact_mut(BGRA_CHANNELS) {
        pixel.swap(0, 2);
    }
    data
}

/// Encode one raw frame for a client: reorder the channels, compress in
/// the requested format, then base64 the result.
///
/// * `camera`: camera the frame came from, used in errors.
/// * `frame`: raw B,G,R,A capture.
/// * `format`: requested format, echoed into the result.
pub fn encode_frame(
    camera: CameraId,
    frame: RawFrame,
    format: &FormatSpec,
) -> Result<EncodedFrame, EncodeError> {
    let output = format.output_format()?;
    let compressed = compress(camera, frame.data, frame.width, frame.height, output)?;
    let b64_data = STANDARD.encode(compressed);
    Ok(EncodedFrame {
        timestamp: frame.timestamp,
        format: format.clone(),
        b64_data,
    })
}

/// Encode every frame of a bundle. One failure fails the whole bundle, a
/// client never gets a reply with cameras silently missing.
pub fn encode_bundle(bundle: FrameBundle) -> Result<EncodedFrameSet, EncodeError> {
    let FrameBundle { format, frames } = bundle;
    // Checked up front so an empty camera list still reports a bad format.
    format.output_format()?;

    let mut encoded = EncodedFrameSet::default();
    for (camera, frame) in frames {
        encoded.0.insert(camera, encode_frame(camera, frame, &format)?);
    }
    Ok(encoded)
}

fn compress(
    camera: CameraId,
    data: Vec<u8>,
    width: u32,
    height: u32,
    output: ImageOutputFormat,
) -> Result<Vec<u8>, EncodeError> {
    let expected = width as usize * height as usize * BGRA_CHANNELS;
    let invalid = |actual| EncodeError::InvalidFrame {
        camera,
        expected,
        actual,
    };
    if data.len() != expected {
        return Err(invalid(data.len()));
    }

    let actual = data.len();
    let pixels = RgbaImage::from_raw(width, height, bgra_to_rgba(data)).ok_or(invalid(actual))?;
    let image = match output {
        // JPEG has no alpha channel.
        ImageOutputFormat::Jpeg(_) => {
            DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(pixels).into_rgb8())
        }
        _ => DynamicImage::ImageRgba8(pixels),
    };

    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, output)
        .map_err(|source| EncodeError::Image { camera, source })?;
    Ok(bytes.into_inner())
}

#[cfg(test)]
mod tests {

    use super::*;
    use rstest::rstest;
    use std::collections::BTreeMap;

    /// Raw frame whose pixels are all different, in B,G,R,A order.
    fn gradient_frame(width: u32, height: u32) -> RawFrame {
        let data = (0..width * height)
            .flat_map(|i| [i as u8, (i * 3) as u8, (i * 7) as u8, 255 - i as u8])
            .collect();
        RawFrame {
            data,
            timestamp: 1_700_000_000_123,
            height,
            width,
        }
    }

    #[rstest]
    #[case(r#""png""#, FormatSpec::from_name("png"))]
    #[case(r#""JPEG""#, FormatSpec::from_name("JPEG"))]
    #[case(
        r#"{"jpeg": {"quality": 80}}"#,
        FormatSpec::NamedWithOptions(String::from("jpeg"), serde_json::json!({"quality": 80}))
    )]
    #[case(r#"{"png": null}"#, FormatSpec::NamedWithOptions(String::from("png"), Value::Null))]
    fn test_parse_format_spec(#[case] raw: &str, #[case] expected: FormatSpec) {
        let parsed: FormatSpec = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed, expected);
        // Echoed verbatim in whichever shape it arrived.
        assert_eq!(
            serde_json::to_value(&parsed).unwrap(),
            serde_json::from_str::<Value>(raw).unwrap()
        );
    }

    #[rstest]
    #[case("{}")]
    #[case(r#"{"png": null, "jpeg": null}"#)]
    #[case("42")]
    #[case(r#"["png"]"#)]
    fn test_reject_format_spec(#[case] raw: &str) {
        assert!(serde_json::from_str::<FormatSpec>(raw).is_err());
    }

    #[rstest]
    #[case("png", ImageFormat::Png)]
    #[case("PNG", ImageFormat::Png)]
    #[case("jpeg", ImageFormat::Jpeg)]
    #[case("jpg", ImageFormat::Jpeg)]
    #[case("bmp", ImageFormat::Bmp)]
    fn test_format_names_resolve(#[case] name: &str, #[case] format: ImageFormat) {
        assert_eq!(FormatSpec::from_name(name).image_format().unwrap(), format);
    }

    #[test]
    fn test_bgra_to_rgba() {
        let rgba = bgra_to_rgba(vec![1, 2, 3, 4, 10, 20, 30, 40]);
        assert_eq!(rgba, vec![3, 2, 1, 4, 30, 20, 10, 40]);
    }

    #[rstest]
    #[case(1, 1)]
    #[case(4, 4)]
    #[case(7, 3)]
    /// PNG is lossless, decoding the payload gives back the capture with
    /// the channels in R,G,B,A order.
    fn test_png_round_trip(#[case] width: u32, #[case] height: u32) {
        let frame = gradient_frame(width, height);
        let original = frame.data.clone();

        let encoded = encode_frame(CameraId::LeftNav, frame, &FormatSpec::from_name("png"))
            .expect("Failed to encode frame");
        assert_eq!(encoded.timestamp, 1_700_000_000_123);
        assert_eq!(encoded.format, FormatSpec::from_name("png"));

        let bytes = encoded.image_bytes().expect("Payload is not base64");
        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Png)
            .expect("Payload is not a png")
            .to_rgba8();
        assert_eq!(decoded.dimensions(), (width, height));
        assert_eq!(decoded.into_raw(), bgra_to_rgba(original));
    }

    #[test]
    fn test_jpeg_with_options() {
        let format =
            FormatSpec::NamedWithOptions(String::from("jpeg"), serde_json::json!({"quality": 90}));
        let encoded = encode_frame(CameraId::RightNav, gradient_frame(8, 8), &format)
            .expect("Failed to encode frame");
        assert_eq!(encoded.format, format);

        let bytes = encoded.image_bytes().unwrap();
        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg)
            .expect("Payload is not a jpeg");
        assert_eq!((decoded.width(), decoded.height()), (8, 8));
    }

    #[test]
    fn test_unsupported_format_fails_whole_bundle() {
        let mut frames = BTreeMap::new();
        frames.insert(CameraId::LeftNav, gradient_frame(2, 2));
        frames.insert(CameraId::RightNav, gradient_frame(2, 2));
        let bundle = FrameBundle {
            format: FormatSpec::from_name("not-a-format"),
            frames,
        };
        assert!(matches!(
            encode_bundle(bundle),
            Err(EncodeError::UnsupportedFormat(name)) if name == "not-a-format"
        ));
    }

    #[test]
    fn test_short_frame_is_rejected() {
        let mut frame = gradient_frame(4, 4);
        frame.data.truncate(60);
        assert!(matches!(
            encode_frame(CameraId::LeftDepth, frame, &FormatSpec::from_name("png")),
            Err(EncodeError::InvalidFrame {
                camera: CameraId::LeftDepth,
                expected: 64,
                actual: 60
            })
        ));
    }

    #[test]
    fn test_bundle_encodes_every_camera() {
        let mut frames = BTreeMap::new();
        frames.insert(CameraId::LeftNav, gradient_frame(2, 2));
        frames.insert(CameraId::LeftDepth, gradient_frame(3, 1));
        let bundle = FrameBundle {
            format: FormatSpec::from_name("png"),
            frames,
        };
        let encoded = encode_bundle(bundle).expect("Failed to encode bundle");
        assert_eq!(
            encoded.0.keys().copied().collect::<Vec<_>>(),
            vec![CameraId::LeftNav, CameraId::LeftDepth]
        );
        assert!(encoded.0.values().all(|frame| !frame.b64_data.is_empty()));
    }
}
