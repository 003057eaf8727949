//! Frame - ingestion output, synchronizer input
//!
//! One frame produced by one channel for one capture instant.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::ChannelId;

/// A frame tagged with its channel and capture sequence number.
///
/// The payload type is generic so the synchronizer can carry device handles
/// it never looks into. The pipeline uses [`FramePayload`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame<P = FramePayload> {
    /// Producing channel
    pub channel: ChannelId,

    /// Capture instant, assigned by the device, shared across channels
    pub sequence: u64,

    /// Opaque data
    pub payload: P,
}

impl<P> Frame<P> {
    pub fn new(channel: impl Into<ChannelId>, sequence: u64, payload: P) -> Self {
        Self {
            channel: channel.into(),
            sequence,
            payload,
        }
    }

    /// Drop the tag and keep the payload
    pub fn into_payload(self) -> P {
        self.payload
    }
}

/// Frame payload produced by the camera pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FramePayload {
    /// Depth map, color image or rectified mono image
    Image(ImageData),

    /// Undecoded bytes (fallback)
    Raw(Bytes),
}

impl FramePayload {
    /// Size of the underlying buffer in bytes
    pub fn byte_len(&self) -> usize {
        match self {
            FramePayload::Image(image) => image.data.len(),
            FramePayload::Raw(bytes) => bytes.len(),
        }
    }
}

/// Image data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageData {
    pub width: u32,

    pub height: u32,

    pub format: ImageFormat,

    /// Row-major pixel data, `width * height * format.bytes_per_pixel()` bytes
    pub data: Bytes,
}

/// Pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    /// Little-endian u16 depth in millimetres
    Depth16,
    /// Interleaved RGB
    Rgb8,
    /// Single channel 8-bit (rectified mono)
    Gray8,
}

impl ImageFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            ImageFormat::Depth16 => 2,
            ImageFormat::Rgb8 => 3,
            ImageFormat::Gray8 => 1,
        }
    }
}

/// What a channel carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Stereo depth output
    Depth,
    /// Color camera (ISP output)
    Color,
    /// Rectified left mono image
    RectifiedLeft,
    /// Rectified right mono image
    RectifiedRight,
}

impl ChannelKind {
    /// Pixel format emitted by channels of this kind
    pub fn image_format(self) -> ImageFormat {
        match self {
            ChannelKind::Depth => ImageFormat::Depth16,
            ChannelKind::Color => ImageFormat::Rgb8,
            ChannelKind::RectifiedLeft | ChannelKind::RectifiedRight => ImageFormat::Gray8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_into_payload() {
        let frame = Frame::new("depth", 3, 42u32);
        assert_eq!(frame.channel, "depth");
        assert_eq!(frame.sequence, 3);
        assert_eq!(frame.into_payload(), 42);
    }

    #[test]
    fn test_kind_formats() {
        assert_eq!(ChannelKind::Depth.image_format().bytes_per_pixel(), 2);
        assert_eq!(ChannelKind::Color.image_format(), ImageFormat::Rgb8);
        assert_eq!(ChannelKind::RectifiedRight.image_format(), ImageFormat::Gray8);
    }

    #[test]
    fn test_kind_serde_snake_case() {
        let kind: ChannelKind = serde_json::from_str("\"rectified_left\"").unwrap();
        assert_eq!(kind, ChannelKind::RectifiedLeft);
    }
}
