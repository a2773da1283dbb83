//! Frame encoding
//!
//! Compresses composited frames into single JPEG images for the multipart
//! feed. The encoder is stateless between calls so one instance can be
//! shared by every viewer loop.

mod jpeg;

pub use jpeg::JpegEncoder;

use crate::error::Result;
use crate::types::{EncodedChunk, FrameBuffer};

/// Compresses a raw frame into a transport-ready image
pub trait FrameEncoder: Send + Sync {
    /// Encode one frame
    ///
    /// Fails with `FramecastError::Encode` when the buffer shape is unsupported
    /// or the codec rejects the frame.
    fn encode(&self, frame: &FrameBuffer) -> Result<EncodedChunk>;
}

/// Check whether FFmpeg provides the MJPEG encoder
pub fn jpeg_available() -> bool {
    jpeg::mjpeg_encoder_available()
}

/// FFmpeg library version as `major.minor.micro`
pub fn ffmpeg_version() -> String {
    let v = ffmpeg_next::util::version();
    format!("{}.{}.{}", v >> 16, (v >> 8) & 0xff, v & 0xff)
}
