//! Core types for Framecast
//!
//! These types represent the data that flows through the live pipeline:
//! raw frames out of the capture session and encoded chunks into the
//! viewer connections.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Multipart boundary used by the video feed
pub const MULTIPART_BOUNDARY: &str = "frame";

/// Content type of the video feed response
pub const MULTIPART_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Content type of every part in the video feed
pub const PART_CONTENT_TYPE: &str = "image/jpeg";

/// Global counter for viewer ids
static VIEWER_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Opaque id for a connected viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewerId(u64);

impl ViewerId {
    /// Allocate a new unique viewer id
    pub fn new() -> Self {
        Self(VIEWER_COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the raw id value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ViewerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ViewerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Viewer({})", self.0)
    }
}

/// Key of a capture session in the registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Name of the session driven by the HTTP API
    pub const DEFAULT: &'static str = "default";

    /// Create a session id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The session used by `/api/stream/*`
    pub fn default_session() -> Self {
        Self::new(Self::DEFAULT)
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A raw decoded frame
///
/// Pixels are packed RGB24, row-major, no padding: `data.len() == width * height * 3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Packed RGB24 pixels
    pub data: Vec<u8>,
    /// Position of this frame in its session's read order
    pub sequence: u64,
}

impl FrameBuffer {
    /// Bytes per pixel of the packed layout
    pub const BYTES_PER_PIXEL: usize = 3;

    /// Create a frame filled with a single colour
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixels * Self::BYTES_PER_PIXEL);
        for _ in 0..pixels {
            data.extend_from_slice(&rgb);
        }
        Self {
            width,
            height,
            data,
            sequence: 0,
        }
    }

    /// Expected length of `data` for the frame's dimensions
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * Self::BYTES_PER_PIXEL
    }

    /// Whether dimensions and data length agree
    pub fn is_well_formed(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == self.expected_len()
    }

    /// Read one pixel, `None` when out of bounds
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * Self::BYTES_PER_PIXEL;
        self.data
            .get(idx..idx + Self::BYTES_PER_PIXEL)
            .map(|p| [p[0], p[1], p[2]])
    }

    /// Write one pixel, ignoring out-of-bounds coordinates
    pub fn put_pixel(&mut self, x: i64, y: i64, rgb: [u8; 3]) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let idx = (y as usize * self.width as usize + x as usize) * Self::BYTES_PER_PIXEL;
        if let Some(px) = self.data.get_mut(idx..idx + Self::BYTES_PER_PIXEL) {
            px.copy_from_slice(&rgb);
        }
    }
}

/// A compressed frame ready for the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedChunk {
    /// Sequence of the frame this chunk was encoded from
    pub sequence: u64,
    /// JPEG bytes
    pub jpeg: Bytes,
}

impl EncodedChunk {
    /// Create a chunk from encoded image bytes
    pub fn new(sequence: u64, jpeg: impl Into<Bytes>) -> Self {
        Self {
            sequence,
            jpeg: jpeg.into(),
        }
    }

    /// Frame the image as one multipart part
    ///
    /// `--frame\r\nContent-Type: image/jpeg\r\n\r\n<bytes>\r\n`
    pub fn to_multipart(&self) -> Bytes {
        let header = format!("--{MULTIPART_BOUNDARY}\r\nContent-Type: {PART_CONTENT_TYPE}\r\n\r\n");
        let mut buf = BytesMut::with_capacity(header.len() + self.jpeg.len() + 2);
        buf.put_slice(header.as_bytes());
        buf.put_slice(&self.jpeg);
        buf.put_slice(b"\r\n");
        buf.freeze()
    }
}
