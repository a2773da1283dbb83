//! Upstream video capture
//!
//! This module handles:
//! - Opening network camera sources through a pluggable backend
//! - The per-session capture worker that reads frames on its own thread
//! - The registry of sessions keyed by id

pub mod ffmpeg;
pub mod registry;
pub mod session;

pub use self::ffmpeg::FfmpegBackend;
pub use registry::SessionRegistry;
pub use session::{CaptureSession, SessionState, SessionStatus, StartAck, StopAck};

use crate::error::Result;
use crate::types::FrameBuffer;

/// An open connection to a live video source
///
/// Owned by exactly one capture worker. Dropping it releases the upstream
/// connection. Implementations need not be `Send`: the backend opens the
/// source on the worker thread that reads from it.
pub trait FrameSource {
    /// Block until the next frame is decoded
    ///
    /// Fails with `FramecastError::EndOfStream` when the upstream closes or
    /// errors. Returned frames must be well formed RGB24; the session assigns
    /// their sequence numbers.
    fn read_frame(&mut self) -> Result<FrameBuffer>;
}

/// Opens capture resources for source addresses
pub trait CaptureBackend: Send + Sync {
    /// Open a source
    ///
    /// Fails with `FramecastError::StreamOpen` when the address is
    /// unreachable, malformed or unsupported.
    fn open(&self, source: &str) -> Result<Box<dyn FrameSource>>;

    /// Short backend name for logs
    fn name(&self) -> &'static str {
        "capture"
    }
}
