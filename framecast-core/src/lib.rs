//! Framecast Core Library
//!
//! Live camera re-streaming with overlays.
//!
//! This library provides:
//! - RTSP/network camera capture via FFmpeg on a dedicated worker thread
//! - Text overlay compositing with a built-in bitmap font
//! - JPEG encoding and `multipart/x-mixed-replace` fan-out to HTTP viewers
//! - An axum API for stream control, overlays and settings
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────┐    ┌────────────────────┐
//! │ Capture Session │───▶│  broadcast   │───▶│ Viewer loop (each) │──▶ HTTP body
//! │ (worker thread) │    │ Arc<Frame>   │    │ composite + JPEG   │
//! └─────────────────┘    └──────────────┘    └────────────────────┘
//!                                                     ▲
//!                                            overlay snapshots
//! ```

pub mod capture;
pub mod composite;
pub mod config;
pub mod encode;
pub mod error;
pub mod metrics;
pub mod overlay;
pub mod publisher;
pub mod server;
pub mod store;
pub mod types;

pub use capture::{CaptureBackend, CaptureSession, FrameSource, SessionRegistry, SessionState, SessionStatus};
pub use composite::FrameCompositor;
pub use config::{CaptureOptions, ConfigFile, PublisherOptions, RuntimeConfig};
pub use encode::{FrameEncoder, JpegEncoder};
pub use error::{CompositeError, FramecastError, Result};
pub use overlay::{OverlayDescriptor, OverlayKind, OverlayProvider};
pub use publisher::{CloseReason, StreamPublisher, ViewerState};
pub use server::AppState;
pub use types::{EncodedChunk, FrameBuffer, SessionId};
