//! Error types for Framecast

use thiserror::Error;

use crate::overlay::OverlayKind;

/// Result type alias using FramecastError
pub type Result<T> = std::result::Result<T, FramecastError>;

/// Main error type for Framecast operations
#[derive(Debug, Error)]
pub enum FramecastError {
    /// Upstream source could not be opened (unreachable, malformed, unsupported)
    #[error("Failed to open stream {source_url}: {reason}")]
    StreamOpen {
        /// Address that was being opened
        source_url: String,
        /// Why the open failed
        reason: String,
    },

    /// Upstream closed, failed, or the session was stopped
    #[error("End of stream")]
    EndOfStream,

    /// Bad overlay data
    #[error("Composite error: {0}")]
    Composite(#[from] CompositeError),

    /// Frame could not be compressed
    #[error("Encode error: {0}")]
    Encode(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request or record failed validation
    #[error("{0}")]
    Validation(String),

    /// Record or session not found
    #[error("{0} not found")]
    NotFound(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<FramecastError>,
    },
}

/// Per-overlay compositing failure
///
/// The publisher skips the offending overlay and keeps rendering the rest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompositeError {
    /// Colour is not a `#rrggbb` string
    #[error("invalid color {0:?}, expected #rrggbb")]
    InvalidColor(String),

    /// Overlay has no `x` or `y`
    #[error("overlay is missing its {0} coordinate")]
    MissingPosition(&'static str),

    /// Overlay kind has no rendering defined
    #[error("{0} overlays are not implemented")]
    UnimplementedKind(OverlayKind),
}

impl FramecastError {
    /// Create a stream-open error
    pub fn stream_open(source_url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StreamOpen {
            source_url: source_url.into(),
            reason: reason.into(),
        }
    }

    /// Create an encoder error
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through context wrappers
    pub fn root(&self) -> &FramecastError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether this is (or wraps) a stream-open failure
    pub fn is_stream_open(&self) -> bool {
        matches!(self.root(), Self::StreamOpen { .. })
    }

    /// Get a user-facing hint for resolving this error
    pub fn user_hint(&self) -> Option<&'static str> {
        match self.root() {
            Self::StreamOpen { .. } => Some(
                "Check that the camera is reachable and the URL is correct (e.g. rtsp://host:554/stream)",
            ),
            Self::Encode(_) => Some("Make sure FFmpeg was built with the MJPEG encoder"),
            Self::Config(_) => Some("Check ~/.config/framecast/config.toml for syntax errors"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_open_display() {
        let err = FramecastError::stream_open("rtsp://cam/1", "connection refused");
        let msg = err.to_string();
        assert!(msg.contains("rtsp://cam/1"));
        assert!(msg.contains("connection refused"));
        assert!(err.is_stream_open());
    }

    #[test]
    fn test_context_preserves_root() {
        let err = FramecastError::stream_open("rtsp://cam/1", "timeout").with_context("Starting session");
        assert!(err.is_stream_open());
        assert!(err.user_hint().is_some());
        assert!(err.to_string().starts_with("Starting session"));
    }

    #[test]
    fn test_composite_error_conversion() {
        let err: FramecastError = CompositeError::InvalidColor("#zz".into()).into();
        assert!(matches!(err, FramecastError::Composite(CompositeError::InvalidColor(_))));
    }
}
