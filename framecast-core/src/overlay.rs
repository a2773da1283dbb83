//! Overlay descriptors and the snapshot provider seam
//!
//! Descriptors are owned by the overlay store; the pipeline only reads
//! snapshots of them, once per output frame.

use serde::{Deserialize, Serialize};

use crate::error::CompositeError;

/// Font size used when an overlay does not set one
pub const DEFAULT_FONT_SIZE: u32 = 24;

/// Colour used when an overlay does not set one
pub const DEFAULT_COLOR: &str = "#ffffff";

/// Kind of overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayKind {
    /// Text drawn onto the frame
    Text,
    /// Image logo (no rendering defined)
    Logo,
}

impl OverlayKind {
    /// Parse from the wire name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "logo" => Some(Self::Logo),
            _ => None,
        }
    }
}

impl std::fmt::Display for OverlayKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Logo => write!(f, "logo"),
        }
    }
}

/// A positioned annotation applied to every outgoing frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayDescriptor {
    /// Overlay kind
    #[serde(rename = "type")]
    pub kind: OverlayKind,
    /// Text to draw, or logo reference
    pub content: String,
    /// Left edge of the text baseline
    #[serde(default)]
    pub x: Option<i32>,
    /// Baseline of the text
    #[serde(default)]
    pub y: Option<i32>,
    /// Box width (informational for text)
    #[serde(default)]
    pub width: i32,
    /// Box height (informational for text)
    #[serde(default)]
    pub height: i32,
    /// Font size, defaults to 24
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u32>,
    /// `#rrggbb` colour, defaults to white
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl OverlayDescriptor {
    /// Create a text overlay at a position
    pub fn text(content: impl Into<String>, x: i32, y: i32) -> Self {
        Self {
            kind: OverlayKind::Text,
            content: content.into(),
            x: Some(x),
            y: Some(y),
            width: 0,
            height: 0,
            font_size: None,
            color: None,
        }
    }

    /// Set the colour
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Set the font size
    pub fn with_font_size(mut self, size: u32) -> Self {
        self.font_size = Some(size);
        self
    }

    /// Font size with the default applied
    pub fn effective_font_size(&self) -> u32 {
        self.font_size.unwrap_or(DEFAULT_FONT_SIZE)
    }

    /// Scale factor relative to the base glyph size
    pub fn font_scale(&self) -> f32 {
        self.effective_font_size() as f32 / 30.0
    }

    /// Colour with the default applied
    pub fn effective_color(&self) -> &str {
        self.color.as_deref().unwrap_or(DEFAULT_COLOR)
    }

    /// Parsed RGB colour
    pub fn rgb(&self) -> Result<[u8; 3], CompositeError> {
        parse_hex_color(self.effective_color())
    }

    /// Position, or the first missing coordinate
    pub fn position(&self) -> Result<(i32, i32), CompositeError> {
        let x = self.x.ok_or(CompositeError::MissingPosition("x"))?;
        let y = self.y.ok_or(CompositeError::MissingPosition("y"))?;
        Ok((x, y))
    }
}

/// Parse `#rrggbb` into `[r, g, b]`
///
/// Channels are the hex pairs at positions 1-2, 3-4 and 5-6.
pub fn parse_hex_color(color: &str) -> Result<[u8; 3], CompositeError> {
    let invalid = || CompositeError::InvalidColor(color.to_string());

    let hex = color.strip_prefix('#').ok_or_else(invalid)?;
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
    Ok([channel(0)?, channel(2)?, channel(4)?])
}

/// Source of the current overlay set
///
/// Called once per output frame, concurrently from every viewer loop.
/// Implementations must return a consistent, ordered snapshot; list order is
/// paint order.
pub trait OverlayProvider: Send + Sync {
    /// Current overlays in paint order
    fn snapshot(&self) -> Vec<OverlayDescriptor>;
}

/// Provider with a fixed overlay list
#[derive(Debug, Clone, Default)]
pub struct StaticOverlays(pub Vec<OverlayDescriptor>);

impl OverlayProvider for StaticOverlays {
    fn snapshot(&self) -> Vec<OverlayDescriptor> {
        self.0.clone()
    }
}
