//! Overlay compositing for Framecast
//!
//! Draws the overlay set onto a raw RGB24 frame. Text uses a built-in 5x7
//! bitmap face so rendering has no font-file dependency.

use tracing::trace;

use crate::error::CompositeError;
use crate::overlay::{OverlayDescriptor, OverlayKind};
use crate::types::FrameBuffer;

/// Pixels per font dot at scale 1.0 (7 rows -> 21 px cap height)
const DOT_SIZE: f32 = 3.0;

/// Glyph columns
const GLYPH_COLS: usize = 5;

/// Glyph rows
const GLYPH_ROWS: usize = 7;

/// Horizontal advance in dots (glyph plus one column of spacing)
const GLYPH_ADVANCE: usize = 6;

/// Stroke width in pixels
pub const STROKE_THICKNESS: u32 = 2;

/// An overlay that could not be drawn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedOverlay {
    /// Position of the overlay in the snapshot
    pub index: usize,
    /// Why it was skipped
    pub error: CompositeError,
}

/// Result of compositing a frame
#[derive(Debug, Clone)]
pub struct Composited {
    /// The frame with all drawable overlays applied
    pub frame: FrameBuffer,
    /// Overlays that were skipped, in snapshot order
    pub skipped: Vec<SkippedOverlay>,
}

/// Overlay compositor
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCompositor;

impl FrameCompositor {
    /// Create a compositor
    pub fn new() -> Self {
        Self
    }

    /// Apply overlays in list order; later overlays paint over earlier ones
    ///
    /// An overlay with bad data is skipped and reported; the rest still render.
    pub fn composite(&self, mut frame: FrameBuffer, overlays: &[OverlayDescriptor]) -> Composited {
        let mut skipped = Vec::new();

        for (index, overlay) in overlays.iter().enumerate() {
            if let Err(error) = self.apply(&mut frame, overlay) {
                trace!("Skipping overlay {}: {}", index, error);
                skipped.push(SkippedOverlay { index, error });
            }
        }

        Composited { frame, skipped }
    }

    /// Draw a single overlay
    ///
    /// All overlay fields are validated before the first pixel is written, so
    /// an error leaves the frame untouched.
    pub fn apply(&self, frame: &mut FrameBuffer, overlay: &OverlayDescriptor) -> Result<(), CompositeError> {
        match overlay.kind {
            OverlayKind::Text => {
                let (x, y) = overlay.position()?;
                let color = overlay.rgb()?;
                draw_text(frame, x as i64, y as i64, &overlay.content, overlay.font_scale(), color);
                Ok(())
            }
            OverlayKind::Logo => Err(CompositeError::UnimplementedKind(OverlayKind::Logo)),
        }
    }
}

/// Rendered width of a string in pixels at a given scale
pub fn text_width(text: &str, font_scale: f32) -> u32 {
    let dot = DOT_SIZE * font_scale;
    (text.chars().count() as f32 * GLYPH_ADVANCE as f32 * dot).round() as u32
}

/// Draw text with `(x, y)` as the bottom-left point of the baseline
fn draw_text(frame: &mut FrameBuffer, x: i64, y: i64, text: &str, font_scale: f32, color: [u8; 3]) {
    if font_scale <= 0.0 {
        return;
    }

    let dot = DOT_SIZE * font_scale;
    let top = y.saturating_sub((GLYPH_ROWS as f32 * dot).round() as i64);
    let right = x.saturating_add(text_width(text, font_scale) as i64);
    if right <= 0 || x >= frame.width as i64 || top >= frame.height as i64 {
        return;
    }

    for (i, ch) in text.chars().enumerate() {
        let char_x = x.saturating_add((i as f32 * GLYPH_ADVANCE as f32 * dot).round() as i64);
        if char_x >= frame.width as i64 {
            break;
        }
        draw_char(frame, char_x, top, ch, dot, color);
    }
}

/// Draw one glyph with its top-left corner at `(x, top)`
///
/// Each dot is clipped to the frame before filling, so work is bounded by
/// the frame size whatever the scale.
fn draw_char(frame: &mut FrameBuffer, x: i64, top: i64, ch: char, dot: f32, color: [u8; 3]) {
    let bitmap = get_char_bitmap(ch);
    let block = (dot.ceil() as i64).max(STROKE_THICKNESS as i64);
    let (width, height) = (frame.width as i64, frame.height as i64);

    for (row, &bits) in bitmap.iter().enumerate() {
        let py = top.saturating_add((row as f32 * dot).round() as i64);
        let (y0, y1) = (py.max(0), py.saturating_add(block).min(height));
        if y0 >= y1 {
            continue;
        }

        for col in 0..GLYPH_COLS {
            if (bits >> (GLYPH_COLS - 1 - col)) & 1 == 0 {
                continue;
            }
            let px = x.saturating_add((col as f32 * dot).round() as i64);
            let (x0, x1) = (px.max(0), px.saturating_add(block).min(width));
            for py in y0..y1 {
                for px in x0..x1 {
                    frame.put_pixel(px, py, color);
                }
            }
        }
    }
}

/// Get the 5x7 bitmap for a character
///
/// One byte per row, low five bits used. Lowercase shares the uppercase
/// shapes; unknown characters render as blank space.
fn get_char_bitmap(ch: char) -> [u8; 7] {
    match ch.to_ascii_uppercase() {
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00110, 0b01000, 0b10000, 0b11111],
        '3' => [0b01110, 0b10001, 0b00001, 0b00110, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01110],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01110, 0b10001, 0b10000, 0b01110, 0b00001, 0b10001, 0b01110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b11011, 0b10001],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        ':' => [0b00000, 0b00100, 0b00000, 0b00000, 0b00000, 0b00100, 0b00000],
        '.' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00100],
        ',' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00100, 0b00100, 0b01000],
        '!' => [0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00000, 0b00100],
        '?' => [0b01110, 0b10001, 0b00001, 0b00110, 0b00100, 0b00000, 0b00100],
        '\'' => [0b00100, 0b00100, 0b01000, 0b00000, 0b00000, 0b00000, 0b00000],
        '"' => [0b01010, 0b01010, 0b00000, 0b00000, 0b00000, 0b00000, 0b00000],
        '(' => [0b00010, 0b00100, 0b01000, 0b01000, 0b01000, 0b00100, 0b00010],
        ')' => [0b01000, 0b00100, 0b00010, 0b00010, 0b00010, 0b00100, 0b01000],
        '+' => [0b00000, 0b00100, 0b00100, 0b11111, 0b00100, 0b00100, 0b00000],
        '=' => [0b00000, 0b00000, 0b11111, 0b00000, 0b11111, 0b00000, 0b00000],
        '_' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b11111],
        '#' => [0b01010, 0b01010, 0b11111, 0b01010, 0b11111, 0b01010, 0b01010],
        '@' => [0b01110, 0b10001, 0b10111, 0b10101, 0b10111, 0b10000, 0b01110],
        '&' => [0b01100, 0b10010, 0b10100, 0b01000, 0b10101, 0b10010, 0b01101],
        '*' => [0b00000, 0b10101, 0b01110, 0b11111, 0b01110, 0b10101, 0b00000],
        '|' => [0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        '-' => [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000],
        '/' => [0b00001, 0b00010, 0b00010, 0b00100, 0b01000, 0b01000, 0b10000],
        '%' => [0b11001, 0b11010, 0b00010, 0b00100, 0b01000, 0b01011, 0b10011],
        _ => [0; 7],
    }
}
