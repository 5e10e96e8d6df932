//! Positioned characters produced by the extractor.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

/// Index of a font in the document's [`FontRegistry`](crate::font::FontRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FontId(pub u32);

impl std::fmt::Display for FontId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "font#{}", self.0)
    }
}

/// The content-stream operator that drew a glyph.
///
/// `source` indexes the page's content sources: `0` is the page content
/// itself, `1..` are form XObjects in discovery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GlyphOrigin {
    pub source: usize,
    pub op_index: usize,
}

impl GlyphOrigin {
    pub fn new(source: usize, op_index: usize) -> Self {
        Self { source, op_index }
    }
}

/// A single drawn character with its font metadata and position.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedChar {
    /// Decoded character; U+FFFD when the code has no Unicode mapping
    pub ch: char,
    /// Registry font, if the font dictionary is an indirect object
    pub font: Option<FontId>,
    /// Base font name as written in the document
    pub font_name: Arc<str>,
    /// Effective font size in user space
    pub size: f32,
    /// Glyph box (descent to ascent, origin to advance)
    pub bbox: Rect,
    /// Raw character code for composite fonts
    pub cid: Option<u32>,
    pub origin: GlyphOrigin,
}

impl PositionedChar {
    /// Horizontal start of the glyph.
    pub fn x0(&self) -> f32 {
        self.bbox.x0
    }

    /// Horizontal end of the glyph.
    pub fn x1(&self) -> f32 {
        self.bbox.x1
    }

    /// Top edge of the glyph.
    pub fn y1(&self) -> f32 {
        self.bbox.y1
    }

    /// Bottom edge of the glyph.
    pub fn y0(&self) -> f32 {
        self.bbox.y0
    }

    /// Whether the character could not be mapped to Unicode.
    pub fn is_unmapped(&self) -> bool {
        self.ch == char::REPLACEMENT_CHARACTER && self.cid.is_some()
    }

    /// Font name without a subset prefix (`ABCDEF+Name` becomes `Name`).
    pub fn base_font_name(&self) -> &str {
        strip_subset_prefix(&self.font_name)
    }
}

/// Strip a six-letter subset tag from a font name.
pub fn strip_subset_prefix(name: &str) -> &str {
    match name.split_once('+') {
        Some((tag, rest)) if tag.len() == 6 && tag.chars().all(|c| c.is_ascii_uppercase()) => rest,
        _ => name,
    }
}
