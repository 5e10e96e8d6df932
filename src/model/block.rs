//! Blocks: structured units of translatable text.

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

use super::glyph::{FontId, GlyphOrigin};

/// Region type of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Paragraph,
    TableCell,
    HeaderFooter,
    PageNumber,
}

impl BlockType {
    /// Prefix used in block ids.
    pub fn id_prefix(&self) -> char {
        match self {
            BlockType::TableCell => 'T',
            _ => 'P',
        }
    }
}

/// Grid position of a table cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCoord {
    pub row: usize,
    pub col: usize,
    pub row_span: usize,
    pub col_span: usize,
}

impl TableCoord {
    pub fn new(row: usize, col: usize) -> Self {
        Self {
            row,
            col,
            row_span: 1,
            col_span: 1,
        }
    }
}

/// A formula or variable span replaced by a `{vN}` placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaSpan {
    /// Placeholder as it appears in the block text, e.g. `{v0}`
    pub placeholder: String,
    /// Verbatim source text
    pub text: String,
}

/// A paragraph, table cell, header/footer or page number on one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// `P{page}_{n}` or `T{page}_{n}`
    pub id: String,

    /// Page number (1-indexed)
    pub page: u32,

    /// Merged text, formulas replaced by placeholders
    pub text: String,

    /// Bounding box in PDF coordinates
    pub bbox: Rect,

    /// Dominant source font size
    pub font_size: f32,

    /// Dominant source font
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<FontId>,

    pub block_type: BlockType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<TableCoord>,

    /// Free space towards neighbouring blocks, in points
    pub expandable_left: f32,
    pub expandable_right: f32,
    pub expandable_top: f32,
    pub expandable_bottom: f32,

    /// Repositioned but never sent for translation
    pub skip_translation: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub formulas: Vec<FormulaSpan>,

    /// Number of source lines
    pub line_count: usize,

    /// Layout region the block came from
    pub region_id: u16,

    /// Operators that drew the block's glyphs
    #[serde(skip)]
    pub origins: Vec<GlyphOrigin>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated: Option<String>,
}

impl Block {
    /// Create a block with no expansion room.
    pub fn new(page: u32, block_type: BlockType, text: impl Into<String>, bbox: Rect) -> Self {
        Self {
            id: String::new(),
            page,
            text: text.into(),
            bbox,
            font_size: 0.0,
            font: None,
            block_type,
            table: None,
            expandable_left: 0.0,
            expandable_right: 0.0,
            expandable_top: 0.0,
            expandable_bottom: 0.0,
            skip_translation: block_type == BlockType::PageNumber,
            formulas: Vec::new(),
            line_count: 1,
            region_id: 0,
            origins: Vec::new(),
            translated: None,
        }
    }

    /// Format a block id.
    pub fn make_id(block_type: BlockType, page: u32, index: usize) -> String {
        format!("{}{}_{}", block_type.id_prefix(), page, index)
    }

    /// Recover the page number from a block id.
    pub fn page_from_id(id: &str) -> Option<u32> {
        let rest = id.strip_prefix('P').or_else(|| id.strip_prefix('T'))?;
        let (page, index) = rest.split_once('_')?;
        index.parse::<usize>().ok()?;
        page.parse().ok()
    }

    pub fn is_table_cell(&self) -> bool {
        self.block_type == BlockType::TableCell
    }

    /// Whether the block should be sent for translation.
    pub fn needs_translation(&self) -> bool {
        !self.skip_translation && !self.text.trim().is_empty()
    }

    /// Attach the translated string.
    pub fn attach_translation(&mut self, text: impl Into<String>) {
        self.translated = Some(text.into());
    }

    /// The block box grown by its expandable margins.
    pub fn expandable_rect(&self) -> Rect {
        self.bbox.expand(
            self.expandable_left,
            self.expandable_bottom,
            self.expandable_right,
            self.expandable_top,
        )
    }

    /// Source text with formula placeholders replaced by their originals.
    pub fn source_text(&self) -> String {
        crate::builder::restore_placeholders(&self.text, &self.formulas)
    }

    /// Text to render: the translation if attached, else the source text,
    /// with formula placeholders restored in both cases.
    pub fn render_text(&self) -> String {
        match &self.translated {
            Some(t) => crate::builder::restore_placeholders(t, &self.formulas),
            None => self.source_text(),
        }
    }
}
