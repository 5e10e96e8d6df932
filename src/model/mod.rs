//! Data types shared by the pipeline stages.
//!
//! Characters flow from the extractor into the builder as
//! [`PositionedChar`]s, leave it as [`Block`]s and end up in a
//! [`DocumentResult`].

mod block;
mod glyph;
mod result;

pub use block::{Block, BlockType, FormulaSpan, TableCoord};
pub use glyph::{strip_subset_prefix, FontId, GlyphOrigin, PositionedChar};
pub use result::{DocumentResult, PageResult, PageStatus, ProcessingStats};
