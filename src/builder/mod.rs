//! Block building: groups extracted characters into paragraphs, table cells,
//! headers/footers and page numbers.
//!
//! Each pair of consecutive characters is classified as the same line, a
//! wrapped line, a weak boundary or a strong boundary. Layout regions decide
//! when a grid is available; otherwise vertical and horizontal thresholds
//! derived from the page size and median font size take over.

mod accumulator;
mod boundary;
mod config;
mod formula;
mod text_rules;

pub use accumulator::BlockBuilder;
pub use boundary::{BoundaryClassifier, CharPos, Transition};
pub use config::{BuilderConfig, PageThresholds};
pub use formula::{is_formula_char, is_formula_font, placeholder, restore_placeholders};
pub use text_rules::{
    is_japanese_continuation, is_toc_line_ending, line_join_separator, needs_word_space,
    weak_boundary_splits,
};

use crate::layout::LayoutArray;
use crate::model::Block;
use crate::parser::PageText;

/// Build the blocks of one page in extraction order.
///
/// `layout` carries the label grid and its pixels-per-point scale. Block ids
/// and reading order are assigned later by [`crate::order`].
pub fn build_blocks(
    page: &PageText,
    layout: Option<(&LayoutArray, f32)>,
    config: &BuilderConfig,
) -> Vec<Block> {
    let builder = BlockBuilder::new(config, page.page_number, page.media_box);
    match layout {
        Some((grid, scale)) => builder.with_layout(grid, scale).build(&page.chars),
        None => builder.build(&page.chars),
    }
}
