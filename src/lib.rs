//! # transpdf
//!
//! Layout-preserving PDF translation for Rust.
//!
//! This library recovers paragraphs and table cells from the text layer of a
//! PDF, hands their text to a translation provider and writes the
//! translations back into the original page, in place of the source text,
//! without touching drawings, images or table shading.
//!
//! ## Quick Start
//!
//! ```no_run
//! use transpdf::{translate_file, TranslateOptions, TranslationContext};
//!
//! fn main() -> transpdf::Result<()> {
//!     let provider = |texts: &[String], _ctx: &TranslationContext| -> transpdf::Result<Vec<String>> {
//!         Ok(texts.iter().map(|t| t.to_uppercase()).collect())
//!     };
//!
//!     let options = TranslateOptions::new("en");
//!     let result = translate_file("paper.pdf", "paper.en.pdf", options, &provider)?;
//!     println!("failed pages: {:?}", result.failed_pages);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Paragraph recovery**: line joining, CJK continuation rules, formula placeholders
//! - **Tables**: cells with row/column grid and spans
//! - **Reading order**: column and vertical-writing detection
//! - **Box fitting**: widen first, then shrink font and line height
//! - **Font embedding**: Type0/Identity-H subsets with `/ToUnicode`
//! - **Surgical rewriting**: only the translated text operators are removed
//! - **Parallel processing**: Uses Rayon for multi-page documents
//! - **Exports**: bilingual page-interleaved PDFs and CSV glossaries

pub mod builder;
pub mod error;
pub mod export;
pub mod fit;
pub mod font;
pub mod geometry;
pub mod layout;
pub mod model;
pub mod order;
pub mod parser;
pub mod pipeline;
pub mod rewrite;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use builder::BuilderConfig;
pub use error::{Error, FailureCategory, Result};
pub use export::{create_bilingual_pdf, export_glossary_csv, BilingualStats, GlossaryStats};
pub use fit::{Alignment, FitConfig};
pub use font::{FontKind, FontRegistry};
pub use geometry::Rect;
pub use layout::{Detection, LayoutModel, ModelCache, PageRasterizer};
pub use model::{
    Block, BlockType, DocumentResult, FontId, PageResult, PageStatus, PositionedChar,
    ProcessingStats, TableCoord,
};
pub use parser::PageSelection;
pub use pipeline::{
    CancelHandle, MemoryProbe, PageBlocks, PageState, ProgressEvent, TranslateOptions,
    TranslationContext, TranslationProvider, Translator,
};

use std::path::Path;

/// Extract the blocks of a PDF file for translation.
///
/// # Example
///
/// ```no_run
/// use transpdf::{extract_blocks, TranslateOptions};
///
/// let pages = extract_blocks("paper.pdf", TranslateOptions::new("ja")).unwrap();
/// for block in pages.iter().flat_map(|p| &p.blocks) {
///     println!("{}: {}", block.id, block.text);
/// }
/// ```
pub fn extract_blocks<P: AsRef<Path>>(path: P, options: TranslateOptions) -> Result<Vec<PageBlocks>> {
    let doc = parser::load_document(path)?;
    Translator::new(options)?.extract(&doc)
}

/// Translate a PDF file and write the result to `output`.
///
/// Pages that fail keep their original content; they are listed in
/// [`DocumentResult::failed_pages`].
pub fn translate_file<P, Q>(
    input: P,
    output: Q,
    options: TranslateOptions,
    provider: &dyn TranslationProvider,
) -> Result<DocumentResult>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    Translator::new(options)?.translate_document(input, output, provider)
}

/// Write known translations (block id to text) into a PDF file.
///
/// Block ids are those returned by [`extract_blocks`] with the same options.
///
/// # Example
///
/// ```no_run
/// use std::collections::HashMap;
/// use transpdf::{apply_translations, TranslateOptions};
///
/// let translations: HashMap<String, String> =
///     serde_json::from_str(&std::fs::read_to_string("ja.json")?)?;
/// let result = apply_translations("paper.pdf", "paper.ja.pdf", &translations, TranslateOptions::new("ja"))?;
/// assert!(result.failed_pages.is_empty());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn apply_translations<P, Q>(
    input: P,
    output: Q,
    translations: &std::collections::HashMap<String, String>,
    options: TranslateOptions,
) -> Result<DocumentResult>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let translator = Translator::new(options)?;
    let mut doc = parser::load_document(input.as_ref())?;
    let pages = translator.extract(&doc)?;
    let mut result = translator.apply(&mut doc, pages, translations)?;
    pipeline::save_document(&mut doc, output.as_ref())?;
    result.output_path = Some(output.as_ref().to_path_buf());
    Ok(result)
}
