//! Content-stream rewriting.
//!
//! Original text-showing operators of rewritten blocks are removed from the
//! page and from every form XObject that drew them; all other operators are
//! copied unchanged. New text is appended after the original content. The
//! result is a [`PagePatch`] that is committed to the document in one step.

mod emit;
mod filter;
mod patch;

pub use emit::{block_operations, measure_char, split_runs, TextRun};
pub use filter::{filter_operations, Removal};
pub use patch::PagePatch;
