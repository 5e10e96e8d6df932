//! Outputs derived from a finished translation.

mod bilingual;
mod glossary;

pub use bilingual::{create_bilingual_pdf, interleave_pages, BilingualStats};
pub use glossary::{export_glossary_csv, glossary_entries, write_glossary_csv, GlossaryEntry, GlossaryStats};
