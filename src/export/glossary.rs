//! Source and translation pairs written as a CSV glossary.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::model::Block;
use crate::pipeline::PageBlocks;

/// UTF-8 byte order mark, so spreadsheet tools pick the right encoding.
const BOM: &[u8] = b"\xEF\xBB\xBF";

/// One source/translation pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlossaryEntry {
    pub original: String,
    pub translated: String,
    pub page: u32,
    /// Block id
    pub address: String,
}

/// Counts of a glossary export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GlossaryStats {
    /// Translations offered
    pub total: usize,
    pub exported: usize,
    /// Translations with no source block, or an empty side after trimming
    pub skipped: usize,
}

/// Pair translations with the text of their blocks.
///
/// Rows follow block order. Both sides are trimmed.
pub fn glossary_entries<'a>(
    blocks: impl IntoIterator<Item = &'a Block>,
    translations: &HashMap<String, String>,
) -> (Vec<GlossaryEntry>, GlossaryStats) {
    let mut entries = Vec::new();
    let mut matched = 0;
    for block in blocks {
        let Some(translated) = translations.get(&block.id) else {
            continue;
        };
        matched += 1;
        let original = block.text.trim();
        let translated = translated.trim();
        if original.is_empty() || translated.is_empty() {
            continue;
        }
        entries.push(GlossaryEntry {
            original: original.to_string(),
            translated: translated.to_string(),
            page: block.page,
            address: block.id.clone(),
        });
    }

    let stats = GlossaryStats {
        total: translations.len(),
        exported: entries.len(),
        skipped: translations.len() - entries.len(),
    };
    if matched < translations.len() {
        log::debug!("{} translations name no extracted block", translations.len() - matched);
    }
    (entries, stats)
}

/// Write entries as CSV, with page and block id columns when `with_location`.
pub fn write_glossary_csv<W: Write>(
    mut writer: W,
    entries: &[GlossaryEntry],
    with_location: bool,
) -> Result<()> {
    writer.write_all(BOM)?;
    let mut rows = csv::Writer::from_writer(writer);
    if with_location {
        rows.write_record(["original", "translated", "page", "address"])?;
    } else {
        rows.write_record(["original", "translated"])?;
    }
    for entry in entries {
        if with_location {
            let page = entry.page.to_string();
            rows.write_record([
                entry.original.as_str(),
                entry.translated.as_str(),
                page.as_str(),
                entry.address.as_str(),
            ])?;
        } else {
            rows.write_record([entry.original.as_str(), entry.translated.as_str()])?;
        }
    }
    rows.flush()?;
    Ok(())
}

/// Export the translated blocks of extracted pages to a CSV file.
pub fn export_glossary_csv(
    pages: &[PageBlocks],
    translations: &HashMap<String, String>,
    path: impl AsRef<Path>,
    with_location: bool,
) -> Result<GlossaryStats> {
    let path = path.as_ref();
    let (entries, stats) = glossary_entries(pages.iter().flat_map(|p| &p.blocks), translations);
    let file = BufWriter::new(File::create(path)?);
    write_glossary_csv(file, &entries, with_location)?;
    log::info!("Exported glossary CSV: {} pairs to {}", stats.exported, path.display());
    Ok(stats)
}
