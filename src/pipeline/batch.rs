//! Translation provider seam and character-budget batching.

use std::collections::{BTreeSet, HashMap};
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::Block;

/// Languages passed to the provider with every batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationContext {
    pub target_language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_language: Option<String>,
}

impl TranslationContext {
    pub fn new(target_language: impl Into<String>) -> Self {
        Self {
            target_language: target_language.into(),
            source_language: None,
        }
    }
}

/// External translation service.
///
/// Must return exactly one string per input, in input order.
pub trait TranslationProvider: Send + Sync {
    fn translate(&self, texts: &[String], context: &TranslationContext) -> Result<Vec<String>>;
}

impl<F> TranslationProvider for F
where
    F: Fn(&[String], &TranslationContext) -> Result<Vec<String>> + Send + Sync,
{
    fn translate(&self, texts: &[String], context: &TranslationContext) -> Result<Vec<String>> {
        self(texts, context)
    }
}

/// Groups texts into requests under a character budget.
#[derive(Debug, Clone, Copy)]
pub struct TranslationBatcher {
    max_chars: usize,
}

/// Outcome of translating a set of blocks.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Block id to translated text
    pub translations: HashMap<String, String>,
    /// Pages with a block in a failed batch, with the error
    pub failed_pages: Vec<(u32, Error)>,
}

impl TranslationBatcher {
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
        }
    }

    /// Consecutive index ranges whose combined length stays within the
    /// budget. A single text longer than the budget forms its own batch.
    pub fn batches(&self, texts: &[String]) -> Vec<Range<usize>> {
        let mut batches = Vec::new();
        let mut start = 0;
        let mut used = 0;
        for (i, text) in texts.iter().enumerate() {
            let len = text.chars().count();
            if i > start && used + len > self.max_chars {
                batches.push(start..i);
                start = i;
                used = 0;
            }
            used += len;
        }
        if start < texts.len() {
            batches.push(start..texts.len());
        }
        batches
    }

    /// Translate every block that needs it, in the given order.
    ///
    /// A failed or mismatched batch fails the pages of its blocks; the other
    /// batches still run. `on_batch` is called with `(index, total)` before
    /// each request.
    pub fn translate_blocks<'a, I>(
        &self,
        provider: &dyn TranslationProvider,
        blocks: I,
        context: &TranslationContext,
        mut on_batch: impl FnMut(usize, usize),
    ) -> BatchOutcome
    where
        I: IntoIterator<Item = &'a Block>,
    {
        let (ids, texts): (Vec<&str>, Vec<String>) = blocks
            .into_iter()
            .filter(|b| b.needs_translation())
            .map(|b| (b.id.as_str(), b.text.clone()))
            .unzip();

        let batches = self.batches(&texts);
        let total = batches.len();
        let mut outcome = BatchOutcome::default();
        let mut failed: BTreeSet<u32> = BTreeSet::new();

        for (index, range) in batches.into_iter().enumerate() {
            on_batch(index, total);
            let chunk = &texts[range.clone()];
            log::debug!(
                "Translation batch {}/{}: {} texts, {} chars",
                index + 1,
                total,
                chunk.len(),
                chunk.iter().map(|t| t.chars().count()).sum::<usize>()
            );

            let result = provider.translate(chunk, context).and_then(|out| {
                if out.len() == chunk.len() {
                    Ok(out)
                } else {
                    Err(Error::TranslationCountMismatch {
                        expected: chunk.len(),
                        actual: out.len(),
                    })
                }
            });

            match result {
                Ok(translated) => {
                    for (id, text) in ids[range].iter().zip(translated) {
                        outcome.translations.insert((*id).to_string(), text);
                    }
                }
                Err(e) => {
                    log::warn!("Translation batch {}/{} failed: {}", index + 1, total, e);
                    for id in &ids[range] {
                        if let Some(page) = Block::page_from_id(id) {
                            if failed.insert(page) {
                                outcome
                                    .failed_pages
                                    .push((page, Error::Translation(e.to_string())));
                            }
                        }
                    }
                }
            }
        }
        outcome
    }
}

impl Default for TranslationBatcher {
    fn default() -> Self {
        Self::new(super::options::DEFAULT_BATCH_CHARS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::model::BlockType;

    fn texts(lens: &[usize]) -> Vec<String> {
        lens.iter().map(|n| "a".repeat(*n)).collect()
    }

    fn block(page: u32, index: usize, text: &str) -> Block {
        let mut block = Block::new(page, BlockType::Paragraph, text, Rect::new(0.0, 0.0, 10.0, 10.0));
        block.id = Block::make_id(BlockType::Paragraph, page, index);
        block
    }

    #[test]
    fn test_batches_respect_budget() {
        let batcher = TranslationBatcher::new(10);
        assert_eq!(batcher.batches(&texts(&[4, 4, 4, 9, 1])), vec![0..2, 2..3, 3..5]);
        // an oversized text stands alone
        assert_eq!(batcher.batches(&texts(&[3, 25, 3])), vec![0..1, 1..2, 2..3]);
        assert!(batcher.batches(&[]).is_empty());
    }

    #[test]
    fn test_translations_keyed_by_block_id() {
        let blocks = vec![block(1, 0, "hello"), block(2, 0, "world")];
        let provider = |texts: &[String], ctx: &TranslationContext| -> Result<Vec<String>> {
            Ok(texts.iter().map(|t| format!("{}:{}", ctx.target_language, t)).collect())
        };
        let mut seen = Vec::new();
        let outcome = TranslationBatcher::new(100).translate_blocks(
            &provider,
            &blocks,
            &TranslationContext::new("ja"),
            |i, n| seen.push((i, n)),
        );
        assert_eq!(seen, vec![(0, 1)]);
        assert_eq!(outcome.translations["P1_0"], "ja:hello");
        assert_eq!(outcome.translations["P2_0"], "ja:world");
        assert!(outcome.failed_pages.is_empty());
    }

    #[test]
    fn test_count_mismatch_fails_pages_of_batch() {
        let blocks = vec![block(1, 0, "aaaa"), block(2, 0, "bbbb"), block(3, 0, "cccc")];
        // drops one string from any batch holding "bbbb"
        let provider = |texts: &[String], _: &TranslationContext| -> Result<Vec<String>> {
            if texts.iter().any(|t| t == "bbbb") {
                Ok(vec![String::new()])
            } else {
                Ok(texts.to_vec())
            }
        };
        let outcome = TranslationBatcher::new(8).translate_blocks(
            &provider,
            &blocks,
            &TranslationContext::new("en"),
            |_, _| {},
        );
        let pages: Vec<u32> = outcome.failed_pages.iter().map(|(p, _)| *p).collect();
        assert_eq!(pages, vec![1, 2]);
        assert!(outcome.failed_pages[0].1.to_string().contains("count mismatch"));
        assert_eq!(outcome.translations.len(), 1);
        assert_eq!(outcome.translations["P3_0"], "cccc");
    }

    #[test]
    fn test_skipped_blocks_are_not_sent() {
        let mut number = block(1, 1, "12");
        number.skip_translation = true;
        let blocks = vec![block(1, 0, "text"), number];
        let provider = |texts: &[String], _: &TranslationContext| -> Result<Vec<String>> {
            assert_eq!(texts.len(), 1);
            Ok(texts.to_vec())
        };
        let outcome = TranslationBatcher::default().translate_blocks(
            &provider,
            &blocks,
            &TranslationContext::new("en"),
            |_, _| {},
        );
        assert_eq!(outcome.translations.len(), 1);
    }
}
