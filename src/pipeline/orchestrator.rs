//! Page orchestration: extraction through writing.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use crossbeam_channel::Sender;
use lopdf::content::Operation;
use lopdf::Document as LopdfDocument;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::builder::build_blocks;
use crate::error::{Error, FailureCategory, Result};
use crate::fit::{compute_expandable, resolve_overlaps, BoxFitter};
use crate::font::FontRegistry;
use crate::layout::{LayoutAnalyzer, LayoutArray, ModelCache, PageRasterizer};
use crate::model::{Block, DocumentResult, FontId, PageResult, PageStatus, ProcessingStats};
use crate::order::{order_blocks, ReadingDirection};
use crate::parser::{load_document, CharExtractor, PageText};
use crate::rewrite::{block_operations, measure_char, PagePatch, Removal};

use super::batch::{TranslationBatcher, TranslationContext, TranslationProvider};
use super::memory::{MemoryBudget, MemoryProbe, SystemMemory};
use super::options::TranslateOptions;
use super::state::{PageJob, PageState};

/// Pipeline phase a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    Apply,
}

/// Progress reported to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    PageStarted { page: u32, stage: Stage },
    PageFinished { page: u32, stage: Stage },
    PageFailed { page: u32, reason: String },
    TranslationBatch { index: usize, total: usize },
}

type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Cooperative cancellation shared with a [`Translator`].
///
/// Pages already in flight finish; pages not yet started are reported as
/// cancelled and keep their original content.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Blocks of one page after extraction, ready for translation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageBlocks {
    #[serde(flatten)]
    pub job: PageJob,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<ReadingDirection>,
    /// The layout model found nothing and thresholds were used
    #[serde(default)]
    pub fallback_used: bool,
    #[serde(default)]
    pub blocks: Vec<Block>,
    /// Extracted content, needed to rewrite the page
    #[serde(skip)]
    pub text: Option<PageText>,
}

impl PageBlocks {
    pub(crate) fn new(page: u32) -> Self {
        Self {
            job: PageJob::new(page),
            direction: None,
            fallback_used: false,
            blocks: Vec::new(),
            text: None,
        }
    }

    pub fn page(&self) -> u32 {
        self.job.page
    }

    fn has_text(&self) -> bool {
        self.text.as_ref().map(PageText::has_text).unwrap_or(false)
    }
}

/// A page rewrite waiting to be committed.
struct PlannedPage {
    page: PageBlocks,
    outcome: Result<Option<PagePatch>>,
    translated: u32,
    overflow: u32,
}

/// Translates documents page by page.
///
/// Pages are processed on a rayon pool; the document itself is only mutated
/// on the calling thread when finished page rewrites are committed.
pub struct Translator {
    options: TranslateOptions,
    models: Arc<ModelCache>,
    rasterizer: Option<Arc<dyn PageRasterizer>>,
    memory: Arc<dyn MemoryProbe>,
    progress: Option<ProgressCallback>,
    cancel: CancelHandle,
    pool: Option<rayon::ThreadPool>,
}

impl Translator {
    /// Create a translator. The options are validated here.
    pub fn new(options: TranslateOptions) -> Result<Self> {
        options.validate()?;
        let pool = if options.workers > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(options.workers)
                .thread_name(|i| format!("transpdf-page-{}", i))
                .build()
                .map_err(|e| Error::Config(format!("worker pool: {}", e)))?;
            Some(pool)
        } else {
            None
        };
        Ok(Self {
            options,
            models: Arc::new(ModelCache::default()),
            rasterizer: None,
            memory: Arc::new(SystemMemory),
            progress: None,
            cancel: CancelHandle::default(),
            pool,
        })
    }

    /// Share a layout model cache.
    pub fn with_models(mut self, models: Arc<ModelCache>) -> Self {
        self.models = models;
        self
    }

    /// Use a different page rasterizer for the layout model.
    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        self.rasterizer = Some(rasterizer);
        self
    }

    /// Use a different source of available memory.
    pub fn with_memory_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.memory = probe;
        self
    }

    /// Report progress through a callback, invoked on the calling thread.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressEvent) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    /// Handle to cancel processing from another thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn options(&self) -> &TranslateOptions {
        &self.options
    }

    /// Translate `input` with `provider` and write the result to `output`.
    pub fn translate_document<P, Q>(
        &self,
        input: P,
        output: Q,
        provider: &dyn TranslationProvider,
    ) -> Result<DocumentResult>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let mut doc = load_document(input.as_ref())?;
        let mut pages = self.extract(&doc)?;
        let translations = self.translate_pages(&mut pages, provider);
        let mut result = self.apply(&mut doc, pages, &translations)?;
        save_document(&mut doc, output.as_ref())?;
        result.output_path = Some(output.as_ref().to_path_buf());
        Ok(result)
    }

    /// Send the blocks of all live pages to the provider in reading order.
    ///
    /// Pages with a block in a failed batch are failed.
    pub fn translate_pages(
        &self,
        pages: &mut [PageBlocks],
        provider: &dyn TranslationProvider,
    ) -> HashMap<String, String> {
        let context = TranslationContext {
            target_language: self.options.target_language.clone(),
            source_language: self.options.source_language.clone(),
        };
        let blocks = pages
            .iter()
            .filter(|p| !p.job.is_failed())
            .flat_map(|p| p.blocks.iter());
        let outcome = TranslationBatcher::new(self.options.batch_chars).translate_blocks(
            provider,
            blocks,
            &context,
            |index, total| self.emit(ProgressEvent::TranslationBatch { index, total }),
        );

        for (page_number, error) in &outcome.failed_pages {
            if let Some(page) = pages.iter_mut().find(|p| p.page() == *page_number) {
                page.job.fail(error);
                self.emit(ProgressEvent::PageFailed {
                    page: *page_number,
                    reason: error.to_string(),
                });
            }
        }
        outcome.translations
    }

    /// Extract, analyze and build the blocks of the selected pages.
    ///
    /// Page-level problems fail only their page. Fails when the selection
    /// is out of range or no selected page has a text layer.
    pub fn extract(&self, doc: &LopdfDocument) -> Result<Vec<PageBlocks>> {
        let page_ids = doc.get_pages();
        let selected = self.options.pages.resolve(page_ids.len() as u32)?;

        let mut registry = self.registry();
        registry.load_existing_fonts(doc);

        let mut items = Vec::with_capacity(selected.len());
        for number in selected {
            let id = *page_ids
                .get(&number)
                .ok_or(Error::PageOutOfRange(number, page_ids.len() as u32))?;
            items.push((number, id));
        }

        let registry = &registry;
        let mut pages = self.run_pages(items, |(number, id), events| {
            let mut page = PageBlocks::new(number);
            if self.cancel.is_cancelled() {
                page.job.fail(&Error::Cancelled);
                return page;
            }
            let _ = events.send(ProgressEvent::PageStarted {
                page: number,
                stage: Stage::Extract,
            });
            let extracted = page
                .job
                .advance(PageState::Extracting)
                .and_then(|_| CharExtractor::new(doc, registry).extract(number, id))
                .and_then(|text| {
                    if text.height() > 0.0 && text.width() > 0.0 {
                        Ok(text)
                    } else {
                        Err(Error::InvalidInput(format!("page {} has zero height", number)))
                    }
                });
            match extracted {
                Ok(text) => {
                    log::debug!("Page {}: extracted {} chars", number, text.chars.len());
                    page.text = Some(text);
                }
                Err(e) => fail_page(&mut page, &e, events),
            }
            page
        });

        let live = pages.iter().filter(|p| !p.job.is_failed()).count();
        if live > 0 && !pages.iter().any(PageBlocks::has_text) {
            return Err(Error::NoTextLayer);
        }

        self.analyze_and_build(doc, pages)
    }

    /// Run the layout model over the pages with text in memory-sized
    /// chunks and build each chunk's blocks before the next is analyzed.
    ///
    /// Only one chunk of layout grids is alive at a time.
    fn analyze_and_build(
        &self,
        doc: &LopdfDocument,
        mut pages: Vec<PageBlocks>,
    ) -> Result<Vec<PageBlocks>> {
        let mut pending = Vec::new();
        let mut textless = Vec::new();
        for (slot, page) in pages.iter_mut().enumerate() {
            if page.job.is_failed() {
                continue;
            }
            if let Err(e) = page.job.advance(PageState::LayoutAnalyzed) {
                page.job.fail(&e);
                continue;
            }
            if page.has_text() {
                pending.push(slot);
            } else {
                textless.push(slot);
            }
        }

        let items: Vec<(PageBlocks, Option<(LayoutArray, f32)>)> =
            textless.iter().map(|&slot| (take_page(&mut pages, slot), None)).collect();
        for (slot, page) in textless.into_iter().zip(self.build_pages(items)) {
            pages[slot] = page;
        }
        if pending.is_empty() {
            return Ok(pages);
        }

        let mut analyzer = LayoutAnalyzer::new(self.models.clone(), self.options.dpi)?
            .with_min_confidence(self.options.min_confidence);
        if let Some(rasterizer) = &self.rasterizer {
            analyzer = analyzer.with_rasterizer(rasterizer.clone());
        }
        let scale = analyzer.scale();

        let budget = MemoryBudget {
            dpi: self.options.dpi,
            base_mb_per_page: self.options.base_mb_per_page,
            safety_ratio: self.options.memory_safety_ratio,
            default_batch: self.options.layout_batch_size,
        };
        let batch_size = match budget.batch_size(self.memory.as_ref(), pending.len()) {
            Ok(size) => size,
            Err(e) => {
                for &slot in &pending {
                    self.fail(&mut pages[slot], &e);
                }
                return Ok(pages);
            }
        };

        for chunk in pending.chunks(batch_size) {
            if self.cancel.is_cancelled() {
                for &slot in chunk {
                    pages[slot].job.fail(&Error::Cancelled);
                }
                continue;
            }
            let sizes: Vec<(u32, (f32, f32))> = chunk
                .iter()
                .filter_map(|&slot| {
                    let page = &pages[slot];
                    page.text.as_ref().map(|t| (page.page(), (t.width(), t.height())))
                })
                .collect();

            let mut items = Vec::with_capacity(chunk.len());
            let mut built = Vec::with_capacity(chunk.len());
            for (&slot, result) in chunk.iter().zip(analyzer.analyze_batch(doc, &sizes)) {
                match result {
                    Ok(array) => {
                        items.push((take_page(&mut pages, slot), Some((array, scale))));
                        built.push(slot);
                    }
                    Err(e) => self.fail(&mut pages[slot], &e),
                }
            }
            // grids are dropped inside build_pages
            for (slot, page) in built.into_iter().zip(self.build_pages(items)) {
                pages[slot] = page;
            }
        }
        Ok(pages)
    }

    /// Build and order the blocks of analyzed pages, consuming their grids.
    fn build_pages(&self, items: Vec<(PageBlocks, Option<(LayoutArray, f32)>)>) -> Vec<PageBlocks> {
        if items.is_empty() {
            return Vec::new();
        }
        let config = &self.options.builder;
        self.run_pages(items, |(mut page, layout), events| {
            if page.job.is_failed() {
                return page;
            }
            if let Err(e) = page.job.advance(PageState::Built) {
                fail_page(&mut page, &e, events);
                return page;
            }
            if let Some(text) = page.text.as_ref() {
                let grid = layout.as_ref().map(|(array, scale)| (array, *scale));
                let blocks = build_blocks(text, grid, config);
                let (direction, blocks) = order_blocks(blocks, config.table_row_y);
                log::debug!(
                    "Page {}: {} blocks ({:?})",
                    text.page_number,
                    blocks.len(),
                    direction
                );
                page.fallback_used = layout.as_ref().map_or(false, |(a, _)| a.fallback_used);
                page.direction = Some(direction);
                page.blocks = blocks;
            }
            drop(layout);
            let _ = events.send(ProgressEvent::PageFinished {
                page: page.page(),
                stage: Stage::Extract,
            });
            page
        })
    }

    /// Rewrite the pages with the given translations (block id to text).
    ///
    /// Page rewrites are planned in parallel and committed in page order.
    /// A page whose plan fails keeps its original content. Fails only when
    /// the target font cannot be registered.
    pub fn apply(
        &self,
        doc: &mut LopdfDocument,
        pages: Vec<PageBlocks>,
        translations: &HashMap<String, String>,
    ) -> Result<DocumentResult> {
        let started_at = Utc::now();
        let mut registry = self.registry();
        registry.load_existing_fonts(doc);
        registry.register_target_font(doc, &self.options.target_language)?;

        let mut stats = ProcessingStats {
            page_count: pages.len() as u32,
            ..ProcessingStats::default()
        };
        let mut results = Vec::with_capacity(pages.len());
        let mut ready = Vec::new();
        for page in pages {
            stats.block_count += page.blocks.len() as u32;
            if page.fallback_used {
                stats.fallback_pages += 1;
            }
            if let Some(failure) = page.job.failure() {
                if failure.category == FailureCategory::Cancelled {
                    results.push(PageResult::cancelled(page.page()));
                } else {
                    results.push(PageResult {
                        page: page.page(),
                        status: PageStatus::Failed,
                        reason: Some(failure.reason.clone()),
                        category: Some(failure.category),
                        blocks: page.blocks,
                    });
                }
            } else if page.blocks.is_empty() {
                results.push(PageResult::skipped(page.page(), "no embedded text"));
            } else {
                ready.push(page);
            }
        }

        let planned = {
            let doc: &LopdfDocument = doc;
            let registry = &registry;
            self.run_pages(ready, |page, events| {
                if self.cancel.is_cancelled() {
                    return PlannedPage {
                        page,
                        outcome: Err(Error::Cancelled),
                        translated: 0,
                        overflow: 0,
                    };
                }
                let _ = events.send(ProgressEvent::PageStarted {
                    page: page.page(),
                    stage: Stage::Apply,
                });
                self.plan_page(doc, registry, page, translations)
            })
        };

        for planned in planned {
            let PlannedPage {
                mut page,
                outcome,
                translated,
                overflow,
            } = planned;
            let number = page.page();
            let outcome = outcome.and_then(|patch| {
                if patch.is_some() {
                    page.job.advance(PageState::Written)?;
                }
                Ok(patch)
            });
            match outcome {
                Ok(Some(patch)) => {
                    patch.commit(doc);
                    stats.translated_count += translated;
                    stats.overflow_count += overflow;
                    self.emit(ProgressEvent::PageFinished {
                        page: number,
                        stage: Stage::Apply,
                    });
                    results.push(PageResult::written(number, page.blocks));
                }
                Ok(None) => results.push(PageResult::skipped(number, "no translated blocks")),
                Err(Error::Cancelled) => results.push(PageResult::cancelled(number)),
                Err(e) => {
                    self.fail(&mut page, &e);
                    results.push(PageResult::failed(number, &e, page.blocks));
                }
            }
        }

        registry.finalize(doc)?;
        let result = DocumentResult::new(results, stats, started_at);
        log::info!(
            "Wrote {} of {} pages ({} failed, {} skipped)",
            result.count(PageStatus::Written),
            result.per_page.len(),
            result.failed_pages.len(),
            result.count(PageStatus::Skipped)
        );
        Ok(result)
    }

    /// Fit the translated blocks of a page and plan its rewrite.
    fn plan_page(
        &self,
        doc: &LopdfDocument,
        registry: &FontRegistry,
        mut page: PageBlocks,
        translations: &HashMap<String, String>,
    ) -> PlannedPage {
        let mut translated = 0;
        let mut overflow = 0;
        let outcome = (|| -> Result<Option<PagePatch>> {
            let text = page.text.take().ok_or_else(|| {
                Error::InvalidInput(format!(
                    "page {} was not extracted from this document",
                    page.page()
                ))
            })?;

            for block in page.blocks.iter_mut() {
                if !block.needs_translation() {
                    continue;
                }
                if let Some(t) = translations.get(&block.id) {
                    block.attach_translation(t.nfc().collect::<String>());
                    translated += 1;
                }
            }

            resolve_overlaps(&mut page.blocks);
            compute_expandable(&mut page.blocks, &text.media_box, self.options.fit.page_margin);
            let removal = Removal::plan(&page.blocks, &text.source_groups());
            if removal.is_empty() {
                return Ok(None);
            }

            let fitter = BoxFitter::new(&self.options.fit);
            let source_language = self.options.source_language.as_deref().unwrap_or("en");
            let mut operations: Vec<Operation> = Vec::new();
            let mut fonts: BTreeSet<FontId> = BTreeSet::new();
            for &index in &removal.blocks {
                let block = &page.blocks[index];
                let language = if block.translated.is_some() {
                    self.options.target_language.as_str()
                } else {
                    source_language
                };
                let fit = fitter.fit(block, &block.render_text(), language, |c| {
                    measure_char(registry, c)
                });
                if fit.overflow {
                    overflow += 1;
                    log::warn!(
                        "Block {} overflows its box at {:.1}pt",
                        block.id,
                        fit.font_size
                    );
                }
                let (ops, used) = block_operations(registry, &fit)?;
                operations.extend(ops);
                fonts.extend(used);
            }
            page.job.advance(PageState::Fitted)?;

            let patch = PagePatch::build(doc, registry, &text, &removal, operations, &fonts)?;
            log::debug!(
                "Page {}: rewriting {} blocks, {} forms",
                patch.page_number(),
                removal.blocks.len(),
                patch.form_count()
            );
            Ok(Some(patch))
        })();

        PlannedPage {
            page,
            outcome,
            translated,
            overflow,
        }
    }

    fn registry(&self) -> FontRegistry {
        FontRegistry::new(self.options.target_language.clone())
            .with_font_dirs(self.options.font_dirs.clone())
            .with_font_file(self.options.font_file.clone())
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(callback) = &self.progress {
            callback(event);
        }
    }

    fn fail(&self, page: &mut PageBlocks, error: &Error) {
        page.job.fail(error);
        self.emit(ProgressEvent::PageFailed {
            page: page.page(),
            reason: error.to_string(),
        });
    }

    /// Map `work` over pages, in parallel when enabled, preserving order.
    ///
    /// Workers send progress events over a channel; they are delivered to
    /// the callback on the calling thread while the pages run.
    fn run_pages<T, R, F>(&self, items: Vec<T>, work: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T, &Sender<ProgressEvent>) -> R + Send + Sync,
    {
        let (tx, rx) = crossbeam_channel::unbounded();
        let parallel = self.options.parallel;
        let pool = self.pool.as_ref();

        std::thread::scope(|scope| {
            let worker = scope.spawn(move || {
                let run = || -> Vec<R> {
                    if parallel {
                        items.into_par_iter().map(|item| work(item, &tx)).collect()
                    } else {
                        items.into_iter().map(|item| work(item, &tx)).collect()
                    }
                };
                match pool {
                    Some(pool) => pool.install(run),
                    None => run(),
                }
            });
            for event in rx.iter() {
                self.emit(event);
            }
            match worker.join() {
                Ok(results) => results,
                Err(panic) => std::panic::resume_unwind(panic),
            }
        })
    }
}

/// Move a page out of `pages`, leaving a placeholder until it is put back.
fn take_page(pages: &mut [PageBlocks], slot: usize) -> PageBlocks {
    let number = pages[slot].page();
    std::mem::replace(&mut pages[slot], PageBlocks::new(number))
}

fn fail_page(page: &mut PageBlocks, error: &Error, events: &Sender<ProgressEvent>) {
    page.job.fail(error);
    let _ = events.send(ProgressEvent::PageFailed {
        page: page.page(),
        reason: error.to_string(),
    });
}

/// Remove unreachable objects, compress streams and write the document.
pub fn save_document(doc: &mut LopdfDocument, path: &Path) -> Result<()> {
    let pruned = doc.prune_objects();
    if !pruned.is_empty() {
        log::debug!("Pruned {} unreachable objects", pruned.len());
    }
    doc.compress();
    doc.save(path)?;
    Ok(())
}
