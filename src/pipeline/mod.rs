//! Document translation pipeline.
//!
//! Every page moves through `PENDING → EXTRACTING → LAYOUT_ANALYZED → BUILT
//! → FITTED → WRITTEN`, or ends in `FAILED` without touching the rest of the
//! document. [`Translator::extract`] runs up to `BUILT`; the host translates
//! the blocks (or hands a [`TranslationProvider`] to
//! [`Translator::translate_document`]); [`Translator::apply`] fits and
//! writes the translations.

mod batch;
mod memory;
mod options;
mod orchestrator;
mod state;

pub use batch::{BatchOutcome, TranslationBatcher, TranslationContext, TranslationProvider};
pub use memory::{estimate_memory_mb, FixedMemory, MemoryBudget, MemoryProbe, SystemMemory};
pub use options::{
    TranslateOptions, BASE_MB_PER_PAGE, DEFAULT_BATCH_CHARS, DEFAULT_LAYOUT_BATCH,
    MEMORY_SAFETY_RATIO,
};
pub use orchestrator::{save_document, CancelHandle, PageBlocks, ProgressEvent, Stage, Translator};
pub use state::{PageFailure, PageJob, PageState};
