//! Translation options and configuration.

use std::path::PathBuf;

use crate::builder::BuilderConfig;
use crate::error::{Error, Result};
use crate::fit::FitConfig;
use crate::layout::{validate_dpi, DEFAULT_DPI};
use crate::parser::PageSelection;

/// Memory per page rendered at 300 DPI (A4, RGB).
pub const BASE_MB_PER_PAGE: f64 = 26.0;
/// Share of the available memory the layout stage may use.
pub const MEMORY_SAFETY_RATIO: f64 = 0.5;
/// Pages per layout-model call.
pub const DEFAULT_LAYOUT_BATCH: usize = 5;
/// Characters per translation request.
pub const DEFAULT_BATCH_CHARS: usize = 4000;

/// Options for translating a document.
#[derive(Debug, Clone)]
pub struct TranslateOptions {
    /// Output language tag (`ja`, `en`, `zh-CN`, …)
    pub target_language: String,

    /// Source language tag, passed through to the translation provider
    pub source_language: Option<String>,

    /// Page selection (which pages to translate)
    pub pages: PageSelection,

    /// Rendering resolution for the layout model (72–600)
    pub dpi: u32,

    /// Estimated memory per page at 300 DPI, in MB
    pub base_mb_per_page: f64,

    /// Share of the available memory the layout stage may use
    pub memory_safety_ratio: f64,

    /// Pages per layout-model call before memory adjustment
    pub layout_batch_size: usize,

    /// Worker threads (0 = rayon default)
    pub workers: usize,

    /// Whether to process pages in parallel
    pub parallel: bool,

    /// Character budget of one translation request
    pub batch_chars: usize,

    /// Directories searched for target-language fonts before the system ones
    pub font_dirs: Vec<PathBuf>,

    /// Font file used for the target language
    pub font_file: Option<PathBuf>,

    /// Ignore layout detections below this confidence
    pub min_confidence: f32,

    /// Paragraph and table thresholds
    pub builder: BuilderConfig,

    /// Box fitting limits
    pub fit: FitConfig,
}

impl TranslateOptions {
    /// Create options for a target language with defaults.
    pub fn new(target_language: impl Into<String>) -> Self {
        Self {
            target_language: target_language.into(),
            ..Self::default()
        }
    }

    /// Set the source language.
    pub fn with_source_language(mut self, language: impl Into<String>) -> Self {
        self.source_language = Some(language.into());
        self
    }

    /// Set page selection.
    pub fn with_pages(mut self, pages: PageSelection) -> Self {
        self.pages = pages;
        self
    }

    /// Set the layout rendering resolution.
    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    /// Set the memory estimate per page and the usable share of memory.
    pub fn with_memory_budget(mut self, base_mb_per_page: f64, safety_ratio: f64) -> Self {
        self.base_mb_per_page = base_mb_per_page;
        self.memory_safety_ratio = safety_ratio;
        self
    }

    /// Set the default layout batch size.
    pub fn with_layout_batch_size(mut self, size: usize) -> Self {
        self.layout_batch_size = size;
        self
    }

    /// Set the number of worker threads.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Enable or disable parallel processing.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Set the character budget of one translation request.
    pub fn with_batch_chars(mut self, chars: usize) -> Self {
        self.batch_chars = chars;
        self
    }

    /// Add a font search directory.
    pub fn with_font_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.font_dirs.push(dir.into());
        self
    }

    /// Use a specific font file for the target language.
    pub fn with_font_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_file = Some(path.into());
        self
    }

    /// Set the layout confidence floor.
    pub fn with_min_confidence(mut self, confidence: f32) -> Self {
        self.min_confidence = confidence;
        self
    }

    /// Set the builder thresholds.
    pub fn with_builder_config(mut self, config: BuilderConfig) -> Self {
        self.builder = config;
        self
    }

    /// Set the box fitting limits.
    pub fn with_fit_config(mut self, config: FitConfig) -> Self {
        self.fit = config;
        self
    }

    /// Check the options before any page is touched.
    pub fn validate(&self) -> Result<()> {
        if self.target_language.trim().is_empty() {
            return Err(Error::Config("target language is empty".to_string()));
        }
        validate_dpi(self.dpi)?;
        if !(self.base_mb_per_page > 0.0) {
            return Err(Error::Config("memory per page must be positive".to_string()));
        }
        if !(self.memory_safety_ratio > 0.0 && self.memory_safety_ratio <= 1.0) {
            return Err(Error::Config(format!(
                "memory safety ratio must be in (0, 1], got {}",
                self.memory_safety_ratio
            )));
        }
        if self.layout_batch_size == 0 {
            return Err(Error::Config("layout batch size must be at least 1".to_string()));
        }
        if self.batch_chars == 0 {
            return Err(Error::Config("translation batch budget must be at least 1".to_string()));
        }
        self.builder.validate()
    }
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            target_language: "ja".to_string(),
            source_language: None,
            pages: PageSelection::All,
            dpi: DEFAULT_DPI,
            base_mb_per_page: BASE_MB_PER_PAGE,
            memory_safety_ratio: MEMORY_SAFETY_RATIO,
            layout_batch_size: DEFAULT_LAYOUT_BATCH,
            workers: 0,
            parallel: true,
            batch_chars: DEFAULT_BATCH_CHARS,
            font_dirs: Vec::new(),
            font_file: None,
            min_confidence: 0.0,
            builder: BuilderConfig::default(),
            fit: FitConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_builder() {
        let options = TranslateOptions::new("en")
            .with_source_language("ja")
            .with_pages(PageSelection::Pages(vec![2, 4]))
            .with_dpi(150)
            .with_batch_chars(1000)
            .with_font_dir("/opt/fonts")
            .sequential();

        assert_eq!(options.target_language, "en");
        assert_eq!(options.source_language.as_deref(), Some("ja"));
        assert_eq!(options.dpi, 150);
        assert_eq!(options.batch_chars, 1000);
        assert_eq!(options.font_dirs, vec![PathBuf::from("/opt/fonts")]);
        assert!(!options.parallel);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_default_options() {
        let options = TranslateOptions::default();
        assert_eq!(options.dpi, 300);
        assert_eq!(options.batch_chars, 4000);
        assert_eq!(options.layout_batch_size, 5);
        assert!(options.parallel);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(matches!(
            TranslateOptions::new("ja").with_dpi(50).validate(),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            TranslateOptions::new(" ").validate(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            TranslateOptions::new("ja").with_memory_budget(26.0, 1.5).validate(),
            Err(Error::Config(_))
        ));
        assert!(TranslateOptions::new("ja").with_batch_chars(0).validate().is_err());
    }
}
