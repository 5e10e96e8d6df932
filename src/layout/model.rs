//! Contracts for the external layout-detection model and page rasterizer.

use std::sync::{Arc, Mutex};

use lopdf::Document as LopdfDocument;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::array::LayoutLabel;

/// A labelled box returned by the layout model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// `[x0, y0, x1, y1]` in raster pixels, top-left origin
    pub bbox: [f32; 4],
    /// Model category index
    pub category: u32,
    pub confidence: f32,
}

/// A rendered page handed to the layout model.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub page_number: u32,
    pub width: usize,
    pub height: usize,
    pub dpi: u32,
    /// Packed RGB pixels; empty when the rasterizer reports geometry only
    pub pixels: Vec<u8>,
}

/// The external document-layout classifier.
///
/// Implementations are loaded once and shared between documents. `detect_batch`
/// receives one image per page and must return exactly one result list per
/// image; an empty list is a valid answer.
pub trait LayoutModel: Send + Sync {
    /// Model name for logs.
    fn name(&self) -> &str;

    /// Load weights. Called once before the first batch.
    fn init(&self) -> Result<()> {
        Ok(())
    }

    /// Run detection on a batch of page images.
    fn detect_batch(&self, images: &[PageImage]) -> Result<Vec<Vec<Detection>>>;

    /// Map a category index to a label.
    fn label(&self, category: u32) -> LayoutLabel {
        LayoutLabel::from_category(category)
    }

    /// Release weights and accelerator memory.
    fn clear(&self) {}
}

/// Model that never detects anything, forcing the heuristic fallback.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLayoutModel;

impl LayoutModel for NoopLayoutModel {
    fn name(&self) -> &str {
        "noop"
    }

    fn detect_batch(&self, images: &[PageImage]) -> Result<Vec<Vec<Detection>>> {
        Ok(vec![Vec::new(); images.len()])
    }
}

/// Renders a page to a bitmap for the layout model.
pub trait PageRasterizer: Send + Sync {
    fn rasterize(
        &self,
        doc: &LopdfDocument,
        page_number: u32,
        page_size: (f32, f32),
        dpi: u32,
    ) -> Result<PageImage>;
}

/// Rasterizer that only computes the bitmap geometry.
///
/// Suitable for models that work from the document itself or for the
/// heuristic path; no pixels are allocated.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeometryRasterizer;

impl PageRasterizer for GeometryRasterizer {
    fn rasterize(
        &self,
        _doc: &LopdfDocument,
        page_number: u32,
        page_size: (f32, f32),
        dpi: u32,
    ) -> Result<PageImage> {
        let (width, height) = page_size;
        if !(width > 0.0 && height > 0.0) {
            return Err(Error::InvalidInput(format!(
                "page {} has non-positive size {}x{}",
                page_number, width, height
            )));
        }
        let scale = crate::geometry::scale_for_dpi(dpi);
        Ok(PageImage {
            page_number,
            width: (width * scale).round() as usize,
            height: (height * scale).round() as usize,
            dpi,
            pixels: Vec::new(),
        })
    }
}

type ModelFactory = dyn Fn() -> Result<Arc<dyn LayoutModel>> + Send + Sync;

/// Process-wide holder for a loaded layout model.
///
/// The model is created lazily on first use and released by
/// [`ModelCache::clear_cache`], which the host calls after a batch of
/// documents.
pub struct ModelCache {
    factory: Box<ModelFactory>,
    slot: Mutex<Option<Arc<dyn LayoutModel>>>,
}

impl ModelCache {
    /// Create a cache around a model factory.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn LayoutModel>> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            slot: Mutex::new(None),
        }
    }

    /// Cache holding an already constructed model.
    pub fn with_model(model: Arc<dyn LayoutModel>) -> Self {
        let shared = model.clone();
        Self {
            factory: Box::new(move || Ok(shared.clone())),
            slot: Mutex::new(None),
        }
    }

    /// Return the loaded model, loading and initialising it if needed.
    pub fn get_or_init(&self) -> Result<Arc<dyn LayoutModel>> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| Error::LayoutModel("model cache lock poisoned".to_string()))?;
        if let Some(model) = slot.as_ref() {
            return Ok(model.clone());
        }
        let model = (self.factory)()?;
        model.init()?;
        log::info!("Layout model '{}' loaded", model.name());
        *slot = Some(model.clone());
        Ok(model)
    }

    /// Whether a model is currently loaded.
    pub fn is_loaded(&self) -> bool {
        self.slot.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    /// Release the loaded model.
    pub fn clear_cache(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            if let Some(model) = slot.take() {
                model.clear();
                log::debug!("Layout model '{}' released", model.name());
            }
        }
    }
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::with_model(Arc::new(NoopLayoutModel))
    }
}

impl std::fmt::Debug for ModelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCache")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
