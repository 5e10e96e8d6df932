//! Page rendering and layout-model invocation.

use std::sync::Arc;

use lopdf::Document as LopdfDocument;

use crate::error::{Error, Result};

use super::array::{LayoutArray, LayoutLabel};
use super::model::{Detection, GeometryRasterizer, ModelCache, PageImage, PageRasterizer};

/// Lowest supported rendering resolution.
pub const MIN_DPI: u32 = 72;
/// Highest supported rendering resolution.
pub const MAX_DPI: u32 = 600;
/// Default rendering resolution for the layout model.
pub const DEFAULT_DPI: u32 = 300;

/// Runs the layout model over rendered pages and builds [`LayoutArray`]s.
pub struct LayoutAnalyzer {
    models: Arc<ModelCache>,
    rasterizer: Arc<dyn PageRasterizer>,
    dpi: u32,
    min_confidence: f32,
}

impl LayoutAnalyzer {
    /// Create an analyzer. Fails with `InvalidInput` when `dpi` is outside 72–600.
    pub fn new(models: Arc<ModelCache>, dpi: u32) -> Result<Self> {
        validate_dpi(dpi)?;
        Ok(Self {
            models,
            rasterizer: Arc::new(GeometryRasterizer),
            dpi,
            min_confidence: 0.0,
        })
    }

    /// Use a different page rasterizer.
    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    /// Ignore detections below this confidence.
    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    /// Raster scale factor (`dpi / 72`).
    pub fn scale(&self) -> f32 {
        crate::geometry::scale_for_dpi(self.dpi)
    }

    /// Analyze a batch of pages given as `(page_number, (width, height))`.
    ///
    /// Returns one result per input page, in order. A rasterizer failure
    /// fails only its page; a model failure fails every page of the batch.
    pub fn analyze_batch(
        &self,
        doc: &LopdfDocument,
        pages: &[(u32, (f32, f32))],
    ) -> Vec<Result<LayoutArray>> {
        let mut results: Vec<Option<Result<LayoutArray>>> = (0..pages.len()).map(|_| None).collect();
        let mut images = Vec::new();
        let mut slots = Vec::new();

        for (slot, &(page_number, size)) in pages.iter().enumerate() {
            match self.rasterizer.rasterize(doc, page_number, size, self.dpi) {
                Ok(image) => {
                    images.push(image);
                    slots.push(slot);
                }
                Err(e) => results[slot] = Some(Err(e)),
            }
        }

        if !images.is_empty() {
            match self.detect(&images) {
                Ok(arrays) => {
                    for (slot, array) in slots.iter().zip(arrays) {
                        results[*slot] = Some(Ok(array));
                    }
                }
                Err(e) => {
                    let message = e.to_string();
                    for slot in &slots {
                        results[*slot] = Some(Err(Error::LayoutModel(message.clone())));
                    }
                }
            }
        }

        results
            .into_iter()
            .map(|r| r.unwrap_or_else(|| Err(Error::Other("page not analyzed".to_string()))))
            .collect()
    }

    /// Analyze a single page.
    pub fn analyze_page(
        &self,
        doc: &LopdfDocument,
        page_number: u32,
        page_size: (f32, f32),
    ) -> Result<LayoutArray> {
        self.analyze_batch(doc, &[(page_number, page_size)])
            .pop()
            .unwrap_or_else(|| Err(Error::Other("page not analyzed".to_string())))
    }

    fn detect(&self, images: &[PageImage]) -> Result<Vec<LayoutArray>> {
        let model = self.models.get_or_init()?;
        let detections = model.detect_batch(images)?;
        if detections.len() != images.len() {
            return Err(Error::LayoutModel(format!(
                "model '{}' returned {} results for {} pages",
                model.name(),
                detections.len(),
                images.len()
            )));
        }

        Ok(images
            .iter()
            .zip(detections)
            .map(|(image, found)| {
                log::debug!(
                    "Page {}: layout model '{}' returned {} regions",
                    image.page_number,
                    model.name(),
                    found.len()
                );
                let labelled: Vec<(Detection, LayoutLabel)> = found
                    .into_iter()
                    .map(|d| {
                        let label = model.label(d.category);
                        (d, label)
                    })
                    .collect();
                LayoutArray::from_detections(
                    &labelled,
                    image.width,
                    image.height,
                    self.min_confidence,
                )
            })
            .collect())
    }
}

/// Check a rendering resolution.
pub fn validate_dpi(dpi: u32) -> Result<()> {
    if !(MIN_DPI..=MAX_DPI).contains(&dpi) {
        return Err(Error::InvalidInput(format!(
            "layout DPI must be between {} and {}, got {}",
            MIN_DPI, MAX_DPI, dpi
        )));
    }
    Ok(())
}
