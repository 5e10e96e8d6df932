//! Dense per-pixel category grid.

use serde::{Deserialize, Serialize};

use super::model::Detection;

/// Region removed from translation (figures, formulas, seals).
pub const ABANDON: u16 = 0;
/// No region detected.
pub const BACKGROUND: u16 = 1;
/// First paragraph-range id.
pub const PARAGRAPH_BASE: u16 = 2;
/// Last paragraph-range id.
pub const PARAGRAPH_MAX: u16 = 999;
/// First table-range id.
pub const TABLE_BASE: u16 = 1000;
/// Last table-range id.
pub const TABLE_MAX: u16 = 1999;

/// Whether a category id belongs to the paragraph range.
pub fn is_paragraph_id(id: u16) -> bool {
    (PARAGRAPH_BASE..=PARAGRAPH_MAX).contains(&id)
}

/// Whether a category id belongs to the table range.
pub fn is_table_id(id: u16) -> bool {
    (TABLE_BASE..=TABLE_MAX).contains(&id)
}

/// Labels produced by the layout-detection model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutLabel {
    Text,
    ParagraphTitle,
    DocumentTitle,
    Abstract,
    Content,
    Reference,
    Footnote,
    Algorithm,
    Aside,
    Table,
    TableCaption,
    SectionHeader,
    Figure,
    FigureTitle,
    Chart,
    ChartTitle,
    Seal,
    Header,
    Footer,
    PageNumber,
    HeaderImage,
    FooterImage,
    Formula,
    FormulaNumber,
    Unknown,
}

impl LayoutLabel {
    /// Map a label name as emitted by document-layout models.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "text" => Self::Text,
            "paragraph_title" => Self::ParagraphTitle,
            "document_title" | "doc_title" => Self::DocumentTitle,
            "abstract" => Self::Abstract,
            "content" => Self::Content,
            "reference" => Self::Reference,
            "footnote" => Self::Footnote,
            "algorithm" => Self::Algorithm,
            "aside" | "aside_text" => Self::Aside,
            "table" => Self::Table,
            "table_caption" | "table_title" => Self::TableCaption,
            "section_header" => Self::SectionHeader,
            "figure" | "image" => Self::Figure,
            "figure_title" => Self::FigureTitle,
            "chart" => Self::Chart,
            "chart_title" => Self::ChartTitle,
            "seal" => Self::Seal,
            "header" => Self::Header,
            "footer" => Self::Footer,
            "page_number" | "number" => Self::PageNumber,
            "header_image" => Self::HeaderImage,
            "footer_image" => Self::FooterImage,
            "formula" => Self::Formula,
            "formula_number" => Self::FormulaNumber,
            _ => Self::Unknown,
        }
    }

    /// Map a PP-DocLayout category index.
    pub fn from_category(category: u32) -> Self {
        match category {
            0 => Self::ParagraphTitle,
            1 => Self::Figure,
            2 => Self::Text,
            3 => Self::PageNumber,
            4 => Self::Abstract,
            5 => Self::Content,
            6 => Self::FigureTitle,
            7 => Self::Formula,
            8 => Self::Table,
            9 => Self::TableCaption,
            10 => Self::Reference,
            11 => Self::DocumentTitle,
            12 => Self::Footnote,
            13 => Self::Header,
            14 => Self::Algorithm,
            15 => Self::Footer,
            16 => Self::Seal,
            17 => Self::ChartTitle,
            18 => Self::Chart,
            19 => Self::FormulaNumber,
            20 => Self::HeaderImage,
            21 => Self::FooterImage,
            22 => Self::Aside,
            _ => Self::Unknown,
        }
    }

    /// Regions whose text is removed from translation.
    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            Self::Figure
                | Self::FigureTitle
                | Self::Chart
                | Self::ChartTitle
                | Self::Seal
                | Self::HeaderImage
                | Self::FooterImage
                | Self::Formula
                | Self::FormulaNumber
        )
    }

    pub fn is_table(&self) -> bool {
        matches!(self, Self::Table | Self::TableCaption)
    }

    pub fn is_figure(&self) -> bool {
        matches!(
            self,
            Self::Figure | Self::Chart | Self::Seal | Self::FigureTitle | Self::ChartTitle
        )
    }
}

/// Kind of a labelled region, as seen by the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    Paragraph,
    Table,
    HeaderFooter,
    PageNumber,
}

/// A labelled region of the page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutRegion {
    /// Category id written into the grid
    pub id: u16,
    pub kind: RegionKind,
    pub label: LayoutLabel,
    /// `[x0, y0, x1, y1]` in raster pixels (top-left origin)
    pub bbox: [f32; 4],
    pub confidence: f32,
    /// Position in the model output
    pub order: usize,
}

/// Page-sized grid of category ids plus the regions that produced them.
#[derive(Debug, Clone)]
pub struct LayoutArray {
    grid: Vec<u16>,
    width: usize,
    height: usize,
    /// Regions in model order
    pub regions: Vec<LayoutRegion>,
    /// Figure-like boxes that were abandoned, in raster pixels
    pub figures: Vec<[f32; 4]>,
    /// The model returned nothing and the heuristic path must be used
    pub fallback_used: bool,
}

impl LayoutArray {
    /// An all-background grid.
    pub fn background(width: usize, height: usize) -> Self {
        Self {
            grid: vec![BACKGROUND; width * height],
            width,
            height,
            regions: Vec::new(),
            figures: Vec::new(),
            fallback_used: false,
        }
    }

    /// An all-background grid flagged for the Y/X threshold fallback.
    pub fn fallback(width: usize, height: usize) -> Self {
        Self {
            fallback_used: true,
            ..Self::background(width, height)
        }
    }

    /// Build the grid from model detections.
    ///
    /// Translatable boxes are painted first in model order, table boxes get
    /// table-range ids, and skipped boxes overwrite everything with
    /// [`ABANDON`] at the end. Boxes below `min_confidence` are ignored.
    pub fn from_detections(
        detections: &[(Detection, LayoutLabel)],
        width: usize,
        height: usize,
        min_confidence: f32,
    ) -> Self {
        let usable: Vec<(usize, &Detection, LayoutLabel)> = detections
            .iter()
            .enumerate()
            .filter(|(_, (d, _))| d.confidence >= min_confidence)
            .map(|(i, (d, l))| (i, d, *l))
            .collect();

        if usable.is_empty() || width == 0 || height == 0 {
            log::warn!(
                "Layout model returned no regions for page ({}x{}); using Y/X threshold fallback",
                width,
                height
            );
            return Self::fallback(width, height);
        }

        let mut layout = Self::background(width, height);
        let mut skip_boxes = Vec::new();
        let mut next_paragraph = PARAGRAPH_BASE;
        let mut next_table = TABLE_BASE;

        for (order, detection, label) in usable {
            let Some((x0, y0, x1, y1)) = layout.clip_box(&detection.bbox) else {
                continue;
            };

            if label.is_skipped() {
                skip_boxes.push((x0, y0, x1, y1));
                if label.is_figure() {
                    layout.figures.push(detection.bbox);
                }
                continue;
            }

            let (id, kind) = if label.is_table() {
                let id = next_table;
                if next_table < TABLE_MAX {
                    next_table += 1;
                }
                (id, RegionKind::Table)
            } else {
                let id = next_paragraph;
                if next_paragraph < PARAGRAPH_MAX {
                    next_paragraph += 1;
                }
                let kind = match label {
                    LayoutLabel::Header | LayoutLabel::Footer => RegionKind::HeaderFooter,
                    LayoutLabel::PageNumber => RegionKind::PageNumber,
                    _ => RegionKind::Paragraph,
                };
                (id, kind)
            };

            layout.fill_rect(x0, y0, x1, y1, id);
            layout.regions.push(LayoutRegion {
                id,
                kind,
                label,
                bbox: detection.bbox,
                confidence: detection.confidence,
                order,
            });
        }

        for (x0, y0, x1, y1) in skip_boxes {
            layout.fill_rect(x0, y0, x1, y1, ABANDON);
        }

        log::debug!(
            "Layout grid {}x{}: {} paragraph regions, {} table regions, {} figures",
            width,
            height,
            layout.paragraph_count(),
            layout.table_count(),
            layout.figures.len()
        );

        layout
    }

    /// Clip a raster box into grid indices with a one-pixel margin.
    fn clip_box(&self, bbox: &[f32; 4]) -> Option<(usize, usize, usize, usize)> {
        if bbox.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let max_x = self.width as i64 - 1;
        let max_y = self.height as i64 - 1;
        let clip = |v: f32, delta: i64, max: i64| (v as i64 + delta).clamp(0, max) as usize;
        let x0 = clip(bbox[0].min(bbox[2]), -1, max_x);
        let y0 = clip(bbox[1].min(bbox[3]), -1, max_y);
        let x1 = clip(bbox[0].max(bbox[2]), 1, max_x);
        let y1 = clip(bbox[1].max(bbox[3]), 1, max_y);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0, y0, x1, y1))
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Category id at a grid cell. Out-of-range cells are background.
    pub fn get(&self, col: usize, row: usize) -> u16 {
        if col >= self.width || row >= self.height {
            return BACKGROUND;
        }
        self.grid[row * self.width + col]
    }

    /// Paint `[x0, x1) × [y0, y1)` with a category id.
    pub fn fill_rect(&mut self, x0: usize, y0: usize, x1: usize, y1: usize, id: u16) {
        let x1 = x1.min(self.width);
        let y1 = y1.min(self.height);
        for row in y0..y1 {
            let start = row * self.width;
            for cell in &mut self.grid[start + x0.min(x1)..start + x1] {
                *cell = id;
            }
        }
    }

    /// Region registered under a category id.
    pub fn region(&self, id: u16) -> Option<&LayoutRegion> {
        self.regions.iter().find(|r| r.id == id)
    }

    /// Region kind for a category id; background and abandon have none.
    pub fn region_kind(&self, id: u16) -> Option<RegionKind> {
        if is_table_id(id) {
            return Some(RegionKind::Table);
        }
        if !is_paragraph_id(id) {
            return None;
        }
        Some(
            self.region(id)
                .map(|r| r.kind)
                .unwrap_or(RegionKind::Paragraph),
        )
    }

    pub fn paragraph_count(&self) -> usize {
        self.regions
            .iter()
            .filter(|r| r.kind != RegionKind::Table)
            .count()
    }

    pub fn table_count(&self) -> usize {
        self.regions
            .iter()
            .filter(|r| r.kind == RegionKind::Table)
            .count()
    }
}
