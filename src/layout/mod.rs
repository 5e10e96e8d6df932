//! Layout classification: the dense label grid consumed by the builder and
//! the adapter around the external layout-detection model.

mod analyzer;
mod array;
mod model;

pub use analyzer::{validate_dpi, LayoutAnalyzer, DEFAULT_DPI, MAX_DPI, MIN_DPI};
pub use array::{
    is_paragraph_id, is_table_id, LayoutArray, LayoutLabel, LayoutRegion, RegionKind, ABANDON,
    BACKGROUND, PARAGRAPH_BASE, PARAGRAPH_MAX, TABLE_BASE, TABLE_MAX,
};
pub use model::{
    Detection, GeometryRasterizer, LayoutModel, ModelCache, NoopLayoutModel, PageImage,
    PageRasterizer,
};
