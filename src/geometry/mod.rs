//! Geometry primitives and coordinate conversion.

mod coords;
mod matrix;
mod rect;

pub use coords::{
    image_bbox_to_pdf, image_to_pdf, layout_class_at_pdf_point, pdf_bbox_to_image, pdf_to_image,
    scale_for_dpi, PDF_UNITS_PER_INCH,
};
pub use matrix::Matrix;
pub use rect::Rect;
