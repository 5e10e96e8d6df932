//! PDF ↔ raster image coordinate conversion.
//!
//! PDF space has its origin at the bottom-left corner with Y pointing up and
//! one unit per 1/72 inch. Raster space (the rendered bitmap handed to the
//! layout model) has its origin at the top-left corner with Y pointing down
//! and one unit per pixel:
//!
//! ```text
//! image_x = pdf_x * scale
//! image_y = (page_height - pdf_y) * scale      scale = dpi / 72
//! ```

use crate::error::{Error, Result};
use crate::layout::{LayoutArray, BACKGROUND};

use super::Rect;

/// PDF user-space units per inch.
pub const PDF_UNITS_PER_INCH: f32 = 72.0;

/// Raster scale factor for a rendering resolution.
pub fn scale_for_dpi(dpi: u32) -> f32 {
    dpi as f32 / PDF_UNITS_PER_INCH
}

fn check_preconditions(page_height: f32, scale: f32) -> Result<()> {
    if !page_height.is_finite() || page_height <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "page height must be positive, got {}",
            page_height
        )));
    }
    if !scale.is_finite() || scale <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "scale must be positive, got {}",
            scale
        )));
    }
    Ok(())
}

fn check_point(x: f32, y: f32) -> Result<()> {
    if !x.is_finite() || !y.is_finite() {
        return Err(Error::InvalidInput(format!(
            "non-finite coordinate ({}, {})",
            x, y
        )));
    }
    Ok(())
}

/// Convert a PDF point to raster coordinates.
pub fn pdf_to_image(x: f32, y: f32, page_height: f32, scale: f32) -> Result<(f32, f32)> {
    check_preconditions(page_height, scale)?;
    check_point(x, y)?;
    Ok((x * scale, (page_height - y) * scale))
}

/// Convert a raster point back to PDF coordinates.
pub fn image_to_pdf(x: f32, y: f32, page_height: f32, scale: f32) -> Result<(f32, f32)> {
    check_preconditions(page_height, scale)?;
    check_point(x, y)?;
    Ok((x / scale, page_height - y / scale))
}

/// Convert a PDF rectangle to a raster box `(x0, top, x1, bottom)`.
///
/// The Y corners swap: the PDF top edge (`y1`) becomes the raster `y0`.
pub fn pdf_bbox_to_image(rect: &Rect, page_height: f32, scale: f32) -> Result<[f32; 4]> {
    let (x0, top) = pdf_to_image(rect.x0, rect.y1, page_height, scale)?;
    let (x1, bottom) = pdf_to_image(rect.x1, rect.y0, page_height, scale)?;
    Ok([x0, top, x1, bottom])
}

/// Convert a raster box `[x0, y0, x1, y1]` (top-left origin) to a PDF rectangle.
pub fn image_bbox_to_pdf(bbox: [f32; 4], page_height: f32, scale: f32) -> Result<Rect> {
    let (x0, y_top) = image_to_pdf(bbox[0], bbox[1], page_height, scale)?;
    let (x1, y_bottom) = image_to_pdf(bbox[2], bbox[3], page_height, scale)?;
    Ok(Rect::new(x0, y_bottom, x1, y_top))
}

/// Look up the layout category under a PDF point.
///
/// Called once per extracted glyph, so it never fails: invalid input, an
/// empty grid or a point off the page yields [`BACKGROUND`]. Indices are
/// clamped into the grid for points that land exactly on the far edges.
pub fn layout_class_at_pdf_point(
    layout: &LayoutArray,
    x: f32,
    y: f32,
    page_height: f32,
    scale: f32,
) -> u16 {
    if layout.width() == 0 || layout.height() == 0 {
        return BACKGROUND;
    }
    let Ok((ix, iy)) = pdf_to_image(x, y, page_height, scale) else {
        return BACKGROUND;
    };
    if ix < -1.0
        || iy < -1.0
        || ix > layout.width() as f32 + 1.0
        || iy > layout.height() as f32 + 1.0
    {
        return BACKGROUND;
    }
    let col = (ix.max(0.0) as usize).min(layout.width() - 1);
    let row = (iy.max(0.0) as usize).min(layout.height() - 1);
    layout.get(col, row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{LayoutArray, ABANDON};

    const EPS: f32 = 1e-3;

    #[test]
    fn test_pdf_to_image_flips_y() {
        let (x, y) = pdf_to_image(72.0, 792.0, 792.0, 300.0 / 72.0).unwrap();
        assert!((x - 300.0).abs() < EPS);
        assert!(y.abs() < EPS);

        let (_, y) = pdf_to_image(0.0, 0.0, 792.0, 1.0).unwrap();
        assert!((y - 792.0).abs() < EPS);
    }

    #[test]
    fn test_inverse_law() {
        let heights = [1.0_f32, 100.0, 612.0, 792.0, 1683.8];
        let scales = [0.5_f32, 1.0, 72.0 / 72.0, 150.0 / 72.0, 300.0 / 72.0, 600.0 / 72.0];
        let points = [(0.0_f32, 0.0_f32), (10.5, 700.25), (595.0, 842.0), (-3.0, 1000.0)];
        for &h in &heights {
            for &s in &scales {
                for &(x, y) in &points {
                    let (ix, iy) = pdf_to_image(x, y, h, s).unwrap();
                    let (px, py) = image_to_pdf(ix, iy, h, s).unwrap();
                    let tol = 1e-3 * (1.0 + x.abs().max(y.abs()).max(h));
                    assert!((px - x).abs() < tol, "x {} -> {} (h={}, s={})", x, px, h, s);
                    assert!((py - y).abs() < tol, "y {} -> {} (h={}, s={})", y, py, h, s);
                }
            }
        }
    }

    #[test]
    fn test_strict_conversion_rejects_bad_preconditions() {
        assert!(matches!(
            pdf_to_image(1.0, 1.0, 0.0, 1.0),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            image_to_pdf(1.0, 1.0, 792.0, -2.0),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            pdf_to_image(f32::NAN, 1.0, 792.0, 1.0),
            Err(Error::InvalidInput(_))
        ));
        assert!(image_to_pdf(1.0, 1.0, f32::INFINITY, 1.0).is_err());
    }

    #[test]
    fn test_bbox_round_trip_swaps_corners() {
        let rect = Rect::new(100.0, 600.0, 300.0, 650.0);
        let img = pdf_bbox_to_image(&rect, 792.0, 2.0).unwrap();
        assert!((img[1] - (792.0 - 650.0) * 2.0).abs() < EPS);
        assert!((img[3] - (792.0 - 600.0) * 2.0).abs() < EPS);
        assert!(img[1] < img[3]);

        let back = image_bbox_to_pdf(img, 792.0, 2.0).unwrap();
        assert!((back.x0 - rect.x0).abs() < EPS);
        assert!((back.y0 - rect.y0).abs() < EPS);
        assert!((back.x1 - rect.x1).abs() < EPS);
        assert!((back.y1 - rect.y1).abs() < EPS);
    }

    #[test]
    fn test_layout_lookup_degrades_to_background() {
        let mut layout = LayoutArray::background(10, 10);
        layout.fill_rect(0, 0, 10, 10, ABANDON);

        // valid lookup
        assert_eq!(layout_class_at_pdf_point(&layout, 5.0, 5.0, 10.0, 1.0), ABANDON);
        // far edge clamps into the grid
        assert_eq!(layout_class_at_pdf_point(&layout, 10.0, 0.0, 10.0, 1.0), ABANDON);
        // invalid inputs
        assert_eq!(layout_class_at_pdf_point(&layout, 5.0, 5.0, 0.0, 1.0), BACKGROUND);
        assert_eq!(layout_class_at_pdf_point(&layout, 5.0, 5.0, 10.0, 0.0), BACKGROUND);
        assert_eq!(layout_class_at_pdf_point(&layout, f32::NAN, 5.0, 10.0, 1.0), BACKGROUND);
        // off the page
        assert_eq!(layout_class_at_pdf_point(&layout, -50.0, 5.0, 10.0, 1.0), BACKGROUND);
        // empty grid
        let empty = LayoutArray::background(0, 0);
        assert_eq!(layout_class_at_pdf_point(&empty, 1.0, 1.0, 10.0, 1.0), BACKGROUND);
    }
}
