//! Table structure recovery from cell boxes.
//!
//! Cell left edges and top edges are clustered into column and row lines.
//! A cell's position is the last line at or before its edge, and its span is
//! one plus the number of lines its box straddles.

use crate::geometry::Rect;
use crate::model::TableCoord;

/// Cluster sorted values whose neighbours lie within `tolerance`.
///
/// Returns `(representative, support)` pairs; the representative is the
/// first value of the cluster.
fn cluster(mut values: Vec<f32>, tolerance: f32) -> Vec<(f32, usize)> {
    values.retain(|v| v.is_finite());
    values.sort_by(|a, b| a.total_cmp(b));
    let mut clusters: Vec<(f32, f32, usize)> = Vec::new();
    for v in values {
        match clusters.last_mut() {
            Some((_, last, count)) if v - *last <= tolerance => {
                *last = v;
                *count += 1;
            }
            _ => clusters.push((v, v, 1)),
        }
    }
    clusters.into_iter().map(|(first, _, n)| (first, n)).collect()
}

/// Keep column lines supported by at least two cells, plus the leftmost one.
///
/// A lone left edge usually belongs to a merged or centred header whose box
/// overlaps the cells of real columns; such a line is dropped. A lone cell
/// overlapping no other cell horizontally is a column of its own.
fn column_lines(cells: &[Rect], tolerance: f32) -> Vec<f32> {
    let clusters = cluster(cells.iter().map(|c| c.x0).collect(), tolerance);
    if clusters.iter().all(|(_, n)| *n < 2) {
        return clusters.into_iter().map(|(v, _)| v).collect();
    }
    let stands_alone = |line: f32| {
        let Some(lone) = cells.iter().position(|c| c.x0 == line) else {
            return false;
        };
        let (x0, x1) = (cells[lone].x0, cells[lone].x1);
        !cells
            .iter()
            .enumerate()
            .any(|(i, c)| i != lone && c.x0 < x1 - tolerance && c.x1 > x0 + tolerance)
    };
    clusters
        .iter()
        .enumerate()
        .filter(|(i, (v, n))| *i == 0 || *n >= 2 || stands_alone(*v))
        .map(|(_, (v, _))| *v)
        .collect()
}

/// Assign grid coordinates to the cells of one table.
///
/// `tolerance` is the distance within which edges belong to the same grid
/// line. The result is parallel to `cells`.
pub fn assign_table_grid(cells: &[Rect], tolerance: f32) -> Vec<TableCoord> {
    if cells.is_empty() {
        return Vec::new();
    }

    let columns = column_lines(cells, tolerance);
    // rows run top to bottom, so work on negated tops; a row may hold a
    // single cell when its neighbours are merged from above
    let rows: Vec<f32> = cluster(cells.iter().map(|c| -c.y1).collect(), tolerance)
        .into_iter()
        .map(|(v, _)| v)
        .collect();

    let locate = |lines: &[f32], start: f32, end: f32| -> (usize, usize) {
        let index = lines
            .iter()
            .rposition(|line| *line <= start + tolerance)
            .unwrap_or(0);
        let straddled = lines
            .iter()
            .filter(|line| **line > start + tolerance && **line < end)
            .count();
        (index, 1 + straddled)
    };

    let coords: Vec<TableCoord> = cells
        .iter()
        .map(|cell| {
            let (col, col_span) = locate(&columns, cell.x0, cell.x1);
            let (row, row_span) = locate(&rows, -cell.y1, -cell.y0);
            TableCoord {
                row,
                col,
                row_span,
                col_span,
            }
        })
        .collect();

    log::debug!(
        "Table grid: {} cells on {} rows x {} columns",
        cells.len(),
        rows.len(),
        columns.len()
    );
    coords
}
