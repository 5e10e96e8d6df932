//! Reading order over the blocks of one page.
//!
//! Blocks become nodes of a precedence graph: `a -> b` when `a` directly
//! precedes `b` along the page's reading axis and no third block lies between
//! them. A topological sort with a direction-specific tie-break yields the
//! order.

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

/// Share of block area that must be tall and narrow for vertical ordering.
const VERTICAL_AREA_RATIO: f32 = 0.7;
/// Width of the occupancy slices used to find column gutters.
const SLICE_WIDTH: f32 = 3.0;
/// Narrowest empty band that counts as a gutter.
const MIN_GUTTER_WIDTH: f32 = 12.0;
/// Narrowest column accepted between two gutters.
const MIN_COLUMN_WIDTH: f32 = 80.0;
/// Pages narrower than this never have columns.
const MIN_MULTI_COLUMN_EXTENT: f32 = 250.0;
/// Blocks wider than this share of the text extent span columns.
const SPANNING_RATIO: f32 = 0.6;
/// Slack for touching edges.
const EDGE_TOLERANCE: f32 = 1.0;

/// Dominant reading axis of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingDirection {
    /// Single column, top to bottom
    TopToBottom,
    /// Several columns read left to right
    MultiColumn,
    /// Vertical script: columns read right to left
    Vertical,
}

/// A text column, in PDF x coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Column {
    pub left: f32,
    pub right: f32,
    pub index: usize,
}

/// Detect text columns from empty vertical bands between block boxes.
///
/// Blocks spanning most of the text width (titles, wide tables) are ignored
/// so they do not hide the gutter.
pub fn detect_columns(boxes: &[Rect]) -> Vec<Column> {
    let Some(min_x) = boxes.iter().map(|b| b.x0).min_by(|a, b| a.total_cmp(b)) else {
        return Vec::new();
    };
    let max_x = boxes
        .iter()
        .map(|b| b.x1)
        .max_by(|a, b| a.total_cmp(b))
        .unwrap_or(min_x);
    let single = vec![Column {
        left: min_x,
        right: max_x,
        index: 0,
    }];

    let extent = max_x - min_x;
    if extent < MIN_MULTI_COLUMN_EXTENT {
        return single;
    }

    let narrow: Vec<&Rect> = boxes
        .iter()
        .filter(|b| b.width() <= extent * SPANNING_RATIO)
        .collect();
    let slices = (extent / SLICE_WIDTH) as usize + 1;
    let mut occupancy = vec![0usize; slices];
    for b in &narrow {
        let start = ((b.x0 - min_x) / SLICE_WIDTH) as usize;
        let end = (((b.x1 - min_x) / SLICE_WIDTH) as usize).min(slices - 1);
        for slot in occupancy.iter_mut().take(end + 1).skip(start) {
            *slot += 1;
        }
    }

    // gutters are only searched in the middle 70% of the text extent
    let search_start = slices * 15 / 100;
    let search_end = slices * 85 / 100;
    let mut gutters = Vec::new();
    let mut run_start = None;
    for (i, &count) in occupancy
        .iter()
        .enumerate()
        .take(search_end + 1)
        .skip(search_start)
    {
        let empty = count == 0 && i < search_end;
        match (empty, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                let width = (i - start) as f32 * SLICE_WIDTH;
                if width >= MIN_GUTTER_WIDTH {
                    gutters.push(min_x + (start as f32 + (i - start) as f32 / 2.0) * SLICE_WIDTH);
                }
                run_start = None;
            }
            _ => {}
        }
    }

    let has_block = |left: f32, right: f32| {
        narrow
            .iter()
            .any(|b| b.center_x() >= left && b.center_x() < right)
    };
    let mut bounds = vec![min_x];
    for gutter in gutters {
        let left = bounds[bounds.len() - 1];
        if gutter - left >= MIN_COLUMN_WIDTH && has_block(left, gutter) {
            bounds.push(gutter);
        }
    }
    while bounds.len() > 1 {
        let last = bounds[bounds.len() - 1];
        if max_x - last >= MIN_COLUMN_WIDTH && has_block(last, max_x + EDGE_TOLERANCE) {
            break;
        }
        bounds.pop();
    }
    if bounds.len() == 1 {
        return single;
    }
    bounds.push(max_x);

    log::debug!("Detected {} text columns: {:?}", bounds.len() - 1, bounds);
    bounds
        .windows(2)
        .enumerate()
        .map(|(index, w)| Column {
            left: w[0],
            right: w[1],
            index,
        })
        .collect()
}

fn column_of(columns: &[Column], x: f32) -> usize {
    columns
        .iter()
        .find(|c| x < c.right)
        .or(columns.last())
        .map(|c| c.index)
        .unwrap_or(0)
}

/// Choose the reading direction by an area-weighted vote.
pub fn detect_direction(boxes: &[Rect], columns: &[Column]) -> ReadingDirection {
    let total: f32 = boxes.iter().map(Rect::area).sum();
    let tall: f32 = boxes
        .iter()
        .filter(|b| b.height() > b.width())
        .map(Rect::area)
        .sum();
    if total > 0.0 && tall / total >= VERTICAL_AREA_RATIO {
        ReadingDirection::Vertical
    } else if columns.len() >= 2 {
        ReadingDirection::MultiColumn
    } else {
        ReadingDirection::TopToBottom
    }
}

/// Whether `a` lies entirely above `b`.
fn above(a: &Rect, b: &Rect) -> bool {
    a.y0 >= b.y1 - EDGE_TOLERANCE
}

/// Whether `a` lies entirely left of `b`.
fn left_of(a: &Rect, b: &Rect) -> bool {
    a.x1 <= b.x0 + EDGE_TOLERANCE
}

fn spans_overlap(a0: f32, a1: f32, b0: f32, b1: f32) -> bool {
    a1.min(b1) - a0.max(b0) > 0.0
}

/// Whether some box other than `a` and `b` separates them vertically
/// inside their shared x range.
fn blocked_vertically(boxes: &[Rect], a: usize, b: usize) -> bool {
    let (ra, rb) = (&boxes[a], &boxes[b]);
    let x0 = ra.x0.max(rb.x0);
    let x1 = ra.x1.min(rb.x1);
    boxes.iter().enumerate().any(|(i, c)| {
        i != a && i != b && above(ra, c) && above(c, rb) && spans_overlap(c.x0, c.x1, x0, x1)
    })
}

/// Whether some box other than `a` and `b` separates them horizontally
/// inside their shared y range.
fn blocked_horizontally(boxes: &[Rect], a: usize, b: usize) -> bool {
    let (ra, rb) = (&boxes[a], &boxes[b]);
    let y0 = ra.y0.max(rb.y0);
    let y1 = ra.y1.min(rb.y1);
    boxes.iter().enumerate().any(|(i, c)| {
        i != a && i != b && left_of(ra, c) && left_of(c, rb) && spans_overlap(c.y0, c.y1, y0, y1)
    })
}

/// Whether `a` directly precedes `b`.
fn precedes(boxes: &[Rect], direction: ReadingDirection, a: usize, b: usize) -> bool {
    let (ra, rb) = (&boxes[a], &boxes[b]);
    let stacked = ra.x_overlap(rb) > 0.0 && above(ra, rb) && !blocked_vertically(boxes, a, b);
    if stacked {
        return true;
    }
    if ra.y_overlap(rb) <= 0.0 {
        return false;
    }
    match direction {
        ReadingDirection::Vertical => left_of(rb, ra) && !blocked_horizontally(boxes, b, a),
        _ => left_of(ra, rb) && !blocked_horizontally(boxes, a, b),
    }
}

/// Tie-break key: smaller goes first.
fn sort_key(direction: ReadingDirection, columns: &[Column], b: &Rect) -> (f32, f32) {
    match direction {
        ReadingDirection::TopToBottom => (-b.y1, b.x0),
        ReadingDirection::MultiColumn => (column_of(columns, b.center_x()) as f32, -b.y1),
        ReadingDirection::Vertical => (-b.x1, -b.y1),
    }
}

/// Compute the reading order of `boxes`.
///
/// Returns the direction used and a permutation of box indices.
pub fn reading_order(boxes: &[Rect]) -> (ReadingDirection, Vec<usize>) {
    let columns = detect_columns(boxes);
    let direction = detect_direction(boxes, &columns);
    let n = boxes.len();

    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut in_degree = vec![0usize; n];
    for a in 0..n {
        for b in 0..n {
            if a != b && precedes(boxes, direction, a, b) {
                successors[a].push(b);
                in_degree[b] += 1;
            }
        }
    }

    let keys: Vec<(f32, f32)> = boxes
        .iter()
        .map(|b| sort_key(direction, &columns, b))
        .collect();
    let cmp = |a: &usize, b: &usize| {
        keys[*a]
            .0
            .total_cmp(&keys[*b].0)
            .then(keys[*a].1.total_cmp(&keys[*b].1))
            .then(a.cmp(b))
    };

    let mut done = vec![false; n];
    let mut order = Vec::with_capacity(n);
    while order.len() < n {
        let ready = (0..n)
            .filter(|&i| !done[i] && in_degree[i] == 0)
            .min_by(cmp);
        // a cycle leaves nothing ready; the key order breaks it
        let next = match ready {
            Some(i) => i,
            None => {
                let Some(i) = (0..n).filter(|&i| !done[i]).min_by(cmp) else {
                    break;
                };
                log::debug!("Reading-order cycle broken at box {}", i);
                i
            }
        };
        done[next] = true;
        order.push(next);
        for &s in &successors[next] {
            in_degree[s] = in_degree[s].saturating_sub(1);
        }
    }

    (direction, order)
}
