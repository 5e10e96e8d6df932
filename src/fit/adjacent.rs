//! Neighbour constraints between the blocks of one page.

use crate::geometry::Rect;
use crate::model::Block;

/// Split two overlapping rectangles at the middle of their overlap.
///
/// The cut runs across the axis with the smaller overlap unless one box
/// nests inside the other along that axis. Returns whether anything changed.
fn separate(a: &mut Rect, b: &mut Rect) -> bool {
    let ox = a.x_overlap(b);
    let oy = a.y_overlap(b);
    if ox <= 0.0 || oy <= 0.0 {
        return false;
    }
    let nested = |a0: f32, a1: f32, b0: f32, b1: f32| (a0 <= b0 && a1 >= b1) || (b0 <= a0 && b1 >= a1);
    let x_nested = nested(a.x0, a.x1, b.x0, b.x1);
    let y_nested = nested(a.y0, a.y1, b.y0, b.y1);
    let cut_x = match (x_nested, y_nested) {
        (false, true) => true,
        (true, false) => false,
        _ => ox <= oy,
    };

    if cut_x {
        let mid = (a.x0.max(b.x0) + a.x1.min(b.x1)) / 2.0;
        let (left, right) = if a.center_x() <= b.center_x() { (a, b) } else { (b, a) };
        left.x1 = mid;
        right.x0 = mid;
    } else {
        let mid = (a.y0.max(b.y0) + a.y1.min(b.y1)) / 2.0;
        let (lower, upper) = if a.center_y() <= b.center_y() { (a, b) } else { (b, a) };
        lower.y1 = mid;
        upper.y0 = mid;
    }
    true
}

/// Clip block boxes so that no two overlap.
pub fn resolve_overlaps(blocks: &mut [Block]) {
    let n = blocks.len();
    let mut clipped = 0usize;
    // each cut removes one overlapping pair; later cuts only shrink boxes
    for _ in 0..n.max(1) {
        let mut changed = false;
        for i in 0..n {
            for j in (i + 1)..n {
                let (head, tail) = blocks.split_at_mut(j);
                if separate(&mut head[i].bbox, &mut tail[0].bbox) {
                    changed = true;
                    clipped += 1;
                }
            }
        }
        if !changed {
            break;
        }
    }
    if clipped > 0 {
        log::debug!("Clipped {} overlapping block pairs", clipped);
    }
}

/// Compute the free space around every block.
///
/// Horizontal room is half the gap to the nearest row neighbour, vertical
/// room half the gap to the nearest neighbour whose horizontally expanded box
/// shares x range. Both are bounded by the page margin. Expanded boxes of two
/// blocks never overlap as long as the original boxes are disjoint.
pub fn compute_expandable(blocks: &mut [Block], page: &Rect, page_margin: f32) {
    let boxes: Vec<Rect> = blocks.iter().map(|b| b.bbox).collect();
    let left_limit = page.x0 + page_margin;
    let right_limit = page.x1 - page_margin;
    let bottom_limit = page.y0 + page_margin;
    let top_limit = page.y1 - page_margin;

    let mut horizontal = Vec::with_capacity(boxes.len());
    for (i, b) in boxes.iter().enumerate() {
        let mut left = (b.x0 - left_limit).max(0.0);
        let mut right = (right_limit - b.x1).max(0.0);
        for (j, n) in boxes.iter().enumerate() {
            if i == j || b.y_overlap(n) <= 0.0 {
                continue;
            }
            if n.x1 <= b.x0 {
                left = left.min((b.x0 - n.x1) / 2.0);
            } else if n.x0 >= b.x1 {
                right = right.min((n.x0 - b.x1) / 2.0);
            }
        }
        horizontal.push((left, right));
    }

    let widened: Vec<(f32, f32)> = boxes
        .iter()
        .zip(&horizontal)
        .map(|(b, (l, r))| (b.x0 - l, b.x1 + r))
        .collect();

    for (i, block) in blocks.iter_mut().enumerate() {
        let b = &boxes[i];
        let mut bottom = (b.y0 - bottom_limit).max(0.0);
        let mut top = (top_limit - b.y1).max(0.0);
        for (j, n) in boxes.iter().enumerate() {
            let shares_x = widened[i].1.min(widened[j].1) - widened[i].0.max(widened[j].0) > 0.0;
            if i == j || !shares_x {
                continue;
            }
            if n.y1 <= b.y0 {
                bottom = bottom.min((b.y0 - n.y1) / 2.0);
            } else if n.y0 >= b.y1 {
                top = top.min((n.y0 - b.y1) / 2.0);
            }
        }
        block.expandable_left = horizontal[i].0;
        block.expandable_right = horizontal[i].1;
        block.expandable_bottom = bottom;
        block.expandable_top = top;
    }
}
