//! Axis-aligned rectangles in PDF space.

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in PDF coordinates (origin bottom-left, Y up).
///
/// `x0 <= x1` and `y0 <= y1` hold for every rectangle built through
/// [`Rect::new`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    /// Create a rectangle from two corners in any order.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn center_x(&self) -> f32 {
        (self.x0 + self.x1) / 2.0
    }

    pub fn center_y(&self) -> f32 {
        (self.y0 + self.y1) / 2.0
    }

    /// Whether all coordinates are finite.
    pub fn is_finite(&self) -> bool {
        self.x0.is_finite() && self.y0.is_finite() && self.x1.is_finite() && self.y1.is_finite()
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Intersection, if the rectangles share a region of positive area.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x0 = self.x0.max(other.x0);
        let y0 = self.y0.max(other.y0);
        let x1 = self.x1.min(other.x1);
        let y1 = self.y1.min(other.y1);
        if x1 > x0 && y1 > y0 {
            Some(Rect { x0, y0, x1, y1 })
        } else {
            None
        }
    }

    /// Positive-area overlap. Touching edges do not count.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.intersection(other).is_some()
    }

    /// Overlap of the X projections (may be negative when apart).
    pub fn x_overlap(&self, other: &Rect) -> f32 {
        self.x1.min(other.x1) - self.x0.max(other.x0)
    }

    /// Overlap of the Y projections (may be negative when apart).
    pub fn y_overlap(&self, other: &Rect) -> f32 {
        self.y1.min(other.y1) - self.y0.max(other.y0)
    }

    /// Whether `other` lies inside this rectangle (with a small tolerance).
    pub fn contains(&self, other: &Rect) -> bool {
        const EPS: f32 = 1e-3;
        other.x0 >= self.x0 - EPS
            && other.y0 >= self.y0 - EPS
            && other.x1 <= self.x1 + EPS
            && other.y1 <= self.y1 + EPS
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }

    /// Grow by the given amounts on each side.
    pub fn expand(&self, left: f32, bottom: f32, right: f32, top: f32) -> Rect {
        Rect {
            x0: self.x0 - left,
            y0: self.y0 - bottom,
            x1: self.x1 + right,
            y1: self.y1 + top,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes_corners() {
        let r = Rect::new(10.0, 50.0, 0.0, 20.0);
        assert_eq!(r, Rect { x0: 0.0, y0: 20.0, x1: 10.0, y1: 50.0 });
        assert_eq!(r.width(), 10.0);
        assert_eq!(r.height(), 30.0);
    }

    #[test]
    fn test_touching_rects_do_not_overlap() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 20.0, 10.0);
        assert!(!a.overlaps(&b));
        assert_eq!(a.x_overlap(&b), 0.0);

        let c = Rect::new(5.0, 5.0, 15.0, 15.0);
        assert!(a.overlaps(&c));
        assert_eq!(a.intersection(&c), Some(Rect::new(5.0, 5.0, 10.0, 10.0)));
    }

    #[test]
    fn test_union_and_contains() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(20.0, 5.0, 30.0, 40.0);
        let u = a.union(&b);
        assert!(u.contains(&a));
        assert!(u.contains(&b));
        assert!(!a.contains(&b));
        assert!(u.contains_point(15.0, 20.0));
    }
}
