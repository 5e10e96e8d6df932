//! Classification of the transition between two consecutive characters.

use crate::layout::{is_paragraph_id, is_table_id, RegionKind, BACKGROUND};

use super::config::{BuilderConfig, PageThresholds};

/// What lies between two consecutive characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Same line of the same block
    SameLine,
    /// Wrapped line of the same block
    LineBreak,
    /// New block unless the text reads as a continuation
    Weak,
    /// Always a new block
    Strong,
}

impl Transition {
    pub fn is_boundary(&self) -> bool {
        matches!(self, Transition::Weak | Transition::Strong)
    }
}

/// Position and layout class of one character.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharPos {
    pub x0: f32,
    pub x1: f32,
    /// Bottom of the glyph box
    pub y0: f32,
    /// Layout category id
    pub class: u16,
    pub kind: Option<RegionKind>,
}

/// Boundary rules for one page.
#[derive(Debug, Clone, Copy)]
pub struct BoundaryClassifier<'a> {
    pub config: &'a BuilderConfig,
    pub thresholds: PageThresholds,
    /// Layout categories are meaningful (the model found regions)
    pub use_layout: bool,
}

impl<'a> BoundaryClassifier<'a> {
    pub fn new(config: &'a BuilderConfig, thresholds: PageThresholds, use_layout: bool) -> Self {
        Self {
            config,
            thresholds,
            use_layout,
        }
    }

    /// Classify the step from `prev` to `cur`.
    pub fn classify(&self, prev: &CharPos, cur: &CharPos) -> Transition {
        let transition = if self.use_layout {
            self.classify_layout(prev, cur)
        } else {
            self.classify_fallback(prev, cur)
        };
        // a glyph ending left of the previous one starts a new line
        if transition == Transition::SameLine && cur.x1 < prev.x0 - self.config.word_space_x {
            return Transition::LineBreak;
        }
        transition
    }

    fn classify_layout(&self, prev: &CharPos, cur: &CharPos) -> Transition {
        let t = &self.thresholds;
        let c = self.config;
        let dy = (cur.y0 - prev.y0).abs();
        let x_gap = cur.x0 - prev.x1;
        let x_reset = prev.x1 - cur.x0;

        if cur.class != prev.class {
            if cur.class == BACKGROUND || prev.class == BACKGROUND {
                return self.vertical_only(dy);
            }
            let strong = cur.kind != prev.kind || (is_table_id(cur.class) && is_table_id(prev.class));
            return if strong {
                Transition::Strong
            } else {
                Transition::Weak
            };
        }

        if is_table_id(cur.class) {
            if x_gap > c.table_cell_x {
                Transition::Strong
            } else if x_reset > t.x_column && dy <= c.table_row_y {
                Transition::Strong
            } else if dy > c.table_row_y {
                Transition::Strong
            } else if dy > t.y_line {
                Transition::LineBreak
            } else {
                Transition::SameLine
            }
        } else if is_paragraph_id(cur.class) {
            if x_gap > c.table_cell_x && dy <= t.y_line {
                Transition::Strong
            } else if dy > t.y_line && x_reset > c.toc_line_x_reset {
                Transition::Weak
            } else {
                self.vertical_only(dy)
            }
        } else {
            self.vertical_only(dy)
        }
    }

    fn classify_fallback(&self, prev: &CharPos, cur: &CharPos) -> Transition {
        let t = &self.thresholds;
        let dy = (cur.y0 - prev.y0).abs();
        let dx = cur.x0 - prev.x0;
        let x_reset = prev.x1 - cur.x0;

        if dy > t.y_para {
            Transition::Weak
        } else if dx > t.x_column {
            if cur.y0 > prev.y0 + t.y_line {
                Transition::Strong
            } else if dy > t.y_line {
                Transition::LineBreak
            } else {
                Transition::SameLine
            }
        } else if dy > t.y_line && x_reset > self.config.toc_line_x_reset {
            Transition::Weak
        } else if dy > t.y_line {
            Transition::LineBreak
        } else {
            Transition::SameLine
        }
    }

    fn vertical_only(&self, dy: f32) -> Transition {
        if dy > self.thresholds.y_para {
            Transition::Weak
        } else if dy > self.thresholds.y_line {
            Transition::LineBreak
        } else {
            Transition::SameLine
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{PARAGRAPH_BASE, TABLE_BASE};

    fn pos(x0: f32, y0: f32, class: u16) -> CharPos {
        let kind = if is_table_id(class) {
            Some(RegionKind::Table)
        } else if is_paragraph_id(class) {
            Some(RegionKind::Paragraph)
        } else {
            None
        };
        CharPos {
            x0,
            x1: x0 + 5.0,
            y0,
            class,
            kind,
        }
    }

    fn classifier(config: &BuilderConfig, use_layout: bool) -> BoundaryClassifier<'_> {
        BoundaryClassifier::new(config, config.thresholds(600.0, 800.0, Some(10.0)), use_layout)
    }

    #[test]
    fn test_region_type_change_is_strong() {
        let config = BuilderConfig::default();
        let c = classifier(&config, true);
        let para = pos(100.0, 500.0, PARAGRAPH_BASE);
        let cell = pos(105.0, 500.0, TABLE_BASE);
        assert_eq!(c.classify(&para, &cell), Transition::Strong);
        assert_eq!(c.classify(&cell, &para), Transition::Strong);
    }

    #[test]
    fn test_paragraph_regions_change_weakly() {
        let config = BuilderConfig::default();
        let c = classifier(&config, true);
        let a = pos(100.0, 500.0, PARAGRAPH_BASE);
        let b = pos(100.0, 480.0, PARAGRAPH_BASE + 1);
        assert_eq!(c.classify(&a, &b), Transition::Weak);
    }

    #[test]
    fn test_table_rules() {
        let config = BuilderConfig::default();
        let c = classifier(&config, true);
        let a = pos(100.0, 500.0, TABLE_BASE);
        // next row
        assert_eq!(c.classify(&a, &pos(100.0, 490.0, TABLE_BASE)), Transition::Strong);
        // next cell on the same row
        assert_eq!(c.classify(&a, &pos(130.0, 500.0, TABLE_BASE)), Transition::Strong);
        // next glyph
        assert_eq!(c.classify(&a, &pos(105.0, 500.0, TABLE_BASE)), Transition::SameLine);
        // jump back to the first column on the same row
        assert_eq!(c.classify(&pos(400.0, 500.0, TABLE_BASE), &a), Transition::Strong);
    }

    #[test]
    fn test_background_uses_vertical_distance() {
        let config = BuilderConfig::default();
        let c = classifier(&config, true);
        let a = pos(100.0, 500.0, PARAGRAPH_BASE);
        assert_eq!(c.classify(&a, &pos(105.0, 500.0, BACKGROUND)), Transition::SameLine);
        assert_eq!(c.classify(&a, &pos(100.0, 488.0, BACKGROUND)), Transition::LineBreak);
        assert_eq!(c.classify(&a, &pos(100.0, 450.0, BACKGROUND)), Transition::Weak);
    }

    #[test]
    fn test_fallback_rules() {
        let config = BuilderConfig::default();
        let c = classifier(&config, false);
        let a = pos(250.0, 100.0, BACKGROUND);
        // new column: far right and back up
        assert_eq!(c.classify(&a, &pos(400.0, 700.0, BACKGROUND)), Transition::Weak);
        assert_eq!(c.classify(&a, &pos(400.0, 110.0, BACKGROUND)), Transition::Strong);
        // wrapped line back at the left margin
        assert_eq!(c.classify(&a, &pos(72.0, 88.0, BACKGROUND)), Transition::Weak);
        assert_eq!(c.classify(&a, &pos(200.0, 88.0, BACKGROUND)), Transition::LineBreak);
        assert_eq!(c.classify(&a, &pos(256.0, 100.0, BACKGROUND)), Transition::SameLine);
    }
}
