//! Box fitting for translated text.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;
use crate::model::Block;

use super::wrap::wrap_text;

/// Baseline offset below the box top, in font size units.
pub const ASCENT: f32 = 0.8;
/// Slack for float comparisons of heights.
const EPS: f32 = 0.01;
/// Candidate widths tried between the original and the widest box.
const WIDTH_STEPS: usize = 8;

/// Box fitting limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Widest box as a multiple of the original width
    pub width_cap_ratio: f32,
    /// Font size floor in points
    pub min_font_size: f32,
    pub font_shrink_step: f32,
    pub min_line_height: f32,
    pub line_height_step: f32,
    /// Distance kept from every page edge
    pub page_margin: f32,
    /// Line height multiplier per target language
    pub line_heights: BTreeMap<String, f32>,
    pub default_line_height: f32,
}

impl Default for FitConfig {
    fn default() -> Self {
        let line_heights = [("ja", 1.1), ("en", 1.2), ("zh-CN", 1.4), ("zh-TW", 1.4), ("ko", 1.1)]
            .into_iter()
            .map(|(lang, lh)| (lang.to_string(), lh))
            .collect();
        Self {
            width_cap_ratio: 2.0,
            min_font_size: 5.0,
            font_shrink_step: 0.5,
            min_line_height: 1.0,
            line_height_step: 0.05,
            page_margin: 20.0,
            line_heights,
            default_line_height: 1.1,
        }
    }
}

impl FitConfig {
    /// Line height multiplier for a language tag.
    pub fn line_height_for(&self, language: &str) -> f32 {
        self.line_heights
            .get(language)
            .or_else(|| {
                self.line_heights
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(language))
                    .map(|(_, v)| v)
            })
            .copied()
            .unwrap_or(self.default_line_height)
    }
}

/// Horizontal alignment of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    Left,
    Right,
    Center,
}

impl Alignment {
    /// Infer the alignment of a block from its free space.
    ///
    /// Multi-line blocks are left aligned. A single line with similar room on
    /// both sides is centred; one with less room on the right than on the
    /// left is right aligned.
    pub fn infer(block: &Block) -> Alignment {
        if block.line_count > 1 {
            return Alignment::Left;
        }
        let left = block.expandable_left;
        let right = block.expandable_right;
        let tolerance = (left.max(right) * 0.1).max(2.0);
        if left > tolerance && (left - right).abs() <= tolerance {
            Alignment::Center
        } else if right < left {
            Alignment::Right
        } else {
            Alignment::Left
        }
    }
}

/// Where and how a block's text is drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub rect: Rect,
    pub font_size: f32,
    /// Multiplier of the font size between baselines
    pub line_height: f32,
    pub lines: Vec<String>,
    /// Width of each line at `font_size`
    pub line_widths: Vec<f32>,
    pub alignment: Alignment,
    /// The text did not fit even at the smallest font size
    pub overflow: bool,
}

impl FitResult {
    /// Start point `(x, baseline)` of every line.
    pub fn line_origins(&self) -> Vec<(f32, f32)> {
        let top = self.rect.y1 - self.font_size * ASCENT;
        self.line_widths
            .iter()
            .enumerate()
            .map(|(i, &w)| {
                let x = match self.alignment {
                    Alignment::Left => self.rect.x0,
                    Alignment::Right => self.rect.x1 - w,
                    Alignment::Center => self.rect.x0 + (self.rect.width() - w) / 2.0,
                };
                (x, top - i as f32 * self.font_size * self.line_height)
            })
            .collect()
    }
}

/// Chooses render boxes and font sizes.
///
/// Widening the box always comes before shrinking the font.
#[derive(Debug, Clone)]
pub struct BoxFitter<'a> {
    config: &'a FitConfig,
}

impl<'a> BoxFitter<'a> {
    pub fn new(config: &'a FitConfig) -> Self {
        Self { config }
    }

    fn source_size(&self, block: &Block) -> f32 {
        if block.font_size > 0.0 && block.font_size.is_finite() {
            return block.font_size;
        }
        let lines = block.line_count.max(1) as f32;
        (block.bbox.height() / lines / 1.2).max(self.config.min_font_size)
    }

    /// Line heights from the language default down to the floor.
    fn line_heights(&self, language: &str) -> Vec<f32> {
        let start = self.config.line_height_for(language);
        let step = self.config.line_height_step.max(0.01);
        let mut out = vec![start];
        let mut lh = start;
        while lh - step >= self.config.min_line_height - EPS {
            lh -= step;
            out.push(lh);
        }
        out
    }

    /// Fit `text` into the block's box.
    ///
    /// `char_width` gives a character's advance at a font size of 1pt.
    pub fn fit<F: Fn(char) -> f32>(
        &self,
        block: &Block,
        text: &str,
        language: &str,
        char_width: F,
    ) -> FitResult {
        let alignment = Alignment::infer(block);
        let bbox = block.bbox;
        let base_width = bbox.width().max(1.0);
        let grow = match alignment {
            Alignment::Left => block.expandable_right,
            Alignment::Right => block.expandable_left,
            Alignment::Center => 2.0 * block.expandable_left.min(block.expandable_right),
        };
        let max_width = (base_width + grow).min(base_width * self.config.width_cap_ratio).max(base_width);
        let max_height = bbox.height() + block.expandable_bottom;

        let widths: Vec<f32> = (0..=WIDTH_STEPS)
            .map(|i| base_width + (max_width - base_width) * i as f32 / WIDTH_STEPS as f32)
            .collect();
        let line_heights = self.line_heights(language);

        let mut size = self.source_size(block);
        loop {
            for &width in &widths {
                let lines = wrap_text(text, width, |c| char_width(c) * size);
                let needed = lines.len().max(1) as f32 * size;
                if let Some(&lh) = line_heights.iter().find(|&&lh| needed * lh <= max_height + EPS) {
                    return self.result(block, alignment, width, size, lh, lines, false, &char_width);
                }
            }
            let next = size - self.config.font_shrink_step.max(0.1);
            if next < self.config.min_font_size - EPS {
                break;
            }
            size = next;
        }

        let size = self.config.min_font_size.min(self.source_size(block));
        let lines = wrap_text(text, max_width, |c| char_width(c) * size);
        log::warn!(
            "Block {}: text overflows its box at {:.1}pt ({} lines)",
            block.id,
            size,
            lines.len()
        );
        let lh = self.config.min_line_height;
        self.result(block, alignment, max_width, size, lh, lines, true, &char_width)
    }

    #[allow(clippy::too_many_arguments)]
    fn result<F: Fn(char) -> f32>(
        &self,
        block: &Block,
        alignment: Alignment,
        width: f32,
        size: f32,
        line_height: f32,
        lines: Vec<String>,
        overflow: bool,
        char_width: &F,
    ) -> FitResult {
        let bbox = block.bbox;
        let (x0, x1) = match alignment {
            Alignment::Left => (bbox.x0, bbox.x0 + width),
            Alignment::Right => (bbox.x1 - width, bbox.x1),
            Alignment::Center => {
                let extra = (width - bbox.width()) / 2.0;
                (bbox.x0 - extra, bbox.x1 + extra)
            }
        };
        let height = (lines.len().max(1) as f32 * size * line_height).max(bbox.height());
        let floor = bbox.y0 - block.expandable_bottom;
        let bounds = block.expandable_rect();
        let rect = Rect::new(
            x0.max(bounds.x0),
            (bbox.y1 - height).max(floor),
            x1.min(bounds.x1),
            bbox.y1,
        );
        let line_widths = lines
            .iter()
            .map(|l| l.chars().map(|c| char_width(c) * size).sum())
            .collect();
        FitResult {
            rect,
            font_size: size,
            line_height,
            lines,
            line_widths,
            alignment,
            overflow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::script::is_wide;
    use crate::model::BlockType;

    fn em(c: char) -> f32 {
        if is_wide(c) {
            1.0
        } else {
            0.5
        }
    }

    fn block(bbox: Rect, size: f32) -> Block {
        let mut b = Block::new(1, BlockType::Paragraph, "source", bbox);
        b.font_size = size;
        b
    }

    #[test]
    fn test_short_text_keeps_box_and_size() {
        let config = FitConfig::default();
        let b = block(Rect::new(72.0, 700.0, 172.0, 710.0), 10.0);
        let fit = BoxFitter::new(&config).fit(&b, "hello", "en", em);
        assert_eq!(fit.font_size, 10.0);
        assert_eq!(fit.lines, vec!["hello"]);
        assert_eq!(fit.rect, b.bbox);
        assert!(!fit.overflow);
        let (x, y) = fit.line_origins()[0];
        assert_eq!(x, 72.0);
        assert!((y - 702.0).abs() < 1e-4);
    }

    #[test]
    fn test_expansion_before_shrinking() {
        let config = FitConfig::default();
        let mut b = block(Rect::new(72.0, 700.0, 122.0, 710.0), 10.0);
        b.expandable_right = 100.0;
        b.expandable_left = 0.0;
        // 80pt of text in a 50pt box
        let fit = BoxFitter::new(&config).fit(&b, "abcdefghijklmnop", "en", em);
        assert_eq!(fit.font_size, 10.0);
        assert_eq!(fit.lines.len(), 1);
        assert!(fit.rect.width() >= 80.0 && fit.rect.width() <= 100.0 + 1e-3);
        assert_eq!(fit.rect.x0, 72.0);
    }

    #[test]
    fn test_right_aligned_block_grows_leftward() {
        let config = FitConfig::default();
        let mut b = block(Rect::new(500.0, 700.0, 560.0, 710.0), 10.0);
        b.expandable_left = 60.0;
        b.expandable_right = 2.0;
        let fit = BoxFitter::new(&config).fit(&b, "a much longer line", "en", em);
        assert_eq!(fit.alignment, Alignment::Right);
        assert_eq!(fit.rect.x1, 560.0);
        assert!(fit.rect.x0 < 500.0);
        assert!(fit.rect.x0 >= 440.0);
        assert!(b.expandable_rect().contains(&fit.rect));
    }

    #[test]
    fn test_font_shrinks_when_box_is_full() {
        let config = FitConfig::default();
        let b = block(Rect::new(72.0, 700.0, 122.0, 710.0), 10.0);
        let fit = BoxFitter::new(&config).fit(&b, "abcdefghijklmn", "en", em);
        assert!(fit.font_size < 10.0);
        assert!(fit.font_size >= 5.0);
        assert!(!fit.overflow);
    }

    #[test]
    fn test_overflow_is_flagged_and_bounded() {
        let config = FitConfig::default();
        let b = block(Rect::new(72.0, 700.0, 92.0, 710.0), 10.0);
        let text = "this text is far too long for such a tiny box";
        let fit = BoxFitter::new(&config).fit(&b, text, "en", em);
        assert!(fit.overflow);
        assert_eq!(fit.font_size, 5.0);
        assert!(b.expandable_rect().contains(&fit.rect));
    }

    #[test]
    fn test_language_line_heights() {
        let config = FitConfig::default();
        assert_eq!(config.line_height_for("zh-CN"), 1.4);
        assert_eq!(config.line_height_for("zh-cn"), 1.4);
        assert_eq!(config.line_height_for("fr"), 1.1);
    }
}
