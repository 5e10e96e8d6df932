//! Block accumulation over the character stream of one page.

use std::collections::{BTreeSet, HashMap};

use crate::geometry::{layout_class_at_pdf_point, Rect};
use crate::layout::{LayoutArray, RegionKind, ABANDON, BACKGROUND};
use crate::model::{Block, BlockType, FontId, FormulaSpan, GlyphOrigin, PositionedChar};

use super::boundary::{BoundaryClassifier, CharPos, Transition};
use super::config::BuilderConfig;
use super::formula::{is_formula_char, placeholder};
use super::text_rules::{line_join_separator, needs_word_space, weak_boundary_splits};

/// The block being filled.
#[derive(Debug)]
struct OpenBlock {
    text: String,
    bbox: Option<Rect>,
    class: u16,
    kind: Option<RegionKind>,
    /// Size of the first text glyph, the reference for sub/superscripts
    base_size: Option<f32>,
    sizes: Vec<f32>,
    max_size: f32,
    fonts: HashMap<FontId, usize>,
    formulas: Vec<FormulaSpan>,
    origins: BTreeSet<GlyphOrigin>,
    line_count: usize,
    /// A wrapped line whose separator has not been written yet
    pending_join: bool,
    has_unmapped: bool,
}

impl OpenBlock {
    fn new(class: u16, kind: Option<RegionKind>) -> Self {
        Self {
            text: String::new(),
            bbox: None,
            class,
            kind,
            base_size: None,
            sizes: Vec::new(),
            max_size: 0.0,
            fonts: HashMap::new(),
            formulas: Vec::new(),
            origins: BTreeSet::new(),
            line_count: 1,
            pending_join: false,
            has_unmapped: false,
        }
    }

    fn cover(&mut self, ch: &PositionedChar) {
        self.bbox = Some(match self.bbox {
            Some(b) => b.union(&ch.bbox),
            None => ch.bbox,
        });
        self.origins.insert(ch.origin);
        self.max_size = self.max_size.max(ch.size);
    }

    /// Write the pending line separator before `next`.
    fn join_line(&mut self, next: char) {
        if !self.pending_join {
            return;
        }
        self.pending_join = false;
        match line_join_separator(&self.text, next) {
            Some(sep) => self.text.push_str(sep),
            None => {
                self.text.pop();
            }
        }
    }

    fn push_text(&mut self, ch: &PositionedChar) {
        self.join_line(ch.ch);
        self.text.push(ch.ch);
        self.base_size.get_or_insert(ch.size);
        self.sizes.push(ch.size);
        if let Some(font) = ch.font {
            *self.fonts.entry(font).or_insert(0) += 1;
        }
        self.has_unmapped |= ch.is_unmapped();
        self.cover(ch);
    }

    fn dominant_size(&self) -> f32 {
        let mut counts: Vec<(i32, usize, f32)> = Vec::new();
        for &size in &self.sizes {
            let key = (size * 2.0).round() as i32;
            match counts.iter_mut().find(|(k, _, _)| *k == key) {
                Some(entry) => entry.1 += 1,
                None => counts.push((key, 1, size)),
            }
        }
        // first-seen wins ties
        let mut best: Option<(usize, f32)> = None;
        for (_, count, size) in counts {
            if best.map(|(c, _)| count > c).unwrap_or(true) {
                best = Some((count, size));
            }
        }
        best.map(|(_, s)| s).unwrap_or(self.max_size)
    }

    fn dominant_font(&self) -> Option<FontId> {
        self.fonts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(id, _)| *id)
    }

    fn into_block(self, page: u32) -> Option<Block> {
        let bbox = self.bbox?;
        let text = self.text.trim().to_string();
        if text.is_empty() {
            return None;
        }
        let block_type = match self.kind {
            Some(RegionKind::Table) => BlockType::TableCell,
            Some(RegionKind::HeaderFooter) => BlockType::HeaderFooter,
            Some(RegionKind::PageNumber) => BlockType::PageNumber,
            _ => BlockType::Paragraph,
        };
        let font_size = self.dominant_size();
        let font = self.dominant_font();
        let mut block = Block::new(page, block_type, text, bbox);
        block.font_size = font_size;
        block.font = font;
        block.formulas = self.formulas;
        block.line_count = self.line_count;
        block.region_id = self.class;
        block.origins = self.origins.into_iter().collect();

        let mut plain = block.text.clone();
        for f in &block.formulas {
            plain = plain.replace(&f.placeholder, "");
        }
        if plain.trim().is_empty() {
            block.skip_translation = true;
        }
        if self.has_unmapped {
            log::debug!(
                "Page {}: block with unmapped glyph codes kept untranslated",
                page
            );
            block.skip_translation = true;
        }
        Some(block)
    }
}

/// Groups the characters of one page into blocks.
///
/// The state is one open block plus one open formula run; every character
/// either extends them or closes them first.
#[derive(Debug)]
pub struct BlockBuilder<'a> {
    config: &'a BuilderConfig,
    page: u32,
    media_box: Rect,
    layout: Option<(&'a LayoutArray, f32)>,
}

struct State {
    blocks: Vec<Block>,
    current: Option<OpenBlock>,
    formula: Option<String>,
    prev: Option<(CharPos, char, bool)>,
}

impl State {
    fn flush_formula(&mut self) {
        let Some(text) = self.formula.take() else {
            return;
        };
        if let Some(block) = self.current.as_mut() {
            let ph = placeholder(block.formulas.len());
            block.text.push_str(&ph);
            block.formulas.push(FormulaSpan {
                placeholder: ph,
                text,
            });
        }
    }

    fn close(&mut self, page: u32) {
        self.flush_formula();
        if let Some(open) = self.current.take() {
            if let Some(block) = open.into_block(page) {
                self.blocks.push(block);
            }
        }
    }
}

impl<'a> BlockBuilder<'a> {
    pub fn new(config: &'a BuilderConfig, page: u32, media_box: Rect) -> Self {
        Self {
            config,
            page,
            media_box,
            layout: None,
        }
    }

    /// Use a layout grid rendered at `scale` pixels per point.
    pub fn with_layout(mut self, layout: &'a LayoutArray, scale: f32) -> Self {
        self.layout = Some((layout, scale));
        self
    }

    fn use_layout(&self) -> bool {
        matches!(self.layout, Some((layout, _)) if !layout.fallback_used)
    }

    fn class_of(&self, ch: &PositionedChar) -> (u16, Option<RegionKind>) {
        match self.layout {
            Some((layout, scale)) if !layout.fallback_used => {
                let x = ch.bbox.center_x() - self.media_box.x0;
                let y = ch.bbox.center_y() - self.media_box.y0;
                let class = layout_class_at_pdf_point(layout, x, y, self.media_box.height(), scale);
                (class, layout.region_kind(class))
            }
            _ => (BACKGROUND, None),
        }
    }

    /// Build blocks from characters in extraction order.
    pub fn build(&self, chars: &[PositionedChar]) -> Vec<Block> {
        let classified: Vec<(&PositionedChar, u16, Option<RegionKind>)> = chars
            .iter()
            .map(|ch| {
                let (class, kind) = self.class_of(ch);
                (ch, class, kind)
            })
            .filter(|(_, class, _)| *class != ABANDON)
            .collect();

        let mut sizes: Vec<f32> = classified.iter().map(|(c, _, _)| c.size).collect();
        sizes.sort_by(|a, b| a.total_cmp(b));
        let median = sizes.get(sizes.len() / 2).copied();
        let thresholds = self
            .config
            .thresholds(self.media_box.width(), self.media_box.height(), median);
        let classifier = BoundaryClassifier::new(self.config, thresholds, self.use_layout());
        log::debug!(
            "Page {}: {} chars, thresholds y_line={:.1} y_para={:.1} x_column={:.1}, layout={}",
            self.page,
            classified.len(),
            thresholds.y_line,
            thresholds.y_para,
            thresholds.x_column,
            self.use_layout()
        );

        let mut state = State {
            blocks: Vec::new(),
            current: None,
            formula: None,
            prev: None,
        };

        for (ch, class, kind) in classified {
            let pos = CharPos {
                x0: ch.x0(),
                x1: ch.x1(),
                y0: ch.y0(),
                class,
                kind,
            };
            let transition = match &state.prev {
                Some((prev, _, _)) => classifier.classify(prev, &pos),
                None => Transition::Strong,
            };

            let is_formula = is_formula_char(&ch.font_name, ch.ch, ch.is_unmapped())
                || (transition == Transition::SameLine
                    && state
                        .current
                        .as_ref()
                        .and_then(|b| b.base_size)
                        .map(|base| ch.size < base * self.config.subscript_ratio)
                        .unwrap_or(false));

            let new_block = match transition {
                Transition::Strong => true,
                Transition::Weak => match &state.current {
                    Some(open) => {
                        weak_boundary_splits(&open.text, ch.ch, self.config.min_cjk_fragment)
                    }
                    None => true,
                },
                _ => false,
            };

            if new_block {
                state.close(self.page);
            } else if transition != Transition::SameLine {
                state.flush_formula();
                if let Some(open) = state.current.as_mut() {
                    open.line_count += 1;
                    open.pending_join = true;
                }
            } else if let Some((prev, prev_ch, prev_formula)) = state.prev {
                let gap = pos.x0 - prev.x1;
                if gap > self.config.word_space_x && needs_word_space(prev_ch, ch.ch) {
                    if prev_formula && is_formula && state.formula.is_some() {
                        if let Some(formula) = state.formula.as_mut() {
                            formula.push(' ');
                        }
                    } else {
                        state.flush_formula();
                        if let Some(open) = state.current.as_mut() {
                            open.text.push(' ');
                        }
                    }
                }
            }

            let open = state
                .current
                .get_or_insert_with(|| OpenBlock::new(class, kind));
            if is_formula {
                if state.formula.is_none() {
                    open.join_line(ch.ch);
                }
                open.cover(ch);
                state.formula.get_or_insert_with(String::new).push(ch.ch);
            } else {
                if state.formula.is_some() {
                    state.flush_formula();
                }
                if let Some(open) = state.current.as_mut() {
                    open.push_text(ch);
                }
            }
            state.prev = Some((pos, ch.ch, is_formula));
        }
        state.close(self.page);

        log::debug!("Page {}: built {} blocks", self.page, state.blocks.len());
        state.blocks
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::layout::{Detection, LayoutLabel};

    /// Characters of one line, 6pt advance each, baseline `y`.
    fn line(text: &str, x: f32, y: f32, size: f32, op: usize) -> Vec<PositionedChar> {
        line_in_font(text, x, y, size, op, "Helvetica")
    }

    fn line_in_font(text: &str, x: f32, y: f32, size: f32, op: usize, font: &str) -> Vec<PositionedChar> {
        let mut out = Vec::new();
        let mut cursor = x;
        for c in text.chars() {
            let w = size * 0.5;
            if c != ' ' {
                out.push(PositionedChar {
                    ch: c,
                    font: Some(FontId(0)),
                    font_name: Arc::from(font),
                    size,
                    bbox: Rect::new(cursor, y - 0.2 * size, cursor + w, y + 0.8 * size),
                    cid: None,
                    origin: GlyphOrigin::new(0, op),
                });
            }
            cursor += w;
        }
        out
    }

    fn page() -> Rect {
        Rect::new(0.0, 0.0, 612.0, 792.0)
    }

    fn build(chars: &[PositionedChar]) -> Vec<Block> {
        let config = BuilderConfig::default();
        BlockBuilder::new(&config, 1, page()).build(chars)
    }

    #[test]
    fn test_wrapped_lines_join() {
        let mut chars = line("the quick brown", 72.0, 700.0, 12.0, 1);
        chars.extend(line("fox jumps.", 72.0, 686.0, 12.0, 2));
        let blocks = build(&chars);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "the quick brown fox jumps.");
        assert_eq!(blocks[0].line_count, 2);
        assert_eq!(blocks[0].origins.len(), 2);
        assert!((blocks[0].font_size - 12.0).abs() < 1e-4);
    }

    #[test]
    fn test_hyphenated_line_drops_hyphen() {
        let mut chars = line("inter-", 72.0, 700.0, 12.0, 1);
        chars.extend(line("national", 72.0, 686.0, 12.0, 2));
        assert_eq!(build(&chars)[0].text, "international");
    }

    #[test]
    fn test_sentence_end_splits_at_weak_boundary() {
        let mut chars = line("First paragraph ends here.", 72.0, 700.0, 12.0, 1);
        chars.extend(line("Second one", 72.0, 650.0, 12.0, 2));
        let blocks = build(&chars);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].text, "Second one");
    }

    #[test]
    fn test_continuation_survives_large_gap() {
        let mut chars = line("the results of the", 72.0, 700.0, 12.0, 1);
        chars.extend(line("experiment", 72.0, 650.0, 12.0, 2));
        let blocks = build(&chars);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "the results of the experiment");
    }

    #[test]
    fn test_cjk_lines_join_without_space() {
        let mut chars = line("売上高は前年同期を", 72.0, 700.0, 10.0, 1);
        chars.extend(line("上回りました。", 72.0, 686.0, 10.0, 2));
        assert_eq!(build(&chars)[0].text, "売上高は前年同期を上回りました。");
    }

    #[test]
    fn test_formula_becomes_placeholder() {
        let mut chars = line("let", 72.0, 700.0, 12.0, 1);
        chars.extend(line_in_font("x", 96.0, 700.0, 12.0, 2, "ABCDEF+CMMI10"));
        chars.extend(line("be given.", 108.0, 700.0, 12.0, 3));
        let blocks = build(&chars);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "let {v0} be given.");
        assert_eq!(blocks[0].formulas[0].text, "x");
        assert_eq!(blocks[0].source_text(), "let x be given.");
    }

    #[test]
    fn test_subscript_is_formula() {
        let mut chars = line("H", 72.0, 700.0, 12.0, 1);
        chars.extend(line("2", 78.0, 698.0, 7.0, 2));
        chars.extend(line("O", 81.5, 700.0, 12.0, 3));
        let blocks = build(&chars);
        assert_eq!(blocks[0].text, "H{v0}O");
    }

    #[test]
    fn test_pure_formula_block_is_skipped() {
        let chars = line_in_font("xy", 72.0, 700.0, 12.0, 1, "CMMI10");
        let blocks = build(&chars);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].skip_translation);
    }

    fn two_region_layout() -> LayoutArray {
        // 612x792 at scale 1: paragraph on top half, table below
        let detections = vec![
            (
                Detection {
                    bbox: [0.0, 0.0, 612.0, 396.0],
                    category: 0,
                    confidence: 0.9,
                },
                LayoutLabel::Text,
            ),
            (
                Detection {
                    bbox: [0.0, 396.0, 612.0, 792.0],
                    category: 0,
                    confidence: 0.9,
                },
                LayoutLabel::Table,
            ),
        ];
        LayoutArray::from_detections(&detections, 612, 792, 0.5)
    }

    #[test]
    fn test_region_change_splits_despite_continuation() {
        let layout = two_region_layout();
        let config = BuilderConfig::default();
        let mut chars = line("Revenue of the", 72.0, 400.0, 10.0, 1);
        chars.extend(line("segment", 72.0, 390.0, 10.0, 2));
        let blocks = BlockBuilder::new(&config, 3, page())
            .with_layout(&layout, 1.0)
            .build(&chars);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].block_type, BlockType::Paragraph);
        assert_eq!(blocks[1].block_type, BlockType::TableCell);
    }

    #[test]
    fn test_fallback_layout_still_builds_blocks() {
        let layout = LayoutArray::from_detections(&[], 612, 792, 0.5);
        let config = BuilderConfig::default();
        let chars = line("Visible text", 72.0, 700.0, 12.0, 1);
        let blocks = BlockBuilder::new(&config, 1, page())
            .with_layout(&layout, 1.0)
            .build(&chars);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "Visible text");
    }

    #[test]
    fn test_build_is_deterministic() {
        let mut chars = line("Alpha beta.", 72.0, 700.0, 12.0, 1);
        chars.extend(line("Gamma", 300.0, 720.0, 12.0, 2));
        chars.extend(line("delta", 72.0, 640.0, 12.0, 3));
        let a = build(&chars);
        let b = build(&chars);
        let texts = |v: &[Block]| v.iter().map(|b| b.text.clone()).collect::<Vec<_>>();
        assert_eq!(texts(&a), texts(&b));
    }
}
