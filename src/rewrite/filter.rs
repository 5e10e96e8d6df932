//! Removal of the text-showing operators that belong to rewritten blocks.

use std::collections::BTreeSet;

use lopdf::content::Operation;
use lopdf::Object;

use crate::error::{Error, Result};
use crate::model::Block;
use crate::parser::ContentSource;

/// Which blocks get re-rendered and which operators disappear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Removal {
    /// Indices of the blocks to render, ascending
    pub blocks: Vec<usize>,
    /// Removed operator indices, one set per content source
    pub operators: Vec<BTreeSet<usize>>,
}

impl Removal {
    /// Work out the removal for one page.
    ///
    /// `groups` maps every content source to the first source reading the
    /// same stream (see [`PageText::source_groups`](crate::parser::PageText::source_groups)).
    /// Draws of one form share a single rewritten stream, so an operator
    /// removed from one draw disappears from all of them.
    ///
    /// Every translated block loses its operators. A block sharing an
    /// operator with a removed block would lose glyphs too, so it is pulled
    /// in and re-rendered with its source text. This repeats until no
    /// further block is affected.
    pub fn plan(blocks: &[Block], groups: &[usize]) -> Self {
        let mut rendered = vec![false; blocks.len()];
        let mut operators = vec![BTreeSet::new(); groups.len()];

        for (i, block) in blocks.iter().enumerate() {
            if block.translated.is_some() {
                rendered[i] = true;
                insert_origins(&mut operators, groups, block);
            }
        }

        let mut pulled = 0usize;
        loop {
            let mut changed = false;
            for (i, block) in blocks.iter().enumerate() {
                if rendered[i] {
                    continue;
                }
                let shared = block.origins.iter().any(|o| {
                    groups
                        .get(o.source)
                        .and_then(|&g| operators.get(g))
                        .map(|set| set.contains(&o.op_index))
                        .unwrap_or(false)
                });
                if shared {
                    rendered[i] = true;
                    insert_origins(&mut operators, groups, block);
                    pulled += 1;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        if pulled > 0 {
            log::debug!("{} untranslated blocks share operators and are re-rendered", pulled);
        }

        for (source, &group) in groups.iter().enumerate() {
            if group != source {
                operators[source] = operators[group].clone();
            }
        }

        Self {
            blocks: (0..blocks.len()).filter(|&i| rendered[i]).collect(),
            operators,
        }
    }

    /// Whether nothing on the page changes.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Removed operators of one source.
    pub fn for_source(&self, source: usize) -> Option<&BTreeSet<usize>> {
        self.operators.get(source).filter(|set| !set.is_empty())
    }
}

fn insert_origins(operators: &mut [BTreeSet<usize>], groups: &[usize], block: &Block) {
    for origin in &block.origins {
        if let Some(set) = groups.get(origin.source).and_then(|&g| operators.get_mut(g)) {
            set.insert(origin.op_index);
        }
    }
}

/// Copy a source's operations without the removed ones.
///
/// A removed `Tj` or `TJ` that is followed by kept text in the same text
/// object becomes a glyph-less `TJ` with the same advance. A removed `'`
/// keeps its line move as `T*`; a removed `"` also keeps its spacing as
/// `Tw` and `Tc`. Every other operation is copied unchanged.
pub fn filter_operations(source: &ContentSource, removed: &BTreeSet<usize>) -> Result<Vec<Operation>> {
    let ops = &source.operations;
    let kept_show_after = kept_show_after(source, removed);
    let mut out = Vec::with_capacity(ops.len() + 4);

    for (i, op) in ops.iter().enumerate() {
        if !removed.contains(&i) {
            out.push(op.clone());
            continue;
        }
        let record = source
            .shows
            .get(i)
            .copied()
            .flatten()
            .ok_or_else(|| {
                Error::ContentStreamCorrupt(format!(
                    "operator {} ({}) is not a text-showing operator",
                    i, op.operator
                ))
            })?;

        match op.operator.as_str() {
            "Tj" | "TJ" => {}
            "'" => out.push(Operation::new("T*", vec![])),
            "\"" => {
                let mut operands = op.operands.iter();
                let word = operands.next().cloned().unwrap_or(Object::Integer(0));
                let chars = operands.next().cloned().unwrap_or(Object::Integer(0));
                out.push(Operation::new("Tw", vec![word]));
                out.push(Operation::new("Tc", vec![chars]));
                out.push(Operation::new("T*", vec![]));
            }
            other => {
                return Err(Error::ContentStreamCorrupt(format!(
                    "cannot remove operator {}",
                    other
                )))
            }
        }

        let scale = record.font_size * record.h_scale;
        if kept_show_after[i] && record.advance != 0.0 && scale.abs() > f32::EPSILON {
            let adjustment = -record.advance * 1000.0 / scale;
            out.push(Operation::new(
                "TJ",
                vec![Object::Array(vec![Object::Real(adjustment)])],
            ));
        }
    }
    Ok(out)
}

/// For every operator, whether a kept text-showing operator follows in the
/// same text object.
fn kept_show_after(source: &ContentSource, removed: &BTreeSet<usize>) -> Vec<bool> {
    let mut out = vec![false; source.operations.len()];
    let mut group_with_kept: Option<usize> = None;
    for i in (0..source.operations.len()).rev() {
        let Some(record) = source.shows.get(i).copied().flatten() else {
            continue;
        };
        out[i] = group_with_kept == Some(record.bt_group);
        if !removed.contains(&i) {
            group_with_kept = Some(record.bt_group);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::FontRegistry;
    use crate::geometry::Rect;
    use crate::model::{BlockType, GlyphOrigin};
    use crate::parser::{CharExtractor, PageText};
    use crate::testing::single_page;

    fn extract(content: &str) -> PageText {
        let doc = single_page(content);
        let mut registry = FontRegistry::new("en");
        registry.load_existing_fonts(&doc);
        CharExtractor::new(&doc, &registry).extract_page(1).unwrap()
    }

    fn block(origins: &[(usize, usize)], translated: bool) -> Block {
        let mut b = Block::new(1, BlockType::Paragraph, "text", Rect::default());
        b.origins = origins.iter().map(|&(s, i)| GlyphOrigin::new(s, i)).collect();
        if translated {
            b.attach_translation("texte");
        }
        b
    }

    #[test]
    fn test_plan_pulls_in_blocks_sharing_operators() {
        let blocks = vec![
            block(&[(0, 3)], true),
            block(&[(0, 3), (0, 4)], false),
            block(&[(0, 4), (1, 2)], false),
            block(&[(0, 9)], false),
        ];
        let removal = Removal::plan(&blocks, &[0, 1]);
        assert_eq!(removal.blocks, vec![0, 1, 2]);
        assert_eq!(removal.operators[0], BTreeSet::from([3, 4]));
        assert_eq!(removal.operators[1], BTreeSet::from([2]));
        assert!(removal.for_source(1).is_some());
    }

    #[test]
    fn test_draws_of_one_form_share_removals() {
        // sources 1 and 2 are two draws of the same form
        let blocks = vec![block(&[(1, 3)], true), block(&[(2, 3)], false), block(&[(2, 5)], false)];
        let removal = Removal::plan(&blocks, &[0, 1, 1]);
        assert_eq!(removal.blocks, vec![0, 1]);
        assert_eq!(removal.operators[1], BTreeSet::from([3]));
        assert_eq!(removal.operators[2], BTreeSet::from([3]));
        assert!(removal.for_source(0).is_none());
    }

    #[test]
    fn test_plan_without_translations_is_empty() {
        let removal = Removal::plan(&[block(&[(0, 1)], false)], &[0]);
        assert!(removal.is_empty());
        assert!(removal.for_source(0).is_none());
    }

    #[test]
    fn test_removed_tj_keeps_following_text_in_place() {
        let page = extract("BT /F1 10 Tf 0 0 Td (AB) Tj (C) Tj ET");
        let removed = BTreeSet::from([3]);
        let ops = filter_operations(&page.sources[0], &removed).unwrap();
        let names: Vec<&str> = ops.iter().map(|o| o.operator.as_str()).collect();
        assert_eq!(names, vec!["BT", "Tf", "Td", "TJ", "Tj", "ET"]);

        // AB advances 13.34pt at 10pt, i.e. 1334 thousandths of an em
        let Object::Array(items) = &ops[3].operands[0] else {
            panic!("expected an array operand");
        };
        let Object::Real(n) = items[0] else {
            panic!("expected a real adjustment");
        };
        assert!((n + 1334.0).abs() < 0.1);
    }

    #[test]
    fn test_trailing_removal_leaves_no_adjustment() {
        let page = extract("BT /F1 10 Tf 0 0 Td (A) Tj (B) Tj ET 0 0 m 10 10 l S");
        let removed = BTreeSet::from([4]);
        let ops = filter_operations(&page.sources[0], &removed).unwrap();
        let names: Vec<&str> = ops.iter().map(|o| o.operator.as_str()).collect();
        assert_eq!(names, vec!["BT", "Tf", "Td", "Tj", "ET", "m", "l", "S"]);
        assert_eq!(format!("{:?}", ops[5]), format!("{:?}", page.sources[0].operations[6]));
    }

    #[test]
    fn test_quote_operators_keep_line_moves() {
        let page = extract("BT /F1 10 Tf 14 TL 50 500 Td (A) ' 2 1 (B) \" (C) Tj ET");
        let removed = BTreeSet::from([4, 5]);
        let ops = filter_operations(&page.sources[0], &removed).unwrap();
        let names: Vec<&str> = ops.iter().map(|o| o.operator.as_str()).collect();
        assert_eq!(
            names,
            vec!["BT", "Tf", "TL", "Td", "T*", "TJ", "Tw", "Tc", "T*", "TJ", "Tj", "ET"]
        );
        assert!(matches!(ops[6].operands[..], [Object::Integer(2)]));
        assert!(matches!(ops[7].operands[..], [Object::Integer(1)]));
    }

    #[test]
    fn test_removing_non_text_operator_is_an_error() {
        let page = extract("BT /F1 10 Tf 0 0 Td (A) Tj ET");
        let removed = BTreeSet::from([2]);
        assert!(matches!(
            filter_operations(&page.sources[0], &removed),
            Err(Error::ContentStreamCorrupt(_))
        ));
    }
}
