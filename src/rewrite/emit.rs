//! Text-showing operators for fitted blocks.

use std::collections::BTreeSet;

use lopdf::content::Operation;
use lopdf::{Object, StringFormat};

use crate::error::Result;
use crate::fit::FitResult;
use crate::font::FontRegistry;
use crate::model::FontId;

/// A run of text drawn with one font.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub font: FontId,
    pub text: String,
}

/// Split a line into runs that a single registered font can render.
///
/// The whole line stays one run when any chain font covers it. Otherwise
/// every character picks its own font and neighbours with the same font
/// merge. A character no font can render fails the line.
pub fn split_runs(registry: &FontRegistry, line: &str) -> Result<Vec<TextRun>> {
    if let Ok(font) = registry.select_font(line, None) {
        return Ok(vec![TextRun {
            font,
            text: line.to_string(),
        }]);
    }

    let mut runs: Vec<TextRun> = Vec::new();
    let mut buf = [0u8; 4];
    for c in line.chars() {
        let font = match runs.last() {
            Some(run) if registry.can_encode(run.font, c.encode_utf8(&mut buf)) => run.font,
            _ => registry.select_font(c.encode_utf8(&mut buf), None)?,
        };
        match runs.last_mut() {
            Some(run) if run.font == font => run.text.push(c),
            _ => runs.push(TextRun {
                font,
                text: c.to_string(),
            }),
        }
    }
    Ok(runs)
}

/// Advance of one character at 1pt, using the font that would draw it.
pub fn measure_char(registry: &FontRegistry, c: char) -> f32 {
    let mut buf = [0u8; 4];
    let font = registry
        .select_font(c.encode_utf8(&mut buf), None)
        .ok()
        .or_else(|| registry.target_chain().first().copied());
    match font {
        Some(font) => registry.char_width(font, c, 1.0),
        None => crate::font::estimate_width(c) / 1000.0,
    }
}

/// Operators drawing a fitted block, and the fonts they reference.
///
/// The block becomes one `q BT … ET Q` group: black fill, then for every
/// run a `Tf`, a `Tm` at the run's origin and a hex-string `TJ`.
pub fn block_operations(registry: &FontRegistry, fit: &FitResult) -> Result<(Vec<Operation>, BTreeSet<FontId>)> {
    let mut fonts = BTreeSet::new();
    let mut ops = vec![
        Operation::new("q", vec![]),
        Operation::new("BT", vec![]),
        Operation::new("rg", vec![0.into(), 0.into(), 0.into()]),
    ];

    for (line, (x, y)) in fit.lines.iter().zip(fit.line_origins()) {
        if line.trim().is_empty() {
            continue;
        }
        let mut x = x;
        for run in split_runs(registry, line)? {
            let name = registry
                .info(run.font)
                .map(|info| info.resource_name())
                .unwrap_or_else(|| format!("TPF{}", run.font.0));
            let bytes = registry.encode(run.font, &run.text)?;
            ops.push(Operation::new(
                "Tf",
                vec![Object::Name(name.into_bytes()), fit.font_size.into()],
            ));
            ops.push(Operation::new(
                "Tm",
                vec![1.into(), 0.into(), 0.into(), 1.into(), x.into(), y.into()],
            ));
            ops.push(Operation::new(
                "TJ",
                vec![Object::Array(vec![Object::String(bytes, StringFormat::Hexadecimal)])],
            ));
            x += registry.text_width(run.font, &run.text, fit.font_size);
            fonts.insert(run.font);
        }
    }

    ops.push(Operation::new("ET", vec![]));
    ops.push(Operation::new("Q", vec![]));
    Ok((ops, fonts))
}
