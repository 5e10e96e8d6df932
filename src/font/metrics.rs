//! Glyph widths of fonts already present in a document.

use std::collections::HashMap;

use lopdf::{Dictionary, Document as LopdfDocument, Object};

use crate::parser::objects::{get_array, get_dict, get_f32, get_name, get_number, resolve};

use super::script::is_wide;

/// Helvetica advance widths for ASCII 32..=126, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

/// Width of an ASCII character in Helvetica, in 1/1000 em.
pub fn helvetica_width(c: char) -> f32 {
    let code = c as u32;
    if (32..=126).contains(&code) {
        HELVETICA_WIDTHS[(code - 32) as usize] as f32
    } else {
        estimate_width(c)
    }
}

/// Proportional estimate in 1/1000 em when a font has no usable widths.
pub fn estimate_width(c: char) -> f32 {
    if is_wide(c) {
        1000.0
    } else {
        500.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Fallback {
    Helvetica,
    Monospace,
    Estimate,
}

/// Advance widths read from a font dictionary.
#[derive(Debug, Clone)]
pub struct FontMetrics {
    /// Two-byte codes (Type0) rather than single bytes
    pub composite: bool,
    widths: HashMap<u32, f32>,
    default_width: Option<f32>,
    /// Glyph space to text space (`/FontMatrix` a; 0.001 for most fonts)
    scale: f32,
    fallback: Fallback,
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self {
            composite: false,
            widths: HashMap::new(),
            default_width: None,
            scale: 0.001,
            fallback: Fallback::Estimate,
        }
    }
}

impl FontMetrics {
    /// Read widths from a font dictionary.
    pub fn from_dict(doc: &LopdfDocument, font: &Dictionary) -> Self {
        let subtype = get_name(font, b"Subtype").unwrap_or_default();
        if subtype == "Type0" {
            return Self::composite_from_dict(doc, font);
        }

        let mut metrics = FontMetrics::default();
        let base_font = get_name(font, b"BaseFont").unwrap_or_default();
        let base = crate::model::strip_subset_prefix(&base_font);
        if base.starts_with("Helvetica") || base.starts_with("Arial") {
            metrics.fallback = Fallback::Helvetica;
        } else if base.starts_with("Courier") {
            metrics.fallback = Fallback::Monospace;
        }

        if subtype == "Type3" {
            if let Some(matrix) = get_array(doc, font, b"FontMatrix") {
                if let Some(a) = matrix.first().and_then(|o| get_number(resolve(doc, o))) {
                    if a != 0.0 {
                        metrics.scale = a.abs();
                    }
                }
            }
        }

        let first_char = get_f32(doc, font, b"FirstChar").unwrap_or(0.0) as u32;
        if let Some(widths) = get_array(doc, font, b"Widths") {
            for (i, w) in widths.iter().enumerate() {
                if let Some(w) = get_number(resolve(doc, w)) {
                    metrics.widths.insert(first_char + i as u32, w);
                }
            }
        }
        metrics.default_width = get_dict(doc, font, b"FontDescriptor")
            .and_then(|d| get_f32(doc, d, b"MissingWidth"))
            .filter(|w| *w > 0.0);

        metrics
    }

    fn composite_from_dict(doc: &LopdfDocument, font: &Dictionary) -> Self {
        let mut metrics = FontMetrics {
            composite: true,
            default_width: Some(1000.0),
            ..FontMetrics::default()
        };
        let Some(descendant) = get_array(doc, font, b"DescendantFonts")
            .and_then(|a| a.first())
            .and_then(|o| resolve(doc, o).as_dict().ok())
        else {
            return metrics;
        };

        if let Some(dw) = get_f32(doc, descendant, b"DW") {
            metrics.default_width = Some(dw);
        }
        if let Some(w) = get_array(doc, descendant, b"W") {
            metrics.widths = parse_cid_widths(doc, w);
        }
        metrics
    }

    /// Advance of a character code in text space units per unit font size.
    pub fn code_width(&self, code: u32) -> f32 {
        if let Some(w) = self.widths.get(&code) {
            return w * self.scale;
        }
        if let Some(w) = self.default_width {
            return w * self.scale;
        }
        let fallback = match char::from_u32(code) {
            Some(c) => self.fallback_width(c),
            None => 500.0,
        };
        fallback * 0.001
    }

    /// Advance of a Unicode character, assuming it is encoded as its own code.
    pub fn char_width(&self, c: char) -> f32 {
        let code = c as u32;
        if self.widths.contains_key(&code) || (self.composite && self.default_width.is_some()) {
            return self.code_width(code);
        }
        self.fallback_width(c) * 0.001
    }

    /// Whether the dictionary supplied explicit widths.
    pub fn has_widths(&self) -> bool {
        !self.widths.is_empty()
    }

    fn fallback_width(&self, c: char) -> f32 {
        match self.fallback {
            Fallback::Helvetica => helvetica_width(c),
            Fallback::Monospace if !is_wide(c) => 600.0,
            _ => estimate_width(c),
        }
    }
}

/// Parse a CIDFont `/W` array: `c [w1 w2 …]` and `c_first c_last w` forms.
fn parse_cid_widths(doc: &LopdfDocument, array: &[Object]) -> HashMap<u32, f32> {
    let mut widths = HashMap::new();
    let mut i = 0;
    while i < array.len() {
        let Some(first) = get_number(resolve(doc, &array[i])) else {
            i += 1;
            continue;
        };
        let first = first as u32;
        match array.get(i + 1).map(|o| resolve(doc, o)) {
            Some(Object::Array(list)) => {
                for (offset, w) in list.iter().enumerate() {
                    if let Some(w) = get_number(resolve(doc, w)) {
                        widths.insert(first + offset as u32, w);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let last = get_number(last).map(|v| v as u32);
                let width = array.get(i + 2).and_then(|o| get_number(resolve(doc, o)));
                if let (Some(last), Some(width)) = (last, width) {
                    for code in first..=last.min(first.saturating_add(0xFFFF)) {
                        widths.insert(code, width);
                    }
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helvetica_table() {
        assert_eq!(helvetica_width(' '), 278.0);
        assert_eq!(helvetica_width('W'), 944.0);
        assert_eq!(helvetica_width('~'), 584.0);
        assert_eq!(helvetica_width('漢'), 1000.0);
    }

    #[test]
    fn test_simple_font_widths() {
        let doc = LopdfDocument::with_version("1.5");
        let font = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"TrueType".to_vec())),
            ("BaseFont", Object::Name(b"ABCDEF+Custom".to_vec())),
            ("FirstChar", Object::Integer(65)),
            (
                "Widths",
                Object::Array(vec![Object::Integer(600), Object::Integer(700)]),
            ),
        ]);
        let metrics = FontMetrics::from_dict(&doc, &font);
        assert!(!metrics.composite);
        assert!((metrics.code_width(65) - 0.6).abs() < 1e-6);
        assert!((metrics.code_width(66) - 0.7).abs() < 1e-6);
        // outside the table: estimate
        assert!((metrics.code_width(32) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_standard_helvetica_without_widths() {
        let doc = LopdfDocument::with_version("1.5");
        let font = Dictionary::from_iter(vec![
            ("Subtype", Object::Name(b"Type1".to_vec())),
            ("BaseFont", Object::Name(b"Helvetica".to_vec())),
        ]);
        let metrics = FontMetrics::from_dict(&doc, &font);
        assert!((metrics.code_width('i' as u32) - 0.222).abs() < 1e-6);
    }

    #[test]
    fn test_composite_w_array() {
        let mut doc = LopdfDocument::with_version("1.5");
        let descendant = doc.add_object(Dictionary::from_iter(vec![
            ("Subtype", Object::Name(b"CIDFontType2".to_vec())),
            ("DW", Object::Integer(900)),
            (
                "W",
                Object::Array(vec![
                    Object::Integer(1),
                    Object::Array(vec![Object::Integer(250), Object::Integer(300)]),
                    Object::Integer(10),
                    Object::Integer(12),
                    Object::Integer(400),
                ]),
            ),
        ]));
        let font = Dictionary::from_iter(vec![
            ("Subtype", Object::Name(b"Type0".to_vec())),
            ("DescendantFonts", Object::Array(vec![Object::Reference(descendant)])),
        ]);
        let metrics = FontMetrics::from_dict(&doc, &font);
        assert!(metrics.composite);
        assert!((metrics.code_width(2) - 0.3).abs() < 1e-6);
        assert!((metrics.code_width(11) - 0.4).abs() < 1e-6);
        assert!((metrics.code_width(500) - 0.9).abs() < 1e-6);
    }
}
