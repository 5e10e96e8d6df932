//! Formula and variable detection.
//!
//! Characters drawn with math fonts, math symbols, Greek letters and
//! sub/superscripts are kept out of the translatable text. Each run of them
//! becomes a `{vN}` placeholder that is put back after translation.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::model::{strip_subset_prefix, FormulaSpan};

static FORMULA_FONT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(CM[^R]|MS[AB]M|XY|MT|BL|RM|EU|LA|RS|LINE|LCIRCLE|TeX-|rsfs|txsy|wasy|stmary|.*Mono|.*Code|.*Ital|.*Sym|.*Math)",
    )
    .expect("formula font pattern is valid")
});

static FORMULA_CATEGORY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\p{Lm}\p{Mn}\p{Sk}\p{Sm}\p{Zl}\p{Zp}\p{Zs}]$").expect("category pattern is valid")
});

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[\{\(\[]\s*v([\d\s]+)\s*[\}\)\]]").expect("placeholder pattern is valid")
});

/// Operators and marks that look like math but are ordinary text.
const TEXT_SYMBOLS: &[char] = &[
    '+', '-', '*', '/', '<', '=', '>', '＋', '－', '＊', '／', '＜', '＝', '＞', '～', '々', 'ゝ',
    'ゞ', 'ー', 'ヽ', 'ヾ',
];

/// Whether a font name (subset prefix allowed) belongs to a math font.
pub fn is_formula_font(font_name: &str) -> bool {
    let name = strip_subset_prefix(font_name);
    !name.is_empty() && FORMULA_FONT.is_match(name)
}

/// Whether a character belongs to a formula.
///
/// Unmapped codes from a math font count as formula; unmapped codes from a
/// text font are an encoding problem and stay text.
pub fn is_formula_char(font_name: &str, ch: char, unmapped: bool) -> bool {
    let formula_font = is_formula_font(font_name);
    if unmapped || formula_font {
        return formula_font;
    }
    if ch == ' ' || TEXT_SYMBOLS.contains(&ch) {
        return false;
    }
    let mut buf = [0u8; 4];
    if FORMULA_CATEGORY.is_match(ch.encode_utf8(&mut buf)) {
        return true;
    }
    (0x370..0x400).contains(&(ch as u32))
}

/// Placeholder for the `index`-th formula of a block.
pub fn placeholder(index: usize) -> String {
    format!("{{v{}}}", index)
}

/// Replace `{vN}` placeholders, including variants such as `(v 1)` or `[V1]`
/// that translators produce, with the original formula text.
///
/// Unknown indices are normalised to `{vN}` and left in place.
pub fn restore_placeholders(text: &str, formulas: &[FormulaSpan]) -> String {
    if formulas.is_empty() {
        return text.to_string();
    }
    PLACEHOLDER
        .replace_all(text, |caps: &Captures| {
            caps[1]
                .split_whitespace()
                .map(|idx| match idx.parse::<usize>().ok().and_then(|i| formulas.get(i)) {
                    Some(f) => f.text.clone(),
                    None => format!("{{v{}}}", idx),
                })
                .collect::<String>()
        })
        .into_owned()
}
