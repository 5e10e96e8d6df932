//! Character script classification.

/// CJK ideographs, kana, fullwidth forms and CJK punctuation.
///
/// Hangul is excluded: Korean separates words with spaces.
pub fn is_cjk(c: char) -> bool {
    let code = c as u32;
    (0x4E00..=0x9FFF).contains(&code)
        || (0x3400..=0x4DBF).contains(&code)
        || (0x20000..=0x2EBEF).contains(&code)
        || (0xF900..=0xFAFF).contains(&code)
        || (0x3000..=0x30FF).contains(&code)
        || (0x31F0..=0x31FF).contains(&code)
        || (0xFF00..=0xFFEF).contains(&code)
}

/// Hiragana or katakana.
pub fn is_kana(c: char) -> bool {
    let code = c as u32;
    (0x3040..=0x30FF).contains(&code) || (0x31F0..=0x31FF).contains(&code) || (0xFF66..=0xFF9F).contains(&code)
}

/// Han ideographs.
pub fn is_han(c: char) -> bool {
    let code = c as u32;
    (0x4E00..=0x9FFF).contains(&code)
        || (0x3400..=0x4DBF).contains(&code)
        || (0x20000..=0x2EBEF).contains(&code)
        || (0xF900..=0xFAFF).contains(&code)
}

/// Hangul syllables and jamo.
pub fn is_hangul(c: char) -> bool {
    let code = c as u32;
    (0xAC00..=0xD7AF).contains(&code) || (0x1100..=0x11FF).contains(&code) || (0x3130..=0x318F).contains(&code)
}

/// Latin letters and digits, including accented Latin.
pub fn is_latin(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(c as u32, 0x00C0..=0x024F | 0x1E00..=0x1EFF)
}

/// Characters that take a full em in proportional estimates.
pub fn is_wide(c: char) -> bool {
    c as u32 > 0x2E7F || is_hangul(c)
}

/// Pick a language for rendering a line of text.
///
/// Kana means Japanese and hangul means Korean regardless of counts; Han
/// without kana is ambiguous between Chinese and Japanese and resolves to
/// `target`. Anything else is treated as English.
pub fn dominant_language<'a>(text: &str, target: &'a str) -> &'a str {
    let mut han = 0usize;
    for c in text.chars() {
        if is_kana(c) {
            return "ja";
        }
        if is_hangul(c) {
            return "ko";
        }
        if is_han(c) {
            han += 1;
        }
    }
    if han > 0 {
        if target.starts_with("zh") || target == "ja" {
            return target;
        }
        return "ja";
    }
    "en"
}
