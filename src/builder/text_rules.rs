//! Sentence continuation rules for joining wrapped lines.

use crate::font::script::{is_cjk, is_latin};

const SENTENCE_END_CJK: &str = "。！？…‥）」』】｝〕〉》＞]";
const SENTENCE_END_LATIN: &str = ".!?;:";
const CLOSING_BRACKETS: &str = ")）]］";
const OPENING_BRACKETS: &str = "(（[［「『【〔〈《{｛";
const QUANTITY_UNITS: &str = "円万億千台個件名社年月日回本枚％%";
const CONTINUATION_CHARS: &str = "がをにでとへのはもてば、,";
const CONTINUATION_SUFFIXES: &[&str] = &[
    "から", "まで", "より", "ので", "けど", "けれど", "けれども", "ながら", "たら", "なら",
    "のに", "ても", "でも", "だけ", "ほど", "くらい", "ばかり", "など", "なんか", "なんて",
    "こと", "もの", "ところ", "ため", "とき", "場合", "際", "して", "され", "であ", "であり",
    "でき", "おり", "あり", "です", "ます", "である", "となり", "とし", "につ", "にお",
];
const SENTENCE_FINAL_PARTICLES: &str = "ねよか";
const TOC_LEADERS: &str = "…‥・．.·";
const HYPHENS: &str = "-‐‑‒–—−";

fn last_char(text: &str) -> Option<char> {
    text.trim_end().chars().last()
}

pub fn is_sentence_end(c: char) -> bool {
    SENTENCE_END_CJK.contains(c) || SENTENCE_END_LATIN.contains(c)
}

pub fn is_opening_bracket(c: char) -> bool {
    OPENING_BRACKETS.contains(c)
}

pub fn is_hyphen(c: char) -> bool {
    HYPHENS.contains(c)
}

fn is_hiragana(c: char) -> bool {
    ('\u{3040}'..='\u{309F}').contains(&c)
}

/// Whether the text ends like a table-of-contents entry: leaders, then a page number.
pub fn is_toc_line_ending(text: &str) -> bool {
    let stripped = text.trim_end();
    let chars: Vec<char> = stripped.chars().collect();
    let mut i = chars.len();
    while i > 0 && (chars[i - 1].is_ascii_digit() || chars[i - 1] == ' ' || chars[i - 1] == '\u{3000}') {
        i -= 1;
    }
    if i == 0 || i == chars.len() {
        return false;
    }
    while i > 0 {
        let c = chars[i - 1];
        if TOC_LEADERS.contains(c) {
            return true;
        }
        if c == ' ' || c == '\u{3000}' {
            i -= 1;
            continue;
        }
        return false;
    }
    false
}

/// Whether Japanese text ends mid-clause (particle, comma, conjunctive suffix).
pub fn is_japanese_continuation(text: &str) -> bool {
    let stripped = text.trim_end();
    let Some(last) = stripped.chars().last() else {
        return false;
    };
    if is_sentence_end(last) || CLOSING_BRACKETS.contains(last) || QUANTITY_UNITS.contains(last) {
        return false;
    }
    if CONTINUATION_CHARS.contains(last) {
        return true;
    }
    if CONTINUATION_SUFFIXES.iter().any(|s| stripped.ends_with(s)) {
        return true;
    }
    if SENTENCE_FINAL_PARTICLES.contains(last) {
        return false;
    }
    stripped.chars().any(is_cjk) && is_hiragana(last)
}

/// Decide whether a weak boundary really starts a new block.
///
/// `text` is the open block's text and `next` the first character after the
/// boundary.
pub fn weak_boundary_splits(text: &str, next: char, min_cjk_fragment: usize) -> bool {
    let Some(last) = last_char(text) else {
        return false;
    };
    if is_opening_bracket(last) {
        return false;
    }
    let trimmed = text.trim();
    let count = trimmed.chars().count();
    if count <= min_cjk_fragment && trimmed.chars().all(is_cjk) {
        return false;
    }
    if is_toc_line_ending(text) {
        return true;
    }
    if is_sentence_end(last) || CLOSING_BRACKETS.contains(last) || QUANTITY_UNITS.contains(last) {
        return true;
    }
    if is_japanese_continuation(text) {
        return false;
    }
    if last == ',' || last == '、' || is_hyphen(last) {
        return false;
    }
    // a Latin line ending mid-sentence continues in lower case
    if (is_latin(last) || last == ')') && next.is_lowercase() {
        return false;
    }
    true
}

/// Separator placed between two wrapped lines of the same block.
///
/// Returns `None` when the previous line's trailing hyphen must be dropped.
pub fn line_join_separator(text: &str, next: char) -> Option<&'static str> {
    let Some(last) = text.chars().last() else {
        return Some("");
    };
    if is_hyphen(last) && next.is_lowercase() && text.chars().rev().nth(1).map(is_latin).unwrap_or(false) {
        return None;
    }
    if is_sentence_end(last) {
        if is_cjk(last) || is_cjk(next) {
            return Some("");
        }
        return Some(" ");
    }
    if is_cjk(last) || is_cjk(next) {
        return Some("");
    }
    if last.is_whitespace() {
        return Some("");
    }
    Some(" ")
}

/// Whether a word space goes between two characters on the same line.
pub fn needs_word_space(prev: char, next: char) -> bool {
    !is_cjk(prev) && !is_cjk(next)
}
