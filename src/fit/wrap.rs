//! Line wrapping of translated text.

use crate::font::script::is_cjk;

/// Split text into wrap tokens.
///
/// CJK characters stand alone, Latin words keep their trailing space and a
/// newline is its own token.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if c == '\n' || is_cjk(c) {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            tokens.push(c.to_string());
        } else if c == ' ' {
            current.push(c);
            tokens.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Wrap `text` into lines no wider than `max_width`.
///
/// `char_width` measures one character at the rendering size. Words longer
/// than a line break between characters.
pub fn wrap_text<F: Fn(char) -> f32>(text: &str, max_width: f32, char_width: F) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    if max_width <= 0.0 {
        return vec![text.to_string()];
    }
    let width_of = |s: &str| s.chars().map(&char_width).sum::<f32>();

    let mut lines = Vec::new();
    let mut line = String::new();
    let mut width = 0.0f32;
    for token in tokenize(text) {
        if token == "\n" {
            lines.push(std::mem::take(&mut line).trim_end().to_string());
            width = 0.0;
            continue;
        }
        let token_width = width_of(&token);
        // trailing spaces may hang past the edge
        let visible = width_of(token.trim_end());
        if width + visible <= max_width {
            line.push_str(&token);
            width += token_width;
        } else if line.is_empty() {
            for c in token.chars() {
                let w = char_width(c);
                if width + w > max_width && !line.is_empty() {
                    lines.push(std::mem::take(&mut line).trim_end().to_string());
                    width = 0.0;
                }
                line.push(c);
                width += w;
            }
        } else {
            lines.push(std::mem::take(&mut line).trim_end().to_string());
            let token = token.trim_start();
            width = width_of(token);
            line.push_str(token);
        }
    }
    if !line.trim_end().is_empty() {
        lines.push(line.trim_end().to_string());
    }
    lines
}
