//! Paragraph builder thresholds.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Empirical thresholds for block building, in PDF points unless noted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Characters within this vertical distance are on the same line
    pub same_line_y: f32,
    /// Lines within this vertical distance belong to the same paragraph
    pub same_para_y: f32,
    /// Horizontal gap that inserts a word space
    pub word_space_x: f32,
    /// Column jump used when the page size gives no dynamic threshold
    pub column_jump_x: f32,
    /// Horizontal gap that separates table cells and form fields
    pub table_cell_x: f32,
    /// Vertical distance that starts a new table row
    pub table_row_y: f32,
    /// Leftward reset that marks a new table-of-contents entry
    pub toc_line_x_reset: f32,
    /// Column jump as a fraction of page width
    pub column_ratio: f32,
    /// Lower bound for the dynamic column jump
    pub min_column_x: f32,
    /// Same-line threshold as a fraction of the median font size
    pub line_font_ratio: f32,
    /// Same-paragraph threshold as a multiple of the median font size
    pub para_font_ratio: f32,
    /// Glyphs smaller than this fraction of the block size are sub/superscripts
    pub subscript_ratio: f32,
    /// CJK fragments up to this many characters never stand alone
    pub min_cjk_fragment: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            same_line_y: 3.0,
            same_para_y: 20.0,
            word_space_x: 1.0,
            column_jump_x: 100.0,
            table_cell_x: 15.0,
            table_row_y: 5.0,
            toc_line_x_reset: 80.0,
            column_ratio: 0.2,
            min_column_x: 50.0,
            line_font_ratio: 0.3,
            para_font_ratio: 1.8,
            subscript_ratio: 0.79,
            min_cjk_fragment: 2,
        }
    }
}

impl BuilderConfig {
    /// Load thresholds from a JSON file; missing keys keep their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: BuilderConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject negative or non-finite thresholds.
    pub fn validate(&self) -> Result<()> {
        let values = [
            ("same_line_y", self.same_line_y),
            ("same_para_y", self.same_para_y),
            ("word_space_x", self.word_space_x),
            ("column_jump_x", self.column_jump_x),
            ("table_cell_x", self.table_cell_x),
            ("table_row_y", self.table_row_y),
            ("toc_line_x_reset", self.toc_line_x_reset),
            ("column_ratio", self.column_ratio),
            ("min_column_x", self.min_column_x),
            ("line_font_ratio", self.line_font_ratio),
            ("para_font_ratio", self.para_font_ratio),
            ("subscript_ratio", self.subscript_ratio),
        ];
        for (name, value) in values {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::Config(format!("{} must be a non-negative number", name)));
            }
        }
        if self.same_para_y < self.same_line_y {
            return Err(Error::Config(
                "same_para_y must not be smaller than same_line_y".to_string(),
            ));
        }
        Ok(())
    }

    /// Thresholds adapted to one page.
    ///
    /// Falls back to the static values when the page size is unusable.
    pub fn thresholds(&self, page_width: f32, page_height: f32, font_size: Option<f32>) -> PageThresholds {
        let base = PageThresholds {
            y_line: self.same_line_y,
            y_para: self.same_para_y,
            x_column: self.column_jump_x,
        };
        if !(page_width > 0.0 && page_height > 0.0) {
            log::warn!(
                "Invalid page size {}x{}; using default thresholds",
                page_width,
                page_height
            );
            return base;
        }
        let fs = font_size.filter(|s| *s > 0.0 && s.is_finite()).unwrap_or(10.0);
        PageThresholds {
            y_line: (fs * self.line_font_ratio).max(self.same_line_y),
            y_para: (fs * self.para_font_ratio).max(self.same_para_y),
            x_column: (page_width * self.column_ratio).max(self.min_column_x),
        }
    }
}

/// Per-page line, paragraph and column thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageThresholds {
    pub y_line: f32,
    pub y_para: f32,
    pub x_column: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dynamic_thresholds() {
        let config = BuilderConfig::default();
        let t = config.thresholds(595.0, 842.0, Some(10.0));
        assert_eq!(t.y_line, 3.0);
        assert_eq!(t.y_para, 20.0);
        assert!((t.x_column - 119.0).abs() < 1e-3);

        let t = config.thresholds(200.0, 300.0, Some(20.0));
        assert!((t.y_line - 6.0).abs() < 1e-4);
        assert!((t.y_para - 36.0).abs() < 1e-4);
        assert_eq!(t.x_column, 50.0);
    }

    #[test]
    fn test_invalid_page_uses_defaults() {
        let t = BuilderConfig::default().thresholds(0.0, 842.0, Some(30.0));
        assert_eq!(t.y_line, 3.0);
        assert_eq!(t.x_column, 100.0);

        let config = BuilderConfig {
            column_jump_x: 140.0,
            ..BuilderConfig::default()
        };
        assert_eq!(config.thresholds(f32::NAN, 842.0, None).x_column, 140.0);
    }

    #[test]
    fn test_json_partial_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thresholds.json");
        std::fs::write(&path, r#"{"table_cell_x": 25.0}"#).unwrap();
        let config = BuilderConfig::from_json_file(&path).unwrap();
        assert_eq!(config.table_cell_x, 25.0);
        assert_eq!(config.same_line_y, 3.0);

        std::fs::write(&path, r#"{"same_line_y": -1}"#).unwrap();
        assert!(matches!(
            BuilderConfig::from_json_file(&path),
            Err(Error::Config(_))
        ));
    }
}
