//! TrueType/OpenType faces embedded for target-language text.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};

use ttf_parser::{name_id, Face, GlyphId, Tag};

use crate::error::{Error, Result};

use super::system::is_collection;

/// Outline format of a face, which decides the embedding subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlineFormat {
    /// `glyf` outlines, embedded as `CIDFontType2` / `FontFile2`
    TrueType,
    /// CFF outlines, embedded as `CIDFontType0` / `FontFile3 /OpenType`
    Cff,
}

/// Face metrics in 1/1000 em.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceMetrics {
    pub ascent: f32,
    pub descent: f32,
    pub cap_height: f32,
    pub bbox: [f32; 4],
}

/// A parsed font file with glyph lookup caches and usage tracking.
pub struct EmbeddedFace {
    name: String,
    data: Arc<Vec<u8>>,
    units_per_em: u16,
    outline: OutlineFormat,
    metrics: FaceMetrics,
    glyphs: Mutex<HashMap<char, Option<u16>>>,
    advances: Mutex<HashMap<u16, u16>>,
    used: Mutex<BTreeMap<u16, char>>,
}

impl EmbeddedFace {
    /// Load a face from a font file.
    pub fn from_file(path: &Path) -> Result<Self> {
        if is_collection(path) {
            return Err(Error::FontEmbeddingFailed(format!(
                "{} is a font collection",
                path.display()
            )));
        }
        let data = std::fs::read(path).map_err(|e| {
            Error::FontEmbeddingFailed(format!("cannot read {}: {}", path.display(), e))
        })?;
        let fallback_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Embedded")
            .to_string();
        Self::from_bytes(data, &fallback_name)
    }

    /// Load a face from font file bytes.
    pub fn from_bytes(data: Vec<u8>, fallback_name: &str) -> Result<Self> {
        if ttf_parser::fonts_in_collection(&data).is_some() {
            return Err(Error::FontEmbeddingFailed(format!(
                "{} is a font collection",
                fallback_name
            )));
        }
        let face = Face::parse(&data, 0).map_err(|e| {
            Error::FontEmbeddingFailed(format!("cannot parse {}: {}", fallback_name, e))
        })?;

        let units_per_em = face.units_per_em().max(1);
        let scale = 1000.0 / units_per_em as f32;
        let outline = if face.raw_face().table(Tag::from_bytes(b"glyf")).is_some() {
            OutlineFormat::TrueType
        } else {
            OutlineFormat::Cff
        };
        let bbox = face.global_bounding_box();
        let metrics = FaceMetrics {
            ascent: face.ascender() as f32 * scale,
            descent: face.descender() as f32 * scale,
            cap_height: face
                .capital_height()
                .map(|h| h as f32 * scale)
                .unwrap_or(face.ascender() as f32 * scale * 0.7),
            bbox: [
                bbox.x_min as f32 * scale,
                bbox.y_min as f32 * scale,
                bbox.x_max as f32 * scale,
                bbox.y_max as f32 * scale,
            ],
        };
        let name = face
            .names()
            .into_iter()
            .filter(|n| n.name_id == name_id::POST_SCRIPT_NAME)
            .find_map(|n| n.to_string())
            .unwrap_or_else(|| fallback_name.to_string());
        drop(face);

        Ok(Self {
            name: sanitize_font_name(&name),
            data: Arc::new(data),
            units_per_em,
            outline,
            metrics,
            glyphs: Mutex::new(HashMap::new()),
            advances: Mutex::new(HashMap::new()),
            used: Mutex::new(BTreeMap::new()),
        })
    }

    /// PostScript name usable as `/BaseFont`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn outline(&self) -> OutlineFormat {
        self.outline
    }

    pub fn metrics(&self) -> FaceMetrics {
        self.metrics
    }

    fn face(&self) -> Option<Face<'_>> {
        Face::parse(&self.data, 0).ok()
    }

    /// Glyph id for a character. `Some(0)` is a real mapping; `None` means
    /// the face has no glyph.
    pub fn glyph_id(&self, c: char) -> Option<u16> {
        if let Ok(cache) = self.glyphs.lock() {
            if let Some(hit) = cache.get(&c) {
                return *hit;
            }
        }
        let gid = self.face().and_then(|f| f.glyph_index(c)).map(|g| g.0);
        if let Ok(mut cache) = self.glyphs.lock() {
            cache.insert(c, gid);
        }
        gid
    }

    pub fn has_glyph(&self, c: char) -> bool {
        self.glyph_id(c).is_some()
    }

    /// Advance of a glyph in 1/1000 em.
    pub fn advance(&self, gid: u16) -> f32 {
        let cached = self.advances.lock().ok().and_then(|c| c.get(&gid).copied());
        let units = match cached {
            Some(units) => units,
            None => {
                let units = self
                    .face()
                    .and_then(|f| f.glyph_hor_advance(GlyphId(gid)))
                    .unwrap_or(self.units_per_em / 2);
                if let Ok(mut cache) = self.advances.lock() {
                    cache.insert(gid, units);
                }
                units
            }
        };
        units as f32 * 1000.0 / self.units_per_em as f32
    }

    /// Record that a glyph was emitted for a character.
    pub fn mark_used(&self, gid: u16, c: char) {
        if let Ok(mut used) = self.used.lock() {
            used.entry(gid).or_insert(c);
        }
    }

    /// Glyphs emitted so far, with the character each one renders.
    pub fn used_glyphs(&self) -> BTreeMap<u16, char> {
        self.used.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

impl std::fmt::Debug for EmbeddedFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedFace")
            .field("name", &self.name)
            .field("units_per_em", &self.units_per_em)
            .field("outline", &self.outline)
            .finish()
    }
}

/// Keep the characters allowed in a PDF name token.
pub fn sanitize_font_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if cleaned.is_empty() {
        "EmbeddedFont".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_font_name() {
        assert_eq!(sanitize_font_name("Noto Sans JP"), "NotoSansJP");
        assert_eq!(sanitize_font_name("IPAGothic-Regular"), "IPAGothic-Regular");
        assert_eq!(sanitize_font_name("游ゴシック"), "EmbeddedFont");
    }

    #[test]
    fn test_garbage_is_rejected() {
        let err = EmbeddedFace::from_bytes(b"definitely not a font".to_vec(), "junk").unwrap_err();
        assert!(matches!(err, Error::FontEmbeddingFailed(_)));
    }

    #[test]
    fn test_collection_path_is_rejected() {
        let err = EmbeddedFace::from_file(Path::new("/nonexistent/msgothic.ttc")).unwrap_err();
        assert!(err.to_string().contains("collection"));
    }
}
