//! Font classification and text encoding for the rewriter.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use lopdf::{Document as LopdfDocument, Object, ObjectId};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{strip_subset_prefix, FontId};
use crate::parser::objects::{get_array, get_dict, get_name, resolve};

use super::embed::{self, EmbeddedObjects};
use super::face::EmbeddedFace;
use super::metrics::{estimate_width, FontMetrics};
use super::script::dominant_language;
use super::system::find_font_for_language;

/// How text bytes for a font are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FontKind {
    /// Face embedded by us: two-byte glyph ids
    EmbeddedNew,
    /// Type0 font already in the document: two-byte code points
    ExistingComposite,
    /// Simple font already in the document: one byte per ASCII character
    ExistingSimple,
}

/// A font known to the registry.
#[derive(Debug, Clone, Serialize)]
pub struct FontInfo {
    pub id: FontId,
    pub kind: FontKind,
    pub base_font: String,
    #[serde(skip)]
    pub object_id: Option<ObjectId>,
    /// Code-to-Unicode mapping available (`/ToUnicode` present)
    pub has_to_unicode: bool,
    /// Language hint from the CID ordering or the face lookup
    pub language: Option<String>,
    /// `/Encoding` name
    pub encoding: Option<String>,
    #[serde(skip)]
    pub metrics: FontMetrics,
    #[serde(skip)]
    face: Option<Arc<EmbeddedFace>>,
    #[serde(skip)]
    embedded: Option<EmbeddedObjects>,
}

impl FontInfo {
    /// Resource name under which rewritten pages reference this font.
    pub fn resource_name(&self) -> String {
        format!("TPF{}", self.id.0)
    }

    /// Whether a composite font's encoding maps two-byte codes to code points.
    pub fn accepts_code_points(&self) -> bool {
        match self.encoding.as_deref() {
            Some(enc) => {
                enc == "Identity-H"
                    || enc == "Identity-V"
                    || (enc.starts_with("Uni") && (enc.contains("UTF16") || enc.contains("UCS2")))
            }
            None => false,
        }
    }

    pub fn face(&self) -> Option<&EmbeddedFace> {
        self.face.as_deref()
    }
}

/// All fonts of one document plus the target-language fallback chain.
#[derive(Debug)]
pub struct FontRegistry {
    fonts: Vec<FontInfo>,
    by_object: HashMap<ObjectId, FontId>,
    chain: Vec<FontId>,
    target_language: String,
    font_dirs: Vec<PathBuf>,
    font_file: Option<PathBuf>,
}

impl FontRegistry {
    /// Create an empty registry for a target language.
    pub fn new(target_language: impl Into<String>) -> Self {
        Self {
            fonts: Vec::new(),
            by_object: HashMap::new(),
            chain: Vec::new(),
            target_language: target_language.into(),
            font_dirs: Vec::new(),
            font_file: None,
        }
    }

    /// Search these directories before the system font directories.
    pub fn with_font_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.font_dirs = dirs;
        self
    }

    /// Use this font file for the target language.
    pub fn with_font_file(mut self, path: Option<PathBuf>) -> Self {
        self.font_file = path;
        self
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    /// Classify every font dictionary in the document. Returns the number added.
    pub fn load_existing_fonts(&mut self, doc: &LopdfDocument) -> usize {
        let before = self.fonts.len();
        for (&object_id, object) in doc.objects.iter() {
            if self.by_object.contains_key(&object_id) {
                continue;
            }
            let Ok(dict) = object.as_dict() else {
                continue;
            };
            let subtype = get_name(dict, b"Subtype").unwrap_or_default();
            let is_font = get_name(dict, b"Type").as_deref() == Some("Font")
                || matches!(subtype.as_str(), "Type0" | "Type1" | "TrueType" | "Type3" | "MMType1");
            // descendant fonts are reached through their Type0 parent
            if !is_font || subtype.starts_with("CIDFontType") || subtype.is_empty() {
                continue;
            }

            let base_font = get_name(dict, b"BaseFont").unwrap_or_else(|| format!("F{}", object_id.0));
            let encoding = get_name(dict, b"Encoding");
            let has_to_unicode = dict.has(b"ToUnicode");
            let (kind, language) = if subtype == "Type0" {
                let ordering = get_array(doc, dict, b"DescendantFonts")
                    .and_then(|a| a.first())
                    .and_then(|o| resolve(doc, o).as_dict().ok())
                    .and_then(|d| get_dict(doc, d, b"CIDSystemInfo"))
                    .and_then(|info| info.get(b"Ordering").ok())
                    .and_then(|o| match resolve(doc, o) {
                        Object::String(bytes, _) => Some(String::from_utf8_lossy(bytes).into_owned()),
                        _ => None,
                    });
                (FontKind::ExistingComposite, ordering.as_deref().and_then(language_from_ordering))
            } else {
                (FontKind::ExistingSimple, None)
            };

            let id = FontId(self.fonts.len() as u32);
            self.fonts.push(FontInfo {
                id,
                kind,
                base_font,
                object_id: Some(object_id),
                has_to_unicode,
                language: language.map(str::to_string),
                encoding,
                metrics: FontMetrics::from_dict(doc, dict),
                face: None,
                embedded: None,
            });
            self.by_object.insert(object_id, id);
        }

        let added = self.fonts.len() - before;
        log::debug!("Classified {} existing fonts", added);
        added
    }

    /// Embed the target-language fallback chain and return its first font.
    ///
    /// The chain is: explicit font file (if configured), the language's
    /// face, a generic Latin face, then the Helvetica base font. A
    /// configured font file that cannot be loaded is an error.
    pub fn register_target_font(&mut self, doc: &mut LopdfDocument, language: &str) -> Result<FontId> {
        self.target_language = language.to_string();
        self.chain.clear();

        if let Some(path) = self.font_file.clone() {
            let face = EmbeddedFace::from_file(&path)?;
            let id = self.add_face(doc, face, language)?;
            self.chain.push(id);
        }

        let mut seen: Vec<PathBuf> = self.font_file.iter().cloned().collect();
        let mut languages = vec![language.to_string()];
        if !is_latin_language(language) {
            languages.push("en".to_string());
        }
        for lang in languages {
            let Some(path) = find_font_for_language(&lang, &self.font_dirs) else {
                log::warn!("No font face found for '{}'", lang);
                continue;
            };
            if seen.contains(&path) {
                continue;
            }
            seen.push(path.clone());
            match EmbeddedFace::from_file(&path).and_then(|face| self.add_face(doc, face, &lang)) {
                Ok(id) => self.chain.push(id),
                Err(e) => log::warn!("Skipping font {}: {}", path.display(), e),
            }
        }

        if self.chain.is_empty() {
            log::warn!(
                "No embeddable face for '{}'; falling back to the Helvetica base font",
                language
            );
        }
        let base = self.add_base_font(doc);
        self.chain.push(base);
        Ok(self.chain[0])
    }

    /// Register an already parsed face as an embedded font.
    pub fn add_face(&mut self, doc: &mut LopdfDocument, face: EmbeddedFace, language: &str) -> Result<FontId> {
        let objects = embed::embed_face(doc, &face)?;
        let id = FontId(self.fonts.len() as u32);
        log::debug!("Embedded font {} ({}) as {}", face.name(), language, id);
        self.fonts.push(FontInfo {
            id,
            kind: FontKind::EmbeddedNew,
            base_font: face.name().to_string(),
            object_id: Some(objects.type0),
            has_to_unicode: true,
            language: Some(language.to_string()),
            encoding: Some("Identity-H".to_string()),
            metrics: FontMetrics::default(),
            face: Some(Arc::new(face)),
            embedded: Some(objects),
        });
        self.by_object.insert(objects.type0, id);
        Ok(id)
    }

    fn add_base_font(&mut self, doc: &mut LopdfDocument) -> FontId {
        let object_id = embed::add_base_font(doc);
        let metrics = doc
            .get_dictionary(object_id)
            .map(|d| FontMetrics::from_dict(doc, d))
            .unwrap_or_default();
        let id = FontId(self.fonts.len() as u32);
        self.fonts.push(FontInfo {
            id,
            kind: FontKind::ExistingSimple,
            base_font: "Helvetica".to_string(),
            object_id: Some(object_id),
            has_to_unicode: false,
            language: Some("en".to_string()),
            encoding: Some("WinAnsiEncoding".to_string()),
            metrics,
            face: None,
            embedded: None,
        });
        self.by_object.insert(object_id, id);
        id
    }

    pub fn info(&self, id: FontId) -> Option<&FontInfo> {
        self.fonts.get(id.0 as usize)
    }

    fn require(&self, id: FontId) -> Result<&FontInfo> {
        self.info(id)
            .ok_or_else(|| Error::FontEmbeddingFailed(format!("unknown {}", id)))
    }

    pub fn fonts(&self) -> &[FontInfo] {
        &self.fonts
    }

    /// The target fallback chain, most preferred first.
    pub fn target_chain(&self) -> &[FontId] {
        &self.chain
    }

    /// Registry id of a font dictionary object.
    pub fn font_for_object(&self, object_id: ObjectId) -> Option<FontId> {
        self.by_object.get(&object_id).copied()
    }

    /// Whether every character of `text` can be encoded with the font.
    pub fn can_encode(&self, id: FontId, text: &str) -> bool {
        let Some(info) = self.info(id) else {
            return false;
        };
        text.chars().map(normalize_space).all(|c| encodable(info, c))
    }

    /// Encode text for a text-showing operator.
    ///
    /// Embedded faces produce two-byte glyph ids, existing composite fonts
    /// two-byte code points and existing simple fonts one byte per ASCII
    /// character. Characters the font cannot render are an error.
    pub fn encode(&self, id: FontId, text: &str) -> Result<Vec<u8>> {
        let info = self.require(id)?;
        let mut out = Vec::with_capacity(text.len() * 2);
        for c in text.chars().map(normalize_space) {
            let missing = || Error::MissingGlyph {
                font: info.base_font.clone(),
                ch: c,
            };
            match info.kind {
                FontKind::EmbeddedNew => {
                    let face = info.face().ok_or_else(missing)?;
                    let gid = face.glyph_id(c).ok_or_else(missing)?;
                    face.mark_used(gid, c);
                    out.extend_from_slice(&gid.to_be_bytes());
                }
                FontKind::ExistingComposite => {
                    if !encodable(info, c) {
                        return Err(missing());
                    }
                    out.extend_from_slice(&(c as u16).to_be_bytes());
                }
                FontKind::ExistingSimple => {
                    if !encodable(info, c) {
                        return Err(missing());
                    }
                    out.push(c as u8);
                }
            }
        }
        Ok(out)
    }

    /// Encode text as uppercase hex digits.
    pub fn encode_hex(&self, id: FontId, text: &str) -> Result<String> {
        Ok(self
            .encode(id, text)?
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect())
    }

    /// Pick a font that can render `text`.
    ///
    /// `preferred` (usually the block's source font) wins when it can encode
    /// everything; otherwise the chain font matching the text's dominant
    /// script is tried before the rest of the chain.
    pub fn select_font(&self, text: &str, preferred: Option<FontId>) -> Result<FontId> {
        if let Some(id) = preferred {
            if self.can_encode(id, text) {
                return Ok(id);
            }
        }

        let language = dominant_language(text, &self.target_language);
        let by_language = self.chain.iter().copied().find(|id| {
            self.info(*id).and_then(|i| i.language.as_deref()) == Some(language)
                && self.can_encode(*id, text)
        });
        if let Some(id) = by_language {
            return Ok(id);
        }
        if let Some(id) = self.chain.iter().copied().find(|id| self.can_encode(*id, text)) {
            return Ok(id);
        }

        let offending = text
            .chars()
            .map(normalize_space)
            .find(|c| !self.chain.iter().any(|id| self.can_encode(*id, &c.to_string())));
        Err(Error::FontEmbeddingFailed(match offending {
            Some(c) => format!("no registered font can render {:?} (U+{:04X})", c, c as u32),
            None => "no target font registered".to_string(),
        }))
    }

    /// Width of `text` at `size`, in points.
    pub fn text_width(&self, id: FontId, text: &str, size: f32) -> f32 {
        text.chars().map(|c| self.char_width(id, c, size)).sum()
    }

    /// Width of one character at `size`, in points.
    pub fn char_width(&self, id: FontId, c: char, size: f32) -> f32 {
        let c = normalize_space(c);
        let Some(info) = self.info(id) else {
            return estimate_width(c) * size / 1000.0;
        };
        let per_mille = match (&info.kind, info.face()) {
            (FontKind::EmbeddedNew, Some(face)) => match face.glyph_id(c) {
                Some(gid) => face.advance(gid),
                None => estimate_width(c),
            },
            _ => info.metrics.char_width(c) * 1000.0,
        };
        per_mille * size / 1000.0
    }

    /// Write `/W` and `/ToUnicode` for every embedded face that was used.
    pub fn finalize(&self, doc: &mut LopdfDocument) -> Result<()> {
        for info in &self.fonts {
            if let (Some(objects), Some(face)) = (info.embedded, info.face()) {
                embed::write_usage(doc, objects, face)?;
            }
        }
        Ok(())
    }
}

fn encodable(info: &FontInfo, c: char) -> bool {
    match info.kind {
        FontKind::EmbeddedNew => info.face().map(|f| f.has_glyph(c)).unwrap_or(false),
        FontKind::ExistingComposite => info.accepts_code_points() && (c as u32) <= 0xFFFF,
        FontKind::ExistingSimple => (' '..='~').contains(&c),
    }
}

/// Tabs and other whitespace render as plain spaces.
fn normalize_space(c: char) -> char {
    if c.is_whitespace() {
        ' '
    } else {
        c
    }
}

/// Language hint from a CIDSystemInfo ordering.
pub fn language_from_ordering(ordering: &str) -> Option<&'static str> {
    match ordering {
        "Japan1" => Some("ja"),
        "GB1" => Some("zh-CN"),
        "CNS1" => Some("zh-TW"),
        "Korea1" => Some("ko"),
        _ => None,
    }
}

fn is_latin_language(language: &str) -> bool {
    !matches!(language, "ja" | "ko" | "zh" | "zh-CN" | "zh-TW")
}

/// Base font name of a classified font without its subset tag.
pub fn display_name(info: &FontInfo) -> &str {
    strip_subset_prefix(&info.base_font)
}
