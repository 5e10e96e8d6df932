//! Character extraction from page content streams.
//!
//! The extractor interprets the text operators of a page (and of the form
//! XObjects it draws) and produces one [`PositionedChar`] per visible glyph,
//! tagged with the operator that drew it. Each text-showing operator also
//! gets a [`ShowRecord`] with its total advance so the rewriter can delete it
//! without moving the text that follows.

use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::sync::Arc;

use lopdf::content::Operation;
use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId};

use crate::error::{Error, Result};
use crate::font::{FontMetrics, FontRegistry};
use crate::geometry::{Matrix, Rect};
use crate::model::{FontId, GlyphOrigin, PositionedChar};

use super::document::{decode_operations, media_box, page_operations, page_resources};
use super::objects::{get_dict, get_name, get_number, numbers, resolve};

/// Glyph box bottom, in text space units per unit font size.
const GLYPH_DESCENT: f32 = -0.2;
/// Glyph box top, in text space units per unit font size.
const GLYPH_ASCENT: f32 = 0.8;
/// Upper bound on form draws interpreted for one page.
const MAX_FORM_DRAWS: usize = 4096;

/// Where a content stream came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// The page's own content
    Page,
    /// A form XObject drawn by another source
    Form {
        object_id: ObjectId,
        /// Index of the source whose resources name this form
        parent: usize,
        /// Name under the parent's `/XObject` resources
        resource_name: Vec<u8>,
    },
}

/// Horizontal displacement of a text-showing operator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShowRecord {
    /// Total advance in text space, including spacing and `TJ` adjustments
    pub advance: f32,
    pub font_size: f32,
    /// `Tz / 100`
    pub h_scale: f32,
    /// Index of the enclosing `BT … ET` within the source
    pub bt_group: usize,
}

/// One content stream with its decoded operations.
#[derive(Debug, Clone)]
pub struct ContentSource {
    pub kind: SourceKind,
    pub operations: Vec<Operation>,
    /// Per operation; `Some` for text-showing operators
    pub shows: Vec<Option<ShowRecord>>,
}

/// Everything extracted from one page.
#[derive(Debug, Clone)]
pub struct PageText {
    pub page_number: u32,
    pub page_id: ObjectId,
    pub media_box: Rect,
    /// Visible glyphs in content-stream order
    pub chars: Vec<PositionedChar>,
    /// Index 0 is the page content; every form draw follows in discovery order
    pub sources: Vec<ContentSource>,
}

impl PageText {
    /// Whether the page carries a text layer.
    pub fn has_text(&self) -> bool {
        !self.chars.is_empty()
    }

    pub fn width(&self) -> f32 {
        self.media_box.width()
    }

    pub fn height(&self) -> f32 {
        self.media_box.height()
    }

    /// For every source, the index of the first source reading the same
    /// stream. Draws of one form share their operators.
    pub fn source_groups(&self) -> Vec<usize> {
        let mut first: HashMap<ObjectId, usize> = HashMap::new();
        self.sources
            .iter()
            .enumerate()
            .map(|(index, source)| match &source.kind {
                SourceKind::Page => index,
                SourceKind::Form { object_id, .. } => *first.entry(*object_id).or_insert(index),
            })
            .collect()
    }
}

type Decoder<'a> = Box<dyn Fn(&[u8]) -> Option<String> + 'a>;

/// A font as seen by the interpreter.
struct LoadedFont<'a> {
    id: Option<FontId>,
    name: Arc<str>,
    composite: bool,
    /// Composite codes are Unicode code points
    code_points: bool,
    metrics: FontMetrics,
    decode: Option<Decoder<'a>>,
}

#[derive(Debug, Clone, Copy)]
struct TextParams {
    char_spacing: f32,
    word_spacing: f32,
    h_scale: f32,
    leading: f32,
    rise: f32,
    size: f32,
}

impl Default for TextParams {
    fn default() -> Self {
        Self {
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
            size: 0.0,
        }
    }
}

#[derive(Clone)]
struct GraphicsState<'a> {
    ctm: Matrix,
    params: TextParams,
    font: Option<Rc<LoadedFont<'a>>>,
}

struct PendingForm {
    object_id: ObjectId,
    ctm: Matrix,
    parent: usize,
    resource_name: Vec<u8>,
    resources: Dictionary,
    /// Forms drawing this one, outermost first
    ancestry: Vec<ObjectId>,
}

struct RunOutput {
    shows: Vec<Option<ShowRecord>>,
    forms: Vec<PendingForm>,
}

/// Extracts positioned characters from the pages of one document.
pub struct CharExtractor<'a> {
    doc: &'a LopdfDocument,
    registry: &'a FontRegistry,
}

impl<'a> CharExtractor<'a> {
    /// The registry must already hold the document's fonts.
    pub fn new(doc: &'a LopdfDocument, registry: &'a FontRegistry) -> Self {
        Self { doc, registry }
    }

    /// Extract a page by number (1-indexed).
    pub fn extract_page(&self, page_number: u32) -> Result<PageText> {
        let pages = self.doc.get_pages();
        let page_id = *pages
            .get(&page_number)
            .ok_or(Error::PageOutOfRange(page_number, pages.len() as u32))?;
        self.extract(page_number, page_id)
    }

    /// Extract a page by object id.
    pub fn extract(&self, page_number: u32, page_id: ObjectId) -> Result<PageText> {
        let media_box = media_box(self.doc, page_id)?;
        let has_contents = self
            .doc
            .get_dictionary(page_id)
            .map(|d| d.has(b"Contents"))
            .unwrap_or(false);
        let operations = if has_contents {
            page_operations(self.doc, page_id)?
        } else {
            Vec::new()
        };
        let resources = page_resources(self.doc, page_id);

        let mut chars = Vec::new();
        let out = self.run(&operations, &resources, Matrix::IDENTITY, 0, &mut chars);
        let mut sources = vec![ContentSource {
            kind: SourceKind::Page,
            operations,
            shows: out.shows,
        }];

        let mut pending: VecDeque<PendingForm> = out.forms.into();
        while let Some(form) = pending.pop_front() {
            if form.ancestry.contains(&form.object_id) {
                log::debug!("Page {}: form {:?} draws itself", page_number, form.object_id);
                continue;
            }
            if sources.len() > MAX_FORM_DRAWS {
                log::warn!(
                    "Page {}: more than {} form draws, the rest is not extracted",
                    page_number,
                    MAX_FORM_DRAWS
                );
                break;
            }
            let Ok(stream) = self.doc.get_object(form.object_id).and_then(Object::as_stream) else {
                continue;
            };
            let data = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            let operations = match decode_operations(&data) {
                Ok(ops) => ops,
                Err(e) => {
                    log::warn!(
                        "Page {}: skipping unreadable form {:?}: {}",
                        page_number,
                        form.object_id,
                        e
                    );
                    continue;
                }
            };
            let resources = get_dict(self.doc, &stream.dict, b"Resources")
                .cloned()
                .unwrap_or(form.resources);

            let index = sources.len();
            let out = self.run(&operations, &resources, form.ctm, index, &mut chars);
            let mut ancestry = form.ancestry;
            ancestry.push(form.object_id);
            pending.extend(out.forms.into_iter().map(|mut child| {
                child.ancestry = ancestry.clone();
                child
            }));
            sources.push(ContentSource {
                kind: SourceKind::Form {
                    object_id: form.object_id,
                    parent: form.parent,
                    resource_name: form.resource_name,
                },
                operations,
                shows: out.shows,
            });
        }

        log::debug!(
            "Page {}: {} chars from {} content sources",
            page_number,
            chars.len(),
            sources.len()
        );

        Ok(PageText {
            page_number,
            page_id,
            media_box,
            chars,
            sources,
        })
    }

    fn load_font<'r>(&'r self, resources: &'r Dictionary, name: &[u8]) -> Option<LoadedFont<'r>> {
        let fonts = get_dict(self.doc, resources, b"Font")?;
        let entry = fonts.get(name).ok()?;
        let object_id = entry.as_reference().ok();
        let dict = resolve(self.doc, entry).as_dict().ok()?;

        let id = object_id.and_then(|oid| self.registry.font_for_object(oid));
        let info = id.and_then(|id| self.registry.info(id));
        let metrics = match info {
            Some(info) => info.metrics.clone(),
            None => FontMetrics::from_dict(self.doc, dict),
        };
        let base_font = get_name(dict, b"BaseFont")
            .unwrap_or_else(|| String::from_utf8_lossy(name).into_owned());
        let encoding = get_name(dict, b"Encoding");
        let code_points = encoding
            .as_deref()
            .map(|e| e.starts_with("Uni") && (e.contains("UCS2") || e.contains("UTF16")))
            .unwrap_or(false);

        let doc: &'r LopdfDocument = self.doc;
        let decode: Option<Decoder<'r>> = dict.get_font_encoding(doc).ok().map(|enc| {
            Box::new(move |bytes: &[u8]| LopdfDocument::decode_text(&enc, bytes).ok()) as Decoder<'r>
        });

        Some(LoadedFont {
            id,
            name: Arc::from(base_font.as_str()),
            composite: metrics.composite,
            code_points,
            metrics,
            decode,
        })
    }

    fn run<'r>(
        &'r self,
        operations: &[Operation],
        resources: &'r Dictionary,
        base_ctm: Matrix,
        source: usize,
        chars: &mut Vec<PositionedChar>,
    ) -> RunOutput {
        let mut fonts: HashMap<Vec<u8>, Option<Rc<LoadedFont<'r>>>> = HashMap::new();
        let mut gs = GraphicsState {
            ctm: base_ctm,
            params: TextParams::default(),
            font: None,
        };
        let mut stack: Vec<GraphicsState<'r>> = Vec::new();
        let mut tm = Matrix::IDENTITY;
        let mut tlm = Matrix::IDENTITY;
        let mut bt_group = 0usize;
        let mut in_text = false;
        let mut out = RunOutput {
            shows: vec![None; operations.len()],
            forms: Vec::new(),
        };

        for (op_index, op) in operations.iter().enumerate() {
            let args = numbers(&op.operands);
            match op.operator.as_str() {
                "q" => stack.push(gs.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        gs = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(&args) {
                        gs.ctm = m.multiply(&gs.ctm);
                    }
                }
                "BT" => {
                    in_text = true;
                    bt_group += 1;
                    tm = Matrix::IDENTITY;
                    tlm = Matrix::IDENTITY;
                }
                "ET" => in_text = false,
                "Tf" => {
                    if let Some(Object::Name(name)) = op.operands.first() {
                        let font = fonts
                            .entry(name.clone())
                            .or_insert_with(|| self.load_font(resources, name).map(Rc::new));
                        gs.font = font.clone();
                    }
                    if let Some(size) = op.operands.get(1).and_then(get_number) {
                        gs.params.size = size;
                    }
                }
                "Tc" => gs.params.char_spacing = args.first().copied().unwrap_or(0.0),
                "Tw" => gs.params.word_spacing = args.first().copied().unwrap_or(0.0),
                "Tz" => gs.params.h_scale = args.first().copied().unwrap_or(100.0) / 100.0,
                "TL" => gs.params.leading = args.first().copied().unwrap_or(0.0),
                "Ts" => gs.params.rise = args.first().copied().unwrap_or(0.0),
                "Td" | "TD" => {
                    if let [tx, ty] = args[..] {
                        if op.operator == "TD" {
                            gs.params.leading = -ty;
                        }
                        tlm = tlm.pre_translate(tx, ty);
                        tm = tlm;
                    }
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(&args) {
                        tm = m;
                        tlm = m;
                    }
                }
                "T*" => {
                    tlm = tlm.pre_translate(0.0, -gs.params.leading);
                    tm = tlm;
                }
                "Tj" | "TJ" | "'" | "\"" => {
                    if op.operator == "\"" {
                        if let [aw, ac, ..] = args[..] {
                            gs.params.word_spacing = aw;
                            gs.params.char_spacing = ac;
                        }
                    }
                    if op.operator == "'" || op.operator == "\"" {
                        tlm = tlm.pre_translate(0.0, -gs.params.leading);
                        tm = tlm;
                    }
                    if !in_text {
                        continue;
                    }
                    let origin = GlyphOrigin::new(source, op_index);
                    let advance = match &gs.font {
                        Some(font) => show_operands(op, font, &gs, &mut tm, origin, chars),
                        None => 0.0,
                    };
                    out.shows[op_index] = Some(ShowRecord {
                        advance,
                        font_size: gs.params.size,
                        h_scale: gs.params.h_scale,
                        bt_group,
                    });
                }
                "Do" => {
                    if let Some(Object::Name(name)) = op.operands.first() {
                        if let Some(form) = self.form_xobject(resources, name, &gs.ctm, source) {
                            out.forms.push(form);
                        }
                    }
                }
                _ => {}
            }
        }
        out
    }

    fn form_xobject(
        &self,
        resources: &Dictionary,
        name: &[u8],
        ctm: &Matrix,
        source: usize,
    ) -> Option<PendingForm> {
        let xobjects = get_dict(self.doc, resources, b"XObject")?;
        let object_id = xobjects.get(name).ok()?.as_reference().ok()?;
        let stream = self.doc.get_object(object_id).ok()?.as_stream().ok()?;
        if get_name(&stream.dict, b"Subtype").as_deref() != Some("Form") {
            return None;
        }
        let matrix = match stream.dict.get(b"Matrix").map(|o| resolve(self.doc, o)) {
            Ok(Object::Array(values)) => {
                let values: Vec<f32> = values.iter().filter_map(get_number).collect();
                Matrix::from_operands(&values).unwrap_or(Matrix::IDENTITY)
            }
            _ => Matrix::IDENTITY,
        };
        Some(PendingForm {
            object_id,
            ctm: matrix.multiply(ctm),
            parent: source,
            resource_name: name.to_vec(),
            resources: resources.clone(),
            ancestry: Vec::new(),
        })
    }
}

/// Interpret the string operands of a show operator. Returns the advance.
fn show_operands(
    op: &Operation,
    font: &LoadedFont<'_>,
    gs: &GraphicsState<'_>,
    tm: &mut Matrix,
    origin: GlyphOrigin,
    chars: &mut Vec<PositionedChar>,
) -> f32 {
    let mut advance = 0.0;
    let text_index = if op.operator == "\"" { 2 } else { 0 };
    match op.operands.get(text_index) {
        Some(Object::String(bytes, _)) => {
            advance += show_string(bytes, font, gs, tm, origin, chars);
        }
        Some(Object::Array(items)) if op.operator == "TJ" => {
            for item in items {
                match item {
                    Object::String(bytes, _) => {
                        advance += show_string(bytes, font, gs, tm, origin, chars);
                    }
                    other => {
                        if let Some(n) = get_number(other) {
                            let tx = -n / 1000.0 * gs.params.size * gs.params.h_scale;
                            *tm = tm.pre_translate(tx, 0.0);
                            advance += tx;
                        }
                    }
                }
            }
        }
        _ => {}
    }
    advance
}

fn show_string(
    bytes: &[u8],
    font: &LoadedFont<'_>,
    gs: &GraphicsState<'_>,
    tm: &mut Matrix,
    origin: GlyphOrigin,
    chars: &mut Vec<PositionedChar>,
) -> f32 {
    let p = &gs.params;
    let code_len = if font.composite { 2 } else { 1 };
    let mut advance = 0.0;

    for code_bytes in bytes.chunks(code_len) {
        let code = code_bytes.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32);
        let w0 = font.metrics.code_width(code);

        let trm = Matrix::new(p.size * p.h_scale, 0.0, 0.0, p.size, 0.0, p.rise)
            .multiply(tm)
            .multiply(&gs.ctm);
        let size = trm.vertical_scale();
        let (text, cid) = decode_code(font, code_bytes, code);
        if text.chars().any(|c| !c.is_whitespace()) && size > 0.0 {
            let n = text.chars().count() as f32;
            // ligatures share the glyph box
            for (i, ch) in text.chars().enumerate() {
                if ch.is_whitespace() {
                    continue;
                }
                let x0 = w0 * i as f32 / n;
                let x1 = w0 * (i + 1) as f32 / n;
                chars.push(PositionedChar {
                    ch,
                    font: font.id,
                    font_name: font.name.clone(),
                    size,
                    bbox: trm.transform_rect(x0, GLYPH_DESCENT, x1, GLYPH_ASCENT),
                    cid,
                    origin,
                });
            }
        }

        let word_space = if code_len == 1 && code == 32 {
            p.word_spacing
        } else {
            0.0
        };
        let tx = (w0 * p.size + p.char_spacing + word_space) * p.h_scale;
        *tm = tm.pre_translate(tx, 0.0);
        advance += tx;
    }
    advance
}

/// Decode one character code. Composite codes keep their raw value as `cid`.
fn decode_code(font: &LoadedFont<'_>, bytes: &[u8], code: u32) -> (String, Option<u32>) {
    let cid = font.composite.then_some(code);
    if let Some(decode) = &font.decode {
        if let Some(text) = decode(bytes) {
            let usable = !text.is_empty()
                && !text.contains('\0')
                && !text.contains(char::REPLACEMENT_CHARACTER);
            if usable {
                return (text, cid);
            }
        }
    }
    if font.composite {
        if font.code_points {
            if let Some(c) = char::from_u32(code) {
                return (c.to_string(), cid);
            }
        }
        return (char::REPLACEMENT_CHARACTER.to_string(), cid);
    }
    let text: String = bytes.iter().map(|&b| b as char).collect();
    (text, None)
}
