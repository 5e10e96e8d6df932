//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use lopdf::content::Operation;
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use transpdf::layout::{Detection, LayoutModel, ModelCache, PageImage};
use transpdf::pipeline::FixedMemory;
use transpdf::{TranslateOptions, Translator};

/// Letter-sized pages sharing one Helvetica font named `/F1`.
pub struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    font_id: ObjectId,
    kids: Vec<Object>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        Self {
            doc,
            pages_id,
            font_id,
            kids: Vec::new(),
        }
    }

    pub fn page(mut self, content: &str) -> Self {
        let content_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, content.as_bytes().to_vec()));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => self.font_id } },
        });
        self.kids.push(page_id.into());
        self
    }

    /// A form XObject that can use `/F1`.
    pub fn form(&mut self, content: &str) -> ObjectId {
        self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => self.font_id } },
            },
            content.as_bytes().to_vec(),
        ))
    }

    /// A page whose `/XObject` resources name the given forms.
    pub fn page_drawing(mut self, content: &str, forms: &[(&str, ObjectId)]) -> Self {
        let mut xobjects = lopdf::Dictionary::new();
        for (name, id) in forms {
            xobjects.set(name.as_bytes().to_vec(), Object::Reference(*id));
        }
        let content_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, content.as_bytes().to_vec()));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => self.font_id },
                "XObject" => xobjects,
            },
        });
        self.kids.push(page_id.into());
        self
    }

    pub fn build(mut self) -> Document {
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog);
        self.doc
    }
}

/// A line of text at `(x, y)` in 12pt Helvetica.
pub fn text_at(x: f32, y: f32, text: &str) -> String {
    format!("BT /F1 12 Tf {} {} Td ({}) Tj ET\n", x, y, text)
}

/// Decoded operators of a page.
pub fn page_ops(doc: &Document, page: u32) -> Vec<Operation> {
    let page_id = doc.get_pages()[&page];
    transpdf::parser::page_operations(doc, page_id).expect("page content decodes")
}

/// Operators that set or show text.
pub fn is_text_operator(op: &Operation) -> bool {
    matches!(
        op.operator.as_str(),
        "BT" | "ET" | "Tf" | "Td" | "TD" | "Tm" | "T*" | "Tj" | "TJ" | "'" | "\"" | "Tc" | "Tw"
            | "Tz" | "TL" | "Ts" | "Tr"
    )
}

/// Layout model returning the same boxes for every page.
///
/// Boxes are `([x0, y0, x1, y1], category)` in raster pixels.
pub struct FixedLayout(pub Vec<([f32; 4], u32)>);

impl LayoutModel for FixedLayout {
    fn name(&self) -> &str {
        "fixed"
    }

    fn detect_batch(&self, images: &[PageImage]) -> transpdf::Result<Vec<Vec<Detection>>> {
        Ok(images
            .iter()
            .map(|_| {
                self.0
                    .iter()
                    .map(|(bbox, category)| Detection {
                        bbox: *bbox,
                        category: *category,
                        confidence: 0.9,
                    })
                    .collect()
            })
            .collect())
    }
}

/// Raster box for a PDF rectangle on a 792pt-high page rendered at 72 DPI.
pub fn raster_box(x0: f32, y0: f32, x1: f32, y1: f32) -> [f32; 4] {
    [x0, 792.0 - y1, x1, 792.0 - y0]
}

/// Sequential translator with plenty of memory and an optional layout model.
pub fn translator(options: TranslateOptions, layout: Option<FixedLayout>) -> Translator {
    let translator = Translator::new(options.with_dpi(72).sequential())
        .expect("valid options")
        .with_memory_probe(Arc::new(FixedMemory(8192.0)));
    match layout {
        Some(model) => translator.with_models(Arc::new(ModelCache::with_model(Arc::new(model)))),
        None => translator,
    }
}
