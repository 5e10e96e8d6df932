//! Small in-memory documents for unit tests.

use std::path::{Path, PathBuf};

use lopdf::{dictionary, Document as LopdfDocument, Object, ObjectId, Stream};

/// Builds documents whose pages share one Helvetica font named `/F1`.
pub(crate) struct TestPdf {
    pub doc: LopdfDocument,
    pub pages_id: ObjectId,
    pub font_id: ObjectId,
    kids: Vec<Object>,
}

impl TestPdf {
    pub fn new() -> Self {
        let mut doc = LopdfDocument::with_version("1.5");
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

    /// Add a 612x792 page drawing `content`.
    pub fn page(&mut self, content: &str) -> ObjectId {
        self.page_with_resources(content, dictionary! {})
    }

    /// Add a page with extra resource entries next to `/Font`.
    pub fn page_with_resources(&mut self, content: &str, mut extra: lopdf::Dictionary) -> ObjectId {
        let content_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, content.as_bytes().to_vec()));
        extra.set("Font", dictionary! { "F1" => self.font_id });
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => extra,
        });
        self.kids.push(page_id.into());
        page_id
    }

    /// Add a form XObject using `/F1`.
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

    pub fn finish(mut self) -> LopdfDocument {
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

/// One-page document.
pub(crate) fn single_page(content: &str) -> LopdfDocument {
    let mut pdf = TestPdf::new();
    pdf.page(content);
    pdf.finish()
}

/// TrueType face shipped for embedding tests.
pub(crate) fn fixture_font() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/fonts/DejaVuSansMono.ttf")
}
