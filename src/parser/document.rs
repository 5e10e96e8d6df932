//! Loading documents and reading page-level structures.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId};

use crate::error::{Error, Result};
use crate::geometry::Rect;

use super::objects::{get_number, resolve};

const PDF_MAGIC: &[u8] = b"%PDF-";
/// Page tree depth at which inherited attribute lookup gives up.
const MAX_TREE_DEPTH: usize = 32;

/// Geometry and identity of one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageInfo {
    /// Page number (1-indexed)
    pub number: u32,
    pub id: ObjectId,
    pub media_box: Rect,
}

impl PageInfo {
    pub fn width(&self) -> f32 {
        self.media_box.width()
    }

    pub fn height(&self) -> f32 {
        self.media_box.height()
    }
}

/// Open a PDF file.
pub fn load_document<P: AsRef<Path>>(path: P) -> Result<LopdfDocument> {
    let path = path.as_ref();
    let mut header = [0u8; 8];
    let mut file = File::open(path)?;
    let read = file.read(&mut header)?;
    if read < PDF_MAGIC.len() || !header.starts_with(PDF_MAGIC) {
        return Err(Error::InvalidInput(format!("{} is not a PDF file", path.display())));
    }
    let doc = LopdfDocument::load(path)?;
    check_encryption(&doc)?;
    Ok(doc)
}

/// Parse a PDF from bytes.
pub fn load_document_from_bytes(data: &[u8]) -> Result<LopdfDocument> {
    if !data.starts_with(PDF_MAGIC) {
        return Err(Error::InvalidInput("data is not a PDF file".to_string()));
    }
    let doc = LopdfDocument::load_mem(data)?;
    check_encryption(&doc)?;
    Ok(doc)
}

fn check_encryption(doc: &LopdfDocument) -> Result<()> {
    if doc.is_encrypted() {
        return Err(Error::Encrypted);
    }
    Ok(())
}

/// Look up an attribute on a page or its ancestors.
pub fn inherited<'a>(doc: &'a LopdfDocument, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(resolve(doc, value));
        }
        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// The page's MediaBox. A missing box defaults to US Letter; a degenerate one is an error.
pub fn media_box(doc: &LopdfDocument, page_id: ObjectId) -> Result<Rect> {
    let Some(Object::Array(values)) = inherited(doc, page_id, b"MediaBox") else {
        return Ok(Rect::new(0.0, 0.0, 612.0, 792.0));
    };
    let numbers: Vec<f32> = values
        .iter()
        .filter_map(|o| get_number(resolve(doc, o)))
        .collect();
    let [x0, y0, x1, y1] = numbers[..] else {
        return Err(Error::InvalidInput(format!(
            "page object {} has a malformed MediaBox",
            page_id.0
        )));
    };
    let rect = Rect::new(x0, y0, x1, y1);
    if !rect.is_finite() || rect.width() <= 0.0 || rect.height() <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "page object {} has zero-size MediaBox",
            page_id.0
        )));
    }
    Ok(rect)
}

/// All pages with their geometry, in page order.
///
/// Pages with a degenerate MediaBox are returned as errors so the caller can
/// fail them individually.
pub fn page_infos(doc: &LopdfDocument) -> Vec<(u32, Result<PageInfo>)> {
    doc.get_pages()
        .into_iter()
        .map(|(number, id)| {
            let info = media_box(doc, id).map(|media_box| PageInfo {
                number,
                id,
                media_box,
            });
            (number, info)
        })
        .collect()
}

/// The page's resource dictionary, resolved through inheritance.
pub fn page_resources(doc: &LopdfDocument, page_id: ObjectId) -> Dictionary {
    match inherited(doc, page_id, b"Resources") {
        Some(Object::Dictionary(d)) => d.clone(),
        _ => Dictionary::new(),
    }
}

/// Decoded content-stream operations of a page.
pub fn page_operations(doc: &LopdfDocument, page_id: ObjectId) -> Result<Vec<Operation>> {
    let data = doc
        .get_page_content(page_id)
        .map_err(|e| Error::ContentStreamCorrupt(format!("page content: {}", e)))?;
    decode_operations(&data)
}

/// Decode raw content bytes.
pub fn decode_operations(data: &[u8]) -> Result<Vec<Operation>> {
    Content::decode(data)
        .map(|c| c.operations)
        .map_err(|e| Error::ContentStreamCorrupt(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn doc_with_inherited_box() -> (LopdfDocument, ObjectId) {
        let mut doc = LopdfDocument::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                "Resources" => dictionary! { "Font" => dictionary! {} },
            }),
        );
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog);
        (doc, page_id)
    }

    #[test]
    fn test_media_box_is_inherited() {
        let (doc, page_id) = doc_with_inherited_box();
        let rect = media_box(&doc, page_id).unwrap();
        assert_eq!(rect, Rect::new(0.0, 0.0, 595.0, 842.0));
        assert!(page_resources(&doc, page_id).has(b"Font"));
    }

    #[test]
    fn test_zero_height_page_is_invalid() {
        let (mut doc, page_id) = doc_with_inherited_box();
        doc.get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .unwrap()
            .set("MediaBox", vec![0.into(), 0.into(), 595.into(), 0.into()]);
        assert!(matches!(media_box(&doc, page_id), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_non_pdf_bytes_rejected() {
        assert!(matches!(
            load_document_from_bytes(b"hello"),
            Err(Error::InvalidInput(_))
        ));
    }
}
