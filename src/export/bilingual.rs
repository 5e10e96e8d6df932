//! Bilingual documents: every original page followed by its translation.

use std::path::Path;

use lopdf::{Document as LopdfDocument, Object, ObjectId};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::parser::{inherited, load_document};
use crate::pipeline::save_document;

/// Page attributes that may live on a page tree ancestor.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Page counts of a bilingual document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BilingualStats {
    pub total_pages: usize,
    pub original_pages: usize,
    pub translated_pages: usize,
}

/// Interleave the pages of an original and a translated document.
///
/// Original page `i` is followed by translated page `i`. When the counts
/// differ, the surplus pages of the longer document follow in their own
/// order. The translated document's catalog and page tree are dropped;
/// everything its pages reference is imported under fresh object ids.
pub fn interleave_pages(
    original: &LopdfDocument,
    translated: &LopdfDocument,
) -> Result<(LopdfDocument, BilingualStats)> {
    let mut out = original.clone();
    let mut imported = translated.clone();
    imported.renumber_objects_with(out.max_id + 1);

    let original_pages: Vec<ObjectId> = out.get_pages().into_values().collect();
    let translated_pages: Vec<ObjectId> = imported.get_pages().into_values().collect();
    if original_pages.is_empty() {
        return Err(Error::InvalidInput("original document has no pages".to_string()));
    }
    for &page in &original_pages {
        flatten_inherited(&mut out, page)?;
    }
    for &page in &translated_pages {
        flatten_inherited(&mut imported, page)?;
    }

    let root = out
        .catalog()?
        .get(b"Pages")
        .and_then(Object::as_reference)
        .map_err(|e| Error::PdfParse(format!("catalog has no page tree: {}", e)))?;

    for (id, object) in imported.objects {
        if is_tree_node(&object) {
            continue;
        }
        out.max_id = out.max_id.max(id.0);
        out.objects.insert(id, object);
    }

    let mut kids = Vec::with_capacity(original_pages.len() + translated_pages.len());
    for i in 0..original_pages.len().max(translated_pages.len()) {
        if let Some(&page) = original_pages.get(i) {
            kids.push(page);
        }
        match translated_pages.get(i) {
            Some(&page) => kids.push(page),
            None => log::warn!("Page {} has no translation, original only included", i + 1),
        }
    }

    for &page in &kids {
        out.get_object_mut(page)
            .and_then(Object::as_dict_mut)?
            .set("Parent", Object::Reference(root));
    }
    let tree = out.get_object_mut(root).and_then(Object::as_dict_mut)?;
    tree.set("Count", Object::Integer(kids.len() as i64));
    tree.set(
        "Kids",
        Object::Array(kids.iter().map(|&id| Object::Reference(id)).collect()),
    );

    let stats = BilingualStats {
        total_pages: kids.len(),
        original_pages: original_pages.len(),
        translated_pages: translated_pages.len(),
    };
    Ok((out, stats))
}

/// Interleave two PDF files and save the result.
pub fn create_bilingual_pdf(
    original: impl AsRef<Path>,
    translated: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> Result<BilingualStats> {
    let original = load_document(original)?;
    let translated = load_document(translated)?;
    let (mut doc, stats) = interleave_pages(&original, &translated)?;
    save_document(&mut doc, output.as_ref())?;
    log::info!(
        "Created bilingual PDF: {} pages ({} original + {} translated interleaved)",
        stats.total_pages,
        stats.original_pages,
        stats.translated_pages
    );
    Ok(stats)
}

/// Copy inherited attributes onto the page so it survives re-parenting.
fn flatten_inherited(doc: &mut LopdfDocument, page: ObjectId) -> Result<()> {
    let missing: Vec<(&[u8], Object)> = {
        let dict = doc.get_dictionary(page)?;
        INHERITABLE
            .iter()
            .copied()
            .filter(|key| !dict.has(key))
            .filter_map(|key| inherited(doc, page, key).map(|value| (key, value.clone())))
            .collect()
    };
    if missing.is_empty() {
        return Ok(());
    }
    let dict = doc.get_object_mut(page).and_then(Object::as_dict_mut)?;
    for (key, value) in missing {
        dict.set(key.to_vec(), value);
    }
    Ok(())
}

fn is_tree_node(object: &Object) -> bool {
    match object.as_dict() {
        Ok(dict) => matches!(
            dict.get(b"Type").and_then(Object::as_name),
            Ok(b"Catalog") | Ok(b"Pages")
        ),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::page_operations;
    use crate::testing::TestPdf;
    use lopdf::{dictionary, Stream};

    fn pages(labels: &[&str]) -> LopdfDocument {
        let mut pdf = TestPdf::new();
        for label in labels {
            pdf.page(&format!("BT /F1 12 Tf 72 700 Td ({}) Tj ET", label));
        }
        pdf.finish()
    }

    fn labels(doc: &LopdfDocument) -> Vec<String> {
        doc.get_pages()
            .into_values()
            .map(|id| {
                page_operations(doc, id)
                    .unwrap()
                    .iter()
                    .find(|op| op.operator == "Tj")
                    .and_then(|op| op.operands.first())
                    .and_then(|o| o.as_str().ok())
                    .map(|s| String::from_utf8_lossy(s).into_owned())
                    .unwrap_or_default()
            })
            .collect()
    }

    #[test]
    fn test_pages_alternate() {
        let (doc, stats) = interleave_pages(&pages(&["A1", "A2"]), &pages(&["B1", "B2"])).unwrap();
        assert_eq!(labels(&doc), vec!["A1", "B1", "A2", "B2"]);
        assert_eq!(
            stats,
            BilingualStats {
                total_pages: 4,
                original_pages: 2,
                translated_pages: 2
            }
        );
    }

    #[test]
    fn test_surplus_pages_follow_in_order() {
        let (doc, stats) = interleave_pages(&pages(&["A1", "A2", "A3"]), &pages(&["B1"])).unwrap();
        assert_eq!(labels(&doc), vec!["A1", "B1", "A2", "A3"]);
        assert_eq!(stats.total_pages, 4);

        let (doc, stats) = interleave_pages(&pages(&["A1"]), &pages(&["B1", "B2"])).unwrap();
        assert_eq!(labels(&doc), vec!["A1", "B1", "B2"]);
        assert_eq!(stats.translated_pages, 2);
    }

    fn font_of(doc: &LopdfDocument, page: u32) -> ObjectId {
        doc.get_dictionary(doc.get_pages()[&page])
            .and_then(|p| p.get(b"Resources"))
            .and_then(Object::as_dict)
            .and_then(|r| r.get(b"Font"))
            .and_then(Object::as_dict)
            .and_then(|f| f.get(b"F1"))
            .and_then(Object::as_reference)
            .unwrap()
    }

    #[test]
    fn test_imported_pages_keep_their_fonts() {
        let (doc, _) = interleave_pages(&pages(&["A1"]), &pages(&["B1"])).unwrap();
        let original = font_of(&doc, 1);
        let translated = font_of(&doc, 2);
        assert_ne!(original, translated);
        assert!(doc.get_dictionary(translated).is_ok());

        // exactly one catalog survives
        let catalogs = doc
            .objects
            .values()
            .filter(|o| {
                o.as_dict()
                    .and_then(|d| d.get(b"Type"))
                    .and_then(Object::as_name)
                    .map(|n| n == b"Catalog")
                    .unwrap_or(false)
            })
            .count();
        assert_eq!(catalogs, 1);
    }

    #[test]
    fn test_inherited_attributes_move_onto_pages() {
        let mut doc = LopdfDocument::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let content = doc.add_object(Stream::new(dictionary! {}, b"BT /F1 9 Tf (X) Tj ET".to_vec()));
        let page = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page.into()],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 300.into(), 400.into()],
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font } },
            }),
        );
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog);

        let (out, _) = interleave_pages(&pages(&["A1"]), &doc).unwrap();
        let imported = out.get_dictionary(out.get_pages()[&2]).unwrap();
        assert!(imported.has(b"Resources"));
        let media = imported.get(b"MediaBox").and_then(Object::as_array).unwrap();
        assert_eq!(media.len(), 4);
    }

    #[test]
    fn test_saved_document_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("original.pdf");
        let translated = dir.path().join("translated.pdf");
        let output = dir.path().join("bilingual.pdf");
        pages(&["A1", "A2"]).save(&original).unwrap();
        pages(&["B1", "B2"]).save(&translated).unwrap();

        let stats = create_bilingual_pdf(&original, &translated, &output).unwrap();
        assert_eq!(stats.total_pages, 4);
        let reloaded = load_document(&output).unwrap();
        assert_eq!(labels(&reloaded), vec!["A1", "B1", "A2", "B2"]);
    }

    #[test]
    fn test_original_without_pages_is_rejected() {
        assert!(matches!(
            interleave_pages(&TestPdf::new().finish(), &pages(&["B1"])),
            Err(Error::InvalidInput(_))
        ));
    }
}
