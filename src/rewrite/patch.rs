//! Page rewrites computed against a shared document and committed later.

use std::collections::{BTreeSet, HashMap};
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document as LopdfDocument, Object, ObjectId, Stream};

use crate::error::{Error, Result};
use crate::font::FontRegistry;
use crate::model::FontId;
use crate::parser::objects::get_dict;
use crate::parser::{page_resources, PageText, SourceKind};

use super::filter::{filter_operations, Removal};

/// A rewritten form XObject, written as a new object on commit.
#[derive(Debug, Clone)]
struct FormCopy {
    object_id: ObjectId,
    /// Drawing form (`None` for the page) and the name it uses
    links: Vec<(Option<ObjectId>, Vec<u8>)>,
    stream: Stream,
}

/// Everything needed to replace one page's content.
///
/// Built from a shared `&Document`, so pages can be planned in parallel.
/// [`PagePatch::commit`] applies it in one step and cannot fail, which
/// leaves a page either fully rewritten or untouched.
#[derive(Debug, Clone)]
pub struct PagePatch {
    page_number: u32,
    page_id: ObjectId,
    content: Vec<u8>,
    resources: Dictionary,
    forms: Vec<FormCopy>,
}

impl PagePatch {
    /// Plan the rewrite of a page.
    ///
    /// `text` holds the operators of the new text and `fonts` the registry
    /// fonts they use. Removed operators come from `removal`.
    pub fn build(
        doc: &LopdfDocument,
        registry: &FontRegistry,
        page: &PageText,
        removal: &Removal,
        text: Vec<Operation>,
        fonts: &BTreeSet<FontId>,
    ) -> Result<Self> {
        let dirty = dirty_sources(page, removal);
        let groups = page.source_groups();
        let has_dirty_child = |group: usize| {
            page.sources.iter().enumerate().any(|(i, src)| {
                dirty[i] && matches!(src.kind, SourceKind::Form { parent, .. } if groups[parent] == group)
            })
        };

        let page_ops = source_operations(page, removal, 0)?;
        let mut operations = Vec::with_capacity(page_ops.len() + text.len() + 2);
        operations.push(Operation::new("q", vec![]));
        operations.extend(page_ops);
        operations.push(Operation::new("Q", vec![]));
        operations.extend(text);
        let content = encode(operations)?;

        let mut resources = direct_resources(doc, page_resources(doc, page.page_id));
        let mut font_dict = get_dict(doc, &resources, b"Font").cloned().unwrap_or_default();
        for &id in fonts {
            let info = registry
                .info(id)
                .ok_or_else(|| Error::FontEmbeddingFailed(format!("unknown {}", id)))?;
            let object_id = info.object_id.ok_or_else(|| {
                Error::FontEmbeddingFailed(format!("{} has no font object", info.base_font))
            })?;
            font_dict.set(info.resource_name(), Object::Reference(object_id));
        }
        resources.set("Font", font_dict);

        let mut forms: Vec<FormCopy> = Vec::new();
        for (index, source) in page.sources.iter().enumerate().skip(1) {
            if !dirty[index] {
                continue;
            }
            let SourceKind::Form {
                object_id,
                parent,
                resource_name,
            } = &source.kind
            else {
                continue;
            };
            let link = (drawing_form(page, *parent), resource_name.clone());
            if let Some(copy) = forms.iter_mut().find(|f| f.object_id == *object_id) {
                if !copy.links.contains(&link) {
                    copy.links.push(link);
                }
                continue;
            }

            let original = doc
                .get_object(*object_id)
                .and_then(Object::as_stream)
                .map_err(|e| Error::ContentStreamCorrupt(format!("form {:?}: {}", object_id, e)))?;

            let mut dict = original.dict.clone();
            dict.remove(b"Filter");
            dict.remove(b"DecodeParms");
            dict.set("Filter", "FlateDecode");
            if has_dirty_child(groups[index]) {
                let inherited = effective_resources(doc, page, index);
                dict.set("Resources", direct_resources(doc, inherited));
            }
            let content = encode(source_operations(page, removal, index)?)?;
            forms.push(FormCopy {
                object_id: *object_id,
                links: vec![link],
                stream: Stream::new(dict, content),
            });
        }

        log::debug!(
            "Page {}: patch with {} rewritten forms and {} fonts",
            page.page_number,
            forms.len(),
            fonts.len()
        );

        Ok(Self {
            page_number: page.page_number,
            page_id: page.page_id,
            content,
            resources,
            forms,
        })
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    /// Number of form XObjects the patch replaces.
    pub fn form_count(&self) -> usize {
        self.forms.len()
    }

    /// Write the patch into the document.
    pub fn commit(self, doc: &mut LopdfDocument) {
        let Self {
            page_id,
            content,
            mut resources,
            mut forms,
            ..
        } = self;

        let ids: HashMap<ObjectId, ObjectId> = forms
            .iter()
            .map(|form| (form.object_id, doc.new_object_id()))
            .collect();

        let links: Vec<(Option<ObjectId>, Vec<u8>, ObjectId)> = forms
            .iter()
            .filter_map(|f| ids.get(&f.object_id).map(|&id| (f, id)))
            .flat_map(|(f, id)| f.links.iter().map(move |(parent, name)| (*parent, name.clone(), id)))
            .collect();
        for (parent, name, id) in links {
            let target = match parent {
                None => Some(&mut resources),
                Some(parent) => forms
                    .iter_mut()
                    .find(|f| f.object_id == parent)
                    .and_then(|f| f.stream.dict.get_mut(b"Resources").ok())
                    .and_then(|r| r.as_dict_mut().ok()),
            };
            if let Some(Ok(Object::Dictionary(xobjects))) = target.map(|r| r.get_mut(b"XObject")) {
                xobjects.set(name, Object::Reference(id));
            }
        }

        for form in forms {
            if let Some(&id) = ids.get(&form.object_id) {
                doc.objects.insert(id, Object::Stream(form.stream));
            }
        }

        let content_id = doc.add_object(Stream::new(dictionary! { "Filter" => "FlateDecode" }, content));
        if let Ok(Object::Dictionary(page)) = doc.get_object_mut(page_id) {
            page.set("Contents", Object::Reference(content_id));
            page.set("Resources", Object::Dictionary(resources));
        }
    }
}

/// Sources whose content changes: those with removed operators and every
/// form on the path from them up to the page.
fn dirty_sources(page: &PageText, removal: &Removal) -> Vec<bool> {
    let mut dirty = vec![false; page.sources.len()];
    for index in 0..page.sources.len() {
        if removal.for_source(index).is_none() {
            continue;
        }
        let mut current = index;
        // parents are always discovered before their forms
        while !dirty[current] {
            dirty[current] = true;
            match &page.sources[current].kind {
                SourceKind::Form { parent, .. } if *parent < current => current = *parent,
                _ => break,
            }
        }
    }
    dirty
}

/// The form object a source draws from, `None` for the page.
fn drawing_form(page: &PageText, source: usize) -> Option<ObjectId> {
    match page.sources.get(source).map(|s| &s.kind) {
        Some(SourceKind::Form { object_id, .. }) => Some(*object_id),
        _ => None,
    }
}

fn source_operations(page: &PageText, removal: &Removal, index: usize) -> Result<Vec<Operation>> {
    let source = &page.sources[index];
    match removal.for_source(index) {
        Some(removed) => filter_operations(source, removed),
        None => Ok(source.operations.clone()),
    }
}

/// Serialize operators and deflate them for a `/FlateDecode` stream.
fn encode(operations: Vec<Operation>) -> Result<Vec<u8>> {
    let plain = Content { operations }
        .encode()
        .map_err(|e| Error::ContentStreamCorrupt(e.to_string()))?;
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(plain.len() / 2), Compression::default());
    encoder.write_all(&plain)?;
    Ok(encoder.finish()?)
}

/// The resources a source's operators are looked up in.
fn effective_resources(doc: &LopdfDocument, page: &PageText, index: usize) -> Dictionary {
    match &page.sources[index].kind {
        SourceKind::Page => page_resources(doc, page.page_id),
        SourceKind::Form {
            object_id, parent, ..
        } => {
            let own = doc
                .get_object(*object_id)
                .and_then(Object::as_stream)
                .ok()
                .and_then(|s| get_dict(doc, &s.dict, b"Resources").cloned());
            match own {
                Some(resources) => resources,
                None if *parent < index => effective_resources(doc, page, *parent),
                None => Dictionary::new(),
            }
        }
    }
}

/// Resolve the `/XObject` and `/Font` entries so they can be edited in place.
fn direct_resources(doc: &LopdfDocument, mut resources: Dictionary) -> Dictionary {
    for key in [&b"XObject"[..], &b"Font"[..]] {
        if let Some(dict) = get_dict(doc, &resources, key).cloned() {
            resources.set(key.to_vec(), Object::Dictionary(dict));
        }
    }
    resources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::{BoxFitter, FitConfig};
    use crate::geometry::Rect;
    use crate::model::{Block, BlockType, GlyphOrigin};
    use crate::parser::{decode_operations, page_operations, CharExtractor};
    use crate::rewrite::emit::{block_operations, measure_char};
    use crate::testing::TestPdf;
    use lopdf::dictionary;

    fn registry_for(doc: &mut LopdfDocument) -> FontRegistry {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = FontRegistry::new("en").with_font_dirs(vec![dir.path().to_path_buf()]);
        registry.load_existing_fonts(doc);
        registry.register_target_font(doc, "en").unwrap();
        registry
    }

    fn translated_block(origins: &[(usize, usize)], bbox: Rect) -> Block {
        let mut block = Block::new(1, BlockType::Paragraph, "Hello", bbox);
        block.font_size = 12.0;
        block.origins = origins.iter().map(|&(s, i)| GlyphOrigin::new(s, i)).collect();
        block.attach_translation("Bonjour");
        block
    }

    fn patch_for(doc: &LopdfDocument, registry: &FontRegistry, blocks: &[Block]) -> Result<PagePatch> {
        let page = CharExtractor::new(doc, registry).extract_page(1)?;
        let removal = Removal::plan(blocks, &page.source_groups());
        let config = FitConfig::default();
        let fitter = BoxFitter::new(&config);
        let mut text = Vec::new();
        let mut fonts = BTreeSet::new();
        for &i in &removal.blocks {
            let fit = fitter.fit(&blocks[i], &blocks[i].render_text(), "fr", |c| measure_char(registry, c));
            let (ops, used) = block_operations(registry, &fit)?;
            text.extend(ops);
            fonts.extend(used);
        }
        PagePatch::build(doc, registry, &page, &removal, text, &fonts)
    }

    fn xobject_ref(resources: &Dictionary, name: &[u8]) -> ObjectId {
        resources
            .get(b"XObject")
            .and_then(Object::as_dict)
            .and_then(|x| x.get(name))
            .and_then(Object::as_reference)
            .unwrap()
    }

    fn form_operators(doc: &LopdfDocument, id: ObjectId) -> Vec<String> {
        let stream = doc.get_object(id).and_then(Object::as_stream).unwrap();
        let data = stream.decompressed_content().unwrap_or_else(|_| stream.content.clone());
        decode_operations(&data)
            .unwrap()
            .into_iter()
            .map(|o| o.operator)
            .collect()
    }

    #[test]
    fn test_non_text_operators_survive_unchanged() {
        let mut pdf = TestPdf::new();
        pdf.page("0 0 m 100 100 l S BT /F1 12 Tf 72 700 Td (Hello) Tj ET 1 0 0 rg 10 10 50 50 re f");
        let mut doc = pdf.finish();
        let registry = registry_for(&mut doc);
        let page_id = doc.get_pages()[&1];
        let before = page_operations(&doc, page_id).unwrap();

        let blocks = vec![translated_block(&[(0, 6)], Rect::new(72.0, 697.0, 102.0, 709.0))];
        let patch = patch_for(&doc, &registry, &blocks).unwrap();
        assert_eq!(patch.form_count(), 0);
        patch.commit(&mut doc);

        let after = page_operations(&doc, page_id).unwrap();
        assert_eq!(after[0].operator, "q");
        let kept: Vec<String> = before
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != 6)
            .map(|(_, op)| format!("{:?}", op))
            .collect();
        let copied: Vec<String> = after[1..=kept.len()].iter().map(|op| format!("{:?}", op)).collect();
        assert_eq!(copied, kept);
        assert_eq!(after[kept.len() + 1].operator, "Q");
        assert!(after[kept.len() + 2..].iter().any(|op| op.operator == "TJ"));
        assert!(!after.iter().any(|op| op.operator == "Tj"));

        let resources = doc
            .get_dictionary(page_id)
            .and_then(|p| p.get(b"Resources"))
            .and_then(Object::as_dict)
            .unwrap();
        let fonts = resources.get(b"Font").and_then(Object::as_dict).unwrap();
        assert!(fonts.has(b"F1"));
        assert!(fonts.iter().any(|(k, _)| k.starts_with(b"TPF")));
    }

    #[test]
    fn test_forms_are_copied_on_write() {
        let mut pdf = TestPdf::new();
        let form = pdf.form("BT /F1 10 Tf 72 600 Td (Inside) Tj ET 0 0 m 5 5 l S");
        pdf.page_with_resources("q /Fm1 Do Q", dictionary! { "XObject" => dictionary! { "Fm1" => form } });
        let mut doc = pdf.finish();
        let registry = registry_for(&mut doc);
        let page_id = doc.get_pages()[&1];

        let blocks = vec![translated_block(&[(1, 3)], Rect::new(72.0, 598.0, 100.0, 608.0))];
        let patch = patch_for(&doc, &registry, &blocks).unwrap();
        assert_eq!(patch.form_count(), 1);
        patch.commit(&mut doc);

        let resources = doc
            .get_dictionary(page_id)
            .and_then(|p| p.get(b"Resources"))
            .and_then(Object::as_dict)
            .unwrap();
        let copy = xobject_ref(resources, b"Fm1");
        assert_ne!(copy, form);
        assert_eq!(form_operators(&doc, copy), vec!["BT", "Tf", "Td", "ET", "m", "l", "S"]);
        // the original form is left alone
        assert!(form_operators(&doc, form).contains(&"Tj".to_string()));
    }

    #[test]
    fn test_form_drawn_twice_is_copied_once() {
        let mut pdf = TestPdf::new();
        let form = pdf.form("BT /F1 10 Tf 72 0 Td (Seal) Tj ET");
        pdf.page_with_resources(
            "q 1 0 0 1 0 300 cm /Fm1 Do Q q 1 0 0 1 0 700 cm /Fm1 Do Q",
            dictionary! { "XObject" => dictionary! { "Fm1" => form } },
        );
        let mut doc = pdf.finish();
        let registry = registry_for(&mut doc);
        let page_id = doc.get_pages()[&1];

        let mut upper = translated_block(&[(2, 3)], Rect::new(72.0, 698.0, 100.0, 708.0));
        upper.text = "Seal".into();
        let mut lower = Block::new(1, BlockType::Paragraph, "Seal", Rect::new(72.0, 298.0, 100.0, 308.0));
        lower.font_size = 10.0;
        lower.origins = vec![GlyphOrigin::new(1, 3)];
        let blocks = vec![lower, upper];

        let patch = patch_for(&doc, &registry, &blocks).unwrap();
        assert_eq!(patch.form_count(), 1);
        patch.commit(&mut doc);

        let resources = doc
            .get_dictionary(page_id)
            .and_then(|p| p.get(b"Resources"))
            .and_then(Object::as_dict)
            .unwrap();
        assert!(!form_operators(&doc, xobject_ref(resources, b"Fm1")).contains(&"Tj".to_string()));
        // both draws come back as new text on the page
        let shows = page_operations(&doc, page_id)
            .unwrap()
            .iter()
            .filter(|op| op.operator == "Tm")
            .count();
        assert_eq!(shows, 2);
    }

    #[test]
    fn test_nested_forms_repoint_every_ancestor() {
        let mut pdf = TestPdf::new();
        let inner = pdf.form("BT /F1 10 Tf 72 500 Td (Deep) Tj ET");
        let outer = pdf.form("q /Fm2 Do Q");
        pdf.doc
            .get_object_mut(outer)
            .and_then(Object::as_stream_mut)
            .and_then(|s| s.dict.get_mut(b"Resources"))
            .and_then(Object::as_dict_mut)
            .unwrap()
            .set("XObject", dictionary! { "Fm2" => inner });
        pdf.page_with_resources("/Fm1 Do", dictionary! { "XObject" => dictionary! { "Fm1" => outer } });
        let mut doc = pdf.finish();
        let registry = registry_for(&mut doc);
        let page_id = doc.get_pages()[&1];

        let blocks = vec![translated_block(&[(2, 3)], Rect::new(72.0, 498.0, 100.0, 508.0))];
        let patch = patch_for(&doc, &registry, &blocks).unwrap();
        assert_eq!(patch.form_count(), 2);
        patch.commit(&mut doc);

        let page_resources = doc
            .get_dictionary(page_id)
            .and_then(|p| p.get(b"Resources"))
            .and_then(Object::as_dict)
            .unwrap();
        let outer_copy = xobject_ref(page_resources, b"Fm1");
        assert_ne!(outer_copy, outer);
        let outer_resources = doc
            .get_object(outer_copy)
            .and_then(Object::as_stream)
            .and_then(|s| s.dict.get(b"Resources"))
            .and_then(Object::as_dict)
            .unwrap();
        let inner_copy = xobject_ref(outer_resources, b"Fm2");
        assert_ne!(inner_copy, inner);
        assert!(!form_operators(&doc, inner_copy).contains(&"Tj".to_string()));
    }

    #[test]
    fn test_failed_plan_leaves_document_untouched() {
        let mut pdf = TestPdf::new();
        pdf.page("BT /F1 12 Tf 72 700 Td (Hello) Tj ET");
        let mut doc = pdf.finish();
        let registry = registry_for(&mut doc);
        let page_id = doc.get_pages()[&1];
        let before = page_operations(&doc, page_id).unwrap();

        // Td is not a text-showing operator
        let blocks = vec![translated_block(&[(0, 2)], Rect::new(72.0, 697.0, 102.0, 709.0))];
        assert!(matches!(
            patch_for(&doc, &registry, &blocks),
            Err(Error::ContentStreamCorrupt(_))
        ));
        let after = page_operations(&doc, page_id).unwrap();
        assert_eq!(format!("{:?}", after), format!("{:?}", before));
    }
}
