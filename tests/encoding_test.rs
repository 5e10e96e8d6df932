//! Text encoding per font kind.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use lopdf::{dictionary, Document, Object};
use transpdf::{FontId, FontKind, FontRegistry};

fn doc_with_fonts() -> (Document, lopdf::ObjectId, lopdf::ObjectId) {
    let mut doc = Document::with_version("1.5");
    let simple = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let descendant = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => "NotoSans",
        "CIDSystemInfo" => dictionary! {
            "Registry" => lopdf::Object::string_literal("Adobe"),
            "Ordering" => lopdf::Object::string_literal("Identity"),
            "Supplement" => 0,
        },
    });
    let composite = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => "NotoSans",
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![descendant.into()],
    });
    (doc, simple, composite)
}

#[test]
fn test_ascii_hex_width_per_font_kind() {
    let (doc, simple, composite) = doc_with_fonts();
    let mut registry = FontRegistry::new("en");
    registry.load_existing_fonts(&doc);

    let simple = registry.font_for_object(simple).expect("simple font");
    let composite = registry.font_for_object(composite).expect("composite font");
    assert_eq!(registry.info(simple).map(|f| f.kind), Some(FontKind::ExistingSimple));
    assert_eq!(registry.info(composite).map(|f| f.kind), Some(FontKind::ExistingComposite));

    let text = "Layout 42";
    let n = text.chars().count();
    assert!(registry.encode_hex(simple, text).unwrap().len() <= 2 * n);
    assert_eq!(registry.encode_hex(composite, text).unwrap().len(), 4 * n);
}

fn fixture_font() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/fonts/DejaVuSansMono.ttf")
}

fn embedded_registry(doc: &mut Document) -> (FontRegistry, FontId) {
    let empty = tempfile::tempdir().unwrap();
    let mut registry = FontRegistry::new("en")
        .with_font_dirs(vec![empty.path().to_path_buf()])
        .with_font_file(Some(fixture_font()));
    let first = registry.register_target_font(doc, "en").unwrap();
    (registry, first)
}

#[test]
fn test_embedded_font_uses_four_hex_digits_per_char() {
    let mut doc = Document::with_version("1.5");
    let (registry, first) = embedded_registry(&mut doc);
    let info = registry.info(first).expect("registered font");
    assert_eq!(info.kind, FontKind::EmbeddedNew);
    assert!(info.base_font.contains("DejaVu"));

    let text = "Grüße Ωmega";
    assert_eq!(registry.select_font(text, None).unwrap(), first);
    let hex = registry.encode_hex(first, text).unwrap();
    assert_eq!(hex.len(), 4 * text.chars().count());
    assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));

    // the configured file leads the chain and Helvetica closes it
    let chain = registry.target_chain();
    assert_eq!(chain[0], first);
    let last = chain.last().and_then(|id| registry.info(*id)).unwrap();
    assert_eq!(last.kind, FontKind::ExistingSimple);
    assert!(registry.can_encode(first, "Ω"));
    assert!(!registry.can_encode(first, "日"));
}

#[test]
fn test_embedded_text_decodes_through_to_unicode() {
    let mut doc = Document::with_version("1.5");
    let (registry, first) = embedded_registry(&mut doc);
    let text = "Grüße Ωmega";
    let bytes = registry.encode(first, text).unwrap();
    registry.finalize(&mut doc).unwrap();

    let mut saved = Vec::new();
    doc.save_to(&mut saved).unwrap();
    let reloaded = Document::load_mem(&saved).unwrap();

    let type0 = registry.info(first).and_then(|i| i.object_id).unwrap();
    let font = reloaded.get_dictionary(type0).unwrap();
    assert_eq!(font.get(b"Encoding").unwrap().as_name().unwrap(), b"Identity-H");
    let encoding = font.get_font_encoding(&reloaded).unwrap();
    assert_eq!(Document::decode_text(&encoding, &bytes).unwrap(), text);

    // widths cover exactly the glyphs used
    let descendant = font
        .get(b"DescendantFonts")
        .and_then(Object::as_array)
        .ok()
        .and_then(|a| a.first())
        .and_then(|o| o.as_reference().ok())
        .and_then(|id| reloaded.get_dictionary(id).ok())
        .unwrap();
    let widths = descendant.get(b"W").and_then(Object::as_array).unwrap();
    let distinct: HashSet<char> = text.chars().collect();
    assert_eq!(widths.len(), 2 * distinct.len());
}
