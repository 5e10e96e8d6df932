//! PDF objects for newly embedded Type0 fonts.

use std::collections::BTreeMap;
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId, Stream, StringFormat};

use crate::error::{Error, Result};

use super::face::{EmbeddedFace, OutlineFormat};

/// Object ids of an embedded Type0 font.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddedObjects {
    pub type0: ObjectId,
    pub descendant: ObjectId,
}

fn name(value: &str) -> Object {
    Object::Name(value.as_bytes().to_vec())
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Add the font program, descriptor, descendant CIDFont and Type0 font.
///
/// `/W` and `/ToUnicode` are written later by [`write_usage`] once the used
/// glyphs are known.
pub fn embed_face(doc: &mut LopdfDocument, face: &EmbeddedFace) -> Result<EmbeddedObjects> {
    let compressed = deflate(face.data())?;
    let (file_key, cid_subtype) = match face.outline() {
        OutlineFormat::TrueType => ("FontFile2", "CIDFontType2"),
        OutlineFormat::Cff => ("FontFile3", "CIDFontType0"),
    };

    let mut file_dict = Dictionary::from_iter(vec![
        ("Filter", name("FlateDecode")),
        ("Length1", Object::Integer(face.data().len() as i64)),
    ]);
    if face.outline() == OutlineFormat::Cff {
        file_dict.set("Subtype", name("OpenType"));
    }
    let file_id = doc.add_object(Stream::new(file_dict, compressed).with_compression(false));

    let m = face.metrics();
    let descriptor_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", name("FontDescriptor")),
        ("FontName", name(face.name())),
        ("Flags", Object::Integer(4)),
        (
            "FontBBox",
            Object::Array(m.bbox.iter().map(|v| Object::Integer(v.round() as i64)).collect()),
        ),
        ("ItalicAngle", Object::Integer(0)),
        ("Ascent", Object::Integer(m.ascent.round() as i64)),
        ("Descent", Object::Integer(m.descent.round() as i64)),
        ("CapHeight", Object::Integer(m.cap_height.round() as i64)),
        ("StemV", Object::Integer(80)),
        (file_key, Object::Reference(file_id)),
    ]));

    let system_info = Dictionary::from_iter(vec![
        ("Registry", Object::String(b"Adobe".to_vec(), StringFormat::Literal)),
        ("Ordering", Object::String(b"Identity".to_vec(), StringFormat::Literal)),
        ("Supplement", Object::Integer(0)),
    ]);
    let mut descendant = Dictionary::from_iter(vec![
        ("Type", name("Font")),
        ("Subtype", name(cid_subtype)),
        ("BaseFont", name(face.name())),
        ("CIDSystemInfo", Object::Dictionary(system_info)),
        ("FontDescriptor", Object::Reference(descriptor_id)),
        ("DW", Object::Integer(1000)),
    ]);
    if face.outline() == OutlineFormat::TrueType {
        descendant.set("CIDToGIDMap", name("Identity"));
    }
    let descendant_id = doc.add_object(descendant);

    let type0_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", name("Font")),
        ("Subtype", name("Type0")),
        ("BaseFont", name(face.name())),
        ("Encoding", name("Identity-H")),
        (
            "DescendantFonts",
            Object::Array(vec![Object::Reference(descendant_id)]),
        ),
    ]));

    Ok(EmbeddedObjects {
        type0: type0_id,
        descendant: descendant_id,
    })
}

/// Add a Helvetica base font.
pub fn add_base_font(doc: &mut LopdfDocument) -> ObjectId {
    doc.add_object(Dictionary::from_iter(vec![
        ("Type", name("Font")),
        ("Subtype", name("Type1")),
        ("BaseFont", name("Helvetica")),
        ("Encoding", name("WinAnsiEncoding")),
    ]))
}

/// Write `/W` and `/ToUnicode` for the glyphs used so far.
pub fn write_usage(
    doc: &mut LopdfDocument,
    objects: EmbeddedObjects,
    face: &EmbeddedFace,
) -> Result<()> {
    let used = face.used_glyphs();
    if used.is_empty() {
        return Ok(());
    }

    let widths: Vec<Object> = used
        .keys()
        .flat_map(|gid| {
            [
                Object::Integer(*gid as i64),
                Object::Array(vec![Object::Integer(face.advance(*gid).round() as i64)]),
            ]
        })
        .collect();

    let cmap_id = doc.add_object(Stream::new(Dictionary::new(), to_unicode_cmap(&used).into_bytes()));

    let descendant = doc
        .get_object_mut(objects.descendant)
        .and_then(Object::as_dict_mut)
        .map_err(|e| Error::FontEmbeddingFailed(format!("descendant font missing: {}", e)))?;
    descendant.set("W", Object::Array(widths));

    let type0 = doc
        .get_object_mut(objects.type0)
        .and_then(Object::as_dict_mut)
        .map_err(|e| Error::FontEmbeddingFailed(format!("Type0 font missing: {}", e)))?;
    type0.set("ToUnicode", Object::Reference(cmap_id));
    Ok(())
}

/// A `bfchar` ToUnicode CMap for glyph ids.
pub fn to_unicode_cmap(glyphs: &BTreeMap<u16, char>) -> String {
    let entries: Vec<(&u16, &char)> = glyphs.iter().collect();
    let mut out = String::new();
    out.push_str("/CIDInit /ProcSet findresource begin\n");
    out.push_str("12 dict begin\nbegincmap\n");
    out.push_str("/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n");
    out.push_str("/CMapName /Adobe-Identity-UCS def\n/CMapType 2 def\n");
    out.push_str("1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n");

    // at most 100 entries per bfchar section
    for chunk in entries.chunks(100) {
        out.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for (gid, ch) in chunk {
            let mut units = [0u16; 2];
            let hex: String = ch
                .encode_utf16(&mut units)
                .iter()
                .map(|u| format!("{:04X}", u))
                .collect();
            out.push_str(&format!("<{:04X}> <{}>\n", gid, hex));
        }
        out.push_str("endbfchar\n");
    }

    out.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_unicode_cmap_entries() {
        let mut glyphs = BTreeMap::new();
        glyphs.insert(3, 'A');
        glyphs.insert(0x1234, 'あ');
        glyphs.insert(7, '𝑥');
        let cmap = to_unicode_cmap(&glyphs);
        assert!(cmap.contains("3 beginbfchar"));
        assert!(cmap.contains("<0003> <0041>"));
        assert!(cmap.contains("<1234> <3042>"));
        // astral characters become surrogate pairs
        assert!(cmap.contains("<0007> <D835DC65>"));
    }

    #[test]
    fn test_cmap_sections_are_chunked() {
        let glyphs: BTreeMap<u16, char> = (0..250u16).map(|g| (g, 'a')).collect();
        let cmap = to_unicode_cmap(&glyphs);
        assert_eq!(cmap.matches("beginbfchar").count(), 3);
        assert!(cmap.contains("50 beginbfchar"));
    }

    #[test]
    fn test_base_font_dictionary() {
        let mut doc = LopdfDocument::with_version("1.5");
        let id = add_base_font(&mut doc);
        let dict = doc.get_dictionary(id).unwrap();
        assert_eq!(dict.get(b"BaseFont").unwrap().as_name().unwrap(), b"Helvetica");
    }
}
