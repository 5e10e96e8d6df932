//! Helpers for reading lopdf objects.

use lopdf::{Dictionary, Document as LopdfDocument, Object};

/// Helper to extract a number from a PDF object.
pub fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Follow a reference, returning the object itself when it is direct or dangling.
pub fn resolve<'a>(doc: &'a LopdfDocument, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Resolve a dictionary entry that may be a reference to a dictionary.
pub fn get_dict<'a>(doc: &'a LopdfDocument, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    let obj = dict.get(key).ok()?;
    match resolve(doc, obj) {
        Object::Dictionary(d) => Some(d),
        Object::Stream(s) => Some(&s.dict),
        _ => None,
    }
}

/// Resolve a dictionary entry that may be a reference to an array.
pub fn get_array<'a>(doc: &'a LopdfDocument, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Vec<Object>> {
    let obj = dict.get(key).ok()?;
    match resolve(doc, obj) {
        Object::Array(a) => Some(a),
        _ => None,
    }
}

/// Name entry as a string.
pub fn get_name(dict: &Dictionary, key: &[u8]) -> Option<String> {
    match dict.get(key).ok()? {
        Object::Name(n) => Some(String::from_utf8_lossy(n).into_owned()),
        _ => None,
    }
}

/// Numeric entry, following references.
pub fn get_f32(doc: &LopdfDocument, dict: &Dictionary, key: &[u8]) -> Option<f32> {
    let obj = dict.get(key).ok()?;
    get_number(resolve(doc, obj))
}

/// Numeric operands of a content-stream operation.
pub fn numbers(operands: &[Object]) -> Vec<f32> {
    operands.iter().filter_map(get_number).collect()
}
