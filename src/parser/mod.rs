//! PDF parsing module.

mod document;
mod extractor;
pub mod objects;
mod selection;

pub use document::{
    decode_operations, inherited, load_document, load_document_from_bytes, media_box, page_infos,
    page_operations, page_resources, PageInfo,
};
pub use extractor::{CharExtractor, ContentSource, PageText, ShowRecord, SourceKind};
pub use selection::PageSelection;
