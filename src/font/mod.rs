//! Font registry: classification of document fonts, target-language face
//! embedding and the per-kind text encodings used by the rewriter.

mod embed;
mod face;
mod metrics;
mod registry;
pub mod script;
mod system;

pub use embed::to_unicode_cmap;
pub use face::{EmbeddedFace, OutlineFormat};
pub use metrics::{estimate_width, helvetica_width, FontMetrics};
pub use registry::{display_name, language_from_ordering, FontInfo, FontKind, FontRegistry};
pub use system::{find_font_for_language, font_candidates, system_font_dirs};
