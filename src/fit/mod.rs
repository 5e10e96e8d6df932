//! Box fitting: neighbour constraints, wrapping and font sizing for
//! translated text.

mod adjacent;
mod fitter;
mod wrap;

pub use adjacent::{compute_expandable, resolve_overlaps};
pub use fitter::{Alignment, BoxFitter, FitConfig, FitResult, ASCENT};
pub use wrap::{tokenize, wrap_text};
