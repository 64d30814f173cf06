//! Text cleanup for paper bodies pulled out of a PDF text layer.
//!
//! [`normalize`] turns per-page text into one line of prose;
//! [`slice_abstract_to_references`] keeps the part worth chatting about.

pub mod section;
pub mod text_processing;

pub use section::{SectionBounds, locate_section, slice_abstract_to_references};
pub use text_processing::{collapse_whitespace, normalize, strip_citation_markers};

/// Normalize the pages, then slice the result to its abstract-to-references
/// body.
pub fn extract_body<S: AsRef<str>>(pages: &[S]) -> String {
    slice_abstract_to_references(&normalize(pages))
}
