use once_cell::sync::Lazy;
use regex::Regex;

use crate::text_processing::collapse_whitespace;

static ABSTRACT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)abstract").unwrap());
static REFERENCES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)references").unwrap());

/// Byte range of the abstract-to-references body within a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionBounds {
    start: usize,
    end: usize,
}

impl SectionBounds {
    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    /// The bounded part of `text`, or `None` when the bounds do not fit it
    /// (out of range or not on character boundaries).
    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        text.get(self.start..self.end)
    }
}

/// Find the body of a paper: from the first "abstract" (case-insensitive)
/// up to, but excluding, the first "references" that follows it.
///
/// Without an "abstract" marker the body starts at 0; without a following
/// "references" marker it runs to the end of the text.
pub fn locate_section(text: &str) -> SectionBounds {
    let start = ABSTRACT_RE.find(text).map(|m| m.start()).unwrap_or(0);
    let end = REFERENCES_RE
        .find_at(text, start)
        .map(|m| m.start())
        .unwrap_or(text.len());
    SectionBounds { start, end }
}

/// The abstract-to-references slice of `text`, trimmed and with whitespace
/// collapsed.
pub fn slice_abstract_to_references(text: &str) -> String {
    collapse_whitespace(locate_section(text).slice(text).unwrap_or_default())
}
