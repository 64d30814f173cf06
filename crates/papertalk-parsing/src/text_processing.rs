use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Numeric citation markers such as `[12]`, `[3-5]` or `[1, 2, 7]`, together
/// with any whitespace directly in front of them.
static CITATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s*\[\s*\d+(?:[-,]\s*\d+)*(?:\s*,\s*\d+(?:[-,]\d+)*)*\s*\]").unwrap()
});

/// Collapse every whitespace run to a single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text, " ").trim().to_string()
}

/// Remove numeric citation markers. Repeats until nothing matches so that
/// nested leftovers like `[1[2]]` are removed too.
///
/// A marker directly followed by a word is replaced with a single space so
/// the words on either side stay apart (`"see [12]and"` becomes `"see and"`).
pub fn strip_citation_markers(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = CITATION_RE.replace_all(&current, |caps: &Captures| {
            let end = caps.get(0).map_or(current.len(), |m| m.end());
            match current[end..].chars().next() {
                Some(c) if c.is_alphanumeric() => " ",
                _ => "",
            }
        });
        if next == current {
            return current;
        }
        current = next.into_owned();
    }
}

/// Per-page cleanup: join words hyphenated across a line break, turn the
/// remaining line breaks into spaces, trim.
fn clean_page(page: &str) -> String {
    page.replace("-\r\n", "")
        .replace("-\n", "")
        .replace(['\r', '\n'], " ")
        .trim()
        .to_string()
}

/// Turn the raw text layer of a document (one string per page) into a single
/// line of prose.
///
/// The result has no leading or trailing whitespace, no runs of more than one
/// space, and no numeric citation brackets. Bracketed non-numeric text such
/// as `[note]` is left alone. Applying it to its own output is a no-op.
pub fn normalize<S: AsRef<str>>(pages: &[S]) -> String {
    let joined = pages
        .iter()
        .map(|p| clean_page(p.as_ref()))
        .collect::<Vec<_>>()
        .join(" ");
    let collapsed = collapse_whitespace(&joined);
    collapse_whitespace(&strip_citation_markers(&collapsed))
}
