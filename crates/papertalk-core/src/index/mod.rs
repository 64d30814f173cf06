//! Paper index trait, query model, and implementations.

pub mod arxiv;

use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{PaperId, PaperMetadata, PaperSummary};

pub const MIN_RESULTS: usize = 10;
pub const MAX_RESULTS: usize = 300;
pub const DEFAULT_MAX_RESULTS: usize = 50;

/// Errors surfaced by an index lookup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("no paper found for identifier {0}")]
    NotFound(String),
    #[error("index request failed: {0}")]
    Upstream(String),
}

/// Boxed future returned by [`PaperIndex`] methods.
pub type IndexFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, IndexError>> + Send + 'a>>;

/// A scholarly paper index that can be searched and queried by identifier.
pub trait PaperIndex: Send + Sync {
    /// Human-readable name of the index (e.g. "arXiv").
    fn name(&self) -> &str;

    /// Look up exactly one record by identifier. No caching: every call
    /// queries the index again.
    fn fetch_metadata<'a>(&'a self, id: &'a PaperId) -> IndexFuture<'a, PaperMetadata>;

    /// Run a search. An empty result list is not an error.
    fn search<'a>(&'a self, query: &'a SearchQuery) -> IndexFuture<'a, Vec<PaperSummary>>;
}

/// How a search query is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Keywords matched against all fields.
    #[default]
    General,
    /// Keywords restricted to the title.
    Title,
    /// Direct identifier lookup.
    Id,
}

impl SearchMode {
    pub fn label(&self) -> &'static str {
        match self {
            SearchMode::General => "Normal Search",
            SearchMode::Title => "Title Only Search",
            SearchMode::Id => "Search by arXiv ID",
        }
    }

    pub fn placeholder(&self) -> &'static str {
        match self {
            SearchMode::General => "e.g., vision transformers",
            SearchMode::Title => "e.g., attention is all you need",
            SearchMode::Id => "e.g., 2102.12092",
        }
    }
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "general" | "normal" | "all" => Ok(SearchMode::General),
            "title" | "ti" => Ok(SearchMode::Title),
            "id" | "arxiv-id" => Ok(SearchMode::Id),
            other => Err(format!(
                "unknown search mode '{}' (expected general, title, or id)",
                other
            )),
        }
    }
}

/// A search request against the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: String,
    pub mode: SearchMode,
    pub max_results: usize,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, mode: SearchMode) -> Self {
        Self {
            text: text.into(),
            mode,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Set the result bound, clamped to `MIN_RESULTS..=MAX_RESULTS`.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = clamp_max_results(max_results);
        self
    }

    /// The query text after [`clean_query`]; identifiers keep their dots.
    pub fn cleaned(&self) -> String {
        clean_query(&self.text, self.mode == SearchMode::Id)
    }
}

pub fn clamp_max_results(n: usize) -> usize {
    n.clamp(MIN_RESULTS, MAX_RESULTS)
}

/// Normalize user-typed query text for the index query syntax.
///
/// Typographic quotes and the middle dot are mapped to ASCII, then anything
/// other than word characters, whitespace, `-`, `:` and `'` is dropped
/// (`.` is also kept when `allow_dots` is set, for identifiers).
pub fn clean_query(query: &str, allow_dots: bool) -> String {
    static STRICT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s\-:']").unwrap());
    static DOTTED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s\-:\.']").unwrap());

    let mapped = query
        .replace('\u{00B7}', "-")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");
    let re = if allow_dots { &DOTTED_RE } else { &STRICT_RE };
    re.replace_all(&mapped, "").trim().to_string()
}
