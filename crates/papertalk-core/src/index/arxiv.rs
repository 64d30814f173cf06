use std::time::Duration;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;

use super::{IndexError, IndexFuture, PaperIndex, SearchMode, SearchQuery};
use crate::{PaperId, PaperMetadata, PaperSummary};

pub const DEFAULT_API_URL: &str = "http://export.arxiv.org/api/query";

/// Client for the arXiv Atom query API.
pub struct ArxivIndex {
    client: reqwest::Client,
    api_url: String,
    timeout: Duration,
}

impl ArxivIndex {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            api_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn id_url(&self, id: &str) -> String {
        format!("{}?id_list={}", self.api_url, urlencoding::encode(id))
    }

    /// Build the request URL for `query`, or `None` when the cleaned query
    /// is empty and there is nothing to ask for.
    fn search_url(&self, query: &SearchQuery) -> Option<String> {
        let cleaned = query.cleaned();
        if cleaned.is_empty() {
            return None;
        }
        let url = match query.mode {
            SearchMode::Id => self.id_url(&cleaned),
            SearchMode::General | SearchMode::Title => {
                // A general query that already names a field is sent as is.
                let (field, terms) = match (query.mode, field_prefix(&cleaned)) {
                    (SearchMode::General, Some((field, terms))) => (field, terms),
                    (SearchMode::Title, _) => ("ti", cleaned.as_str()),
                    _ => ("all", cleaned.as_str()),
                };
                format!(
                    "{}?search_query={}:{}&start=0&max_results={}&sortBy=relevance&sortOrder=descending",
                    self.api_url,
                    field,
                    urlencoding::encode(terms),
                    query.max_results
                )
            }
        };
        Some(url)
    }

    async fn fetch_feed(&self, url: &str) -> Result<Vec<FeedEntry>, IndexError> {
        tracing::debug!(url, "querying arXiv");
        let resp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| IndexError::Upstream(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(IndexError::Upstream(format!("HTTP {}", resp.status())));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| IndexError::Upstream(e.to_string()))?;

        parse_feed(&body)
    }
}

/// Split `au:Vaswani` into `("au", "Vaswani")` when the query starts with
/// one of the arXiv search fields.
fn field_prefix(query: &str) -> Option<(&str, &str)> {
    static FIELD_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^(ti|au|abs|co|jr|cat|rn|id|all):").unwrap());
    let caps = FIELD_RE.captures(query)?;
    let field = caps.get(1)?.as_str();
    let rest = &query[caps.get(0)?.end()..];
    Some((field, rest))
}

impl PaperIndex for ArxivIndex {
    fn name(&self) -> &str {
        "arXiv"
    }

    fn fetch_metadata<'a>(&'a self, id: &'a PaperId) -> IndexFuture<'a, PaperMetadata> {
        Box::pin(async move {
            let entries = self.fetch_feed(&self.id_url(id.as_str())).await?;
            metadata_from_entries(entries, id)
        })
    }

    fn search<'a>(&'a self, query: &'a SearchQuery) -> IndexFuture<'a, Vec<PaperSummary>> {
        Box::pin(async move {
            let Some(url) = self.search_url(query) else {
                return Ok(Vec::new());
            };
            let entries = self.fetch_feed(&url).await?;
            let summaries: Vec<PaperSummary> = entries
                .into_iter()
                .filter(|e| {
                    if e.is_error() {
                        tracing::warn!(message = %e.summary.trim(), "arXiv rejected query");
                    }
                    e.is_usable()
                })
                .map(FeedEntry::into_summary)
                .collect();
            tracing::debug!(results = summaries.len(), mode = ?query.mode, "search complete");
            Ok(summaries)
        })
    }
}

/// Pick the record for `id` out of an identifier-lookup feed.
fn metadata_from_entries(
    entries: Vec<FeedEntry>,
    id: &PaperId,
) -> Result<PaperMetadata, IndexError> {
    entries
        .into_iter()
        .find(FeedEntry::is_usable)
        .map(|entry| entry.into_metadata(id))
        .ok_or_else(|| IndexError::NotFound(id.to_string()))
}

/// One `<entry>` of an arXiv Atom feed, as raw strings.
#[derive(Debug, Default, Clone)]
struct FeedEntry {
    id_url: String,
    title: String,
    summary: String,
    authors: Vec<String>,
    published: String,
    updated: String,
    categories: Vec<String>,
    primary_category: Option<String>,
}

impl FeedEntry {
    /// arXiv reports malformed queries as a pseudo-entry under `/api/errors`.
    fn is_error(&self) -> bool {
        self.id_url.contains("/api/errors")
    }

    fn is_usable(&self) -> bool {
        !self.is_error() && !self.id_url.trim().is_empty() && !self.title.trim().is_empty()
    }

    fn into_metadata(self, requested: &PaperId) -> PaperMetadata {
        let url = self.id_url.trim().to_string();
        PaperMetadata {
            id: requested.clone(),
            title: Some(squash(&self.title)).filter(|t| !t.is_empty()),
            authors: self.authors,
            published: parse_date(&self.published),
            updated: parse_date(&self.updated),
            categories: self.categories.into_iter().collect(),
            url: Some(url).filter(|u| !u.is_empty()),
        }
    }

    fn into_summary(self) -> PaperSummary {
        let primary_category = self
            .primary_category
            .clone()
            .or_else(|| self.categories.first().cloned());
        PaperSummary {
            id: PaperId::from_entry_url(&self.id_url),
            title: squash(&self.title),
            authors: self.authors,
            published: parse_date(&self.published),
            summary: squash(&self.summary),
            entry_url: self.id_url.trim().to_string(),
            primary_category,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Id,
    Title,
    Summary,
    Published,
    Updated,
    AuthorName,
}

/// Parse an arXiv Atom feed into its entries.
fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>, IndexError> {
    let mut reader = Reader::from_str(xml);

    let mut entries = Vec::new();
    let mut entry: Option<FeedEntry> = None;
    let mut field: Option<Field> = None;
    let mut in_author = false;
    let mut author_name = String::new();

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                if let Some(current) = entry.as_mut() {
                    match e.local_name().as_ref() {
                        b"id" => field = Some(Field::Id),
                        b"title" => field = Some(Field::Title),
                        b"summary" => field = Some(Field::Summary),
                        b"published" => field = Some(Field::Published),
                        b"updated" => field = Some(Field::Updated),
                        b"author" => {
                            in_author = true;
                            author_name.clear();
                        }
                        b"name" if in_author => field = Some(Field::AuthorName),
                        _ => record_category(e, current),
                    }
                } else if e.local_name().as_ref() == b"entry" {
                    entry = Some(FeedEntry::default());
                }
            }
            Ok(Event::Empty(ref e)) => {
                if let Some(current) = entry.as_mut() {
                    record_category(e, current);
                }
            }
            Ok(Event::Text(ref e)) => {
                if let (Some(f), Some(current)) = (field, entry.as_mut()) {
                    let text = e
                        .unescape()
                        .map_err(|err| IndexError::Upstream(format!("XML parse error: {}", err)))?;
                    match f {
                        Field::Id => current.id_url.push_str(&text),
                        Field::Title => current.title.push_str(&text),
                        Field::Summary => current.summary.push_str(&text),
                        Field::Published => current.published.push_str(&text),
                        Field::Updated => current.updated.push_str(&text),
                        Field::AuthorName => author_name.push_str(&text),
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"entry" => {
                    if let Some(done) = entry.take() {
                        entries.push(done);
                    }
                    field = None;
                    in_author = false;
                }
                b"author" if in_author => {
                    let name = squash(&author_name);
                    if let Some(current) = entry.as_mut()
                        && !name.is_empty()
                    {
                        current.authors.push(name);
                    }
                    in_author = false;
                }
                _ => field = None,
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(IndexError::Upstream(format!("XML parse error: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(entries)
}

/// Record `<category term=..>` and `<arxiv:primary_category term=..>`.
fn record_category(e: &BytesStart<'_>, entry: &mut FeedEntry) {
    let is_primary = match e.local_name().as_ref() {
        b"category" => false,
        b"primary_category" => true,
        _ => return,
    };
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() != b"term" {
            continue;
        }
        let term = String::from_utf8_lossy(&attr.value).trim().to_string();
        if term.is_empty() {
            continue;
        }
        if is_primary {
            entry.primary_category = Some(term);
        } else if !entry.categories.contains(&term) {
            entry.categories.push(term);
        }
    }
}

/// Collapse the line-wrapped whitespace arXiv puts in titles and abstracts.
fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `2017-06-12T17:57:34Z` → `2017-06-12`.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.trim().get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}
