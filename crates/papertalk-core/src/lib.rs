use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub mod backend;
pub mod chat;
pub mod config_file;
pub mod context;
pub mod index;

// Re-export for convenience
pub use backend::{BackendError, PdfBackend};
pub use chat::{ChatBackend, ChatError, ChatMessage, ChatSession, GeminiBackend, Role};
pub use config_file::ConfigFile;
pub use context::{ChatContextDocument, ContextError, ContextTemplate, build_context};
pub use index::arxiv::ArxivIndex;
pub use index::{IndexError, PaperIndex, SearchMode, SearchQuery, clean_query};

/// Canonical identifier of a paper in the arXiv index (e.g. `2102.12092`
/// or `2102.12092v2`). Assigned by the index, never derived locally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaperId(String);

impl PaperId {
    pub fn new(id: impl Into<String>) -> Self {
        let id: String = id.into();
        Self(id.trim().to_string())
    }

    /// Build an identifier from an arXiv entry URL such as
    /// `http://arxiv.org/abs/2102.12092v2`. Old-style identifiers
    /// (`hep-th/9901001v1`) keep their archive prefix.
    pub fn from_entry_url(url: &str) -> Self {
        let trimmed = url.trim().trim_end_matches('/');
        let id = match trimmed.find("/abs/") {
            Some(pos) => &trimmed[pos + "/abs/".len()..],
            None => trimmed.rsplit('/').next().unwrap_or(trimmed),
        };
        Self::new(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Download location of the paper's PDF on `host` (`<host>/pdf/<id>.pdf`).
    pub fn pdf_url(&self, host: &str) -> String {
        format!("{}/pdf/{}.pdf", host.trim_end_matches('/'), self.0)
    }
}

impl fmt::Display for PaperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PaperId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PaperId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Bibliographic record for one paper, as returned by an identifier lookup.
///
/// Fields the index did not supply are absent (`None` / empty) and are
/// skipped on serialization rather than written as null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperMetadata {
    pub id: PaperId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub categories: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl PaperMetadata {
    /// A record carrying only the identifier.
    pub fn new(id: PaperId) -> Self {
        Self {
            id,
            title: None,
            authors: Vec::new(),
            published: None,
            updated: None,
            categories: BTreeSet::new(),
            url: None,
        }
    }
}

/// One hit from a search against the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperSummary {
    pub id: PaperId,
    pub title: String,
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<NaiveDate>,
    pub summary: String,
    pub entry_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_category: Option<String>,
}

/// Output of the ingestion pipeline: the paper's metadata plus the
/// abstract-to-references slice of its normalized text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionResult {
    pub metadata: PaperMetadata,
    pub content: String,
}

pub const DEFAULT_PDF_HOST: &str = "https://arxiv.org";
pub const DEFAULT_USER_AGENT: &str = concat!("papertalk/", env!("CARGO_PKG_VERSION"));

/// Resolved runtime configuration.
///
/// Built from a [`ConfigFile`] layered over defaults, then overridden by
/// environment variables and finally by CLI flags in the binary.
#[derive(Clone)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    pub model: String,
    /// User-supplied context template; the built-in one is used when unset.
    pub context_template: Option<PathBuf>,
    pub chat_timeout_secs: u64,
    pub network_timeout_secs: u64,
    pub pdf_host: String,
    pub api_url: String,
    pub user_agent: String,
    pub max_results: usize,
    /// Header/footer bands skipped during PDF extraction; `0.0` keeps everything.
    pub pdf_header_margin: f32,
    pub pdf_footer_margin: f32,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("context_template", &self.context_template)
            .field("chat_timeout_secs", &self.chat_timeout_secs)
            .field("network_timeout_secs", &self.network_timeout_secs)
            .field("pdf_host", &self.pdf_host)
            .field("api_url", &self.api_url)
            .field("user_agent", &self.user_agent)
            .field("max_results", &self.max_results)
            .field("pdf_header_margin", &self.pdf_header_margin)
            .field("pdf_footer_margin", &self.pdf_footer_margin)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            model: chat::DEFAULT_MODEL.to_string(),
            context_template: None,
            chat_timeout_secs: 120,
            network_timeout_secs: 30,
            pdf_host: DEFAULT_PDF_HOST.to_string(),
            api_url: index::arxiv::DEFAULT_API_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_results: index::DEFAULT_MAX_RESULTS,
            pdf_header_margin: 0.0,
            pdf_footer_margin: 0.0,
        }
    }
}

impl Config {
    /// Apply the values present in `file` over the defaults.
    pub fn from_file(file: &ConfigFile) -> Self {
        let mut config = Self::default();
        if let Some(keys) = &file.api_keys {
            if let Some(key) = keys.gemini_api_key.clone().filter(|k| !k.trim().is_empty()) {
                config.gemini_api_key = Some(key);
            }
        }
        if let Some(chat) = &file.chat {
            if let Some(model) = chat.model.clone() {
                config.model = model;
            }
            if let Some(path) = &chat.context_template {
                config.context_template = Some(PathBuf::from(path));
            }
            if let Some(secs) = chat.timeout_secs {
                config.chat_timeout_secs = secs;
            }
        }
        if let Some(network) = &file.network {
            if let Some(secs) = network.timeout_secs {
                config.network_timeout_secs = secs;
            }
            if let Some(host) = network.pdf_host.clone() {
                config.pdf_host = host;
            }
            if let Some(url) = network.api_url.clone() {
                config.api_url = url;
            }
            if let Some(agent) = network.user_agent.clone() {
                config.user_agent = agent;
            }
        }
        if let Some(max) = file.search.as_ref().and_then(|s| s.max_results) {
            config.max_results = index::clamp_max_results(max);
        }
        if let Some(pdf) = &file.pdf {
            if let Some(header) = pdf.header_margin {
                config.pdf_header_margin = header;
            }
            if let Some(footer) = pdf.footer_margin {
                config.pdf_footer_margin = footer;
            }
        }
        config
    }

    /// Override from the process environment (`GEMINI_API_KEY`, `PAPERTALK_MODEL`).
    pub fn with_env(self) -> Self {
        self.with_env_lookup(|key| std::env::var(key).ok())
    }

    /// Override from an arbitrary variable source. Empty values are ignored.
    pub fn with_env_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(key) = non_empty("GEMINI_API_KEY") {
            self.gemini_api_key = Some(key);
        }
        if let Some(model) = non_empty("PAPERTALK_MODEL") {
            self.model = model;
        }
        self
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.network_timeout_secs)
    }

    pub fn chat_timeout(&self) -> Duration {
        Duration::from_secs(self.chat_timeout_secs)
    }

    /// Shared HTTP client for the index, PDF downloads and the chat endpoint.
    pub fn http_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .user_agent(self.user_agent.clone())
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_file::{ApiKeysConfig, ChatConfig, NetworkConfig, PdfConfig, SearchConfig};

    #[test]
    fn paper_id_from_entry_url_keeps_version() {
        let id = PaperId::from_entry_url("http://arxiv.org/abs/2102.12092v2");
        assert_eq!(id.as_str(), "2102.12092v2");
    }

    #[test]
    fn paper_id_from_old_style_entry_url() {
        let id = PaperId::from_entry_url("http://arxiv.org/abs/hep-th/9901001v1");
        assert_eq!(id.as_str(), "hep-th/9901001v1");
    }

    #[test]
    fn paper_id_pdf_url() {
        let id = PaperId::new(" 1706.03762 ");
        assert_eq!(id.pdf_url("https://arxiv.org/"), "https://arxiv.org/pdf/1706.03762.pdf");
    }

    #[test]
    fn metadata_omits_absent_fields() {
        let mut meta = PaperMetadata::new(PaperId::new("1706.03762"));
        meta.title = Some("Attention Is All You Need".into());
        let json = serde_json::to_value(&meta).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert!(obj.contains_key("id"));
        assert!(obj.contains_key("title"));
        assert!(!obj.contains_key("published"));
        assert!(!obj.contains_key("authors"));
    }

    #[test]
    fn config_from_file_overrides_defaults() {
        let file = ConfigFile {
            api_keys: Some(ApiKeysConfig {
                gemini_api_key: Some("file-key".into()),
            }),
            chat: Some(ChatConfig {
                model: Some("gemini-1.5-pro".into()),
                ..Default::default()
            }),
            network: Some(NetworkConfig {
                timeout_secs: Some(5),
                ..Default::default()
            }),
            search: Some(SearchConfig {
                max_results: Some(1000),
            }),
            pdf: Some(PdfConfig {
                header_margin: Some(0.06),
                ..Default::default()
            }),
        };
        let config = Config::from_file(&file);
        assert_eq!(config.pdf_header_margin, 0.06);
        assert_eq!(config.pdf_footer_margin, 0.0);
        assert_eq!(config.gemini_api_key.as_deref(), Some("file-key"));
        assert_eq!(config.model, "gemini-1.5-pro");
        assert_eq!(config.network_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_results, index::MAX_RESULTS);
        assert_eq!(config.pdf_host, DEFAULT_PDF_HOST);
    }

    #[test]
    fn env_overrides_file_and_ignores_empty_values() {
        let file = ConfigFile {
            api_keys: Some(ApiKeysConfig {
                gemini_api_key: Some("file-key".into()),
            }),
            ..Default::default()
        };
        let config = Config::from_file(&file).with_env_lookup(|key| match key {
            "GEMINI_API_KEY" => Some("env-key".into()),
            "PAPERTALK_MODEL" => Some("   ".into()),
            _ => None,
        });
        assert_eq!(config.gemini_api_key.as_deref(), Some("env-key"));
        assert_eq!(config.model, chat::DEFAULT_MODEL);
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = Config {
            gemini_api_key: Some("secret".into()),
            ..Config::default()
        };
        let printed = format!("{:?}", config);
        assert!(!printed.contains("secret"));
        assert!(printed.contains("***"));
    }
}
