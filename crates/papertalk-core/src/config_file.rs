use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub api_keys: Option<ApiKeysConfig>,
    pub chat: Option<ChatConfig>,
    pub network: Option<NetworkConfig>,
    pub search: Option<SearchConfig>,
    pub pdf: Option<PdfConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiKeysConfig {
    pub gemini_api_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    pub model: Option<String>,
    pub context_template: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub timeout_secs: Option<u64>,
    pub pdf_host: Option<String>,
    pub api_url: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub max_results: Option<usize>,
}

/// Fractions of page height dropped as running header / footer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PdfConfig {
    pub header_margin: Option<f32>,
    pub footer_margin: Option<f32>,
}

#[derive(Error, Debug)]
pub enum ConfigFileError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Platform config directory path: `<config_dir>/papertalk/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("papertalk").join("config.toml"))
}

/// Load config by cascading CWD `.papertalk.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".papertalk.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    match read_config(path) {
        Ok(config) => Some(config),
        Err(ConfigFileError::Read { .. }) => None,
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unreadable config file");
            None
        }
    }
}

/// Read and parse a config file, reporting why it could not be used.
/// Used for paths the user named explicitly.
pub fn read_config(path: &Path) -> Result<ConfigFile, ConfigFileError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigFileError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// `overlay`'s value for a field if set, otherwise `base`'s.
fn pick<S, T: Clone>(
    base: &Option<S>,
    overlay: &Option<S>,
    field: impl Fn(&S) -> Option<T>,
) -> Option<T> {
    overlay
        .as_ref()
        .and_then(&field)
        .or_else(|| base.as_ref().and_then(&field))
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        api_keys: Some(ApiKeysConfig {
            gemini_api_key: pick(&base.api_keys, &overlay.api_keys, |a| {
                a.gemini_api_key.clone()
            }),
        }),
        chat: Some(ChatConfig {
            model: pick(&base.chat, &overlay.chat, |c| c.model.clone()),
            context_template: pick(&base.chat, &overlay.chat, |c| c.context_template.clone()),
            timeout_secs: pick(&base.chat, &overlay.chat, |c| c.timeout_secs),
        }),
        network: Some(NetworkConfig {
            timeout_secs: pick(&base.network, &overlay.network, |n| n.timeout_secs),
            pdf_host: pick(&base.network, &overlay.network, |n| n.pdf_host.clone()),
            api_url: pick(&base.network, &overlay.network, |n| n.api_url.clone()),
            user_agent: pick(&base.network, &overlay.network, |n| n.user_agent.clone()),
        }),
        search: Some(SearchConfig {
            max_results: pick(&base.search, &overlay.search, |s| s.max_results),
        }),
        pdf: Some(PdfConfig {
            header_margin: pick(&base.pdf, &overlay.pdf, |p| p.header_margin),
            footer_margin: pick(&base.pdf, &overlay.pdf, |p| p.footer_margin),
        }),
    }
}
