//! Rendering of the instruction document that opens every chat session.

use std::fmt;
use std::path::{Path, PathBuf};

use minijinja::{Environment, context};
use thiserror::Error;

use crate::IngestionResult;

const BUILTIN_TEMPLATE: &str = include_str!("../templates/context.md.j2");
const TEMPLATE_NAME: &str = "context";

pub const UNTITLED: &str = "Untitled Paper";
pub const UNKNOWN_AUTHORS: &str = "Unknown Authors";
pub const NO_CONTENT: &str = "No content extracted.";

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("failed to read context template {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to render context template: {0}")]
    Render(#[from] minijinja::Error),
}

/// The rendered instruction text sent as the first turn of a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatContextDocument(String);

impl ChatContextDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ChatContextDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Template source for the context document. Receives `title`, `authors`
/// and `content` as plain strings.
#[derive(Debug, Clone)]
pub struct ContextTemplate {
    source: String,
}

impl Default for ContextTemplate {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ContextTemplate {
    pub fn builtin() -> Self {
        Self::from_source(BUILTIN_TEMPLATE)
    }

    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ContextError> {
        let source = std::fs::read_to_string(path).map_err(|source| ContextError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_source(source))
    }

    /// The user template at `path` if given, otherwise the built-in one.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ContextError> {
        match path {
            Some(p) => Self::from_path(p),
            None => Ok(Self::builtin()),
        }
    }
}

/// Fill the template with the paper's title, authors and extracted content,
/// substituting fixed placeholders for whatever is missing.
pub fn build_context(
    result: &IngestionResult,
    template: &ContextTemplate,
) -> Result<ChatContextDocument, ContextError> {
    let meta = &result.metadata;
    let title = meta
        .title
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(UNTITLED);
    let authors = if meta.authors.is_empty() {
        UNKNOWN_AUTHORS.to_string()
    } else {
        meta.authors.join(", ")
    };
    let content = if result.content.trim().is_empty() {
        NO_CONTENT
    } else {
        result.content.as_str()
    };

    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    env.add_template(TEMPLATE_NAME, &template.source)?;
    let rendered = env
        .get_template(TEMPLATE_NAME)?
        .render(context! { title, authors, content })?;
    Ok(ChatContextDocument(rendered))
}
