use std::path::Path;

use thiserror::Error;

/// Failure to open or read a document's text layer.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to open PDF: {0}")]
    OpenError(String),
    #[error("failed to extract text: {0}")]
    ExtractionError(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for PDF text extraction backends.
///
/// Implementors open a document from a filesystem path and return the raw
/// text layer of each page; normalization and slicing happen downstream in
/// `papertalk_parsing`.
pub trait PdfBackend: Send + Sync {
    /// Extract the text of every page, in page order.
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>, BackendError>;
}
