//! Fetching a paper's PDF into a scoped temporary file.

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tempfile::NamedTempFile;
use thiserror::Error;

pub const DEFAULT_PREFIX: &str = "papertalk-";

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("download of {url} failed with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("download of {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("failed to store downloaded PDF: {0}")]
    Io(#[from] std::io::Error),
}

/// Boxed future returned by [`DocumentFetcher::fetch`].
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<u8>, DownloadError>> + Send + 'a>>;

/// Retrieves the raw bytes of a remote document. One attempt, no retries.
pub trait DocumentFetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> FetchFuture<'a>;
}

/// [`DocumentFetcher`] over plain HTTP GET.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

impl DocumentFetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> FetchFuture<'a> {
        Box::pin(async move {
            let transport = |e: reqwest::Error| DownloadError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            };
            let resp = self
                .client
                .get(url)
                .timeout(self.timeout)
                .send()
                .await
                .map_err(transport)?;
            let status = resp.status();
            if !status.is_success() {
                return Err(DownloadError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }
            let bytes = resp.bytes().await.map_err(transport)?;
            Ok(bytes.to_vec())
        })
    }
}

/// A downloaded PDF on disk. The file is deleted when this value is dropped,
/// including during a panic unwind.
#[derive(Debug)]
pub struct AcquiredPdf {
    file: NamedTempFile,
}

impl AcquiredPdf {
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Downloads documents into uniquely named temporary files.
#[derive(Clone)]
pub struct PdfAcquirer {
    fetcher: Arc<dyn DocumentFetcher>,
    prefix: String,
    dir: Option<PathBuf>,
}

impl PdfAcquirer {
    pub fn new(fetcher: Arc<dyn DocumentFetcher>) -> Self {
        Self {
            fetcher,
            prefix: DEFAULT_PREFIX.to_string(),
            dir: None,
        }
    }

    /// File name prefix for the temporary files.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Create temporary files in `dir` instead of the system temp directory.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub async fn acquire(&self, url: &str) -> Result<AcquiredPdf, DownloadError> {
        let bytes = self.fetcher.fetch(url).await?;

        let mut builder = tempfile::Builder::new();
        builder.prefix(&self.prefix).suffix(".pdf");
        let mut file = match &self.dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(&bytes)?;
        file.flush()?;
        tracing::debug!(url, path = %file.path().display(), bytes = bytes.len(), "stored PDF");
        Ok(AcquiredPdf { file })
    }
}
