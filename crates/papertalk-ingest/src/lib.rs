use std::sync::Arc;

use thiserror::Error;

pub mod acquire;

pub use acquire::{AcquiredPdf, DocumentFetcher, DownloadError, HttpFetcher, PdfAcquirer};
// Re-export domain types for convenience
pub use papertalk_core::{BackendError, IndexError, IngestionResult, PaperId};

use papertalk_core::{DEFAULT_PDF_HOST, PaperIndex, PdfBackend};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Download(#[from] DownloadError),
    #[error("PDF extraction error: {0}")]
    Extraction(#[from] BackendError),
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Runs the ingestion pipeline for one paper: download, extract, normalize,
/// slice, look up metadata.
///
/// Nothing is cached; every call repeats the whole pipeline.
#[derive(Clone)]
pub struct Ingestor {
    acquirer: PdfAcquirer,
    backend: Arc<dyn PdfBackend>,
    index: Arc<dyn PaperIndex>,
    pdf_host: String,
}

impl Ingestor {
    pub fn new(
        acquirer: PdfAcquirer,
        backend: Arc<dyn PdfBackend>,
        index: Arc<dyn PaperIndex>,
    ) -> Self {
        Self {
            acquirer,
            backend,
            index,
            pdf_host: DEFAULT_PDF_HOST.to_string(),
        }
    }

    /// Host used by [`Ingestor::ingest_paper`] to build PDF URLs.
    pub fn with_pdf_host(mut self, host: impl Into<String>) -> Self {
        self.pdf_host = host.into();
        self
    }

    /// Ingest the document at `url`, attributing it to `id`.
    ///
    /// Metadata is always looked up with `id` as given; the temporary file
    /// name and the document content play no part in identifying the paper.
    /// The temporary file is gone by the time this returns, whatever the
    /// outcome.
    pub async fn ingest(&self, url: &str, id: &PaperId) -> Result<IngestionResult, IngestError> {
        tracing::debug!(%id, url, "acquiring PDF");
        let pdf = self.acquirer.acquire(url).await?;

        let backend = Arc::clone(&self.backend);
        let pages = tokio::task::spawn_blocking(move || {
            let pages = backend.extract_pages(pdf.path());
            drop(pdf);
            pages
        })
        .await
        .map_err(|e| BackendError::ExtractionError(format!("extraction task failed: {}", e)))??;
        tracing::debug!(%id, pages = pages.len(), "extracted text");

        let content = papertalk_parsing::extract_body(&pages);

        let metadata = self.index.fetch_metadata(id).await?;
        tracing::debug!(%id, chars = content.len(), "ingested paper");
        Ok(IngestionResult { metadata, content })
    }

    /// Ingest a paper from its canonical PDF location on the configured host.
    pub async fn ingest_paper(&self, id: &PaperId) -> Result<IngestionResult, IngestError> {
        let url = id.pdf_url(&self.pdf_host);
        self.ingest(&url, id).await
    }
}

#[cfg(feature = "pdf")]
impl Ingestor {
    /// Production wiring: HTTP download, MuPDF extraction, the given index.
    pub fn from_config(
        config: &papertalk_core::Config,
        client: reqwest::Client,
        index: Arc<dyn PaperIndex>,
    ) -> Self {
        let fetcher = HttpFetcher::new(client, config.network_timeout());
        let acquirer = PdfAcquirer::new(Arc::new(fetcher));
        let backend = papertalk_pdf_mupdf::MupdfBackend::new()
            .with_margins(config.pdf_header_margin, config.pdf_footer_margin);
        Self::new(acquirer, Arc::new(backend), index).with_pdf_host(config.pdf_host.clone())
    }
}
