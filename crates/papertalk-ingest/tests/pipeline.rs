use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use papertalk_core::index::IndexFuture;
use papertalk_core::{
    BackendError, IndexError, PaperId, PaperIndex, PaperMetadata, PaperSummary, PdfBackend,
    SearchQuery,
};
use papertalk_ingest::acquire::FetchFuture;
use papertalk_ingest::{DocumentFetcher, DownloadError, IngestError, Ingestor, PdfAcquirer};

// -- Mocks --------------------------------------------------------------------

struct MockFetcher {
    fail_with: Option<u16>,
    urls: Mutex<Vec<String>>,
}

impl MockFetcher {
    fn ok() -> Arc<Self> {
        Arc::new(Self {
            fail_with: None,
            urls: Mutex::new(Vec::new()),
        })
    }

    fn status(status: u16) -> Arc<Self> {
        Arc::new(Self {
            fail_with: Some(status),
            urls: Mutex::new(Vec::new()),
        })
    }
}

impl DocumentFetcher for MockFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> FetchFuture<'a> {
        Box::pin(async move {
            self.urls.lock().unwrap().push(url.to_string());
            match self.fail_with {
                Some(status) => Err(DownloadError::Status {
                    url: url.to_string(),
                    status,
                }),
                None => Ok(b"%PDF-1.4 fake".to_vec()),
            }
        })
    }
}

enum Behavior {
    Pages(Vec<&'static str>),
    Fail,
    Panic,
}

/// Returns canned pages and records which files it was asked to open and
/// whether they existed at the time.
struct MockBackend {
    behavior: Behavior,
    opened: Mutex<Vec<(PathBuf, bool)>>,
}

impl MockBackend {
    fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            opened: Mutex::new(Vec::new()),
        })
    }

    fn opened(&self) -> Vec<(PathBuf, bool)> {
        self.opened.lock().unwrap().clone()
    }
}

impl PdfBackend for MockBackend {
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>, BackendError> {
        self.opened
            .lock()
            .unwrap()
            .push((path.to_path_buf(), path.exists()));
        match &self.behavior {
            Behavior::Pages(pages) => Ok(pages.iter().map(|p| p.to_string()).collect()),
            Behavior::Fail => Err(BackendError::OpenError("not a PDF".into())),
            Behavior::Panic => panic!("backend blew up mid-document"),
        }
    }
}

struct MockIndex {
    title: Option<&'static str>,
    requested: Mutex<Vec<PaperId>>,
}

impl MockIndex {
    fn with_title(title: &'static str) -> Arc<Self> {
        Arc::new(Self {
            title: Some(title),
            requested: Mutex::new(Vec::new()),
        })
    }

    fn empty() -> Arc<Self> {
        Arc::new(Self {
            title: None,
            requested: Mutex::new(Vec::new()),
        })
    }

    fn requested(&self) -> Vec<PaperId> {
        self.requested.lock().unwrap().clone()
    }
}

impl PaperIndex for MockIndex {
    fn name(&self) -> &str {
        "mock"
    }

    fn fetch_metadata<'a>(&'a self, id: &'a PaperId) -> IndexFuture<'a, PaperMetadata> {
        Box::pin(async move {
            self.requested.lock().unwrap().push(id.clone());
            match self.title {
                Some(title) => {
                    let mut meta = PaperMetadata::new(id.clone());
                    meta.title = Some(title.to_string());
                    Ok(meta)
                }
                None => Err(IndexError::NotFound(id.to_string())),
            }
        })
    }

    fn search<'a>(&'a self, _query: &'a SearchQuery) -> IndexFuture<'a, Vec<PaperSummary>> {
        Box::pin(async { Ok(Vec::new()) })
    }
}

fn sample_pages() -> Behavior {
    Behavior::Pages(vec![
        "Abstract: we propose Y [1].\n",
        "Conclusion. References\n1. Foo.",
    ])
}

fn ingestor(
    dir: &Path,
    fetcher: Arc<MockFetcher>,
    backend: Arc<MockBackend>,
    index: Arc<MockIndex>,
) -> Ingestor {
    let acquirer = PdfAcquirer::new(fetcher).in_dir(dir);
    Ingestor::new(acquirer, backend, index)
}

fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

// -- Tests --------------------------------------------------------------------

#[tokio::test]
async fn test_end_to_end_ingestion() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MockBackend::new(sample_pages());
    let index = MockIndex::with_title("Y Paper");
    let ingestor = ingestor(dir.path(), MockFetcher::ok(), backend.clone(), index.clone());

    let id = PaperId::new("2102.12092");
    let result = ingestor
        .ingest("https://arxiv.org/pdf/2102.12092.pdf", &id)
        .await
        .unwrap();

    assert_eq!(result.content, "Abstract: we propose Y. Conclusion.");
    assert_eq!(result.metadata.title.as_deref(), Some("Y Paper"));
    assert_eq!(result.metadata.id, id);

    let opened = backend.opened();
    assert_eq!(opened.len(), 1);
    assert!(opened[0].1, "backend should see the downloaded file");
    assert!(!opened[0].0.exists());
    assert!(dir_is_empty(dir.path()));
}

#[tokio::test]
async fn test_metadata_uses_caller_identifier() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = MockFetcher::ok();
    let index = MockIndex::with_title("Y Paper");
    let acquirer = PdfAcquirer::new(fetcher.clone())
        .with_prefix("1999.99999-")
        .in_dir(dir.path());
    let ingestor = Ingestor::new(acquirer, MockBackend::new(sample_pages()), index.clone());

    let id = PaperId::new("2102.12092");
    ingestor
        .ingest("https://mirror.example/files/other-name.pdf", &id)
        .await
        .unwrap();

    assert_eq!(index.requested(), vec![id]);
}

#[tokio::test]
async fn test_ingest_paper_builds_pdf_url() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = MockFetcher::ok();
    let ingestor = ingestor(
        dir.path(),
        fetcher.clone(),
        MockBackend::new(sample_pages()),
        MockIndex::with_title("Y Paper"),
    )
    .with_pdf_host("https://export.arxiv.org/");

    ingestor
        .ingest_paper(&PaperId::new("1706.03762"))
        .await
        .unwrap();

    assert_eq!(
        *fetcher.urls.lock().unwrap(),
        vec!["https://export.arxiv.org/pdf/1706.03762.pdf".to_string()]
    );
}

#[tokio::test]
async fn test_extraction_failure_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MockBackend::new(Behavior::Fail);
    let index = MockIndex::with_title("Y Paper");
    let ingestor = ingestor(dir.path(), MockFetcher::ok(), backend.clone(), index.clone());

    let err = ingestor
        .ingest("u", &PaperId::new("2102.12092"))
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::Extraction(BackendError::OpenError(_))));
    assert_eq!(backend.opened().len(), 1);
    assert!(dir_is_empty(dir.path()));
    assert!(index.requested().is_empty(), "no metadata lookup after a failed extraction");
}

#[tokio::test]
async fn test_panicking_backend_still_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MockBackend::new(Behavior::Panic);
    let ingestor = ingestor(
        dir.path(),
        MockFetcher::ok(),
        backend.clone(),
        MockIndex::with_title("Y Paper"),
    );

    let err = ingestor
        .ingest("u", &PaperId::new("2102.12092"))
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::Extraction(_)));
    assert!(backend.opened()[0].1);
    assert!(dir_is_empty(dir.path()));
}

#[tokio::test]
async fn test_download_failure_skips_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MockBackend::new(sample_pages());
    let index = MockIndex::with_title("Y Paper");
    let ingestor = ingestor(dir.path(), MockFetcher::status(503), backend.clone(), index.clone());

    let err = ingestor
        .ingest("https://arxiv.org/pdf/x.pdf", &PaperId::new("x"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        IngestError::Download(DownloadError::Status { status: 503, .. })
    ));
    assert!(backend.opened().is_empty());
    assert!(index.requested().is_empty());
    assert!(dir_is_empty(dir.path()));
}

#[tokio::test]
async fn test_not_found_aborts_without_partial_result() {
    let dir = tempfile::tempdir().unwrap();
    let ingestor = ingestor(
        dir.path(),
        MockFetcher::ok(),
        MockBackend::new(sample_pages()),
        MockIndex::empty(),
    );

    let err = ingestor
        .ingest("u", &PaperId::new("0000.00000"))
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::Index(IndexError::NotFound(ref id)) if id == "0000.00000"));
    assert!(dir_is_empty(dir.path()));
}

#[tokio::test]
async fn test_repeated_calls_rerun_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = MockFetcher::ok();
    let backend = MockBackend::new(sample_pages());
    let index = MockIndex::with_title("Y Paper");
    let ingestor = ingestor(dir.path(), fetcher.clone(), backend.clone(), index.clone());
    let id = PaperId::new("2102.12092");

    let first = ingestor.ingest("u", &id).await.unwrap();
    let second = ingestor.ingest("u", &id).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(fetcher.urls.lock().unwrap().len(), 2);
    assert_eq!(backend.opened().len(), 2);
    assert_eq!(index.requested().len(), 2);
    assert_ne!(backend.opened()[0].0, backend.opened()[1].0);
}
