use std::path::Path;

use mupdf::{Document, Page, TextPageFlags};

use papertalk_core::{BackendError, PdfBackend};

/// MuPDF-based implementation of [`PdfBackend`].
///
/// This crate is the only one linking mupdf (AGPL-3.0), so the rest of the
/// workspace can be built and tested without it.
///
/// By default every text block on a page is kept, matching a plain
/// text-layer dump. Running headers and footers (journal names, page
/// numbers) can be dropped with [`MupdfBackend::with_margins`].
#[derive(Debug, Clone, Default)]
pub struct MupdfBackend {
    /// Fraction of page height from the top treated as header.
    header_ratio: Option<f32>,
    /// Fraction of page height from the bottom treated as footer.
    footer_ratio: Option<f32>,
}

fn ratio(r: f32) -> Option<f32> {
    (r > 0.0 && r < 1.0).then_some(r)
}

impl MupdfBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip blocks that lie entirely in the top `header` or start in the
    /// bottom `footer` fraction of each page. `0.0` disables a side.
    pub fn with_margins(mut self, header: f32, footer: f32) -> Self {
        self.header_ratio = ratio(header);
        self.footer_ratio = ratio(footer);
        self
    }

    fn page_text(&self, page: &Page) -> Result<String, BackendError> {
        let text_page = page
            .to_text_page(TextPageFlags::empty())
            .map_err(|e| BackendError::ExtractionError(e.to_string()))?;
        let bounds = page
            .bounds()
            .map_err(|e| BackendError::ExtractionError(e.to_string()))?;
        let height = bounds.y1 - bounds.y0;
        let header_limit = self.header_ratio.map(|r| bounds.y0 + height * r);
        let footer_limit = self.footer_ratio.map(|r| bounds.y1 - height * r);

        let mut text = String::new();
        for block in text_page.blocks() {
            let b = block.bounds();
            if header_limit.is_some_and(|limit| b.y1 <= limit)
                || footer_limit.is_some_and(|limit| b.y0 >= limit)
            {
                continue;
            }
            for line in block.lines() {
                text.extend(line.chars().map(|c| c.char().unwrap_or('\u{FFFD}')));
                text.push('\n');
            }
        }
        Ok(text)
    }
}

impl PdfBackend for MupdfBackend {
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>, BackendError> {
        let path_str = path
            .to_str()
            .ok_or_else(|| BackendError::OpenError("invalid path encoding".into()))?;
        let document =
            Document::open(path_str).map_err(|e| BackendError::OpenError(e.to_string()))?;

        let mut pages = Vec::new();
        for page in document
            .pages()
            .map_err(|e| BackendError::ExtractionError(e.to_string()))?
        {
            let page = page.map_err(|e| BackendError::ExtractionError(e.to_string()))?;
            pages.push(self.page_text(&page)?);
        }
        tracing::debug!(path = %path.display(), pages = pages.len(), "extracted text layer");
        Ok(pages)
    }
}
