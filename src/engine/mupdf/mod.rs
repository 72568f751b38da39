//! MuPDF-backed rendering engine
//!
//! Parsed documents are kept in a bounded LRU keyed by session token. A
//! document that fell out of the LRU is reopened from the cached bytes on
//! its next use.
//!
//! MuPDF work is CPU-bound and occasionally hangs on hostile input, so every
//! call runs on the blocking pool under a timeout. A timed-out worker may
//! keep running, but the request completes.

mod annotations;
mod document;
mod render;
mod text;

#[cfg(test)]
pub(crate) mod fixture;

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use tokio::time::{timeout, Duration};

use crate::engine::{
    AnnotationSet, AnnotationStats, Bookmark, DocumentInfo, EngineError, EngineResult,
    ImageFormat, PageImage, PageRenderRequest, PageText, RenderedPage, RenderingEngine,
    ThumbnailRequest,
};
use crate::session::{CachedDocument, SessionToken};

pub use document::SafeDocument;

/// Timeout for opening a document
const PARSE_TIMEOUT_SECS: u64 = 30;
/// Timeout for rasterizing (per request, not per page)
const RENDER_TIMEOUT_SECS: u64 = 30;
/// Timeout for text, outline and annotation extraction
const TEXT_TIMEOUT_SECS: u64 = 15;

pub struct MupdfEngine {
    documents: Mutex<LruCache<SessionToken, Arc<SafeDocument>>>,
}

impl MupdfEngine {
    pub fn new(max_open_documents: usize) -> Self {
        let capacity = NonZeroUsize::new(max_open_documents).unwrap_or(NonZeroUsize::MIN);
        Self {
            documents: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of parsed documents currently held
    pub fn open_documents(&self) -> usize {
        self.documents.lock().len()
    }

    async fn document(&self, cached: &CachedDocument) -> EngineResult<Arc<SafeDocument>> {
        let token = cached.token();
        let held = self.documents.lock().get(&token).cloned();
        if let Some(doc) = held {
            return Ok(doc);
        }

        let bytes = cached.shared_bytes();
        let doc = Arc::new(run_blocking(PARSE_TIMEOUT_SECS, move || SafeDocument::open(bytes)).await?);
        tracing::debug!(token = %token, pages = doc.page_count(), "Opened document");

        self.documents.lock().put(token, Arc::clone(&doc));
        Ok(doc)
    }
}

/// Run MuPDF work on the blocking pool with a timeout
async fn run_blocking<T, F>(timeout_secs: u64, f: F) -> EngineResult<T>
where
    F: FnOnce() -> EngineResult<T> + Send + 'static,
    T: Send + 'static,
{
    match timeout(Duration::from_secs(timeout_secs), tokio::task::spawn_blocking(f)).await {
        Ok(joined) => joined.map_err(|e| EngineError::Task(e.to_string()))?,
        Err(_) => {
            tracing::warn!(timeout_secs, "MuPDF operation timed out");
            Err(EngineError::Timeout(timeout_secs))
        }
    }
}

/// Inclusive thumbnail range clamped to the document
fn thumbnail_range(page_count: usize, request: &ThumbnailRequest) -> EngineResult<Vec<usize>> {
    if page_count == 0 {
        return Ok(Vec::new());
    }

    let start = request.start_index.unwrap_or(0);
    let end = request.end_index.unwrap_or(page_count - 1).min(page_count - 1);

    if start >= page_count {
        return Err(EngineError::PageNotFound {
            index: start,
            count: page_count,
        });
    }
    if start > end {
        return Err(EngineError::InvalidRequest(format!(
            "startIndex {} is after endIndex {}",
            start, end
        )));
    }

    Ok((start..=end).collect())
}

#[async_trait]
impl RenderingEngine for MupdfEngine {
    fn identity(&self) -> String {
        format!("MuPDF (mupdf-rs engine, pdf-viewer-server {})", env!("CARGO_PKG_VERSION"))
    }

    async fn load(&self, cached: &CachedDocument) -> EngineResult<DocumentInfo> {
        let doc = self.document(cached).await?;
        run_blocking(TEXT_TIMEOUT_SECS, move || doc.info()).await
    }

    async fn render_page(
        &self,
        cached: &CachedDocument,
        request: PageRenderRequest,
    ) -> EngineResult<RenderedPage> {
        let doc = self.document(cached).await?;
        let page_index = request.page_index.unwrap_or(0);
        let size = doc.page_size(page_index)?;

        run_blocking(RENDER_TIMEOUT_SECS, move || {
            doc.with_doc(|d| render::render_page(d, page_index, size, request))
        })
        .await
    }

    async fn extract_text(
        &self,
        cached: &CachedDocument,
        page_index: Option<usize>,
    ) -> EngineResult<Vec<PageText>> {
        let doc = self.document(cached).await?;
        let pages = doc.select_pages(page_index)?;

        run_blocking(TEXT_TIMEOUT_SECS, move || {
            doc.with_doc(|d| {
                pages
                    .iter()
                    .map(|&index| text::page_text(d, index, doc.page_sizes()[index]))
                    .collect()
            })
        })
        .await
    }

    async fn render_thumbnails(
        &self,
        cached: &CachedDocument,
        request: ThumbnailRequest,
    ) -> EngineResult<Vec<PageImage>> {
        let doc = self.document(cached).await?;
        let pages = thumbnail_range(doc.page_count(), &request)?;

        run_blocking(RENDER_TIMEOUT_SECS, move || {
            doc.with_doc(|d| {
                pages
                    .iter()
                    .map(|&index| {
                        let scale = render::thumbnail_scale(doc.page_sizes()[index], request.size);
                        render::render_image(d, index, scale, ImageFormat::Jpeg)
                    })
                    .collect()
            })
        })
        .await
    }

    async fn bookmarks(&self, cached: &CachedDocument) -> EngineResult<Vec<Bookmark>> {
        let doc = self.document(cached).await?;
        run_blocking(TEXT_TIMEOUT_SECS, move || doc.with_doc(text::bookmarks)).await
    }

    async fn annotations(
        &self,
        cached: &CachedDocument,
        page_index: Option<usize>,
    ) -> EngineResult<AnnotationSet> {
        let doc = self.document(cached).await?;
        if let Some(index) = page_index {
            doc.page_size(index)?;
        }

        let annotations = run_blocking(TEXT_TIMEOUT_SECS, {
            let doc = Arc::clone(&doc);
            move || doc.with_pdf(|pdf| annotations::extract(pdf, doc.page_sizes(), page_index))
        })
        .await?;

        Ok(AnnotationSet {
            page_count: doc.page_count(),
            stats: AnnotationStats::from_annotations(&annotations),
            annotations,
        })
    }

    async fn print_images(
        &self,
        cached: &CachedDocument,
        page_index: Option<usize>,
    ) -> EngineResult<Vec<PageImage>> {
        let doc = self.document(cached).await?;
        let pages = doc.select_pages(page_index)?;

        run_blocking(RENDER_TIMEOUT_SECS, move || {
            doc.with_doc(|d| {
                pages
                    .iter()
                    .map(|&index| {
                        let scale =
                            render::render_scale(doc.page_sizes()[index], 1.0, Some(render::PRINT_DPI));
                        render::render_image(d, index, scale, ImageFormat::Png)
                    })
                    .collect()
            })
        })
        .await
    }

    fn release(&self, token: &SessionToken) {
        if self.documents.lock().pop(token).is_some() {
            tracing::debug!(token = %token, "Released parsed document");
        }
    }
}
