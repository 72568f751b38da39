//! Rendering engine seam
//!
//! The dispatcher talks to the engine only through [`RenderingEngine`].
//! Engines may keep parsed state per session token; [`RenderingEngine::release`]
//! is called when a token is unloaded or expires, and every method receives
//! the cached entry so an engine can rebuild dropped state from its bytes.

mod error;
pub mod mupdf;
mod types;

use async_trait::async_trait;

use crate::session::{CachedDocument, SessionToken};

pub use error::{EngineError, EngineResult};
pub use types::{
    Annotation, AnnotationKind, AnnotationSet, AnnotationStats, Bookmark, DocumentInfo,
    DocumentMetadata, ImageFormat, NormalizedRect, PageImage, PageOrientation, PageRenderRequest,
    PageSize, PageText, RenderedPage, TextLine, ThumbnailRequest,
};

#[async_trait]
pub trait RenderingEngine: Send + Sync {
    /// Name and version reported by the status endpoint
    fn identity(&self) -> String;

    /// Parse a freshly cached document
    async fn load(&self, document: &CachedDocument) -> EngineResult<DocumentInfo>;

    async fn render_page(
        &self,
        document: &CachedDocument,
        request: PageRenderRequest,
    ) -> EngineResult<RenderedPage>;

    /// Text for one page, or every page when `page_index` is `None`
    async fn extract_text(
        &self,
        document: &CachedDocument,
        page_index: Option<usize>,
    ) -> EngineResult<Vec<PageText>>;

    async fn render_thumbnails(
        &self,
        document: &CachedDocument,
        request: ThumbnailRequest,
    ) -> EngineResult<Vec<PageImage>>;

    async fn bookmarks(&self, document: &CachedDocument) -> EngineResult<Vec<Bookmark>>;

    async fn annotations(
        &self,
        document: &CachedDocument,
        page_index: Option<usize>,
    ) -> EngineResult<AnnotationSet>;

    /// Print-resolution images for one page, or every page
    async fn print_images(
        &self,
        document: &CachedDocument,
        page_index: Option<usize>,
    ) -> EngineResult<Vec<PageImage>>;

    /// Drop any state derived from `token`
    fn release(&self, token: &SessionToken);
}
