//! Operation dispatcher
//!
//! Maps each [`Operation`] onto the resolver, the session cache and the
//! rendering engine, and shapes the result for the HTTP layer.
//!
//! Per token the lifecycle is `UNBOUND -> LOADED -> ... -> gone`: only Load
//! creates an entry, every other token operation requires a live one, and
//! Unload or expiry ends it. A missing, malformed, expired or unloaded token
//! is always reported as [`AppError::TokenNotFound`].

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::engine::{
    Annotation, Bookmark, DocumentInfo, PageImage, PageRenderRequest, PageText, RenderingEngine,
};
use crate::error::{AppError, Result};
use crate::operation::{ExportFormat, Operation};
use crate::resolver::{DocumentDescriptor, DocumentResolver};
use crate::session::{CachedDocument, SessionCache, SessionToken};

/// Confirmation returned by Unload, whether or not anything was cached
pub const UNLOAD_MESSAGE: &str = "Document cache is cleared";

/// Result of a dispatched operation
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutput {
    Json(Value),
    Text(String),
}

impl OperationOutput {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            OperationOutput::Json(value) => Some(value),
            OperationOutput::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            OperationOutput::Text(text) => Some(text),
            OperationOutput::Json(_) => None,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoadResponse {
    #[serde(flatten)]
    info: DocumentInfo,
    expires_at: DateTime<Utc>,
    document: SessionToken,
}

#[derive(Serialize)]
struct ImagesResponse {
    images: Vec<PageImage>,
}

#[derive(Serialize)]
struct ThumbnailsResponse {
    thumbnails: Vec<PageImage>,
}

#[derive(Serialize)]
struct BookmarksResponse {
    bookmarks: Vec<Bookmark>,
}

#[derive(Serialize)]
struct TextsResponse {
    pages: Vec<PageText>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportResponse {
    format: &'static str,
    page_count: usize,
    annotations: Vec<Annotation>,
}

fn to_json<T: Serialize>(value: &T) -> Result<OperationOutput> {
    serde_json::to_value(value)
        .map(OperationOutput::Json)
        .map_err(|e| AppError::Internal(format!("Failed to serialize response: {}", e)))
}

#[derive(Clone)]
pub struct Dispatcher {
    cache: SessionCache,
    resolver: DocumentResolver,
    engine: Arc<dyn RenderingEngine>,
}

impl Dispatcher {
    pub fn new(
        cache: SessionCache,
        resolver: DocumentResolver,
        engine: Arc<dyn RenderingEngine>,
    ) -> Self {
        Self {
            cache,
            resolver,
            engine,
        }
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    pub fn engine(&self) -> &Arc<dyn RenderingEngine> {
        &self.engine
    }

    pub async fn dispatch(&self, operation: Operation) -> Result<OperationOutput> {
        let kind = operation.kind();
        tracing::debug!(operation = %kind, "Dispatching operation");

        match operation {
            Operation::Load { descriptor } => self.load(descriptor).await,

            Operation::RenderPages {
                token,
                page_index,
                zoom_factor,
                dpi,
            } => {
                let document = self.lookup(&token)?;
                let page = self
                    .engine
                    .render_page(
                        &document,
                        PageRenderRequest {
                            page_index,
                            zoom_factor,
                            dpi,
                        },
                    )
                    .await?;
                to_json(&page)
            }

            Operation::RenderThumbnails { token, request } => {
                let document = self.lookup(&token)?;
                let thumbnails = self.engine.render_thumbnails(&document, request).await?;
                to_json(&ThumbnailsResponse { thumbnails })
            }

            Operation::RenderTexts { token, page_index } => {
                let document = self.lookup(&token)?;
                let pages = self.engine.extract_text(&document, page_index).await?;
                to_json(&TextsResponse { pages })
            }

            Operation::Bookmarks { token } => {
                let document = self.lookup(&token)?;
                let bookmarks = self.engine.bookmarks(&document).await?;
                to_json(&BookmarksResponse { bookmarks })
            }

            Operation::AnnotationComments { token, page_index } => {
                let document = self.lookup(&token)?;
                let set = self.engine.annotations(&document, page_index).await?;
                to_json(&set)
            }

            Operation::PrintImages { token, page_index } => {
                let document = self.lookup(&token)?;
                let images = self.engine.print_images(&document, page_index).await?;
                to_json(&ImagesResponse { images })
            }

            Operation::Download { token } => {
                let document = self.lookup(&token)?;
                Ok(OperationOutput::Text(BASE64.encode(document.bytes())))
            }

            Operation::Unload { token } => {
                self.unload(token.as_deref());
                Ok(OperationOutput::Text(UNLOAD_MESSAGE.to_string()))
            }

            Operation::ImportAnnotations { file_name } => {
                let bytes = self.resolver.read_local(&file_name).await?;
                Ok(OperationOutput::Text(
                    String::from_utf8_lossy(&bytes).into_owned(),
                ))
            }

            Operation::ExportAnnotations { token, format } => {
                let document = self.lookup(&token)?;
                let set = self.engine.annotations(&document, None).await?;
                match format {
                    ExportFormat::Json => to_json(&ExportResponse {
                        format: format.as_str(),
                        page_count: set.page_count,
                        annotations: set.annotations,
                    }),
                }
            }

            Operation::Status => Ok(OperationOutput::Text(self.status_message())),
        }
    }

    /// Status line reported by GetStatus / version
    pub fn status_message(&self) -> String {
        format!("PDF Viewer API is running {}", self.engine.identity())
    }

    fn lookup(&self, token: &str) -> Result<Arc<CachedDocument>> {
        self.cache.get(token).ok_or(AppError::TokenNotFound)
    }

    async fn load(&self, descriptor: DocumentDescriptor) -> Result<OperationOutput> {
        let bytes = self.resolver.resolve(&descriptor).await?;
        let document = self.cache.put(bytes);
        let token = document.token();

        // Dropped without commit when the engine fails or the request goes away
        let pending = PendingLoad {
            dispatcher: self,
            token,
            committed: false,
        };
        let info = self.engine.load(&document).await?;
        pending.commit();

        tracing::info!(
            token = %token,
            pages = info.page_count,
            bytes = document.len(),
            "Document loaded"
        );
        to_json(&LoadResponse {
            info,
            expires_at: document.expires_at(),
            document: token,
        })
    }

    /// Remove a document and release its engine state; unknown tokens are a no-op
    pub fn unload(&self, token: Option<&str>) {
        let Some(raw) = token else {
            return;
        };

        if let Some(document) = self.cache.remove(raw) {
            self.engine.release(&document.token());
            tracing::info!(token = %document.token(), "Document unloaded");
        }
    }

    /// Purge expired sessions and release their engine state
    pub fn evict_expired(&self) -> usize {
        let expired = self.cache.sweep();
        for token in &expired {
            self.engine.release(token);
        }
        expired.len()
    }

    /// Spawn the periodic eviction sweep
    pub fn start_eviction_task(&self, period: Duration) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                dispatcher.evict_expired();
            }
        })
    }
}

/// A cache entry whose token has not been handed out yet
struct PendingLoad<'a> {
    dispatcher: &'a Dispatcher,
    token: SessionToken,
    committed: bool,
}

impl PendingLoad<'_> {
    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PendingLoad<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        self.dispatcher.cache.remove_token(&self.token);
        self.dispatcher.engine.release(&self.token);
        tracing::debug!(token = %self.token, "Discarded unfinished load");
    }
}

// ============================================================================
// Tests
// ============================================================================
