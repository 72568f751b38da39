//! Document resolution
//!
//! Turns a caller's document descriptor into raw bytes:
//! - inline base64 payloads
//! - file names under the trusted document root
//! - `http`/`https` URLs, fetched with a timeout and a size cap
//!
//! Nothing is cached here.

use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::{Client, Url};
use thiserror::Error;

use crate::config::ResolverConfig;

/// Where a document's bytes come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentDescriptor {
    /// Base64-encoded document content
    Inline(String),
    /// A file under the document root, or a remote URL
    FileName(String),
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Invalid document descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("The document is not a valid Base64 string: {0}")]
    InvalidEncoding(String),

    #[error("The document does not contain any data")]
    EmptyDocument,

    #[error("Error downloading the document: {0}")]
    UpstreamFetch(String),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

/// Resolves descriptors into document bytes
#[derive(Clone)]
pub struct DocumentResolver {
    document_root: PathBuf,
    client: Client,
    fetch_timeout: Duration,
    max_fetch_bytes: u64,
}

impl DocumentResolver {
    pub fn new(config: &ResolverConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.fetch_timeout)
            .connect_timeout(config.fetch_connect_timeout)
            .user_agent(concat!("pdf-viewer-server/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            document_root: config.document_root.clone(),
            client,
            fetch_timeout: config.fetch_timeout,
            max_fetch_bytes: config.max_fetch_bytes,
        })
    }

    pub fn document_root(&self) -> &Path {
        &self.document_root
    }

    /// Resolve a descriptor to a non-empty byte sequence
    pub async fn resolve(&self, descriptor: &DocumentDescriptor) -> Result<Vec<u8>, ResolveError> {
        let bytes = match descriptor {
            DocumentDescriptor::Inline(content) => decode_inline(content)?,
            DocumentDescriptor::FileName(name) => self.resolve_file_name(name).await?,
        };

        if bytes.is_empty() {
            return Err(ResolveError::EmptyDocument);
        }

        Ok(bytes)
    }

    /// Read a file through the local branch only (no inline or URL forms)
    pub async fn read_local(&self, name: &str) -> Result<Vec<u8>, ResolveError> {
        match self.locate(name).await {
            Some(path) => tokio::fs::read(&path)
                .await
                .map_err(|_| ResolveError::FileNotFound(name.to_string())),
            None => Err(ResolveError::FileNotFound(name.to_string())),
        }
    }

    async fn resolve_file_name(&self, name: &str) -> Result<Vec<u8>, ResolveError> {
        if let Some(path) = self.locate(name).await {
            tracing::debug!(path = %path.display(), "Resolved document from document root");
            return tokio::fs::read(&path).await.map_err(|e| {
                ResolveError::InvalidDescriptor(format!("The document could not be read: {}", e))
            });
        }

        match parse_remote_url(name) {
            Some(url) => self.fetch(url).await,
            None => Err(ResolveError::InvalidDescriptor(
                "The document path is not valid".to_string(),
            )),
        }
    }

    /// Find `name` inside the document root: exact match first, then
    /// root-relative. Candidates that canonicalize outside the root are
    /// ignored.
    async fn locate(&self, name: &str) -> Option<PathBuf> {
        if name.trim().is_empty() {
            return None;
        }

        let root = tokio::fs::canonicalize(&self.document_root).await.ok()?;
        let candidates = [PathBuf::from(name), self.document_root.join(name)];

        for candidate in candidates {
            let Ok(canonical) = tokio::fs::canonicalize(&candidate).await else {
                continue;
            };

            if !canonical.starts_with(&root) {
                tracing::warn!(
                    requested = %name,
                    "Rejected document path outside the document root"
                );
                continue;
            }

            if tokio::fs::metadata(&canonical)
                .await
                .map(|meta| meta.is_file())
                .unwrap_or(false)
            {
                return Some(canonical);
            }
        }

        None
    }

    async fn fetch(&self, url: Url) -> Result<Vec<u8>, ResolveError> {
        tracing::info!(url = %url, "Fetching remote document");

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.fetch_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::UpstreamFetch(format!(
                "{} returned {}",
                url, status
            )));
        }

        if let Some(declared) = response.content_length() {
            if declared > self.max_fetch_bytes {
                return Err(self.oversize(declared));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.fetch_error(e))? {
            if (body.len() + chunk.len()) as u64 > self.max_fetch_bytes {
                return Err(self.oversize((body.len() + chunk.len()) as u64));
            }
            body.extend_from_slice(&chunk);
        }

        tracing::debug!(url = %url, bytes = body.len(), "Fetched remote document");
        Ok(body)
    }

    fn fetch_error(&self, error: reqwest::Error) -> ResolveError {
        if error.is_timeout() {
            ResolveError::UpstreamFetch(format!(
                "timed out after {} seconds",
                self.fetch_timeout.as_secs_f32()
            ))
        } else {
            ResolveError::UpstreamFetch(error.to_string())
        }
    }

    fn oversize(&self, bytes: u64) -> ResolveError {
        ResolveError::UpstreamFetch(format!(
            "document exceeds the {} byte limit ({} bytes)",
            self.max_fetch_bytes, bytes
        ))
    }
}

/// Decode standard base64, ignoring embedded whitespace and line breaks
fn decode_inline(content: &str) -> Result<Vec<u8>, ResolveError> {
    let compact: String = content
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    BASE64
        .decode(compact.as_bytes())
        .map_err(|e| ResolveError::InvalidEncoding(e.to_string()))
}

fn parse_remote_url(candidate: &str) -> Option<Url> {
    let url = Url::parse(candidate.trim()).ok()?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Some(url),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================
