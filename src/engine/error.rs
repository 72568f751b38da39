//! Engine error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The bytes could not be opened as a PDF
    #[error("Failed to open document: {0}")]
    Open(String),

    #[error("Page {index} is out of range (document has {count} pages)")]
    PageNotFound { index: usize, count: usize },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Image encoding error: {0}")]
    Image(String),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    /// The blocking worker panicked or was cancelled
    #[error("Engine task failed: {0}")]
    Task(String),

    #[error("MuPDF error: {0}")]
    MuPdf(String),
}

impl From<mupdf::Error> for EngineError {
    fn from(e: mupdf::Error) -> Self {
        EngineError::MuPdf(e.to_string())
    }
}

impl From<image::ImageError> for EngineError {
    fn from(e: image::ImageError) -> Self {
        EngineError::Image(e.to_string())
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
