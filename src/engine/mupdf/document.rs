//! Thread-safe handle to a parsed PDF
//!
//! MuPDF documents are not thread-safe. A `SafeDocument` keeps the source
//! bytes plus the facts gathered at open time, and opens a fresh MuPDF
//! document for each operation while holding its mutex. No MuPDF object
//! escapes the closures passed to `with_doc` / `with_pdf`.

use std::sync::Arc;

use mupdf::pdf::PdfDocument;
use mupdf::{Document, MetadataName};
use parking_lot::Mutex;

use crate::engine::{DocumentInfo, DocumentMetadata, EngineError, EngineResult, PageSize};

const PDF_MIME: &str = "application/pdf";

/// Pages inspected when deciding whether a document has a text layer
const TEXT_LAYER_SAMPLE_PAGES: usize = 3;

pub struct SafeDocument {
    bytes: Arc<Vec<u8>>,
    page_sizes: Vec<PageSize>,
    lock: Mutex<()>,
}

impl SafeDocument {
    /// Parse `bytes` once to validate them and record page geometry
    pub fn open(bytes: Arc<Vec<u8>>) -> EngineResult<Self> {
        let doc = Document::from_bytes(bytes.as_slice(), PDF_MIME)
            .map_err(|e| EngineError::Open(e.to_string()))?;

        let page_count = doc.page_count()?;
        let mut page_sizes = Vec::with_capacity(page_count.max(0) as usize);
        for index in 0..page_count {
            let bounds = doc.load_page(index)?.bounds()?;
            page_sizes.push(PageSize {
                width: bounds.x1 - bounds.x0,
                height: bounds.y1 - bounds.y0,
            });
        }

        Ok(Self {
            bytes,
            page_sizes,
            lock: Mutex::new(()),
        })
    }

    pub fn page_count(&self) -> usize {
        self.page_sizes.len()
    }

    pub fn page_sizes(&self) -> &[PageSize] {
        &self.page_sizes
    }

    pub fn page_size(&self, index: usize) -> EngineResult<PageSize> {
        self.page_sizes
            .get(index)
            .copied()
            .ok_or(EngineError::PageNotFound {
                index,
                count: self.page_count(),
            })
    }

    /// Page indices for an optional single-page selector
    pub fn select_pages(&self, page_index: Option<usize>) -> EngineResult<Vec<usize>> {
        match page_index {
            Some(index) => {
                self.page_size(index)?;
                Ok(vec![index])
            }
            None => Ok((0..self.page_count()).collect()),
        }
    }

    pub fn with_doc<F, R>(&self, f: F) -> EngineResult<R>
    where
        F: FnOnce(&Document) -> EngineResult<R>,
    {
        let _guard = self.lock.lock();
        let doc = Document::from_bytes(self.bytes.as_slice(), PDF_MIME)?;
        f(&doc)
    }

    /// Like `with_doc`, for operations that need the PDF object model
    pub fn with_pdf<F, R>(&self, f: F) -> EngineResult<R>
    where
        F: FnOnce(&PdfDocument) -> EngineResult<R>,
    {
        let _guard = self.lock.lock();
        let doc = PdfDocument::from_bytes(self.bytes.as_slice())?;
        f(&doc)
    }

    /// Metadata, geometry and text-layer summary
    pub fn info(&self) -> EngineResult<DocumentInfo> {
        let (metadata, has_text_layer) = self.with_doc(|doc| {
            let metadata = read_metadata(doc);

            let mut has_text_layer = false;
            for index in 0..self.page_count().min(TEXT_LAYER_SAMPLE_PAGES) {
                let page = doc.load_page(index as i32)?;
                if let Ok(text) = page.to_text() {
                    if !text.trim().is_empty() {
                        has_text_layer = true;
                        break;
                    }
                }
            }

            Ok((metadata, has_text_layer))
        })?;

        let orientation = self
            .page_sizes
            .first()
            .map(PageSize::orientation)
            .unwrap_or(crate::engine::PageOrientation::Portrait);

        Ok(DocumentInfo {
            page_count: self.page_count(),
            page_sizes: self.page_sizes.clone(),
            metadata,
            has_text_layer,
            orientation,
        })
    }
}

fn read_metadata(doc: &Document) -> DocumentMetadata {
    let get = |name: MetadataName| -> Option<String> {
        doc.metadata(name).ok().filter(|s| !s.trim().is_empty())
    };

    DocumentMetadata {
        title: get(MetadataName::Title),
        author: get(MetadataName::Author),
        subject: get(MetadataName::Subject),
        keywords: get(MetadataName::Keywords)
            .map(|k| {
                k.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
        creator: get(MetadataName::Creator),
        producer: get(MetadataName::Producer),
        creation_date: get(MetadataName::CreationDate),
        modification_date: get(MetadataName::ModDate),
    }
}
