//! Document text extraction.
//!
//! An extractor turns one document file into its full plain text, pages in
//! document order separated by a newline.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::ExtractionError;

/// Reads a document and returns its text. Implementations only read the file.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<String, ExtractionError>;

    /// Short name used in logs and stats.
    fn name(&self) -> &str;
}

/// Extracts text from PDF files with lopdf.
#[derive(Debug, Clone, Default)]
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    pub fn new() -> Self {
        Self
    }

    fn extract_blocking(path: PathBuf) -> Result<String, ExtractionError> {
        let bytes = std::fs::read(&path).map_err(|source| ExtractionError::Open {
            path: path.clone(),
            source,
        })?;
        let document =
            lopdf::Document::load_mem(&bytes).map_err(|e| ExtractionError::Parse {
                path: path.clone(),
                message: e.to_string(),
            })?;

        // get_pages is keyed by 1-based page number, so iteration is document order.
        let pages = document.get_pages();
        let mut page_texts = Vec::with_capacity(pages.len());
        for page_number in pages.keys() {
            match document.extract_text(&[*page_number]) {
                Ok(text) => page_texts.push(text),
                Err(e) => {
                    // An unreadable page contributes no text; the remaining pages are kept.
                    warn!(
                        "Skipping page {} of {}: {}",
                        page_number,
                        path.display(),
                        e
                    );
                    page_texts.push(String::new());
                }
            }
        }

        debug!("Extracted {} pages from {}", page_texts.len(), path.display());
        Ok(page_texts.join("\n"))
    }
}

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract(&self, path: &Path) -> Result<String, ExtractionError> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || Self::extract_blocking(path)).await?
    }

    fn name(&self) -> &str {
        "pdf"
    }
}

/// Reads UTF-8 text files. Form feeds mark page breaks and become newlines.
#[derive(Debug, Clone, Default)]
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, path: &Path) -> Result<String, ExtractionError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ExtractionError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        let text = String::from_utf8(bytes).map_err(|_| ExtractionError::Encoding {
            path: path.to_path_buf(),
        })?;
        Ok(text.split('\x0c').collect::<Vec<_>>().join("\n"))
    }

    fn name(&self) -> &str {
        "text"
    }
}

/// Pick the extractor for a document extension (`pdf` or `txt`).
pub fn extractor_for_extension(extension: &str) -> Option<Arc<dyn TextExtractor>> {
    match extension.to_ascii_lowercase().as_str() {
        "pdf" => Some(Arc::new(PdfTextExtractor::new())),
        "txt" | "text" => Some(Arc::new(PlainTextExtractor::new())),
        _ => None,
    }
}
