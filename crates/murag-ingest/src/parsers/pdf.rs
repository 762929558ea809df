//! PDF extractor: text layer per page, OCR for scanned pages.

use super::{Extraction, Extractor, TextSpan};
use crate::error::{IngestError, IngestResult};
use murag_core::{DocumentType, Locator};
use murag_process::{ocr_image, rasterize_pdf_page};
use std::path::Path;
use tracing::{debug, info};

const RASTER_DPI: u32 = 200;

/// Extractor for PDF files.
pub struct PdfExtractor {
    /// OCR language for pages without a text layer; `None` disables the fallback.
    ocr_language: Option<String>,
}

impl PdfExtractor {
    pub fn new(ocr_language: Option<String>) -> Self {
        Self { ocr_language }
    }

    fn ocr_page(&self, path: &Path, page: u32, language: &str) -> IngestResult<Vec<TextSpan>> {
        let dir = tempfile::tempdir()?;
        let image = rasterize_pdf_page(path, page, RASTER_DPI, dir.path())?;
        let result = ocr_image(&image, language)?;

        Ok(result
            .blocks
            .into_iter()
            .map(|block| {
                TextSpan::new(
                    block.text,
                    Locator::Region {
                        page: Some(page),
                        region: block.region,
                    },
                )
            })
            .collect())
    }
}

impl Extractor for PdfExtractor {
    fn extract(&self, path: &Path) -> IngestResult<Extraction> {
        if !path.exists() {
            return Err(IngestError::FileNotFound(path.to_path_buf()));
        }

        debug!("Extracting PDF: {:?}", path);

        let raw = pdf_extract::extract_text(path).map_err(|e| IngestError::ParseError {
            path: path.to_path_buf(),
            message: format!("Failed to extract text from PDF: {}", e),
        })?;

        let pages = split_pages(&raw);
        let mut spans = Vec::new();
        let mut ocr_pages = 0;

        for (i, text) in pages.iter().enumerate() {
            let page = i as u32 + 1;
            if !text.is_empty() {
                spans.push(TextSpan::new(text.clone(), Locator::Page { page }));
            } else if let Some(language) = &self.ocr_language {
                info!("Page {} has no text layer, running OCR", page);
                spans.extend(self.ocr_page(path, page, language)?);
                ocr_pages += 1;
            }
        }

        debug!("Extracted {} spans from {} PDF pages", spans.len(), pages.len());

        Ok(Extraction::new(spans).with_metadata(serde_json::json!({
            "format": "pdf",
            "pages": pages.len(),
            "ocr_pages": ocr_pages,
        })))
    }

    fn doc_type(&self) -> DocumentType {
        DocumentType::Pdf
    }
}

/// Split extracted PDF text into cleaned pages on form feeds.
pub fn split_pages(text: &str) -> Vec<String> {
    let mut pages: Vec<String> = text.split('\x0C').map(clean_pdf_text).collect();
    // A trailing form feed ends the last page rather than starting a new one.
    if pages.len() > 1 && pages.last().map(|p| p.is_empty()).unwrap_or(false) {
        pages.pop();
    }
    pages
}

/// Trim lines and collapse runs of blank lines.
fn clean_pdf_text(text: &str) -> String {
    text.lines()
        .map(|line| line.trim())
        .fold(Vec::new(), |mut acc: Vec<&str>, line| {
            let last_was_empty = acc.last().map(|s| s.is_empty()).unwrap_or(true);
            if !(line.is_empty() && last_was_empty) {
                acc.push(line);
            }
            acc
        })
        .join("\n")
        .trim()
        .to_string()
}
