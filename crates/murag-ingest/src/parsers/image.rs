//! Image extractor: OCR text blocks with their bounding regions.

use super::{Extraction, Extractor, TextSpan};
use crate::error::{IngestError, IngestResult};
use murag_core::{DocumentType, Locator};
use murag_process::ocr_image;
use std::path::Path;
use tracing::info;

/// Extractor for images.
pub struct ImageExtractor {
    /// Tesseract language; `None` when OCR is switched off.
    ocr_language: Option<String>,
}

impl ImageExtractor {
    pub fn new(ocr_language: Option<String>) -> Self {
        Self { ocr_language }
    }
}

impl Extractor for ImageExtractor {
    fn extract(&self, path: &Path) -> IngestResult<Extraction> {
        let language = self.ocr_language.as_deref().ok_or(IngestError::Disabled("OCR"))?;

        info!("Running OCR on image {:?}", path);
        let result = ocr_image(path, language)?;

        let metadata = serde_json::json!({
            "format": "image",
            "ocr_engine": "tesseract",
            "ocr_language": language,
            "blocks": result.blocks.len(),
            "ocr_confidence": result.mean_confidence(),
        });

        let spans = result
            .blocks
            .into_iter()
            .map(|block| {
                TextSpan::new(
                    block.text,
                    Locator::Region {
                        page: None,
                        region: block.region,
                    },
                )
            })
            .collect();

        Ok(Extraction::new(spans).with_metadata(metadata))
    }

    fn doc_type(&self) -> DocumentType {
        DocumentType::Image
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_ocr() {
        let err = ImageExtractor::new(None)
            .extract(Path::new("scan.png"))
            .unwrap_err();
        assert!(matches!(err, IngestError::Disabled("OCR")));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_missing_image_is_not_retried() {
        let err = ImageExtractor::new(Some("eng".into()))
            .extract(Path::new("/no/such/scan.png"))
            .unwrap_err();
        assert!(!err.is_retryable());
    }
}
