//! Per-modality text extractors.
//!
//! Every extractor turns a stored file into [`TextSpan`]s that carry the
//! locator (page, image region or time range) the text came from.

mod audio;
mod docx;
mod image;
mod pdf;

pub use audio::AudioExtractor;
pub use docx::{parse_document_xml, DocxExtractor};
pub use image::ImageExtractor;
pub use pdf::{split_pages, PdfExtractor};

use crate::error::IngestResult;
use murag_config::ProcessingConfig;
use murag_core::{DocumentType, Locator};
use std::path::Path;

/// A piece of extracted text and where it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    pub locator: Locator,
}

impl TextSpan {
    pub fn new(text: impl Into<String>, locator: Locator) -> Self {
        Self {
            text: text.into(),
            locator,
        }
    }
}

/// Everything an extractor produced for one file.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Spans in document order.
    pub spans: Vec<TextSpan>,
    /// Merged into the document's metadata (page count, duration, ...).
    pub metadata: serde_json::Value,
}

impl Extraction {
    pub fn new(spans: Vec<TextSpan>) -> Self {
        Self {
            spans,
            metadata: serde_json::json!({}),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// True when no span contains any text.
    pub fn is_empty(&self) -> bool {
        self.spans.iter().all(|s| s.text.trim().is_empty())
    }
}

/// Trait for modality extractors.
pub trait Extractor: Send + Sync {
    /// Extract text spans from the file at `path`.
    fn extract(&self, path: &Path) -> IngestResult<Extraction>;

    /// The document type this extractor handles.
    fn doc_type(&self) -> DocumentType;
}

/// Extraction switches taken from `[processing]`.
#[derive(Debug, Clone)]
pub struct ExtractorSettings {
    pub ocr_enabled: bool,
    pub ocr_language: String,
    pub transcribe: bool,
    pub whisper_model: String,
}

impl ExtractorSettings {
    pub fn from_processing_config(config: &ProcessingConfig) -> Self {
        Self {
            ocr_enabled: config.ocr_enabled,
            ocr_language: config.ocr_language.clone(),
            transcribe: config.transcribe,
            whisper_model: config.whisper_model.clone(),
        }
    }
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self::from_processing_config(&ProcessingConfig::default())
    }
}

/// Get the extractor for a document type.
pub fn extractor_for(doc_type: DocumentType, settings: &ExtractorSettings) -> Box<dyn Extractor> {
    let ocr_language = settings.ocr_enabled.then(|| settings.ocr_language.clone());
    match doc_type {
        DocumentType::Pdf => Box::new(PdfExtractor::new(ocr_language)),
        DocumentType::Docx => Box::new(DocxExtractor::new()),
        DocumentType::Image => Box::new(ImageExtractor::new(ocr_language)),
        DocumentType::Audio => Box::new(AudioExtractor::new(
            settings.transcribe.then(|| settings.whisper_model.clone()),
        )),
    }
}
