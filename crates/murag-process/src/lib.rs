//! MuRAG Process - OCR, speech-to-text and page rasterization.
//!
//! This crate provides:
//! - OCR with word regions (via Tesseract CLI)
//! - Audio transcription with timestamps (via Whisper CLI)
//! - PDF page rasterization for scanned pages (via pdftoppm)
//!
//! These rely on external tools being installed on the system.

mod error;
mod ocr;
mod rasterize;
mod transcribe;

pub use error::{ProcessError, ProcessResult};
pub use ocr::{ocr_image, parse_tsv, OcrBlock, OcrResult};
pub use rasterize::rasterize_pdf_page;
pub use transcribe::{parse_whisper_json, transcribe_audio, TranscriptSegment};

/// Check if required external tools are available.
pub fn check_dependencies() -> Vec<(&'static str, bool)> {
    vec![
        ("tesseract", which::which("tesseract").is_ok()),
        ("whisper", which::which("whisper").is_ok()),
        ("pdftoppm", which::which("pdftoppm").is_ok()),
    ]
}

/// Check if all required tools are installed.
pub fn all_tools_available() -> bool {
    check_dependencies().iter().all(|(_, available)| *available)
}

/// Fail with `ToolNotFound` unless `tool` is on the PATH.
pub(crate) fn require_tool(tool: &str) -> ProcessResult<()> {
    which::which(tool)
        .map(|_| ())
        .map_err(|_| ProcessError::ToolNotFound {
            tool: tool.to_string(),
        })
}
