//! Audio extractor: Whisper transcript segments with time ranges.

use super::{Extraction, Extractor, TextSpan};
use crate::error::{IngestError, IngestResult};
use murag_core::{DocumentType, Locator};
use murag_process::transcribe_audio;
use std::path::Path;
use tracing::info;

/// Extractor for audio files.
/// Transcribes directly using Whisper.
pub struct AudioExtractor {
    /// Whisper model (tiny, base, small, medium, large); `None` disables transcription.
    whisper_model: Option<String>,
}

impl AudioExtractor {
    pub fn new(whisper_model: Option<String>) -> Self {
        Self { whisper_model }
    }
}

impl Extractor for AudioExtractor {
    fn extract(&self, path: &Path) -> IngestResult<Extraction> {
        let model = self
            .whisper_model
            .as_deref()
            .ok_or(IngestError::Disabled("Transcription"))?;

        let temp_dir = tempfile::tempdir()?;

        info!("Transcribing {:?} with Whisper ({})", path, model);
        let segments = transcribe_audio(path, model, None, temp_dir.path())?;
        info!("Transcribed {} segments", segments.len());

        let duration = segments.last().map(|s| s.end).unwrap_or(0.0);
        let metadata = serde_json::json!({
            "format": "audio",
            "duration": duration,
            "segment_count": segments.len(),
            "whisper_model": model,
        });

        let spans = segments
            .into_iter()
            .map(|s| {
                TextSpan::new(
                    s.text,
                    Locator::TimeRange {
                        start: s.start,
                        end: s.end,
                    },
                )
            })
            .collect();

        Ok(Extraction::new(spans).with_metadata(metadata))
    }

    fn doc_type(&self) -> DocumentType {
        DocumentType::Audio
    }
}
