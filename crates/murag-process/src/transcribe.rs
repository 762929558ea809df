//! Audio transcription using Whisper.

use crate::error::{ProcessError, ProcessResult};
use crate::require_tool;
use serde::Deserialize;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

/// A segment of transcribed audio.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSegment {
    /// The transcribed text.
    pub text: String,
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
}

#[derive(Debug, Deserialize)]
struct WhisperJsonOutput {
    segments: Vec<WhisperSegment>,
    #[serde(default)]
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    text: String,
    start: f64,
    end: f64,
}

/// Transcribe an audio file using Whisper.
///
/// Requires the `whisper` CLI to be installed (pip install openai-whisper).
/// `language` of `None` lets Whisper detect it.
pub fn transcribe_audio(
    audio_path: &Path,
    model: &str,
    language: Option<&str>,
    output_dir: &Path,
) -> ProcessResult<Vec<TranscriptSegment>> {
    if !audio_path.exists() {
        return Err(ProcessError::FileNotFound(audio_path.to_path_buf()));
    }
    require_tool("whisper")?;

    info!("Transcribing {:?} with model '{}'", audio_path, model);

    let mut cmd = Command::new("whisper");
    cmd.arg(audio_path)
        .args(["--model", model])
        .args(["--output_format", "json"])
        .arg("--output_dir")
        .arg(output_dir);
    if let Some(lang) = language {
        cmd.args(["--language", lang]);
    }

    let output = cmd.output()?;

    if !output.status.success() {
        return Err(ProcessError::TranscriptionError(
            String::from_utf8_lossy(&output.stderr).to_string(),
        ));
    }

    let stem = audio_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("audio");
    let json_path = output_dir.join(format!("{}.json", stem));

    if !json_path.exists() {
        return Err(ProcessError::TranscriptionError(
            "Whisper output file not found".to_string(),
        ));
    }

    let json_content = std::fs::read_to_string(&json_path)?;
    let segments = parse_whisper_json(&json_content)?;

    debug!("Transcribed {} segments", segments.len());
    Ok(segments)
}

/// Parse Whisper's JSON output into trimmed, non-empty segments.
pub fn parse_whisper_json(json: &str) -> ProcessResult<Vec<TranscriptSegment>> {
    let output: WhisperJsonOutput = serde_json::from_str(json)
        .map_err(|e| ProcessError::ParseError(format!("Failed to parse Whisper output: {}", e)))?;

    if let Some(lang) = &output.language {
        debug!("Whisper detected language: {}", lang);
    }

    Ok(output
        .segments
        .into_iter()
        .filter_map(|s| {
            let text = s.text.trim();
            (!text.is_empty() && s.end >= s.start).then(|| TranscriptSegment {
                text: text.to_string(),
                start: s.start,
                end: s.end,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whisper_json() {
        let json = r#"{
            "text": " Hello there. We ship Friday.",
            "language": "en",
            "segments": [
                {"id": 0, "start": 0.0, "end": 2.5, "text": " Hello there."},
                {"id": 1, "start": 2.5, "end": 2.5, "text": "   "},
                {"id": 2, "start": 155.0, "end": 158.2, "text": " We ship Friday."}
            ]
        }"#;

        let segments = parse_whisper_json(json).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "Hello there.");
        assert_eq!(segments[1].start, 155.0);
    }

    #[test]
    fn test_parse_whisper_json_rejects_garbage() {
        assert!(matches!(
            parse_whisper_json("not json"),
            Err(ProcessError::ParseError(_))
        ));
    }

    #[test]
    fn test_transcribe_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err =
            transcribe_audio(Path::new("/nope/talk.mp3"), "base", None, dir.path()).unwrap_err();
        assert!(matches!(err, ProcessError::FileNotFound(_)));
    }
}
