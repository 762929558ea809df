//! Content chunking for retrieval.
//!
//! Chunks never cross a locator boundary: page and region text is split
//! inside its span, and transcript segments are merged into time windows
//! only while they are contiguous.

use crate::parsers::TextSpan;
use murag_config::ProcessingConfig;
use murag_core::{Chunk, DocumentId, Locator};

/// Largest silence (seconds) allowed inside one transcript window.
const MAX_SEGMENT_GAP: f64 = 2.0;

/// Configuration for chunking.
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Target size of each chunk in characters.
    pub chunk_size: usize,
    /// Number of characters to overlap between chunks.
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
        }
    }
}

impl ChunkConfig {
    /// Create config from processing settings.
    pub fn from_processing_config(config: &ProcessingConfig) -> Self {
        Self {
            // Config is in tokens; roughly 4 characters per token
            chunk_size: config.chunk_size * 4,
            chunk_overlap: config.chunk_overlap * 4,
        }
    }
}

/// One merged window of transcript text.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptWindow {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

/// Content chunker for splitting extracted spans.
pub struct Chunker {
    config: ChunkConfig,
}

impl Chunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    /// Create a chunker with default configuration.
    pub fn default_chunker() -> Self {
        Self::new(ChunkConfig::default())
    }

    /// Chunk a document's spans, numbering chunks in document order.
    pub fn chunk_spans(&self, document_id: &DocumentId, spans: &[TextSpan]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut i = 0;

        while i < spans.len() {
            if let Locator::TimeRange { .. } = spans[i].locator {
                let run_end = spans[i..]
                    .iter()
                    .position(|s| !matches!(s.locator, Locator::TimeRange { .. }))
                    .map(|offset| i + offset)
                    .unwrap_or(spans.len());

                for window in self.chunk_transcript(&spans[i..run_end]) {
                    let index = chunks.len() as i32;
                    chunks.push(Chunk::new(
                        document_id.clone(),
                        index,
                        window.text,
                        Locator::TimeRange {
                            start: window.start,
                            end: window.end,
                        },
                    ));
                }
                i = run_end;
            } else {
                for piece in self.chunk_text(&spans[i].text) {
                    let index = chunks.len() as i32;
                    chunks.push(Chunk::new(
                        document_id.clone(),
                        index,
                        piece,
                        spans[i].locator.clone(),
                    ));
                }
                i += 1;
            }
        }

        chunks
    }

    /// Split text into pieces of at most `chunk_size` characters.
    /// Works by splitting on paragraph/sentence boundaries where possible.
    pub fn chunk_text(&self, text: &str) -> Vec<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return vec![];
        }

        let size = self.config.chunk_size.max(1);
        if char_len(trimmed) <= size {
            return vec![trimmed.to_string()];
        }

        let mut pieces = Vec::new();
        let mut current = String::new();

        for para in trimmed.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
            let units: Vec<String> = if char_len(para) <= size {
                vec![para.to_string()]
            } else {
                self.split_sentences(para)
                    .into_iter()
                    .flat_map(|sentence| {
                        if char_len(sentence) > size {
                            self.force_split_by_chars(sentence)
                        } else {
                            vec![sentence.to_string()]
                        }
                    })
                    .collect()
            };

            for (n, unit) in units.iter().enumerate() {
                let sep = if n == 0 { "\n\n" } else { " " };
                let unit_len = char_len(unit);

                if !current.is_empty() && char_len(&current) + sep.len() + unit_len > size {
                    pieces.push(current.trim().to_string());
                    let tail = self.overlap_tail(&current);
                    current = if !tail.is_empty() && char_len(&tail) + sep.len() + unit_len <= size {
                        tail
                    } else {
                        String::new()
                    };
                }

                if !current.is_empty() {
                    current.push_str(sep);
                }
                current.push_str(unit);
            }
        }

        let last = current.trim();
        if !last.is_empty() {
            pieces.push(last.to_string());
        }

        pieces
    }

    /// Merge contiguous transcript spans into windows of about `chunk_size` characters.
    pub fn chunk_transcript(&self, spans: &[TextSpan]) -> Vec<TranscriptWindow> {
        let segments: Vec<(&str, f64, f64)> = spans
            .iter()
            .filter_map(|s| match s.locator {
                Locator::TimeRange { start, end } if !s.text.trim().is_empty() => {
                    Some((s.text.trim(), start, end))
                }
                _ => None,
            })
            .collect();

        let mut windows = Vec::new();
        let mut window: Vec<(&str, f64, f64)> = Vec::new();

        for segment in segments {
            if let Some(last) = window.last() {
                let gap = segment.1 - last.2 > MAX_SEGMENT_GAP;
                let len: usize = window.iter().map(|(t, _, _)| char_len(t) + 1).sum();

                if gap || len + char_len(segment.0) > self.config.chunk_size {
                    windows.push(build_window(&window));
                    window = if gap {
                        Vec::new()
                    } else {
                        self.carry_over(&window)
                    };
                }
            }
            window.push(segment);
        }

        if !window.is_empty() {
            windows.push(build_window(&window));
        }

        windows
    }

    /// Trailing segments that fit in the overlap, never the whole window.
    fn carry_over<'a>(&self, window: &[(&'a str, f64, f64)]) -> Vec<(&'a str, f64, f64)> {
        let mut total = 0;
        let mut keep = 0;
        for (text, _, _) in window.iter().rev().take(window.len().saturating_sub(1)) {
            total += char_len(text) + 1;
            if total > self.config.chunk_overlap {
                break;
            }
            keep += 1;
        }
        window[window.len() - keep..].to_vec()
    }

    /// Last `chunk_overlap` characters of `text`, starting on a word boundary.
    fn overlap_tail(&self, text: &str) -> String {
        let overlap = self.config.chunk_overlap;
        if overlap == 0 {
            return String::new();
        }
        let chars: Vec<char> = text.trim().chars().collect();
        let skip = chars.len().saturating_sub(overlap);
        let tail: String = chars[skip..].iter().collect();

        if skip > 0 && !chars[skip - 1].is_whitespace() {
            match tail.find(char::is_whitespace) {
                Some(pos) => tail[pos..].trim().to_string(),
                None => String::new(),
            }
        } else {
            tail.trim().to_string()
        }
    }

    /// Force split text by character limit (for content without natural breaks).
    fn force_split_by_chars(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        chars
            .chunks(self.config.chunk_size.max(1))
            .map(|c| c.iter().collect())
            .collect()
    }

    /// Split text into sentences.
    fn split_sentences<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut sentences = Vec::new();
        let mut start = 0;

        for (i, c) in text.char_indices() {
            if c == '.' || c == '!' || c == '?' {
                let next_idx = i + c.len_utf8();
                if next_idx >= text.len()
                    || text[next_idx..].starts_with(' ')
                    || text[next_idx..].starts_with('\n')
                {
                    let sentence = text[start..next_idx].trim();
                    if !sentence.is_empty() {
                        sentences.push(sentence);
                    }
                    start = next_idx;
                }
            }
        }

        let remaining = text[start..].trim();
        if !remaining.is_empty() {
            sentences.push(remaining);
        }

        sentences
    }
}

fn build_window(segments: &[(&str, f64, f64)]) -> TranscriptWindow {
    TranscriptWindow {
        text: segments
            .iter()
            .map(|(t, _, _)| *t)
            .collect::<Vec<_>>()
            .join(" "),
        start: segments.first().map(|s| s.1).unwrap_or(0.0),
        end: segments.last().map(|s| s.2).unwrap_or(0.0),
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(chunk_size: usize, chunk_overlap: usize) -> Chunker {
        Chunker::new(ChunkConfig {
            chunk_size,
            chunk_overlap,
        })
    }

    fn segment(text: &str, start: f64, end: f64) -> TextSpan {
        TextSpan::new(text, Locator::TimeRange { start, end })
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunker = Chunker::default_chunker();
        let pieces = chunker.chunk_text("  This is a small piece of text.  ");
        assert_eq!(pieces, vec!["This is a small piece of text."]);
    }

    #[test]
    fn test_empty_text() {
        let chunker = Chunker::default_chunker();
        assert!(chunker.chunk_text("").is_empty());
        assert!(chunker.chunk_text("   ").is_empty());
    }

    #[test]
    fn test_large_text_respects_size() {
        let chunker = small(100, 20);
        let text = "This is sentence one. This is sentence two. This is sentence three. \
                    This is sentence four. This is sentence five. This is sentence six. \
                    This is sentence seven. This is sentence eight. This is sentence nine.";

        let pieces = chunker.chunk_text(text);

        assert!(pieces.len() > 1, "expected several chunks, got {}", pieces.len());
        for piece in &pieces {
            assert!(!piece.is_empty());
            assert!(piece.chars().count() <= 100, "chunk too long: {:?}", piece);
        }
        assert!(pieces.last().unwrap().ends_with("sentence nine."));
    }

    #[test]
    fn test_utf8_text() {
        let chunker = small(20, 5);
        let text = "Hello ─── World! This has unicode: 日本語 and more ─ content here.";

        let pieces = chunker.chunk_text(text);
        assert!(!pieces.is_empty());
        for piece in &pieces {
            assert!(piece.chars().count() <= 20);
        }
    }

    #[test]
    fn test_unbroken_text_is_force_split() {
        let chunker = small(10, 0);
        let pieces = chunker.chunk_text(&"x".repeat(25));
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[2], "xxxxx");
    }

    #[test]
    fn test_chunks_never_cross_pages() {
        let chunker = Chunker::default_chunker();
        let spans = vec![
            TextSpan::new("End of chapter one.", Locator::Page { page: 1 }),
            TextSpan::new("Start of chapter two.", Locator::Page { page: 2 }),
        ];

        let chunks = chunker.chunk_spans(&"doc".to_string(), &spans);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].locator, Locator::Page { page: 1 });
        assert_eq!(chunks[1].locator, Locator::Page { page: 2 });
        assert_eq!(chunks[1].chunk_index, 1);
    }

    #[test]
    fn test_transcript_windows_keep_times() {
        let chunker = small(30, 0);
        let spans = vec![
            segment("Hello world", 0.0, 1.0),
            segment("This is a test", 1.0, 2.0),
            segment("More content here", 2.0, 3.5),
        ];

        let windows = chunker.chunk_transcript(&spans);

        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].text, "Hello world This is a test");
        assert_eq!((windows[0].start, windows[0].end), (0.0, 2.0));
        assert_eq!((windows[1].start, windows[1].end), (2.0, 3.5));
    }

    #[test]
    fn test_transcript_splits_on_silence() {
        let chunker = Chunker::default_chunker();
        let spans = vec![
            segment("Before the break.", 0.0, 4.0),
            segment("After the break.", 60.0, 63.0),
        ];

        let chunks = chunker.chunk_spans(&"doc".to_string(), &spans);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].locator, Locator::TimeRange { start: 60.0, end: 63.0 });
        assert_eq!(chunks[1].locator.timestamp().as_deref(), Some("00:01:00"));
    }

    #[test]
    fn test_transcript_overlap_carries_last_segment() {
        let chunker = small(30, 15);
        let spans = vec![
            segment("First sentence.", 0.0, 1.0),
            segment("Second one.", 1.0, 2.0),
            segment("Third sentence.", 2.0, 3.0),
        ];

        let windows = chunker.chunk_transcript(&spans);

        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1].text, "Second one. Third sentence.");
        assert_eq!(windows[1].start, 1.0);
    }
}
