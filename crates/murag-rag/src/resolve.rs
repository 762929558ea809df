//! Citation previews: the cited text plus a modality-specific view of its source.

use crate::error::{RagError, RagResult};
use murag_core::{parse_timestamp, Chunk, Citation, DocumentType, Locator, Region};
use murag_db::Database;
use serde::Serialize;

/// One transcript chunk shown around an audio citation.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptLine {
    pub chunk_id: String,
    pub start: f64,
    pub end: f64,
    pub text: String,
    /// True for the chunk the citation points at.
    pub cited: bool,
}

/// What to show for the cited location.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Preview {
    /// A page of a PDF or DOCX with all text extracted from that page.
    Page {
        page: u32,
        page_text: String,
        /// Set when the text came from OCR of a scanned page.
        region: Option<Region>,
    },
    /// A box to highlight on the original image.
    ImageRegion {
        region: Option<Region>,
        blob_path: String,
    },
    /// A stretch of audio; players should seek to `seek_seconds`.
    AudioRange {
        start: f64,
        end: f64,
        seek_seconds: f64,
        window: Vec<TranscriptLine>,
    },
}

/// A resolved citation.
#[derive(Debug, Clone, Serialize)]
pub struct CitationPreview {
    pub citation_id: String,
    pub document_id: String,
    pub source: String,
    pub doc_type: DocumentType,
    pub label: String,
    /// Exact text of the cited chunk.
    pub chunk_text: String,
    pub preview: Preview,
}

/// Resolve a citation into a preview bound to it.
pub fn resolve(db: &Database, citation_id: &str) -> RagResult<CitationPreview> {
    let citation = db.get_citation(citation_id)?;
    let chunk = db.get_chunk(&citation.chunk_id)?;
    let document = db.get_document(&citation.document_id)?;

    let preview = match citation.doc_type {
        DocumentType::Pdf | DocumentType::Docx => {
            let page = chunk.locator.page().unwrap_or(1);
            let page_text = db
                .get_chunks_by_document(&document.id)?
                .into_iter()
                .filter(|c| c.locator.page() == Some(page))
                .map(|c| c.content)
                .collect::<Vec<_>>()
                .join("\n\n");
            let region = match &chunk.locator {
                Locator::Region { region, .. } => Some(*region),
                _ => None,
            };
            Preview::Page {
                page,
                page_text,
                region,
            }
        }
        DocumentType::Image => Preview::ImageRegion {
            region: match &chunk.locator {
                Locator::Region { region, .. } => Some(*region),
                _ => None,
            },
            blob_path: document.blob_path.clone(),
        },
        DocumentType::Audio => {
            let (start, end) = match chunk.locator {
                Locator::TimeRange { start, end } => (start, end),
                _ => (0.0, 0.0),
            };
            let neighbours = db.get_chunks_by_document(&document.id)?;
            Preview::AudioRange {
                start,
                end,
                seek_seconds: seek_offset(&citation, &chunk)?,
                window: transcript_window(&neighbours, &chunk),
            }
        }
    };

    Ok(CitationPreview {
        citation_id: citation.id.clone(),
        document_id: document.id,
        source: citation.source.clone(),
        doc_type: citation.doc_type,
        label: citation.label(),
        chunk_text: chunk.content,
        preview,
    })
}

/// Playback offset for an audio citation: its encoded timestamp, else the chunk start.
pub fn seek_offset(citation: &Citation, chunk: &Chunk) -> RagResult<f64> {
    match &citation.timestamp {
        Some(ts) => parse_timestamp(ts).map_err(|_| RagError::InvalidTimestamp(ts.clone())),
        None => Ok(match chunk.locator {
            Locator::TimeRange { start, .. } => start,
            _ => 0.0,
        }),
    }
}

/// The cited chunk with the transcript chunk on either side.
fn transcript_window(chunks: &[Chunk], cited: &Chunk) -> Vec<TranscriptLine> {
    chunks
        .iter()
        .filter(|c| (c.chunk_index - cited.chunk_index).abs() <= 1)
        .filter_map(|c| match c.locator {
            Locator::TimeRange { start, end } => Some(TranscriptLine {
                chunk_id: c.id.clone(),
                start,
                end,
                text: c.content.clone(),
                cited: c.id == cited.id,
            }),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::seed_document;
    use murag_core::{Conversation, Message};

    fn cite(db: &Database, chunk: &Chunk, source: &str, doc_type: DocumentType) -> Citation {
        let conversation = Conversation::new();
        db.create_conversation(&conversation).unwrap();

        let mut message = Message::assistant(conversation.id.clone(), "answer [1]");
        let citation = Citation::new(message.id.clone(), 1, chunk, source, doc_type, 0.9);
        message.citations.push(citation.clone());
        db.append_message(&message).unwrap();
        citation
    }

    #[test]
    fn test_resolve_audio_seeks_to_timestamp() {
        let db = Database::open_in_memory().unwrap();
        let (_, chunks) = seed_document(
            &db,
            "standup.mp3",
            DocumentType::Audio,
            &[
                ("Morning everyone.", Locator::TimeRange { start: 0.0, end: 30.0 }),
                ("We ship on Friday.", Locator::TimeRange { start: 155.7, end: 170.0 }),
                ("Any blockers?", Locator::TimeRange { start: 170.0, end: 180.0 }),
                ("Thanks all.", Locator::TimeRange { start: 300.0, end: 305.0 }),
            ],
        );
        let citation = cite(&db, &chunks[1], "standup.mp3", DocumentType::Audio);
        assert_eq!(citation.timestamp.as_deref(), Some("00:02:35"));

        let preview = resolve(&db, &citation.id).unwrap();
        assert_eq!(preview.citation_id, citation.id);
        assert_eq!(preview.chunk_text, "We ship on Friday.");
        assert_eq!(preview.label, "standup.mp3 @ 00:02:35");

        match preview.preview {
            Preview::AudioRange {
                start,
                seek_seconds,
                window,
                ..
            } => {
                assert_eq!(start, 155.7);
                assert_eq!(seek_seconds, 155.0);
                assert_eq!(window.len(), 3);
                assert!(window[1].cited);
                assert!(!window[0].cited);
            }
            other => panic!("expected audio preview, got {:?}", other),
        }

        // Opening it again lands on the same offset.
        let again = resolve(&db, &citation.id).unwrap();
        assert!(matches!(again.preview, Preview::AudioRange { seek_seconds, .. } if seek_seconds == 155.0));
    }

    #[test]
    fn test_resolve_page_collects_page_text() {
        let db = Database::open_in_memory().unwrap();
        let (_, chunks) = seed_document(
            &db,
            "handbook.pdf",
            DocumentType::Pdf,
            &[
                ("Refunds take 14 days.", Locator::Page { page: 4 }),
                ("Contact billing.", Locator::Page { page: 4 }),
                ("Shipping is free.", Locator::Page { page: 5 }),
            ],
        );
        let citation = cite(&db, &chunks[0], "handbook.pdf", DocumentType::Pdf);

        let preview = resolve(&db, &citation.id).unwrap();
        match preview.preview {
            Preview::Page { page, page_text, region } => {
                assert_eq!(page, 4);
                assert_eq!(page_text, "Refunds take 14 days.\n\nContact billing.");
                assert!(region.is_none());
            }
            other => panic!("expected page preview, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_image_region() {
        let db = Database::open_in_memory().unwrap();
        let region = Region::new(10, 20, 300, 40);
        let (_, chunks) = seed_document(
            &db,
            "whiteboard.png",
            DocumentType::Image,
            &[("Q3 goals", Locator::Region { page: None, region })],
        );
        let citation = cite(&db, &chunks[0], "whiteboard.png", DocumentType::Image);

        let preview = resolve(&db, &citation.id).unwrap();
        let json = serde_json::to_value(&preview).unwrap();
        assert_eq!(json["preview"]["kind"], "image_region");
        assert_eq!(json["preview"]["region"]["width"], 300);
        assert_eq!(json["preview"]["blob_path"], "/blobs/whiteboard.png");
    }

    #[test]
    fn test_resolve_unknown_citation() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(resolve(&db, "nope"), Err(RagError::NotFound(_))));
    }

    #[test]
    fn test_seek_offset_rejects_bad_timestamp() {
        let chunk = Chunk::new("d".into(), 0, "t", Locator::TimeRange { start: 3.0, end: 4.0 });
        let mut citation = Citation::new("m".into(), 1, &chunk, "a.mp3", DocumentType::Audio, 1.0);
        assert_eq!(seek_offset(&citation, &chunk).unwrap(), 3.0);

        citation.timestamp = Some("xx:yy".into());
        assert!(matches!(
            seek_offset(&citation, &chunk),
            Err(RagError::InvalidTimestamp(_))
        ));

        citation.timestamp = None;
        assert_eq!(seek_offset(&citation, &chunk).unwrap(), 3.0);
    }
}
