//! Core domain types for MuRAG.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::format_timestamp;

/// Unique identifier for documents.
pub type DocumentId = String;

/// Unique identifier for chunks.
pub type ChunkId = String;

/// Unique identifier for conversations.
pub type ConversationId = String;

/// Unique identifier for messages.
pub type MessageId = String;

/// Unique identifier for citations.
pub type CitationId = String;

/// Unique identifier for pipeline jobs.
pub type JobId = String;

/// Generate a new unique ID.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Modality of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Pdf,
    Docx,
    Image,
    Audio,
}

impl DocumentType {
    pub const ALL: [DocumentType; 4] = [
        DocumentType::Pdf,
        DocumentType::Docx,
        DocumentType::Image,
        DocumentType::Audio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Pdf => "pdf",
            DocumentType::Docx => "docx",
            DocumentType::Image => "image",
            DocumentType::Audio => "audio",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pdf" => Some(DocumentType::Pdf),
            "docx" => Some(DocumentType::Docx),
            "image" => Some(DocumentType::Image),
            "audio" => Some(DocumentType::Audio),
            _ => None,
        }
    }

    /// Detect document type from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(DocumentType::Pdf),
            "docx" => Some(DocumentType::Docx),
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" | "tif" | "tiff" => {
                Some(DocumentType::Image)
            }
            "mp3" | "wav" | "m4a" | "flac" | "ogg" | "aac" => Some(DocumentType::Audio),
            _ => None,
        }
    }

    /// Detect document type from a MIME type such as `image/png`.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.split(';').next().unwrap_or("").trim().to_lowercase();
        match mime.as_str() {
            "application/pdf" => Some(DocumentType::Pdf),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(DocumentType::Docx)
            }
            m if m.starts_with("image/") => Some(DocumentType::Image),
            m if m.starts_with("audio/") => Some(DocumentType::Audio),
            _ => None,
        }
    }

    /// Classify an upload by its filename extension, falling back to the MIME type.
    pub fn classify(filename: &str, mime: Option<&str>) -> Option<Self> {
        std::path::Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
            .or_else(|| mime.and_then(Self::from_mime))
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Processing status of a document as shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    #[default]
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Processing => "processing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "processing" => Some(DocumentStatus::Processing),
            "completed" => Some(DocumentStatus::Completed),
            "failed" => Some(DocumentStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fine-grained pipeline stage a document is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    #[default]
    Queued,
    TextExtraction,
    Ocr,
    Transcription,
    Embedding,
    Indexed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Queued => "queued",
            PipelineStage::TextExtraction => "text_extraction",
            PipelineStage::Ocr => "ocr",
            PipelineStage::Transcription => "transcription",
            PipelineStage::Embedding => "embedding",
            PipelineStage::Indexed => "indexed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "queued" => Some(PipelineStage::Queued),
            "text_extraction" => Some(PipelineStage::TextExtraction),
            "ocr" => Some(PipelineStage::Ocr),
            "transcription" => Some(PipelineStage::Transcription),
            "embedding" => Some(PipelineStage::Embedding),
            "indexed" => Some(PipelineStage::Indexed),
            _ => None,
        }
    }

    /// The extraction stage used for a given modality.
    pub fn extraction_for(doc_type: DocumentType) -> Self {
        match doc_type {
            DocumentType::Pdf | DocumentType::Docx => PipelineStage::TextExtraction,
            DocumentType::Image => PipelineStage::Ocr,
            DocumentType::Audio => PipelineStage::Transcription,
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An uploaded source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub filename: String,
    pub doc_type: DocumentType,
    pub size_bytes: i64,
    pub content_hash: String,
    pub blob_path: String,
    pub status: DocumentStatus,
    pub stage: PipelineStage,
    pub error: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
}

impl Document {
    pub fn new(
        filename: impl Into<String>,
        doc_type: DocumentType,
        content_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            filename: filename.into(),
            doc_type,
            size_bytes: 0,
            content_hash: content_hash.into(),
            blob_path: String::new(),
            status: DocumentStatus::Processing,
            stage: PipelineStage::Queued,
            error: None,
            uploaded_at: Utc::now(),
            processed_at: None,
            metadata: serde_json::json!({}),
        }
    }

    pub fn with_size(mut self, size_bytes: i64) -> Self {
        self.size_bytes = size_bytes;
        self
    }

    pub fn with_blob_path(mut self, path: impl Into<String>) -> Self {
        self.blob_path = path.into();
        self
    }
}

/// A rectangular area of an image, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest region covering both `self` and `other`.
    pub fn union(&self, other: &Region) -> Region {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = (self.x + self.width).max(other.x + other.width);
        let bottom = (self.y + self.height).max(other.y + other.height);
        Region::new(x, y, right - x, bottom - y)
    }
}

/// Where in its source document a piece of text was found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Locator {
    /// A 1-based page of a PDF or DOCX document.
    Page { page: u32 },
    /// A bounding box inside an image (or a rasterized page).
    Region {
        page: Option<u32>,
        #[serde(flatten)]
        region: Region,
    },
    /// A span of an audio recording, in seconds.
    TimeRange { start: f64, end: f64 },
}

impl Locator {
    pub fn kind(&self) -> &'static str {
        match self {
            Locator::Page { .. } => "page",
            Locator::Region { .. } => "region",
            Locator::TimeRange { .. } => "time_range",
        }
    }

    pub fn page(&self) -> Option<u32> {
        match self {
            Locator::Page { page } => Some(*page),
            Locator::Region { page, .. } => *page,
            Locator::TimeRange { .. } => None,
        }
    }

    /// Start of the time range as an `HH:MM:SS` timestamp.
    pub fn timestamp(&self) -> Option<String> {
        match self {
            Locator::TimeRange { start, .. } => Some(format_timestamp(*start)),
            _ => None,
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Page { page } => write!(f, "page {}", page),
            Locator::Region { page: Some(p), region } => write!(
                f,
                "page {} region {}x{}+{}+{}",
                p, region.width, region.height, region.x, region.y
            ),
            Locator::Region { page: None, region } => write!(
                f,
                "region {}x{}+{}+{}",
                region.width, region.height, region.x, region.y
            ),
            Locator::TimeRange { start, end } => {
                write!(f, "{}-{}", format_timestamp(*start), format_timestamp(*end))
            }
        }
    }
}

/// A chunk of extracted text, the unit of embedding and citation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub document_id: DocumentId,
    pub chunk_index: i32,
    pub content: String,
    pub locator: Locator,
}

impl Chunk {
    pub fn new(
        document_id: DocumentId,
        chunk_index: i32,
        content: impl Into<String>,
        locator: Locator,
    ) -> Self {
        Self {
            id: new_id(),
            document_id,
            chunk_index,
            content: content.into(),
            locator,
        }
    }
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A chat session grouping messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            id: new_id(),
            title: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// Reference from an assistant answer to the chunk supporting it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub id: CitationId,
    pub message_id: MessageId,
    /// The `[n]` marker number used in the answer text.
    pub ordinal: i32,
    pub chunk_id: ChunkId,
    pub document_id: DocumentId,
    /// Original filename of the source document.
    pub source: String,
    pub doc_type: DocumentType,
    pub page: Option<u32>,
    /// `HH:MM:SS` start offset for audio sources.
    pub timestamp: Option<String>,
    pub score: f32,
}

impl Citation {
    /// Build a citation pointing at `chunk` of `document`.
    pub fn for_chunk(
        message_id: MessageId,
        ordinal: i32,
        chunk: &Chunk,
        document: &Document,
        score: f32,
    ) -> Self {
        Self::new(message_id, ordinal, chunk, &document.filename, document.doc_type, score)
    }

    /// Build a citation from a chunk and its source's filename and type.
    pub fn new(
        message_id: MessageId,
        ordinal: i32,
        chunk: &Chunk,
        source: &str,
        doc_type: DocumentType,
        score: f32,
    ) -> Self {
        Self {
            id: new_id(),
            message_id,
            ordinal,
            chunk_id: chunk.id.clone(),
            document_id: chunk.document_id.clone(),
            source: source.to_string(),
            doc_type,
            page: chunk.locator.page(),
            timestamp: chunk.locator.timestamp(),
            score,
        }
    }

    /// Short human-readable label, e.g. `report.pdf, page 3`.
    pub fn label(&self) -> String {
        match (&self.page, &self.timestamp) {
            (_, Some(ts)) => format!("{} @ {}", self.source, ts),
            (Some(page), None) => format!("{}, page {}", self.source, page),
            (None, None) => self.source.clone(),
        }
    }
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub role: Role,
    pub content: String,
    pub citations: Vec<Citation>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(conversation_id: ConversationId, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            conversation_id,
            role,
            content: content.into(),
            citations: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn user(conversation_id: ConversationId, content: impl Into<String>) -> Self {
        Self::new(conversation_id, Role::User, content)
    }

    pub fn assistant(conversation_id: ConversationId, content: impl Into<String>) -> Self {
        Self::new(conversation_id, Role::Assistant, content)
    }
}

/// Kind of work a pipeline job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Extract,
    Embed,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Extract => "extract",
            JobKind::Embed => "embed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "extract" => Some(JobKind::Extract),
            "embed" => Some(JobKind::Embed),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of a pipeline job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Processing,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(JobStatus::Pending),
            "processing" => Some(JobStatus::Processing),
            "done" => Some(JobStatus::Done),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A unit of background pipeline work for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub document_id: DocumentId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub next_attempt_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(document_id: DocumentId, kind: JobKind) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            document_id,
            kind,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts: 3,
            error: None,
            created_at: now,
            next_attempt_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }
}

/// Statistics about the database, also used for the dashboard metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseStats {
    pub total_documents: i64,
    pub documents_by_status: std::collections::HashMap<String, i64>,
    pub documents_by_type: std::collections::HashMap<String, i64>,
    pub total_chunks: i64,
    pub total_embeddings: i64,
    pub embedding_dimensions: Option<i64>,
    pub jobs_pending: i64,
    pub jobs_processing: i64,
    pub jobs_failed: i64,
    pub total_conversations: i64,
    pub total_messages: i64,
    pub total_citations: i64,
    /// Markers the model emitted, valid or not.
    pub citation_markers_total: i64,
    /// Markers that pointed at a retrieved source.
    pub citation_markers_valid: i64,
    pub database_size_bytes: i64,
}

impl DatabaseStats {
    /// Share of emitted citation markers that resolved to a retrieved chunk.
    pub fn citation_accuracy(&self) -> Option<f64> {
        if self.citation_markers_total == 0 {
            None
        } else {
            Some(self.citation_markers_valid as f64 / self.citation_markers_total as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_type_from_extension() {
        assert_eq!(DocumentType::from_extension("pdf"), Some(DocumentType::Pdf));
        assert_eq!(DocumentType::from_extension("DOCX"), Some(DocumentType::Docx));
        assert_eq!(DocumentType::from_extension("jpeg"), Some(DocumentType::Image));
        assert_eq!(DocumentType::from_extension("m4a"), Some(DocumentType::Audio));
        assert_eq!(DocumentType::from_extension("doc"), None);
        assert_eq!(DocumentType::from_extension("mp4"), None);
    }

    #[test]
    fn test_classify_falls_back_to_mime() {
        assert_eq!(
            DocumentType::classify("scan", Some("image/png")),
            Some(DocumentType::Image)
        );
        assert_eq!(
            DocumentType::classify("memo.wav", Some("application/octet-stream")),
            Some(DocumentType::Audio)
        );
        assert_eq!(
            DocumentType::classify("blob", Some("audio/mpeg; charset=binary")),
            Some(DocumentType::Audio)
        );
        assert_eq!(DocumentType::classify("notes.txt", Some("text/plain")), None);
        assert_eq!(DocumentType::classify("notes", None), None);
    }

    #[test]
    fn test_document_creation() {
        let doc = Document::new("report.pdf", DocumentType::Pdf, "abc123")
            .with_size(2048)
            .with_blob_path("/blobs/ab/abc123");

        assert_eq!(doc.status, DocumentStatus::Processing);
        assert_eq!(doc.stage, PipelineStage::Queued);
        assert_eq!(doc.size_bytes, 2048);
        assert!(!doc.id.is_empty());
    }

    #[test]
    fn test_locator_serialization() {
        let loc = Locator::Region {
            page: None,
            region: Region::new(10, 20, 30, 40),
        };
        let json = serde_json::to_value(&loc).unwrap();
        assert_eq!(json["kind"], "region");
        assert_eq!(json["width"], 30);

        let back: Locator = serde_json::from_value(json).unwrap();
        assert_eq!(back, loc);
    }

    #[test]
    fn test_locator_display_fields() {
        let audio = Locator::TimeRange {
            start: 155.0,
            end: 170.0,
        };
        assert_eq!(audio.timestamp().as_deref(), Some("00:02:35"));
        assert_eq!(audio.page(), None);
        assert_eq!(Locator::Page { page: 4 }.page(), Some(4));
    }

    #[test]
    fn test_region_union() {
        let a = Region::new(10, 10, 20, 10);
        let b = Region::new(5, 25, 10, 10);
        assert_eq!(a.union(&b), Region::new(5, 10, 25, 25));
    }

    #[test]
    fn test_citation_for_audio_chunk() {
        let doc = Document::new("talk.mp3", DocumentType::Audio, "h");
        let chunk = Chunk::new(
            doc.id.clone(),
            0,
            "hello",
            Locator::TimeRange {
                start: 155.0,
                end: 160.0,
            },
        );
        let citation = Citation::for_chunk("m1".into(), 1, &chunk, &doc, 0.9);

        assert_eq!(citation.timestamp.as_deref(), Some("00:02:35"));
        assert_eq!(citation.page, None);
        assert_eq!(citation.doc_type, DocumentType::Audio);
        assert_eq!(citation.label(), "talk.mp3 @ 00:02:35");
    }

    #[test]
    fn test_citation_accuracy() {
        let mut stats = DatabaseStats::default();
        assert_eq!(stats.citation_accuracy(), None);

        stats.citation_markers_total = 4;
        stats.citation_markers_valid = 3;
        assert_eq!(stats.citation_accuracy(), Some(0.75));
    }
}
