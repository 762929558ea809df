//! MuRAG Ingest - Uploads and the indexing pipeline.
//!
//! This crate provides:
//! - Upload validation, content-hash deduplication and blob storage
//! - Per-format extraction (PDF, DOCX, image OCR, audio transcription)
//! - Locator-preserving chunking
//! - The background worker that drives jobs from queued to indexed

mod chunker;
mod error;
mod ingestor;
mod parsers;
mod pipeline;
mod store;

pub use chunker::{ChunkConfig, Chunker, TranscriptWindow};
pub use error::{IngestError, IngestResult};
pub use ingestor::{Ingestor, UploadOutcome};
pub use parsers::{extractor_for, Extraction, Extractor, ExtractorSettings, TextSpan};
pub use pipeline::{compute_backoff, IndexListener, JobOutcome, PipelineConfig, PipelineWorker};
pub use store::BlobStore;
