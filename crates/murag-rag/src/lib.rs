//! MuRAG RAG - Retrieval and cited answers over the indexed documents.
//!
//! This crate provides:
//! - In-memory index snapshots refreshed as documents complete
//! - Top-k retrieval with a similarity floor
//! - Answers whose `[n]` citations are checked against the retrieved sources
//! - Conversations that persist each question with exactly one answer
//! - Citation previews for pages, image regions and audio ranges

mod answer;
mod conversation;
mod error;
mod resolve;
mod retriever;
mod snapshot;

#[cfg(test)]
mod test_support;

pub use answer::{
    assemble_context, parse_citation_markers, Answer, Answerer, CitationAudit, ContextSource,
    NO_RELEVANT_CONTENT,
};
pub use conversation::{ConversationService, Exchange};
pub use error::{RagError, RagResult};
pub use resolve::{resolve, seek_offset, CitationPreview, Preview, TranscriptLine};
pub use retriever::Retriever;
pub use snapshot::{Hit, IndexSnapshot, SnapshotStore};
