//! In-memory vector index snapshots.
//!
//! Queries scan an immutable [`IndexSnapshot`]. The pipeline publishes a new
//! one through [`SnapshotStore::refresh`] whenever the set of completed
//! documents changes, so readers never touch the database while scoring.

use crate::error::{RagError, RagResult};
use murag_core::{Chunk, DocumentType, Locator};
use murag_db::{cosine_similarity, Database, IndexEntry};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use tracing::debug;

/// A chunk that matched a query.
#[derive(Debug, Clone)]
pub struct Hit {
    pub chunk: Chunk,
    /// Original filename of the parent document.
    pub filename: String,
    pub doc_type: DocumentType,
    /// Cosine similarity to the query.
    pub score: f32,
}

impl Hit {
    /// Label shown next to the passage, e.g. `report.pdf, page 3`.
    pub fn label(&self) -> String {
        match &self.chunk.locator {
            Locator::Page { page } | Locator::Region { page: Some(page), .. } => {
                format!("{}, page {}", self.filename, page)
            }
            Locator::Region { page: None, .. } => self.filename.clone(),
            Locator::TimeRange { .. } => format!(
                "{} @ {}",
                self.filename,
                self.chunk.locator.timestamp().unwrap_or_default()
            ),
        }
    }
}

/// Immutable copy of every embedded chunk of every completed document.
#[derive(Debug, Default)]
pub struct IndexSnapshot {
    entries: Vec<IndexEntry>,
    dimensions: Option<usize>,
    generation: u64,
}

impl IndexSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(entries: Vec<IndexEntry>, generation: u64) -> Self {
        let dimensions = entries.first().map(|e| e.vector.len());
        Self {
            entries,
            dimensions,
            generation,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Brute-force cosine top-`k`, dropping anything scored below `min_similarity`.
    pub fn search(&self, query: &[f32], k: usize, min_similarity: f32) -> RagResult<Vec<Hit>> {
        if let Some(expected) = self.dimensions {
            if query.len() != expected {
                return Err(RagError::DimensionMismatch {
                    expected,
                    actual: query.len(),
                });
            }
        }

        let mut scored: Vec<(f32, &IndexEntry)> = self
            .entries
            .iter()
            .map(|entry| (cosine_similarity(query, &entry.vector), entry))
            .filter(|(score, _)| *score >= min_similarity)
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, entry)| Hit {
                chunk: entry.chunk.clone(),
                filename: entry.filename.clone(),
                doc_type: entry.doc_type,
                score,
            })
            .collect())
    }
}

/// Holds the current snapshot and swaps in new ones.
pub struct SnapshotStore {
    db: Database,
    current: RwLock<Arc<IndexSnapshot>>,
    generation: AtomicU64,
}

impl SnapshotStore {
    /// Start with an empty snapshot; call [`refresh`](Self::refresh) to load.
    pub fn new(db: Database) -> Self {
        Self {
            db,
            current: RwLock::new(Arc::new(IndexSnapshot::empty())),
            generation: AtomicU64::new(0),
        }
    }

    /// Create a store with the index already loaded.
    pub fn load(db: Database) -> RagResult<Self> {
        let store = Self::new(db);
        store.refresh()?;
        Ok(store)
    }

    /// The snapshot queries should use right now.
    pub fn current(&self) -> Arc<IndexSnapshot> {
        self.current.read().clone()
    }

    /// Rebuild from the database and publish the result.
    ///
    /// When two refreshes race, the one that started later wins.
    pub fn refresh(&self) -> RagResult<Arc<IndexSnapshot>> {
        let generation = self.generation.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        let snapshot = Arc::new(IndexSnapshot::new(self.db.load_index()?, generation));

        let mut current = self.current.write();
        if snapshot.generation > current.generation {
            debug!(
                "Published index snapshot {} ({} chunks)",
                generation,
                snapshot.len()
            );
            *current = snapshot;
        }
        Ok(current.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murag_core::{Document, DocumentId, PipelineStage};

    fn entry(doc_id: &str, content: &str, vector: Vec<f32>, locator: Locator) -> IndexEntry {
        IndexEntry {
            chunk: Chunk::new(doc_id.to_string(), 0, content, locator),
            vector,
            filename: format!("{}.pdf", doc_id),
            doc_type: DocumentType::Pdf,
        }
    }

    #[test]
    fn test_search_orders_and_filters() {
        let snapshot = IndexSnapshot::new(
            vec![
                entry("a", "close", vec![1.0, 0.1], Locator::Page { page: 1 }),
                entry("b", "orthogonal", vec![0.0, 1.0], Locator::Page { page: 2 }),
                entry("c", "exact", vec![1.0, 0.0], Locator::Page { page: 3 }),
            ],
            1,
        );

        let hits = snapshot.search(&[1.0, 0.0], 5, 0.5).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.content, "exact");
        assert_eq!(hits[1].chunk.content, "close");
        assert!(hits[0].score >= hits[1].score);

        let top = snapshot.search(&[1.0, 0.0], 1, 0.0).unwrap();
        assert_eq!(top.len(), 1);
    }

    #[test]
    fn test_search_rejects_other_dimensions() {
        let snapshot = IndexSnapshot::new(
            vec![entry("a", "x", vec![1.0, 0.0, 0.0], Locator::Page { page: 1 })],
            1,
        );
        assert!(matches!(
            snapshot.search(&[1.0, 0.0], 5, 0.0),
            Err(RagError::DimensionMismatch { expected: 3, actual: 2 })
        ));
        assert!(IndexSnapshot::empty().search(&[1.0], 5, 0.0).unwrap().is_empty());
    }

    #[test]
    fn test_hit_labels() {
        let hit = |locator| Hit {
            chunk: Chunk::new("d".to_string(), 0, "t", locator),
            filename: "memo.mp3".into(),
            doc_type: DocumentType::Audio,
            score: 1.0,
        };
        assert_eq!(
            hit(Locator::TimeRange { start: 155.0, end: 170.0 }).label(),
            "memo.mp3 @ 00:02:35"
        );
        assert_eq!(hit(Locator::Page { page: 4 }).label(), "memo.mp3, page 4");
    }

    #[test]
    fn test_refresh_publishes_completed_documents_only() {
        let db = Database::open_in_memory().unwrap();
        let store = SnapshotStore::new(db.clone());
        assert!(store.current().is_empty());

        let mut ids: Vec<DocumentId> = Vec::new();
        for (name, complete) in [("done.pdf", true), ("pending.pdf", false)] {
            let doc = Document::new(name, DocumentType::Pdf, name);
            db.create_document(&doc).unwrap();
            let chunk = Chunk::new(doc.id.clone(), 0, "text", Locator::Page { page: 1 });
            db.replace_chunks(&doc.id, &[chunk.clone()]).unwrap();
            db.store_embedding(&chunk.id, &[0.5, 0.5], "test").unwrap();
            if complete {
                db.set_document_stage(&doc.id, PipelineStage::Embedding).unwrap();
                db.mark_document_completed(&doc.id).unwrap();
            }
            ids.push(doc.id);
        }

        let snapshot = store.refresh().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.dimensions(), Some(2));
        assert_eq!(snapshot.generation(), 1);

        db.delete_document(&ids[0]).unwrap();
        let snapshot = store.refresh().unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(store.current().generation(), 2);
    }
}
