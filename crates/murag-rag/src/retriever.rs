//! Query embedding and top-k retrieval over the current snapshot.

use crate::error::RagResult;
use crate::snapshot::{Hit, SnapshotStore};
use murag_config::RetrievalConfig;
use murag_ollama::Embedder;
use std::sync::Arc;
use tracing::debug;

/// Finds the chunks most similar to a query.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    snapshots: Arc<SnapshotStore>,
    top_k: usize,
    min_similarity: f32,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, snapshots: Arc<SnapshotStore>, config: &RetrievalConfig) -> Self {
        Self {
            embedder,
            snapshots,
            top_k: config.top_k,
            min_similarity: config.min_similarity,
        }
    }

    /// Retrieve up to `k` hits (default `top_k`) scoring at least `min_similarity`.
    ///
    /// An empty index returns no hits without calling the embedder.
    pub async fn retrieve(&self, query: &str, k: Option<usize>) -> RagResult<Vec<Hit>> {
        let snapshot = self.snapshots.current();
        if snapshot.is_empty() {
            debug!("Index is empty, nothing to retrieve");
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed(query).await?;
        let hits = snapshot.search(&vector, k.unwrap_or(self.top_k), self.min_similarity)?;
        debug!(
            "Retrieved {} hits from snapshot {} ({} chunks)",
            hits.len(),
            snapshot.generation(),
            snapshot.len()
        );
        Ok(hits)
    }
}
