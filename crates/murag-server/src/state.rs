//! Shared state handed to every handler.

use murag_config::Config;
use murag_db::Database;
use murag_ingest::Ingestor;
use murag_ollama::{Embedder, Generator};
use murag_rag::{Answerer, ConversationService, RagResult, Retriever, SnapshotStore};
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub ingestor: Ingestor,
    pub snapshots: Arc<SnapshotStore>,
    pub conversations: ConversationService,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire the services together and load the current index.
    pub fn new(
        db: Database,
        ingestor: Ingestor,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        config: Config,
    ) -> RagResult<Self> {
        let snapshots = Arc::new(SnapshotStore::load(db.clone())?);
        Ok(Self::with_snapshots(db, ingestor, snapshots, embedder, generator, config))
    }

    /// Like [`new`](Self::new), sharing a snapshot store the pipeline also refreshes.
    pub fn with_snapshots(
        db: Database,
        ingestor: Ingestor,
        snapshots: Arc<SnapshotStore>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        config: Config,
    ) -> Self {
        let retriever = Retriever::new(embedder, snapshots.clone(), &config.retrieval);
        let answerer = Answerer::new(retriever, generator, &config.retrieval);
        let conversations = ConversationService::new(db.clone(), answerer);

        Self {
            db,
            ingestor,
            snapshots,
            conversations,
            config: Arc::new(config),
        }
    }

    /// Rebuild the query snapshot after the set of indexed documents changed.
    pub async fn refresh_index(&self) {
        let snapshots = self.snapshots.clone();
        match tokio::task::spawn_blocking(move || snapshots.refresh()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("Failed to refresh index snapshot: {}", e),
            Err(e) => warn!("Index refresh task failed: {}", e),
        }
    }
}
