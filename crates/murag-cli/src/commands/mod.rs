//! CLI command implementations.

pub mod ask;
pub mod chat;
pub mod cite;
pub mod config;
pub mod files;
pub mod history;
pub mod init;
pub mod process;
pub mod serve;
pub mod stats;
pub mod status;
pub mod upload;

use anyhow::{Context, Result};
use murag_config::{AppPaths, Config};
use murag_db::Database;
use murag_ingest::{Ingestor, PipelineConfig, PipelineWorker};
use murag_ollama::OllamaBackend;
use murag_rag::{Answerer, ConversationService, Retriever, SnapshotStore};
use std::sync::Arc;
use tokio::runtime::Runtime;

/// Get the application paths, honouring `general.data_dir` when set.
pub fn get_paths(config: &Config) -> Result<AppPaths> {
    let paths = AppPaths::new().context("Failed to determine application directories")?;

    match &config.general.data_dir {
        Some(dir) => Ok(paths.with_data_dir(shellexpand::tilde(dir).into_owned())),
        None => Ok(paths),
    }
}

/// Everything a command needs once murag is initialized.
pub struct Workspace {
    pub paths: AppPaths,
    pub config: Config,
    pub db: Database,
}

impl Workspace {
    /// Load config and open the database, ensuring murag is initialized.
    pub fn open() -> Result<Self> {
        let config = Config::load().context("Failed to load configuration")?;
        let paths = get_paths(&config)?;

        if !paths.is_initialized() {
            anyhow::bail!("MuRAG is not initialized. Run 'murag init' first.");
        }

        let db = Database::open(&paths.database_file).context("Failed to open database")?;
        Ok(Self { paths, config, db })
    }

    pub fn ingestor(&self) -> Ingestor {
        Ingestor::from_config(self.db.clone(), &self.paths, &self.config)
    }

    pub fn backend(&self) -> Result<Arc<OllamaBackend>> {
        let backend = OllamaBackend::from_config(&self.config.ollama)
            .context("Failed to create Ollama client")?;
        Ok(Arc::new(backend))
    }

    /// Load the index snapshot queries run against.
    pub fn snapshots(&self) -> Result<Arc<SnapshotStore>> {
        let store = SnapshotStore::load(self.db.clone()).context("Failed to load the vector index")?;
        Ok(Arc::new(store))
    }

    pub fn conversations(&self, backend: Arc<OllamaBackend>, snapshots: Arc<SnapshotStore>) -> ConversationService {
        let retriever = Retriever::new(backend.clone(), snapshots, &self.config.retrieval);
        let answerer = Answerer::new(retriever, backend, &self.config.retrieval);
        ConversationService::new(self.db.clone(), answerer)
    }

    /// A pipeline worker that republishes `snapshots` whenever a document is indexed.
    pub fn worker(&self, backend: Arc<OllamaBackend>, snapshots: Arc<SnapshotStore>) -> PipelineWorker {
        PipelineWorker::new(self.db.clone(), backend, PipelineConfig::from_config(&self.config))
            .with_listener(Arc::new(move |document_id: &str| {
                if let Err(e) = snapshots.refresh() {
                    tracing::warn!("Index refresh after {} failed: {}", document_id, e);
                }
            }))
    }
}

/// Create the async runtime for commands that talk to Ollama.
pub fn runtime() -> Result<Runtime> {
    Runtime::new().context("Failed to create async runtime")
}

/// First eight characters of an id, for display.
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Format a file size in human-readable form.
pub fn format_size(bytes: i64) -> String {
    const KB: i64 = 1024;
    const MB: i64 = KB * 1024;
    const GB: i64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
