//! Background pipeline: claims jobs from the queue, extracts, chunks and embeds.

use crate::chunker::{ChunkConfig, Chunker};
use crate::error::{IngestError, IngestResult};
use crate::parsers::{extractor_for, ExtractorSettings};
use chrono::Utc;
use murag_config::Config;
use murag_core::{DocumentStatus, Job, JobKind, PipelineStage};
use murag_db::Database;
use murag_ollama::Embedder;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Called with a document id each time a document becomes searchable.
///
/// Runs on the blocking pool.
pub type IndexListener = Arc<dyn Fn(&str) + Send + Sync>;

/// Pipeline settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_concurrent_jobs: usize,
    pub retry_base_seconds: u64,
    pub retry_max_seconds: u64,
    pub poll_interval: Duration,
    /// How long a claimed job may run before startup recovery requeues it.
    pub job_lease: Duration,
    pub extractor: ExtractorSettings,
    pub chunk: ChunkConfig,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        let p = &config.processing;
        Self {
            max_concurrent_jobs: p.max_concurrent_jobs.max(1),
            retry_base_seconds: p.retry_base_seconds,
            retry_max_seconds: p.retry_max_seconds,
            poll_interval: Duration::from_millis(p.poll_interval_ms),
            job_lease: Duration::from_secs(p.job_lease_seconds),
            extractor: ExtractorSettings::from_processing_config(p),
            chunk: ChunkConfig::from_processing_config(p),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// What happened to a claimed job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed,
    /// Failed, queued again for a later attempt.
    Retrying { delay: Duration },
    /// Failed for good; the document is marked failed.
    Failed { error: String },
}

/// Delay before retry number `attempts`: `base * 2^(attempts-1)`, capped at `max`.
pub fn compute_backoff(attempts: u32, base_seconds: u64, max_seconds: u64) -> Duration {
    let exponent = attempts.saturating_sub(1);
    let factor = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
    Duration::from_secs(base_seconds.saturating_mul(factor).min(max_seconds))
}

/// Runs queued jobs with bounded concurrency.
#[derive(Clone)]
pub struct PipelineWorker {
    db: Database,
    embedder: Arc<dyn Embedder>,
    config: Arc<PipelineConfig>,
    on_indexed: Option<IndexListener>,
}

impl PipelineWorker {
    pub fn new(db: Database, embedder: Arc<dyn Embedder>, config: PipelineConfig) -> Self {
        Self {
            db,
            embedder,
            config: Arc::new(config),
            on_indexed: None,
        }
    }

    /// Register a callback fired after each document is indexed.
    pub fn with_listener(mut self, listener: IndexListener) -> Self {
        self.on_indexed = Some(listener);
        self
    }

    /// Return jobs orphaned by a crashed worker to the queue.
    ///
    /// Only claims older than the job lease are touched, so jobs another live
    /// worker is running stay with it.
    pub fn recover(&self) -> IngestResult<i64> {
        let cutoff = chrono::Duration::from_std(self.config.job_lease)
            .ok()
            .and_then(|lease| Utc::now().checked_sub_signed(lease));
        // A lease reaching before any representable time leaves nothing stale.
        let Some(cutoff) = cutoff else {
            return Ok(0);
        };
        let recovered = self.db.recover_stale_jobs(cutoff)?;
        if recovered > 0 {
            info!("Recovered {} interrupted jobs", recovered);
        }
        Ok(recovered)
    }

    /// Process every job that is due, including jobs those jobs enqueue.
    ///
    /// Returns the number of jobs that reached an outcome.
    pub async fn run_once(&self) -> IngestResult<usize> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_jobs));
        let mut tasks = JoinSet::new();
        let mut processed = 0;

        loop {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };

            match self.db.dequeue_job(Utc::now())? {
                Some(job) => {
                    let worker = self.clone();
                    tasks.spawn(async move {
                        let _permit = permit;
                        worker.process_job(job).await
                    });
                }
                None => {
                    drop(permit);
                    match tasks.join_next().await {
                        Some(result) => processed += count_outcome(result),
                        None => break,
                    }
                }
            }
        }

        while let Some(result) = tasks.join_next().await {
            processed += count_outcome(result);
        }

        Ok(processed)
    }

    /// Poll the queue until `shutdown` flips to true or its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> IngestResult<()> {
        self.recover()?;
        info!(
            "Pipeline worker started ({} concurrent jobs)",
            self.config.max_concurrent_jobs
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let processed = match self.run_once().await {
                Ok(n) => n,
                Err(e) => {
                    error!("Pipeline pass failed: {}", e);
                    0
                }
            };

            if processed == 0 {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        info!("Pipeline worker stopped");
        Ok(())
    }

    /// Run one claimed job and record its outcome.
    pub async fn process_job(&self, job: Job) -> JobOutcome {
        debug!(
            "Running {} job {} for document {} (attempt {}/{})",
            job.kind, job.id, job.document_id, job.attempts, job.max_attempts
        );

        let result = match job.kind {
            JobKind::Extract => self.extract(&job).await,
            JobKind::Embed => self.embed(&job).await,
        };

        match result {
            Ok(()) => {
                if let Err(e) = self.db.complete_job(&job.id) {
                    warn!("Could not mark job {} done: {}", job.id, e);
                }
                JobOutcome::Completed
            }
            Err(e) => self.handle_failure(&job, e),
        }
    }

    fn handle_failure(&self, job: &Job, err: IngestError) -> JobOutcome {
        let message = err.to_string();

        if err.is_retryable() && job.attempts < job.max_attempts {
            let delay = compute_backoff(
                job.attempts.max(1) as u32,
                self.config.retry_base_seconds,
                self.config.retry_max_seconds,
            );
            let next_attempt_at =
                Utc::now() + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());

            warn!(
                "{} job for {} failed (attempt {}/{}), retrying in {:?}: {}",
                job.kind, job.document_id, job.attempts, job.max_attempts, delay, message
            );
            if let Err(e) = self.db.reschedule_job(&job.id, &message, next_attempt_at) {
                error!("Could not reschedule job {}: {}", job.id, e);
            }
            return JobOutcome::Retrying { delay };
        }

        error!(
            "{} job for {} failed permanently: {}",
            job.kind, job.document_id, message
        );
        if let Err(e) = self.db.fail_job(&job.id, &message) {
            error!("Could not mark job {} failed: {}", job.id, e);
        }
        if let Err(e) = self.db.mark_document_failed(&job.document_id, &message) {
            error!("Could not mark document {} failed: {}", job.document_id, e);
        }
        JobOutcome::Failed { error: message }
    }

    /// Extract text spans, chunk them and queue embedding.
    async fn extract(&self, job: &Job) -> IngestResult<()> {
        let document = self.db.get_document(&job.document_id)?;
        self.db
            .set_document_stage(&document.id, PipelineStage::extraction_for(document.doc_type))?;

        let path = PathBuf::from(&document.blob_path);
        let settings = self.config.extractor.clone();
        let doc_type = document.doc_type;

        let extraction =
            tokio::task::spawn_blocking(move || extractor_for(doc_type, &settings).extract(&path))
                .await
                .map_err(|e| IngestError::Internal(format!("Extraction task failed: {}", e)))??;

        if extraction.is_empty() {
            return Err(IngestError::NoContent(document.filename));
        }

        let chunks = Chunker::new(self.config.chunk.clone()).chunk_spans(&document.id, &extraction.spans);
        info!(
            "Extracted {} spans into {} chunks from {}",
            extraction.spans.len(),
            chunks.len(),
            document.filename
        );

        self.db.merge_document_metadata(&document.id, &extraction.metadata)?;
        self.db.replace_chunks(&document.id, &chunks)?;
        self.db.set_document_stage(&document.id, PipelineStage::Embedding)?;

        let embed = Job::new(document.id.clone(), JobKind::Embed).with_max_attempts(job.max_attempts);
        if !self.db.enqueue_job(&embed)? {
            debug!("Embedding already queued for {}", document.id);
        }
        Ok(())
    }

    /// Embed any chunks still missing a vector, then publish the document.
    ///
    /// A job whose document was reprocessed or failed since it was queued is
    /// finished without touching the document.
    async fn embed(&self, job: &Job) -> IngestResult<()> {
        let document = self.db.get_document(&job.document_id)?;
        if document.status != DocumentStatus::Processing || document.stage != PipelineStage::Embedding {
            info!(
                "Skipping superseded embed job {} for {} ({}, {})",
                job.id, document.filename, document.status, document.stage
            );
            return Ok(());
        }

        let chunks = self.db.get_unembedded_chunks(&document.id)?;
        let mut vectors = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let vector = self.embedder.embed(&chunk.content).await?;
            vectors.push((chunk.id, vector));
        }

        self.db
            .store_embeddings(&vectors, self.embedder.embedding_model())?;
        if !self.db.mark_document_completed(&document.id)? {
            info!("{} changed while embedding; not publishing it", document.filename);
            return Ok(());
        }
        info!(
            "Indexed {} ({} new embeddings)",
            document.filename,
            vectors.len()
        );

        if let Some(listener) = self.on_indexed.clone() {
            let document_id = document.id.clone();
            // Listeners may touch the database.
            if let Err(e) = tokio::task::spawn_blocking(move || listener(&document_id)).await {
                warn!("Index listener for {} failed: {}", document.id, e);
            }
        }
        Ok(())
    }
}

fn count_outcome(result: Result<JobOutcome, tokio::task::JoinError>) -> usize {
    match result {
        Ok(_) => 1,
        Err(e) => {
            error!("Pipeline task panicked: {}", e);
            0
        }
    }
}
