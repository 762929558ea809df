//! Upload handling: validation, deduplication, blob storage and job creation.

use crate::error::{IngestError, IngestResult};
use crate::store::BlobStore;
use murag_config::{AppPaths, Config};
use murag_core::{Document, DocumentType, Job, JobKind};
use murag_db::{Database, DocumentDeletion};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of an upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub document: Document,
    /// True when identical bytes were already uploaded; `document` is the existing one.
    pub was_duplicate: bool,
}

/// Accepts uploads and queues them for processing.
#[derive(Clone)]
pub struct Ingestor {
    db: Database,
    store: BlobStore,
    max_upload_bytes: usize,
    max_attempts: i32,
    /// Held while a blob's existence is tied to the documents referencing it.
    blob_lock: Arc<Mutex<()>>,
}

impl Ingestor {
    pub fn new(db: Database, store: BlobStore, max_upload_bytes: usize, max_attempts: u32) -> Self {
        Self {
            db,
            store,
            max_upload_bytes,
            max_attempts: max_attempts.min(i32::MAX as u32) as i32,
            blob_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Create an ingestor storing blobs under the application's data directory.
    pub fn from_config(db: Database, paths: &AppPaths, config: &Config) -> Self {
        Self::new(
            db,
            BlobStore::new(&paths.blob_dir),
            config.ingest.max_upload_bytes,
            config.processing.max_attempts,
        )
    }

    pub fn store(&self) -> &BlobStore {
        &self.store
    }

    /// Classify an upload by extension, then MIME type.
    pub fn classify(filename: &str, mime: Option<&str>) -> IngestResult<DocumentType> {
        DocumentType::classify(filename, mime).ok_or_else(|| {
            let what = Path::new(filename)
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| format!(".{}", e))
                .or_else(|| mime.map(str::to_string))
                .unwrap_or_else(|| filename.to_string());
            IngestError::UnsupportedFileType(what)
        })
    }

    /// Accept an uploaded file.
    ///
    /// The document and its extraction job are created in one transaction.
    /// Re-uploading identical bytes returns the existing document.
    pub fn upload(
        &self,
        filename: &str,
        bytes: &[u8],
        mime: Option<&str>,
    ) -> IngestResult<UploadOutcome> {
        if bytes.is_empty() {
            return Err(IngestError::EmptyUpload);
        }
        if bytes.len() > self.max_upload_bytes {
            return Err(IngestError::TooLarge {
                size: bytes.len(),
                max: self.max_upload_bytes,
            });
        }
        let doc_type = Self::classify(filename, mime)?;

        let hash = BlobStore::hash(bytes);
        let _guard = self.blob_lock.lock();
        if let Some(existing) = self.db.find_document_by_hash(&hash)? {
            debug!("{} duplicates document {}", filename, existing.id);
            return Ok(UploadOutcome {
                document: existing,
                was_duplicate: true,
            });
        }

        let (hash, blob_path) = self.store.put(bytes)?;
        let document = Document::new(filename, doc_type, &hash)
            .with_size(bytes.len() as i64)
            .with_blob_path(blob_path.to_string_lossy());
        let job = Job::new(document.id.clone(), JobKind::Extract).with_max_attempts(self.max_attempts);

        if let Err(e) = self.db.create_document_with_job(&document, &job) {
            // A concurrent upload of the same bytes won the unique hash.
            if let Some(existing) = self.db.find_document_by_hash(&hash)? {
                return Ok(UploadOutcome {
                    document: existing,
                    was_duplicate: true,
                });
            }
            self.discard_blob(&hash);
            return Err(e.into());
        }

        info!(
            "Uploaded {} as {} ({}, {} bytes)",
            filename, document.id, doc_type, document.size_bytes
        );

        Ok(UploadOutcome {
            document,
            was_duplicate: false,
        })
    }

    /// Upload a file from disk.
    pub fn upload_path(&self, path: &Path) -> IngestResult<UploadOutcome> {
        if !path.is_file() {
            return Err(IngestError::FileNotFound(path.to_path_buf()));
        }

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();

        // Check the type and size before reading the whole file.
        Self::classify(&filename, None)?;
        let size = std::fs::metadata(path)?.len() as usize;
        if size > self.max_upload_bytes {
            return Err(IngestError::TooLarge {
                size,
                max: self.max_upload_bytes,
            });
        }

        let bytes = std::fs::read(path)?;
        self.upload(&filename, &bytes, None)
    }

    /// Upload every supported file under a directory.
    ///
    /// Hidden and unsupported files are skipped; files that fail are logged.
    pub fn upload_directory(&self, dir: &Path) -> IngestResult<Vec<UploadOutcome>> {
        if !dir.is_dir() {
            return Err(IngestError::FileNotFound(dir.to_path_buf()));
        }

        let mut results = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()))
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file() {
                continue;
            }

            let supported = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(DocumentType::from_extension)
                .is_some();
            if !supported {
                debug!("Skipping unsupported file: {:?}", path);
                continue;
            }

            match self.upload_path(path) {
                Ok(outcome) => results.push(outcome),
                Err(e) => warn!("Failed to upload {:?}: {}", path, e),
            }
        }

        Ok(results)
    }

    /// Delete a document, everything derived from it, and its blob.
    pub fn remove(&self, document_id: &str) -> IngestResult<DocumentDeletion> {
        let _guard = self.blob_lock.lock();
        let deletion = self.db.delete_document(document_id)?;

        let hash = &deletion.document.content_hash;
        if self.db.find_document_by_hash(hash)?.is_none() {
            self.store.remove(hash)?;
        }

        Ok(deletion)
    }

    /// Remove a blob written for an upload that never got a document.
    fn discard_blob(&self, hash: &str) {
        match self.db.find_document_by_hash(hash) {
            Ok(None) => {
                if let Err(e) = self.store.remove(hash) {
                    warn!("Failed to remove orphaned blob {}: {}", hash, e);
                }
            }
            Ok(Some(_)) => {}
            Err(e) => warn!("Keeping blob {}: {}", hash, e),
        }
    }

    /// Drop a document's chunks and queue it for extraction again.
    ///
    /// Returns false when an extraction is already in flight.
    pub fn reprocess(&self, document_id: &str) -> IngestResult<bool> {
        let job = Job::new(document_id.to_string(), JobKind::Extract)
            .with_max_attempts(self.max_attempts);
        let queued = self.db.reset_document_for_reprocessing(document_id, &job)?;
        if queued {
            info!("Queued document {} for reprocessing", document_id);
        }
        Ok(queued)
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().map(|n| n.starts_with('.')).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use murag_core::{DocumentStatus, JobStatus, PipelineStage};

    fn ingestor(dir: &Path) -> (Ingestor, Database) {
        let db = Database::open_in_memory().unwrap();
        let ingestor = Ingestor::new(db.clone(), BlobStore::new(dir.join("blobs")), 1024, 3);
        (ingestor, db)
    }

    #[test]
    fn test_upload_creates_document_and_job() {
        let dir = tempfile::tempdir().unwrap();
        let (ingestor, db) = ingestor(dir.path());

        let outcome = ingestor.upload("scan.png", b"fake png bytes", None).unwrap();
        assert!(!outcome.was_duplicate);

        let doc = db.get_document(&outcome.document.id).unwrap();
        assert_eq!(doc.doc_type, DocumentType::Image);
        assert_eq!(doc.status, DocumentStatus::Processing);
        assert_eq!(doc.stage, PipelineStage::Queued);
        assert_eq!(doc.size_bytes, 14);
        assert!(Path::new(&doc.blob_path).exists());

        let jobs = db.list_jobs(Some(JobStatus::Pending), None).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].kind, JobKind::Extract);
        assert_eq!(jobs[0].max_attempts, 3);
    }

    #[test]
    fn test_duplicate_upload_is_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let (ingestor, db) = ingestor(dir.path());

        let first = ingestor.upload("a.mp3", b"same bytes", None).unwrap();
        let second = ingestor.upload("copy-of-a.mp3", b"same bytes", None).unwrap();

        assert!(second.was_duplicate);
        assert_eq!(second.document.id, first.document.id);
        assert_eq!(db.list_documents(None, None).unwrap().len(), 1);
        assert_eq!(db.list_jobs(None, None).unwrap().len(), 1);
    }

    #[test]
    fn test_upload_rejections() {
        let dir = tempfile::tempdir().unwrap();
        let (ingestor, db) = ingestor(dir.path());

        assert!(matches!(
            ingestor.upload("empty.pdf", b"", None),
            Err(IngestError::EmptyUpload)
        ));
        assert!(matches!(
            ingestor.upload("big.pdf", &vec![0u8; 2048], None),
            Err(IngestError::TooLarge { size: 2048, max: 1024 })
        ));
        assert!(matches!(
            ingestor.upload("notes.txt", b"hello", Some("text/plain")),
            Err(IngestError::UnsupportedFileType(_))
        ));
        assert!(db.list_documents(None, None).unwrap().is_empty());
    }

    #[test]
    fn test_upload_uses_mime_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let (ingestor, _db) = ingestor(dir.path());

        let outcome = ingestor
            .upload("recording", b"RIFF....WAVE", Some("audio/wav"))
            .unwrap();
        assert_eq!(outcome.document.doc_type, DocumentType::Audio);
    }

    #[test]
    fn test_remove_deletes_only_that_document() {
        let dir = tempfile::tempdir().unwrap();
        let (ingestor, db) = ingestor(dir.path());

        let keep = ingestor.upload("keep.pdf", b"keep", None).unwrap().document;
        let gone = ingestor.upload("gone.pdf", b"gone", None).unwrap().document;

        let deletion = ingestor.remove(&gone.id).unwrap();
        assert_eq!(deletion.document.id, gone.id);

        let remaining = db.list_documents(None, None).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, keep.id);
        assert!(!ingestor.store().exists(&gone.content_hash));
        assert!(ingestor.store().exists(&keep.content_hash));
        assert_eq!(db.list_jobs(None, None).unwrap().len(), 1);
    }

    #[test]
    fn test_failed_upload_leaves_no_blob() {
        let dir = tempfile::tempdir().unwrap();
        let (ingestor, db) = ingestor(dir.path());
        db.conn().unwrap().execute_batch("DROP TABLE jobs").unwrap();

        assert!(matches!(
            ingestor.upload("a.pdf", b"orphan", None),
            Err(IngestError::Database(_))
        ));
        assert!(!ingestor.store().exists(&BlobStore::hash(b"orphan")));
    }

    #[test]
    fn test_remove_racing_reupload_keeps_blob() {
        let dir = tempfile::tempdir().unwrap();
        let (ingestor, db) = ingestor(dir.path());
        let hash = BlobStore::hash(b"shared");

        for _ in 0..20 {
            let doc = ingestor.upload("a.pdf", b"shared", None).unwrap().document;

            let remover = {
                let ingestor = ingestor.clone();
                std::thread::spawn(move || ingestor.remove(&doc.id).unwrap())
            };
            let uploader = {
                let ingestor = ingestor.clone();
                std::thread::spawn(move || ingestor.upload("b.pdf", b"shared", None).unwrap())
            };
            remover.join().unwrap();
            let outcome = uploader.join().unwrap();

            if let Some(existing) = db.find_document_by_hash(&hash).unwrap() {
                assert!(ingestor.store().exists(&hash));
                ingestor.remove(&existing.id).unwrap();
            } else {
                assert!(outcome.was_duplicate);
            }
        }
    }

    #[test]
    fn test_upload_directory_skips_hidden_and_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let (ingestor, _db) = ingestor(dir.path());

        let inbox = dir.path().join("inbox");
        std::fs::create_dir_all(inbox.join(".cache")).unwrap();
        std::fs::write(inbox.join("a.pdf"), b"pdf one").unwrap();
        std::fs::write(inbox.join("b.wav"), b"wav two").unwrap();
        std::fs::write(inbox.join("readme.txt"), b"skip me").unwrap();
        std::fs::write(inbox.join(".hidden.pdf"), b"hidden").unwrap();
        std::fs::write(inbox.join(".cache").join("c.pdf"), b"cached").unwrap();

        let results = ingestor.upload_directory(&inbox).unwrap();
        let mut names: Vec<_> = results.iter().map(|r| r.document.filename.clone()).collect();
        names.sort();
        assert_eq!(names, vec!["a.pdf", "b.wav"]);
    }

    #[test]
    fn test_reprocess_requeues_document() {
        let dir = tempfile::tempdir().unwrap();
        let (ingestor, db) = ingestor(dir.path());

        let doc = ingestor.upload("a.docx", b"docx", None).unwrap().document;
        // The original extraction job is still pending.
        assert!(!ingestor.reprocess(&doc.id).unwrap());

        let job = db.dequeue_job(chrono::Utc::now()).unwrap().unwrap();
        db.fail_job(&job.id, "boom").unwrap();
        db.mark_document_failed(&doc.id, "boom").unwrap();

        assert!(ingestor.reprocess(&doc.id).unwrap());
        let doc = db.get_document(&doc.id).unwrap();
        assert_eq!(doc.status, DocumentStatus::Processing);
        assert!(doc.error.is_none());
    }
}
