//! Document CRUD operations.

use super::jobs::insert_job;
use super::{json_column_error, parse_datetime, parse_optional_datetime};
use crate::database::Database;
use crate::error::{DbError, DbResult};
use chrono::Utc;
use murag_core::{Document, DocumentStatus, DocumentType, Job, PipelineStage};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::info;

const DOCUMENT_COLUMNS: &str = "id, filename, doc_type, size_bytes, content_hash, blob_path, \
     status, stage, error, uploaded_at, processed_at, metadata";

/// What a document removal took with it.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentDeletion {
    pub document: Document,
    pub chunks_removed: i64,
    pub citations_removed: i64,
}

impl Database {
    /// Create a new document.
    pub fn create_document(&self, document: &Document) -> DbResult<()> {
        let conn = self.conn()?;
        insert_document(&conn, document)?;
        Ok(())
    }

    /// Create a document and its first pipeline job atomically.
    pub fn create_document_with_job(&self, document: &Document, job: &Job) -> DbResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        insert_document(&tx, document)?;
        insert_job(&tx, job)?;
        tx.commit()?;
        Ok(())
    }

    /// Get a document by ID.
    pub fn get_document(&self, id: &str) -> DbResult<Document> {
        let conn = self.conn()?;
        query_document(&conn, id)?
            .ok_or_else(|| DbError::NotFound(format!("Document not found: {}", id)))
    }

    /// Get a document by ID prefix.
    ///
    /// Useful for CLI where users can type partial IDs.
    pub fn get_document_by_prefix(&self, prefix: &str) -> DbResult<Document> {
        let conn = self.conn()?;

        if let Some(doc) = query_document(&conn, prefix)? {
            return Ok(doc);
        }

        let pattern = format!("{}%", prefix);
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM documents WHERE id LIKE ?1 LIMIT 2",
            DOCUMENT_COLUMNS
        ))?;

        let mut docs: Vec<Document> = stmt
            .query_map(params![pattern], row_to_document)?
            .collect::<Result<Vec<_>, _>>()?;

        match docs.len() {
            0 => Err(DbError::NotFound(format!("Document not found: {}", prefix))),
            1 => Ok(docs.remove(0)),
            _ => Err(DbError::Other(format!(
                "Ambiguous ID prefix '{}': multiple documents match",
                prefix
            ))),
        }
    }

    /// Find a document by the SHA-256 of its bytes.
    pub fn find_document_by_hash(&self, hash: &str) -> DbResult<Option<Document>> {
        let conn = self.conn()?;
        let doc = conn
            .query_row(
                &format!("SELECT {} FROM documents WHERE content_hash = ?1", DOCUMENT_COLUMNS),
                params![hash],
                row_to_document,
            )
            .optional()?;
        Ok(doc)
    }

    /// List documents, newest first.
    pub fn list_documents(
        &self,
        status: Option<DocumentStatus>,
        limit: Option<i64>,
    ) -> DbResult<Vec<Document>> {
        let conn = self.conn()?;
        let limit = limit.unwrap_or(100);

        let docs = match status {
            Some(s) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM documents WHERE status = ?1 ORDER BY uploaded_at DESC LIMIT ?2",
                    DOCUMENT_COLUMNS
                ))?;
                let rows = stmt.query_map(params![s.as_str(), limit], row_to_document)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM documents ORDER BY uploaded_at DESC LIMIT ?1",
                    DOCUMENT_COLUMNS
                ))?;
                let rows = stmt.query_map(params![limit], row_to_document)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };

        Ok(docs)
    }

    /// Record which pipeline stage a document has reached.
    pub fn set_document_stage(&self, id: &str, stage: PipelineStage) -> DbResult<()> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE documents SET stage = ?2 WHERE id = ?1",
            params![id, stage.as_str()],
        )?;

        if rows == 0 {
            return Err(DbError::NotFound(format!("Document not found: {}", id)));
        }
        Ok(())
    }

    /// Merge extraction metadata (page count, duration...) into the document.
    pub fn merge_document_metadata(&self, id: &str, extra: &serde_json::Value) -> DbResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let current: String = tx
            .query_row(
                "SELECT metadata FROM documents WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| DbError::NotFound(format!("Document not found: {}", id)))?;

        let mut merged: serde_json::Value = serde_json::from_str(&current).unwrap_or_default();
        if !merged.is_object() {
            merged = serde_json::json!({});
        }
        if let (Some(target), Some(source)) = (merged.as_object_mut(), extra.as_object()) {
            for (k, v) in source {
                target.insert(k.clone(), v.clone());
            }
        }

        tx.execute(
            "UPDATE documents SET metadata = ?2 WHERE id = ?1",
            params![id, merged.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Mark a document as fully indexed and searchable.
    ///
    /// Only a document still processing in the embedding stage with at least
    /// one chunk is completed. Returns false when it was left unchanged, for
    /// example because it was reprocessed or failed in the meantime.
    pub fn mark_document_completed(&self, id: &str) -> DbResult<bool> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE documents SET status = 'completed', stage = 'indexed', error = NULL, processed_at = ?2
             WHERE id = ?1 AND status = 'processing' AND stage = 'embedding'
               AND EXISTS (SELECT 1 FROM chunks WHERE document_id = ?1)",
            params![id, Utc::now().to_rfc3339()],
        )?;
        Ok(rows > 0)
    }

    /// Mark a document as failed, keeping the stage it failed in.
    pub fn mark_document_failed(&self, id: &str, error: &str) -> DbResult<()> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE documents SET status = 'failed', error = ?2, processed_at = ?3 WHERE id = ?1",
            params![id, error, Utc::now().to_rfc3339()],
        )?;

        if rows == 0 {
            return Err(DbError::NotFound(format!("Document not found: {}", id)));
        }
        Ok(())
    }

    /// Delete a document and everything derived from it in one transaction.
    ///
    /// Chunks, embeddings, citations and jobs go with it through the
    /// `ON DELETE CASCADE` foreign keys.
    pub fn delete_document(&self, id: &str) -> DbResult<DocumentDeletion> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let document = query_document(&tx, id)?
            .ok_or_else(|| DbError::NotFound(format!("Document not found: {}", id)))?;

        let chunks_removed: i64 = tx.query_row(
            "SELECT COUNT(*) FROM chunks WHERE document_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        let citations_removed: i64 = tx.query_row(
            "SELECT COUNT(*) FROM citations WHERE document_id = ?1",
            params![id],
            |row| row.get(0),
        )?;

        tx.execute("DELETE FROM documents WHERE id = ?1", params![id])?;
        tx.commit()?;

        info!(
            "Deleted document {} ({} chunks, {} citations)",
            document.filename, chunks_removed, citations_removed
        );

        Ok(DocumentDeletion {
            document,
            chunks_removed,
            citations_removed,
        })
    }

    /// Drop a document's chunks and put it back in the queue.
    ///
    /// Queued embedding jobs for the old chunks are dropped too. Returns false
    /// when an extraction job for it is already in flight.
    pub fn reset_document_for_reprocessing(&self, id: &str, job: &Job) -> DbResult<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let rows = tx.execute(
            "UPDATE documents SET status = 'processing', stage = 'queued', error = NULL, processed_at = NULL
             WHERE id = ?1",
            params![id],
        )?;
        if rows == 0 {
            return Err(DbError::NotFound(format!("Document not found: {}", id)));
        }

        tx.execute("DELETE FROM chunks WHERE document_id = ?1", params![id])?;
        tx.execute(
            "DELETE FROM jobs WHERE document_id = ?1
               AND (status IN ('done', 'failed') OR (kind = 'embed' AND status = 'pending'))",
            params![id],
        )?;
        let enqueued = insert_job(&tx, job)?;

        tx.commit()?;
        Ok(enqueued)
    }
}

fn insert_document(conn: &Connection, doc: &Document) -> rusqlite::Result<usize> {
    conn.execute(
        r#"
        INSERT INTO documents (id, filename, doc_type, size_bytes, content_hash, blob_path,
                               status, stage, error, uploaded_at, processed_at, metadata)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
        params![
            doc.id,
            doc.filename,
            doc.doc_type.as_str(),
            doc.size_bytes,
            doc.content_hash,
            doc.blob_path,
            doc.status.as_str(),
            doc.stage.as_str(),
            doc.error,
            doc.uploaded_at.to_rfc3339(),
            doc.processed_at.map(|dt| dt.to_rfc3339()),
            doc.metadata.to_string(),
        ],
    )
}

fn query_document(conn: &Connection, id: &str) -> DbResult<Option<Document>> {
    let doc = conn
        .query_row(
            &format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS),
            params![id],
            row_to_document,
        )
        .optional()?;
    Ok(doc)
}

pub(crate) fn row_to_document(row: &rusqlite::Row) -> rusqlite::Result<Document> {
    let doc_type_str: String = row.get(2)?;
    let status_str: String = row.get(6)?;
    let stage_str: String = row.get(7)?;
    let uploaded_at_str: String = row.get(9)?;
    let processed_at_str: Option<String> = row.get(10)?;
    let metadata_str: String = row.get(11)?;

    let doc_type = DocumentType::from_str(&doc_type_str).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(2, doc_type_str.clone(), rusqlite::types::Type::Text)
    })?;

    Ok(Document {
        id: row.get(0)?,
        filename: row.get(1)?,
        doc_type,
        size_bytes: row.get(3)?,
        content_hash: row.get(4)?,
        blob_path: row.get(5)?,
        status: DocumentStatus::from_str(&status_str).unwrap_or_default(),
        stage: PipelineStage::from_str(&stage_str).unwrap_or_default(),
        error: row.get(8)?,
        uploaded_at: parse_datetime(&uploaded_at_str),
        processed_at: parse_optional_datetime(processed_at_str),
        metadata: serde_json::from_str(&metadata_str).map_err(|e| json_column_error(11, e))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use murag_core::{Chunk, JobKind, Locator};

    fn pdf(hash: &str) -> Document {
        Document::new(format!("{}.pdf", hash), DocumentType::Pdf, hash).with_size(10)
    }

    #[test]
    fn test_document_crud() {
        let db = Database::open_in_memory().unwrap();

        let doc = pdf("aaa").with_blob_path("/blobs/aa/aaa");
        db.create_document(&doc).unwrap();

        let fetched = db.get_document(&doc.id).unwrap();
        assert_eq!(fetched.filename, "aaa.pdf");
        assert_eq!(fetched.doc_type, DocumentType::Pdf);
        assert_eq!(fetched.status, DocumentStatus::Processing);

        // No chunks yet, so it cannot be completed.
        db.set_document_stage(&doc.id, PipelineStage::Embedding).unwrap();
        assert!(!db.mark_document_completed(&doc.id).unwrap());

        db.replace_chunks(
            &doc.id,
            &[Chunk::new(doc.id.clone(), 0, "text", Locator::Page { page: 1 })],
        )
        .unwrap();
        assert!(db.mark_document_completed(&doc.id).unwrap());

        let fetched = db.get_document(&doc.id).unwrap();
        assert_eq!(fetched.status, DocumentStatus::Completed);
        assert_eq!(fetched.stage, PipelineStage::Indexed);
        assert!(fetched.processed_at.is_some());
    }

    #[test]
    fn test_find_by_hash_and_prefix() {
        let db = Database::open_in_memory().unwrap();
        let doc = pdf("deadbeef");
        db.create_document(&doc).unwrap();

        assert!(db.find_document_by_hash("deadbeef").unwrap().is_some());
        assert!(db.find_document_by_hash("cafe").unwrap().is_none());

        let by_prefix = db.get_document_by_prefix(&doc.id[..8]).unwrap();
        assert_eq!(by_prefix.id, doc.id);
    }

    #[test]
    fn test_duplicate_hash_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.create_document(&pdf("same")).unwrap();
        assert!(db.create_document(&pdf("same")).is_err());
    }

    #[test]
    fn test_merge_metadata() {
        let db = Database::open_in_memory().unwrap();
        let doc = pdf("meta");
        db.create_document(&doc).unwrap();

        db.merge_document_metadata(&doc.id, &serde_json::json!({"pages": 3}))
            .unwrap();
        db.merge_document_metadata(&doc.id, &serde_json::json!({"ocr_pages": [2]}))
            .unwrap();

        let fetched = db.get_document(&doc.id).unwrap();
        assert_eq!(fetched.metadata["pages"], 3);
        assert_eq!(fetched.metadata["ocr_pages"][0], 2);
    }

    #[test]
    fn test_delete_removes_only_target() {
        let db = Database::open_in_memory().unwrap();

        let keep = pdf("keep");
        let drop = pdf("drop");
        db.create_document(&keep).unwrap();
        db.create_document_with_job(&drop, &Job::new(drop.id.clone(), JobKind::Extract))
            .unwrap();

        let chunks = vec![
            Chunk::new(drop.id.clone(), 0, "a", Locator::Page { page: 1 }),
            Chunk::new(drop.id.clone(), 1, "b", Locator::Page { page: 2 }),
        ];
        db.replace_chunks(&drop.id, &chunks).unwrap();
        db.replace_chunks(
            &keep.id,
            &[Chunk::new(keep.id.clone(), 0, "c", Locator::Page { page: 1 })],
        )
        .unwrap();

        let deletion = db.delete_document(&drop.id).unwrap();
        assert_eq!(deletion.chunks_removed, 2);
        assert_eq!(deletion.document.id, drop.id);

        assert!(matches!(db.get_document(&drop.id), Err(DbError::NotFound(_))));
        assert!(db.get_chunks_by_document(&drop.id).unwrap().is_empty());
        assert!(db.list_jobs(None, None).unwrap().is_empty());

        let remaining = db.list_documents(None, None).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, keep.id);
        assert_eq!(db.get_chunks_by_document(&keep.id).unwrap().len(), 1);
    }

    #[test]
    fn test_mark_completed_skips_failed_document() {
        let db = Database::open_in_memory().unwrap();
        let doc = pdf("gone");
        db.create_document(&doc).unwrap();
        db.replace_chunks(
            &doc.id,
            &[Chunk::new(doc.id.clone(), 0, "text", Locator::Page { page: 1 })],
        )
        .unwrap();
        db.set_document_stage(&doc.id, PipelineStage::Embedding).unwrap();
        db.mark_document_failed(&doc.id, "extraction failed").unwrap();

        assert!(!db.mark_document_completed(&doc.id).unwrap());
        assert_eq!(db.get_document(&doc.id).unwrap().status, DocumentStatus::Failed);
    }

    #[test]
    fn test_reprocess_drops_queued_embedding() {
        let db = Database::open_in_memory().unwrap();
        let doc = pdf("stale");
        db.create_document(&doc).unwrap();
        db.enqueue_job(&Job::new(doc.id.clone(), JobKind::Embed)).unwrap();

        db.reset_document_for_reprocessing(&doc.id, &Job::new(doc.id.clone(), JobKind::Extract))
            .unwrap();

        let jobs = db.list_jobs(None, None).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].kind, JobKind::Extract);
    }

    #[test]
    fn test_delete_missing_document() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.delete_document("nope"),
            Err(DbError::NotFound(_))
        ));
    }

    #[test]
    fn test_reset_for_reprocessing() {
        let db = Database::open_in_memory().unwrap();
        let doc = pdf("again");
        db.create_document(&doc).unwrap();
        db.replace_chunks(
            &doc.id,
            &[Chunk::new(doc.id.clone(), 0, "old", Locator::Page { page: 1 })],
        )
        .unwrap();
        db.mark_document_failed(&doc.id, "boom").unwrap();

        let enqueued = db
            .reset_document_for_reprocessing(&doc.id, &Job::new(doc.id.clone(), JobKind::Extract))
            .unwrap();
        assert!(enqueued);

        let fetched = db.get_document(&doc.id).unwrap();
        assert_eq!(fetched.status, DocumentStatus::Processing);
        assert!(fetched.error.is_none());
        assert!(db.get_chunks_by_document(&doc.id).unwrap().is_empty());

        // The queued extraction has not produced chunks, so nothing can complete it.
        db.set_document_stage(&doc.id, PipelineStage::Embedding).unwrap();
        assert!(!db.mark_document_completed(&doc.id).unwrap());

        // A second request while the first is still queued is a no-op.
        let enqueued = db
            .reset_document_for_reprocessing(&doc.id, &Job::new(doc.id.clone(), JobKind::Extract))
            .unwrap();
        assert!(!enqueued);
    }
}
