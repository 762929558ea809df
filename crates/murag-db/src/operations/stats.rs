//! Database statistics operations.

use super::jobs::job_counts;
use crate::database::Database;
use crate::error::DbResult;
use murag_core::DatabaseStats;
use rusqlite::OptionalExtension;
use std::collections::HashMap;

impl Database {
    /// Get comprehensive database statistics.
    pub fn get_stats(&self) -> DbResult<DatabaseStats> {
        let conn = self.conn()?;

        let count = |sql: &str| -> DbResult<i64> { Ok(conn.query_row(sql, [], |row| row.get(0))?) };

        let grouped = |sql: &str| -> DbResult<HashMap<String, i64>> {
            let mut map = HashMap::new();
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map([], |row| {
                let key: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                Ok((key, count))
            })?;
            for row in rows {
                let (key, count) = row?;
                map.insert(key, count);
            }
            Ok(map)
        };

        let total_documents = count("SELECT COUNT(*) FROM documents")?;
        let documents_by_status =
            grouped("SELECT status, COUNT(*) FROM documents GROUP BY status")?;
        let documents_by_type =
            grouped("SELECT doc_type, COUNT(*) FROM documents GROUP BY doc_type")?;
        let total_chunks = count("SELECT COUNT(*) FROM chunks")?;
        let total_embeddings = count("SELECT COUNT(*) FROM embeddings")?;

        let embedding_dimensions: Option<i64> = conn
            .query_row(
                "SELECT CAST(value AS INTEGER) FROM index_meta WHERE key = 'dimensions'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        let jobs = job_counts(&conn)?;

        let total_conversations = count("SELECT COUNT(*) FROM conversations")?;
        let total_messages = count("SELECT COUNT(*) FROM messages")?;
        let total_citations = count("SELECT COUNT(*) FROM citations")?;
        let citation_markers_total =
            count("SELECT COALESCE(SUM(markers_emitted), 0) FROM messages")?;
        let citation_markers_valid = count("SELECT COALESCE(SUM(markers_valid), 0) FROM messages")?;

        // Database size (page_count * page_size)
        let page_count: i64 = conn.pragma_query_value(None, "page_count", |row| row.get(0))?;
        let page_size: i64 = conn.pragma_query_value(None, "page_size", |row| row.get(0))?;

        Ok(DatabaseStats {
            total_documents,
            documents_by_status,
            documents_by_type,
            total_chunks,
            total_embeddings,
            embedding_dimensions,
            jobs_pending: jobs.pending,
            jobs_processing: jobs.processing,
            jobs_failed: jobs.failed,
            total_conversations,
            total_messages,
            total_citations,
            citation_markers_total,
            citation_markers_valid,
            database_size_bytes: page_count * page_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murag_core::{
        Chunk, Citation, Conversation, Document, DocumentType, Job, JobKind, Locator, Message,
        PipelineStage,
    };

    #[test]
    fn test_get_stats() {
        let db = Database::open_in_memory().unwrap();

        let pdf = Document::new("a.pdf", DocumentType::Pdf, "h1");
        let img = Document::new("b.png", DocumentType::Image, "h2");
        db.create_document(&pdf).unwrap();
        db.create_document_with_job(&img, &Job::new(img.id.clone(), JobKind::Extract))
            .unwrap();

        let chunk = Chunk::new(pdf.id.clone(), 0, "text", Locator::Page { page: 1 });
        db.replace_chunks(&pdf.id, &[chunk.clone()]).unwrap();
        db.store_embedding(&chunk.id, &[1.0, 0.0], "m").unwrap();
        db.set_document_stage(&pdf.id, PipelineStage::Embedding).unwrap();
        db.mark_document_completed(&pdf.id).unwrap();

        let conversation = Conversation::new();
        db.create_conversation(&conversation).unwrap();
        let mut answer = Message::assistant(conversation.id.clone(), "text [1] [7]");
        answer
            .citations
            .push(Citation::for_chunk(answer.id.clone(), 1, &chunk, &pdf, 0.9));
        db.append_message(&answer).unwrap();
        db.record_citation_audit(&answer.id, 2, 1).unwrap();

        let stats = db.get_stats().unwrap();

        assert_eq!(stats.total_documents, 2);
        assert_eq!(stats.documents_by_type.get("pdf"), Some(&1));
        assert_eq!(stats.documents_by_status.get("completed"), Some(&1));
        assert_eq!(stats.total_chunks, 1);
        assert_eq!(stats.total_embeddings, 1);
        assert_eq!(stats.embedding_dimensions, Some(2));
        assert_eq!(stats.jobs_pending, 1);
        assert_eq!(stats.total_messages, 1);
        assert_eq!(stats.total_citations, 1);
        assert_eq!(stats.citation_accuracy(), Some(0.5));
        assert!(stats.database_size_bytes > 0);
    }
}
