//! Vector storage helpers and the index loader behind query snapshots.

use super::chunks::row_to_chunk;
use crate::database::Database;
use crate::error::DbResult;
use murag_core::{Chunk, DocumentType};

/// One row of the searchable index: a chunk of a completed document and its vector.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
    pub filename: String,
    pub doc_type: DocumentType,
}

/// Calculate cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot_product = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot_product += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator == 0.0 {
        return 0.0;
    }

    dot_product / denominator
}

pub(crate) fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub(crate) fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

impl Database {
    /// Load every embedded chunk of every completed document.
    ///
    /// Documents still processing or failed are excluded, so nothing built
    /// from this list can cite them.
    pub fn load_index(&self) -> DbResult<Vec<IndexEntry>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT c.id, c.document_id, c.chunk_index, c.content, c.locator,
                   e.vector, d.filename, d.doc_type
            FROM embeddings e
            JOIN chunks c ON c.id = e.chunk_id
            JOIN documents d ON d.id = c.document_id
            WHERE d.status = 'completed'
            ORDER BY d.id, c.chunk_index
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            let chunk = row_to_chunk(row)?;
            let vector_bytes: Vec<u8> = row.get(5)?;
            let filename: String = row.get(6)?;
            let doc_type_str: String = row.get(7)?;
            Ok((chunk, vector_bytes, filename, doc_type_str))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (chunk, vector_bytes, filename, doc_type_str) = row?;
            let Some(doc_type) = DocumentType::from_str(&doc_type_str) else {
                tracing::warn!("Skipping chunk {} with unknown type {}", chunk.id, doc_type_str);
                continue;
            };
            entries.push(IndexEntry {
                chunk,
                vector: decode_vector(&vector_bytes),
                filename,
                doc_type,
            });
        }

        Ok(entries)
    }
}
