//! Chunk and embedding storage.

use super::json_column_error;
use crate::database::Database;
use crate::error::{DbError, DbResult};
use murag_core::{Chunk, ChunkId, DocumentId, Locator};
use rusqlite::{params, Connection, OptionalExtension};

impl Database {
    /// Replace all chunks of a document in a transaction.
    ///
    /// Re-running extraction yields the same end state instead of duplicates.
    pub fn replace_chunks(&self, document_id: &DocumentId, chunks: &[Chunk]) -> DbResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM chunks WHERE document_id = ?1", params![document_id])?;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO chunks (id, document_id, chunk_index, content, locator)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )?;

            for chunk in chunks {
                if &chunk.document_id != document_id {
                    return Err(DbError::Other(format!(
                        "Chunk {} belongs to {}, not {}",
                        chunk.id, chunk.document_id, document_id
                    )));
                }
                stmt.execute(params![
                    chunk.id,
                    chunk.document_id,
                    chunk.chunk_index,
                    chunk.content,
                    serde_json::to_string(&chunk.locator)?,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Get a chunk by ID.
    pub fn get_chunk(&self, id: &str) -> DbResult<Chunk> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, document_id, chunk_index, content, locator FROM chunks WHERE id = ?1",
            params![id],
            row_to_chunk,
        )
        .optional()?
        .ok_or_else(|| DbError::NotFound(format!("Chunk not found: {}", id)))
    }

    /// Get all chunks for a document, in order.
    pub fn get_chunks_by_document(&self, document_id: &str) -> DbResult<Vec<Chunk>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, document_id, chunk_index, content, locator
             FROM chunks WHERE document_id = ?1 ORDER BY chunk_index",
        )?;

        let chunks = stmt.query_map(params![document_id], row_to_chunk)?;
        chunks.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Chunks of a document that have no embedding yet.
    pub fn get_unembedded_chunks(&self, document_id: &str) -> DbResult<Vec<Chunk>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT c.id, c.document_id, c.chunk_index, c.content, c.locator
            FROM chunks c
            LEFT JOIN embeddings e ON e.chunk_id = c.id
            WHERE c.document_id = ?1 AND e.chunk_id IS NULL
            ORDER BY c.chunk_index
            "#,
        )?;

        let chunks = stmt.query_map(params![document_id], row_to_chunk)?;
        chunks.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Dimensionality every stored embedding must have, once known.
    pub fn index_dimensions(&self) -> DbResult<Option<usize>> {
        let conn = self.conn()?;
        read_dimensions(&conn)
    }

    /// Store embedding for a chunk.
    pub fn store_embedding(&self, chunk_id: &ChunkId, vector: &[f32], model: &str) -> DbResult<()> {
        self.store_embeddings(&[(chunk_id.clone(), vector.to_vec())], model)
    }

    /// Upsert a batch of embeddings.
    ///
    /// The first write fixes the index dimensionality; any vector of a
    /// different length fails the whole batch with `DimensionMismatch`.
    pub fn store_embeddings(&self, embeddings: &[(ChunkId, Vec<f32>)], model: &str) -> DbResult<()> {
        if embeddings.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let expected = match read_dimensions(&tx)? {
            Some(d) => d,
            None => {
                let d = embeddings[0].1.len();
                if d == 0 {
                    return Err(DbError::DimensionMismatch {
                        expected: 1,
                        actual: 0,
                    });
                }
                tx.execute(
                    "INSERT INTO index_meta (key, value) VALUES ('dimensions', ?1)",
                    params![d.to_string()],
                )?;
                tx.execute(
                    "INSERT OR REPLACE INTO index_meta (key, value) VALUES ('model', ?1)",
                    params![model],
                )?;
                d
            }
        };

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR REPLACE INTO embeddings (chunk_id, vector, model, dimensions)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )?;

            for (chunk_id, vector) in embeddings {
                if vector.len() != expected {
                    return Err(DbError::DimensionMismatch {
                        expected,
                        actual: vector.len(),
                    });
                }
                stmt.execute(params![
                    chunk_id,
                    super::vectors::encode_vector(vector),
                    model,
                    vector.len() as i64
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }
}

fn read_dimensions(conn: &Connection) -> DbResult<Option<usize>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM index_meta WHERE key = 'dimensions'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    match value {
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| DbError::Other(format!("Corrupt index dimensions: {}", v))),
        None => Ok(None),
    }
}

pub(crate) fn row_to_chunk(row: &rusqlite::Row) -> rusqlite::Result<Chunk> {
    let locator_str: String = row.get(4)?;
    let locator: Locator =
        serde_json::from_str(&locator_str).map_err(|e| json_column_error(4, e))?;

    Ok(Chunk {
        id: row.get(0)?,
        document_id: row.get(1)?,
        chunk_index: row.get(2)?,
        content: row.get(3)?,
        locator,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use murag_core::{Document, DocumentType, Region};

    fn setup() -> (Database, Document) {
        let db = Database::open_in_memory().unwrap();
        let doc = Document::new("scan.png", DocumentType::Image, "hash");
        db.create_document(&doc).unwrap();
        (db, doc)
    }

    fn stored_vector(db: &Database, chunk_id: &str) -> Option<Vec<f32>> {
        db.conn()
            .unwrap()
            .query_row(
                "SELECT vector FROM embeddings WHERE chunk_id = ?1",
                params![chunk_id],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()
            .unwrap()
            .map(|bytes| super::super::vectors::decode_vector(&bytes))
    }

    #[test]
    fn test_chunks_keep_locators() {
        let (db, doc) = setup();

        let chunk = Chunk::new(
            doc.id.clone(),
            0,
            "Invoice total",
            Locator::Region {
                page: None,
                region: Region::new(1, 2, 3, 4),
            },
        );
        db.replace_chunks(&doc.id, &[chunk.clone()]).unwrap();

        let fetched = db.get_chunk(&chunk.id).unwrap();
        assert_eq!(fetched.content, "Invoice total");
        assert_eq!(fetched.locator, chunk.locator);
    }

    #[test]
    fn test_replace_chunks_is_idempotent() {
        let (db, doc) = setup();
        let make = || {
            vec![
                Chunk::new(doc.id.clone(), 0, "one", Locator::Page { page: 1 }),
                Chunk::new(doc.id.clone(), 1, "two", Locator::Page { page: 1 }),
            ]
        };

        db.replace_chunks(&doc.id, &make()).unwrap();
        db.replace_chunks(&doc.id, &make()).unwrap();

        let chunks = db.get_chunks_by_document(&doc.id).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].content, "two");
    }

    #[test]
    fn test_embeddings_upsert() {
        let (db, doc) = setup();
        let chunk = Chunk::new(doc.id.clone(), 0, "text", Locator::Page { page: 1 });
        db.replace_chunks(&doc.id, &[chunk.clone()]).unwrap();

        db.store_embedding(&chunk.id, &[0.1, 0.2, 0.3], "test-model").unwrap();
        db.store_embedding(&chunk.id, &[0.3, 0.2, 0.1], "test-model").unwrap();

        let retrieved = stored_vector(&db, &chunk.id).unwrap();
        assert_eq!(retrieved.len(), 3);
        assert!((retrieved[0] - 0.3).abs() < 0.0001);
        assert_eq!(db.index_dimensions().unwrap(), Some(3));
        assert!(db.get_unembedded_chunks(&doc.id).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let (db, doc) = setup();
        let a = Chunk::new(doc.id.clone(), 0, "a", Locator::Page { page: 1 });
        let b = Chunk::new(doc.id.clone(), 1, "b", Locator::Page { page: 1 });
        db.replace_chunks(&doc.id, &[a.clone(), b.clone()]).unwrap();

        db.store_embedding(&a.id, &[1.0, 0.0], "m").unwrap();
        let err = db.store_embedding(&b.id, &[1.0, 0.0, 0.0], "m").unwrap_err();

        assert!(matches!(
            err,
            DbError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
        assert!(stored_vector(&db, &b.id).is_none());
        assert_eq!(db.get_unembedded_chunks(&doc.id).unwrap().len(), 1);
    }

    #[test]
    fn test_mixed_batch_fails_atomically() {
        let (db, doc) = setup();
        let a = Chunk::new(doc.id.clone(), 0, "a", Locator::Page { page: 1 });
        let b = Chunk::new(doc.id.clone(), 1, "b", Locator::Page { page: 1 });
        db.replace_chunks(&doc.id, &[a.clone(), b.clone()]).unwrap();

        let batch = vec![(a.id.clone(), vec![1.0, 0.0]), (b.id.clone(), vec![1.0])];
        assert!(db.store_embeddings(&batch, "m").is_err());

        assert!(stored_vector(&db, &a.id).is_none());
        assert_eq!(db.index_dimensions().unwrap(), None);
    }
}
