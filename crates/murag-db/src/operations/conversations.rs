//! Conversations, messages and their citations.

use super::parse_datetime;
use crate::database::Database;
use crate::error::{DbError, DbResult};
use murag_core::{Citation, Conversation, DocumentType, Message, Role};
use rusqlite::{params, Connection, OptionalExtension};

const CITATION_COLUMNS: &str =
    "id, message_id, ordinal, chunk_id, document_id, source, doc_type, page, timestamp, score";

impl Database {
    /// Create a new conversation.
    pub fn create_conversation(&self, conversation: &Conversation) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO conversations (id, title, created_at) VALUES (?1, ?2, ?3)",
            params![
                conversation.id,
                conversation.title,
                conversation.created_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    /// Get a conversation by ID.
    pub fn get_conversation(&self, id: &str) -> DbResult<Conversation> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, title, created_at FROM conversations WHERE id = ?1",
            params![id],
            row_to_conversation,
        )
        .optional()?
        .ok_or_else(|| DbError::NotFound(format!("Conversation not found: {}", id)))
    }

    /// List conversations, newest first.
    pub fn list_conversations(&self, limit: Option<i64>) -> DbResult<Vec<Conversation>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, created_at FROM conversations ORDER BY created_at DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit.unwrap_or(50)], row_to_conversation)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Delete a conversation and its messages.
    pub fn delete_conversation(&self, id: &str) -> DbResult<()> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM conversations WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(DbError::NotFound(format!("Conversation not found: {}", id)));
        }
        Ok(())
    }

    /// Append a message together with its citations.
    ///
    /// Every citation must point at an existing chunk of a completed document;
    /// otherwise nothing is written.
    pub fn append_message(&self, message: &Message) -> DbResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let exists: bool = tx
            .query_row(
                "SELECT 1 FROM conversations WHERE id = ?1",
                params![message.conversation_id],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if !exists {
            return Err(DbError::NotFound(format!(
                "Conversation not found: {}",
                message.conversation_id
            )));
        }

        tx.execute(
            r#"
            INSERT INTO messages (id, conversation_id, role, content, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                message.id,
                message.conversation_id,
                message.role.as_str(),
                message.content,
                message.created_at.to_rfc3339(),
            ],
        )?;

        for citation in &message.citations {
            verify_citation_target(&tx, citation)?;
            tx.execute(
                &format!(
                    "INSERT INTO citations ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    CITATION_COLUMNS
                ),
                params![
                    citation.id,
                    message.id,
                    citation.ordinal,
                    citation.chunk_id,
                    citation.document_id,
                    citation.source,
                    citation.doc_type.as_str(),
                    citation.page,
                    citation.timestamp,
                    citation.score as f64,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Record how many `[n]` markers the model emitted for a message and how many were valid.
    pub fn record_citation_audit(&self, message_id: &str, emitted: i64, valid: i64) -> DbResult<()> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE messages SET markers_emitted = ?2, markers_valid = ?3 WHERE id = ?1",
            params![message_id, emitted, valid],
        )?;
        if rows == 0 {
            return Err(DbError::NotFound(format!("Message not found: {}", message_id)));
        }
        Ok(())
    }

    /// All messages of a conversation in the order they were appended.
    pub fn get_messages(&self, conversation_id: &str) -> DbResult<Vec<Message>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, conversation_id, role, content, created_at
             FROM messages WHERE conversation_id = ?1 ORDER BY created_at, rowid",
        )?;
        let mut messages = stmt
            .query_map(params![conversation_id], row_to_message)?
            .collect::<Result<Vec<_>, _>>()?;

        for message in &mut messages {
            message.citations = citations_for_message(&conn, &message.id)?;
        }

        Ok(messages)
    }

    /// Get a single citation by ID.
    pub fn get_citation(&self, id: &str) -> DbResult<Citation> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM citations WHERE id = ?1", CITATION_COLUMNS),
            params![id],
            row_to_citation,
        )
        .optional()?
        .ok_or_else(|| DbError::NotFound(format!("Citation not found: {}", id)))
    }
}

fn verify_citation_target(conn: &Connection, citation: &Citation) -> DbResult<()> {
    let target: Option<(String, String)> = conn
        .query_row(
            "SELECT c.document_id, d.status FROM chunks c
             JOIN documents d ON d.id = c.document_id
             WHERE c.id = ?1",
            params![citation.chunk_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match target {
        None => Err(DbError::InvalidCitation(format!(
            "chunk {} does not exist",
            citation.chunk_id
        ))),
        Some((document_id, _)) if document_id != citation.document_id => {
            Err(DbError::InvalidCitation(format!(
                "chunk {} belongs to document {}, not {}",
                citation.chunk_id, document_id, citation.document_id
            )))
        }
        Some((_, status)) if status != "completed" => Err(DbError::InvalidCitation(format!(
            "document {} is {}",
            citation.document_id, status
        ))),
        Some(_) => Ok(()),
    }
}

fn citations_for_message(conn: &Connection, message_id: &str) -> DbResult<Vec<Citation>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {} FROM citations WHERE message_id = ?1 ORDER BY ordinal",
        CITATION_COLUMNS
    ))?;
    let rows = stmt.query_map(params![message_id], row_to_citation)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
}

fn row_to_conversation(row: &rusqlite::Row) -> rusqlite::Result<Conversation> {
    let created_at_str: String = row.get(2)?;
    Ok(Conversation {
        id: row.get(0)?,
        title: row.get(1)?,
        created_at: parse_datetime(&created_at_str),
    })
}

fn row_to_message(row: &rusqlite::Row) -> rusqlite::Result<Message> {
    let role_str: String = row.get(2)?;
    let created_at_str: String = row.get(4)?;
    let role = Role::from_str(&role_str).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(2, role_str.clone(), rusqlite::types::Type::Text)
    })?;

    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        role,
        content: row.get(3)?,
        citations: Vec::new(),
        created_at: parse_datetime(&created_at_str),
    })
}

fn row_to_citation(row: &rusqlite::Row) -> rusqlite::Result<Citation> {
    let doc_type_str: String = row.get(6)?;
    let doc_type = DocumentType::from_str(&doc_type_str).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(6, doc_type_str.clone(), rusqlite::types::Type::Text)
    })?;
    let score: f64 = row.get(9)?;

    Ok(Citation {
        id: row.get(0)?,
        message_id: row.get(1)?,
        ordinal: row.get(2)?,
        chunk_id: row.get(3)?,
        document_id: row.get(4)?,
        source: row.get(5)?,
        doc_type,
        page: row.get(7)?,
        timestamp: row.get(8)?,
        score: score as f32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use murag_core::{Chunk, Document, Locator, PipelineStage};

    fn setup() -> (Database, Document, Chunk, Conversation) {
        let db = Database::open_in_memory().unwrap();
        let doc = Document::new("talk.mp3", DocumentType::Audio, "hash");
        db.create_document(&doc).unwrap();
        let chunk = Chunk::new(
            doc.id.clone(),
            0,
            "We ship on Friday",
            Locator::TimeRange {
                start: 155.0,
                end: 170.0,
            },
        );
        db.replace_chunks(&doc.id, &[chunk.clone()]).unwrap();
        let conversation = Conversation::new();
        db.create_conversation(&conversation).unwrap();
        (db, doc, chunk, conversation)
    }

    #[test]
    fn test_messages_round_trip_with_citations() {
        let (db, doc, chunk, conversation) = setup();
        db.set_document_stage(&doc.id, PipelineStage::Embedding).unwrap();
        db.mark_document_completed(&doc.id).unwrap();

        let question = Message::user(conversation.id.clone(), "When do we ship?");
        db.append_message(&question).unwrap();

        let mut answer = Message::assistant(conversation.id.clone(), "On Friday [1].");
        answer
            .citations
            .push(Citation::for_chunk(answer.id.clone(), 1, &chunk, &doc, 0.87));
        db.append_message(&answer).unwrap();
        db.record_citation_audit(&answer.id, 1, 1).unwrap();

        let messages = db.get_messages(&conversation.id).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].citations.len(), 1);

        let citation = db.get_citation(&answer.citations[0].id).unwrap();
        assert_eq!(citation.timestamp.as_deref(), Some("00:02:35"));
        assert_eq!(citation.chunk_id, chunk.id);
    }

    #[test]
    fn test_citation_to_unfinished_document_rejected() {
        let (db, doc, chunk, conversation) = setup();

        let mut answer = Message::assistant(conversation.id.clone(), "Friday [1].");
        answer
            .citations
            .push(Citation::for_chunk(answer.id.clone(), 1, &chunk, &doc, 0.5));

        assert!(matches!(
            db.append_message(&answer),
            Err(DbError::InvalidCitation(_))
        ));
        // Nothing was written, not even the message itself.
        assert!(db.get_messages(&conversation.id).unwrap().is_empty());
    }

    #[test]
    fn test_citation_to_missing_chunk_rejected() {
        let (db, doc, mut chunk, conversation) = setup();
        db.set_document_stage(&doc.id, PipelineStage::Embedding).unwrap();
        db.mark_document_completed(&doc.id).unwrap();
        chunk.id = "not-a-chunk".into();

        let mut answer = Message::assistant(conversation.id.clone(), "Friday [1].");
        answer
            .citations
            .push(Citation::for_chunk(answer.id.clone(), 1, &chunk, &doc, 0.5));

        assert!(matches!(
            db.append_message(&answer),
            Err(DbError::InvalidCitation(_))
        ));
    }

    #[test]
    fn test_message_requires_conversation() {
        let (db, _, _, _) = setup();
        let orphan = Message::user("missing".into(), "hello");
        assert!(matches!(db.append_message(&orphan), Err(DbError::NotFound(_))));
    }

    #[test]
    fn test_document_removal_drops_citations() {
        let (db, doc, chunk, conversation) = setup();
        db.set_document_stage(&doc.id, PipelineStage::Embedding).unwrap();
        db.mark_document_completed(&doc.id).unwrap();

        let mut answer = Message::assistant(conversation.id.clone(), "Friday [1].");
        let citation = Citation::for_chunk(answer.id.clone(), 1, &chunk, &doc, 0.5);
        answer.citations.push(citation.clone());
        db.append_message(&answer).unwrap();

        let deletion = db.delete_document(&doc.id).unwrap();
        assert_eq!(deletion.citations_removed, 1);
        assert!(matches!(
            db.get_citation(&citation.id),
            Err(DbError::NotFound(_))
        ));
        assert_eq!(db.get_messages(&conversation.id).unwrap().len(), 1);
    }

    #[test]
    fn test_conversation_listing_and_delete() {
        let (db, _, _, conversation) = setup();
        db.create_conversation(&Conversation::new().with_title("second")).unwrap();
        assert_eq!(db.list_conversations(None).unwrap().len(), 2);

        db.delete_conversation(&conversation.id).unwrap();
        assert!(db.get_conversation(&conversation.id).is_err());
    }
}
