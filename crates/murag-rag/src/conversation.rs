//! Conversations: persisted question/answer exchanges with citations.

use crate::answer::{Answer, Answerer};
use crate::error::{RagError, RagResult};
use murag_core::{Citation, Conversation, Message};
use murag_db::{Database, DbError};
use tracing::{info, warn};

/// Longest conversation title derived from a first question.
const TITLE_CHARS: usize = 60;

/// The two messages one submission produced.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub user: Message,
    pub assistant: Message,
    /// True when the model cited nothing valid and the top hit was attached.
    pub implicit_citation: bool,
}

/// Persists conversations and answers questions inside them.
#[derive(Clone)]
pub struct ConversationService {
    db: Database,
    answerer: Answerer,
}

impl ConversationService {
    pub fn new(db: Database, answerer: Answerer) -> Self {
        Self { db, answerer }
    }

    /// Create a conversation, titled after `first_question` when given.
    pub fn start(&self, first_question: Option<&str>) -> RagResult<Conversation> {
        let mut conversation = Conversation::new();
        if let Some(question) = first_question.map(str::trim).filter(|q| !q.is_empty()) {
            conversation = conversation.with_title(question.chars().take(TITLE_CHARS).collect::<String>());
        }
        self.db.create_conversation(&conversation)?;
        Ok(conversation)
    }

    pub fn get(&self, conversation_id: &str) -> RagResult<Conversation> {
        Ok(self.db.get_conversation(conversation_id)?)
    }

    pub fn list(&self, limit: Option<i64>) -> RagResult<Vec<Conversation>> {
        Ok(self.db.list_conversations(limit)?)
    }

    pub fn history(&self, conversation_id: &str) -> RagResult<Vec<Message>> {
        self.db.get_conversation(conversation_id)?;
        Ok(self.db.get_messages(conversation_id)?)
    }

    /// Ask a question in a conversation.
    ///
    /// Blank input is rejected before anything is written. Otherwise the user
    /// message is stored first, then exactly one assistant message. If
    /// answering fails, the assistant message states the failure and the
    /// error is returned.
    pub async fn submit(&self, conversation_id: &str, text: &str) -> RagResult<Exchange> {
        let question = text.trim();
        if question.is_empty() {
            return Err(RagError::EmptyQuery);
        }

        self.db.get_conversation(conversation_id)?;

        let user = Message::user(conversation_id.to_string(), question);
        self.db.append_message(&user)?;

        let answer = match self.answerer.answer(question).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Answering failed in conversation {}: {}", conversation_id, e);
                let reply = Message::assistant(
                    conversation_id.to_string(),
                    format!("Sorry, I couldn't answer that: {}", e),
                );
                self.db.append_message(&reply)?;
                return Err(e);
            }
        };

        let assistant = self.store_answer(conversation_id, &answer)?;
        info!(
            "Answered in conversation {} with {} citations",
            conversation_id,
            assistant.citations.len()
        );

        Ok(Exchange {
            user,
            assistant,
            implicit_citation: answer.implicit_citation,
        })
    }

    fn store_answer(&self, conversation_id: &str, answer: &Answer) -> RagResult<Message> {
        let mut message = Message::assistant(conversation_id.to_string(), answer.text.clone());
        message.citations = answer
            .cited
            .iter()
            .map(|source| {
                Citation::new(
                    message.id.clone(),
                    source.number as i32,
                    &source.hit.chunk,
                    &source.hit.filename,
                    source.hit.doc_type,
                    source.hit.score,
                )
            })
            .collect();

        match self.db.append_message(&message) {
            Ok(()) => {}
            Err(DbError::InvalidCitation(reason)) => {
                // A cited document was removed while the answer was generated.
                warn!("Storing answer without citations: {}", reason);
                message.citations.clear();
                self.db.append_message(&message)?;
            }
            Err(e) => return Err(e.into()),
        }

        if answer.audit.emitted > 0 {
            self.db.record_citation_audit(
                &message.id,
                answer.audit.emitted as i64,
                answer.audit.valid as i64,
            )?;
        }

        Ok(message)
    }
}
