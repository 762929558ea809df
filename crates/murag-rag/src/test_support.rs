//! In-test model fakes and fixture helpers.

use async_trait::async_trait;
use murag_core::{Chunk, Document, DocumentId, DocumentType, Locator, PipelineStage};
use murag_db::Database;
use murag_ollama::{Embedder, Generator, OllamaError, OllamaResult};
use std::sync::Mutex;

/// Keyword vectors: refunds and shipping are orthogonal topics.
pub fn vectorize(text: &str) -> Vec<f32> {
    let text = text.to_lowercase();
    vec![
        if text.contains("refund") { 1.0 } else { 0.0 },
        if text.contains("ship") { 1.0 } else { 0.0 },
        0.1,
    ]
}

pub struct FakeEmbedder;

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, text: &str) -> OllamaResult<Vec<f32>> {
        Ok(vectorize(text))
    }

    fn embedding_model(&self) -> &str {
        "fake-embed"
    }
}

enum Reply {
    Text(String),
    Down,
    Hang,
}

/// Records prompts and answers with a canned reply.
pub struct FakeGenerator {
    reply: Reply,
    prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    fn with_reply(reply: Reply) -> Self {
        Self {
            reply,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::with_reply(Reply::Text(text.to_string()))
    }

    pub fn unreachable() -> Self {
        Self::with_reply(Reply::Down)
    }

    pub fn hanging() -> Self {
        Self::with_reply(Reply::Hang)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for FakeGenerator {
    async fn generate(&self, _system: &str, prompt: &str, _temperature: f32) -> OllamaResult<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.reply {
            Reply::Text(text) => Ok(text.clone()),
            Reply::Down => Err(OllamaError::ServerNotRunning {
                host: "http://localhost:11434".into(),
            }),
            Reply::Hang => std::future::pending().await,
        }
    }

    fn generation_model(&self) -> &str {
        "fake-llm"
    }
}

/// Store a completed document whose chunks are embedded with [`vectorize`].
pub fn seed_document(
    db: &Database,
    filename: &str,
    doc_type: DocumentType,
    passages: &[(&str, Locator)],
) -> (DocumentId, Vec<Chunk>) {
    let doc = Document::new(filename, doc_type, format!("hash-{}", filename))
        .with_blob_path(format!("/blobs/{}", filename));
    db.create_document(&doc).unwrap();

    let chunks: Vec<Chunk> = passages
        .iter()
        .enumerate()
        .map(|(i, (text, locator))| Chunk::new(doc.id.clone(), i as i32, *text, locator.clone()))
        .collect();
    db.replace_chunks(&doc.id, &chunks).unwrap();

    for chunk in &chunks {
        db.store_embedding(&chunk.id, &vectorize(&chunk.content), "fake-embed")
            .unwrap();
    }
    db.set_document_stage(&doc.id, PipelineStage::Embedding).unwrap();
    db.mark_document_completed(&doc.id).unwrap();

    (doc.id, chunks)
}
