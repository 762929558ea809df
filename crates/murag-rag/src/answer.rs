//! Cited answering: context assembly, generation and `[n]` marker validation.

use crate::error::{RagError, RagResult};
use crate::retriever::Retriever;
use crate::snapshot::Hit;
use murag_config::RetrievalConfig;
use murag_ollama::prompt::{build_prompt, system_prompt, truncate_content, PromptSource};
use murag_ollama::{Generator, OllamaError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Reply used when retrieval finds nothing above the similarity threshold.
pub const NO_RELEVANT_CONTENT: &str =
    "I couldn't find anything relevant to that question in your documents.";

/// A retrieved passage as numbered in the prompt.
#[derive(Debug, Clone)]
pub struct ContextSource {
    /// The `[n]` number the model cites it by.
    pub number: usize,
    /// Passage text given to the model; may be truncated.
    pub passage: String,
    pub hit: Hit,
}

/// Marker counts for one answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CitationAudit {
    /// `[n]` markers the model wrote.
    pub emitted: usize,
    /// Markers that refer to a numbered source.
    pub valid: usize,
}

/// A generated answer and the sources it cites.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    /// Cited sources, in order of first citation.
    pub cited: Vec<ContextSource>,
    /// True when the model cited nothing valid and the top hit was attached.
    pub implicit_citation: bool,
    pub audit: CitationAudit,
    /// Number of hits retrieved for the question.
    pub retrieved: usize,
}

impl Answer {
    fn no_relevant_content() -> Self {
        Self {
            text: NO_RELEVANT_CONTENT.to_string(),
            cited: Vec::new(),
            implicit_citation: false,
            audit: CitationAudit::default(),
            retrieved: 0,
        }
    }
}

/// Number hits in score order until `char_budget` characters are used.
///
/// The best hit is always included, truncated if it alone exceeds the budget.
pub fn assemble_context(hits: Vec<Hit>, char_budget: usize) -> Vec<ContextSource> {
    let mut remaining = char_budget;
    let mut sources: Vec<ContextSource> = Vec::new();

    for hit in hits {
        let len = hit.chunk.content.chars().count();
        if len > remaining {
            if sources.is_empty() {
                sources.push(ContextSource {
                    number: 1,
                    passage: truncate_content(&hit.chunk.content, char_budget),
                    hit,
                });
            }
            break;
        }

        remaining -= len;
        sources.push(ContextSource {
            number: sources.len() + 1,
            passage: hit.chunk.content.clone(),
            hit,
        });
    }

    sources
}

/// Every number inside `[...]` markers, in order. Accepts `[1]`, `[1][2]` and `[1, 2]`.
pub fn parse_citation_markers(text: &str) -> Vec<usize> {
    let mut markers = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let Some(close) = after.find(']') else {
            break;
        };
        let inner = &after[..close];

        let numbers: Option<Vec<usize>> = inner
            .split(',')
            .map(|part| part.trim().parse().ok())
            .collect();

        match numbers {
            Some(numbers) => {
                markers.extend(numbers);
                rest = &after[close + 1..];
            }
            None => rest = after,
        }
    }

    markers
}

/// Answers questions from retrieved passages.
#[derive(Clone)]
pub struct Answerer {
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    temperature: f32,
    context_char_budget: usize,
    timeout: Duration,
}

impl Answerer {
    pub fn new(retriever: Retriever, generator: Arc<dyn Generator>, config: &RetrievalConfig) -> Self {
        Self {
            retriever,
            generator,
            temperature: config.temperature,
            context_char_budget: config.context_char_budget,
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }

    /// Answer `question`, bounded by the retrieval timeout.
    pub async fn answer(&self, question: &str) -> RagResult<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::EmptyQuery);
        }

        match tokio::time::timeout(self.timeout, self.answer_inner(question)).await {
            Ok(result) => result,
            Err(_) => Err(RagError::Timeout {
                seconds: self.timeout.as_secs(),
            }),
        }
    }

    async fn answer_inner(&self, question: &str) -> RagResult<Answer> {
        let hits = self.retriever.retrieve(question, None).await?;
        if hits.is_empty() {
            info!("No relevant content for question");
            return Ok(Answer::no_relevant_content());
        }

        let retrieved = hits.len();
        let sources = assemble_context(hits, self.context_char_budget);
        let prompt_sources: Vec<PromptSource> = sources
            .iter()
            .map(|s| PromptSource {
                number: s.number,
                label: s.hit.label(),
                content: s.passage.clone(),
            })
            .collect();

        let prompt = build_prompt(question, &prompt_sources);
        debug!(
            "Generating with {} of {} retrieved passages ({})",
            sources.len(),
            retrieved,
            self.generator.generation_model()
        );

        let text = self
            .generator
            .generate(system_prompt(), &prompt, self.temperature)
            .await?;
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(OllamaError::InvalidResponse("Model returned an empty answer".into()).into());
        }

        let markers = parse_citation_markers(&text);
        let mut audit = CitationAudit {
            emitted: markers.len(),
            valid: 0,
        };

        let mut cited: Vec<ContextSource> = Vec::new();
        for number in markers {
            let Some(source) = sources.iter().find(|s| s.number == number) else {
                debug!("Dropping citation [{}] with no matching source", number);
                continue;
            };
            audit.valid += 1;
            if !cited.iter().any(|c| c.number == number) {
                cited.push(source.clone());
            }
        }

        let implicit_citation = cited.is_empty();
        if implicit_citation {
            cited.extend(sources.into_iter().take(1));
        }

        Ok(Answer {
            text,
            cited,
            implicit_citation,
            audit,
            retrieved,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotStore;
    use crate::test_support::{seed_document, FakeEmbedder, FakeGenerator};
    use murag_core::{Chunk, DocumentType, Locator};
    use murag_db::Database;

    fn hit(content: &str, score: f32) -> Hit {
        Hit {
            chunk: Chunk::new("doc".to_string(), 0, content, Locator::Page { page: 1 }),
            filename: "doc.pdf".into(),
            doc_type: DocumentType::Pdf,
            score,
        }
    }

    fn answerer(db: &Database, generator: Arc<FakeGenerator>, config: &RetrievalConfig) -> Answerer {
        let snapshots = Arc::new(SnapshotStore::load(db.clone()).unwrap());
        let retriever = Retriever::new(Arc::new(FakeEmbedder), snapshots, config);
        Answerer::new(retriever, generator, config)
    }

    #[test]
    fn test_parse_citation_markers() {
        assert_eq!(parse_citation_markers("A [1]. B [2][3]."), vec![1, 2, 3]);
        assert_eq!(parse_citation_markers("See [1, 4]"), vec![1, 4]);
        assert_eq!(parse_citation_markers("[[2]] and [note] and []"), vec![2]);
        assert_eq!(parse_citation_markers("no markers [unclosed"), Vec::<usize>::new());
    }

    #[test]
    fn test_assemble_context_respects_budget() {
        let hits = vec![hit("aaaa", 0.9), hit("bbbb", 0.8), hit("cccc", 0.7)];
        let sources = assemble_context(hits, 9);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].number, 1);
        assert_eq!(sources[1].passage, "bbbb");
    }

    #[test]
    fn test_assemble_context_truncates_oversized_best_hit() {
        let sources = assemble_context(vec![hit(&"x".repeat(50), 0.9), hit("y", 0.5)], 10);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].passage.chars().count(), 10);
    }

    #[tokio::test]
    async fn test_answer_keeps_only_valid_citations() {
        let db = Database::open_in_memory().unwrap();
        seed_document(
            &db,
            "handbook.pdf",
            DocumentType::Pdf,
            &[("Refunds are processed within 14 days.", Locator::Page { page: 4 })],
        );

        let generator = Arc::new(FakeGenerator::replying("Refunds take 14 days [1]. Also [7]."));
        let answer = answerer(&db, generator.clone(), &RetrievalConfig::default())
            .answer("How long do refunds take?")
            .await
            .unwrap();

        assert_eq!(answer.cited.len(), 1);
        assert_eq!(answer.cited[0].number, 1);
        assert_eq!(answer.cited[0].hit.filename, "handbook.pdf");
        assert!(!answer.implicit_citation);
        assert_eq!(answer.audit, CitationAudit { emitted: 2, valid: 1 });

        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("[1] handbook.pdf, page 4"));
    }

    #[tokio::test]
    async fn test_uncited_answer_gets_top_hit() {
        let db = Database::open_in_memory().unwrap();
        seed_document(
            &db,
            "handbook.pdf",
            DocumentType::Pdf,
            &[("Refund requests go to billing.", Locator::Page { page: 2 })],
        );

        let generator = Arc::new(FakeGenerator::replying("Ask billing about refunds."));
        let answer = answerer(&db, generator, &RetrievalConfig::default())
            .answer("refund contact?")
            .await
            .unwrap();

        assert!(answer.implicit_citation);
        assert_eq!(answer.cited.len(), 1);
        assert_eq!(answer.audit.emitted, 0);
    }

    #[tokio::test]
    async fn test_no_relevant_content_skips_generator() {
        let db = Database::open_in_memory().unwrap();
        seed_document(
            &db,
            "standup.mp3",
            DocumentType::Audio,
            &[("We ship on Friday.", Locator::TimeRange { start: 0.0, end: 4.0 })],
        );

        let generator = Arc::new(FakeGenerator::replying("unused"));
        let answer = answerer(&db, generator.clone(), &RetrievalConfig::default())
            .answer("What is the refund policy?")
            .await
            .unwrap();

        assert_eq!(answer.text, NO_RELEVANT_CONTENT);
        assert!(answer.cited.is_empty());
        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_empty_question_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let generator = Arc::new(FakeGenerator::replying("unused"));
        let result = answerer(&db, generator, &RetrievalConfig::default())
            .answer("   ")
            .await;
        assert!(matches!(result, Err(RagError::EmptyQuery)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_model_times_out() {
        let db = Database::open_in_memory().unwrap();
        seed_document(
            &db,
            "handbook.pdf",
            DocumentType::Pdf,
            &[("Refunds are processed within 14 days.", Locator::Page { page: 4 })],
        );

        let config = RetrievalConfig {
            timeout_seconds: 5,
            ..Default::default()
        };
        let result = answerer(&db, Arc::new(FakeGenerator::hanging()), &config)
            .answer("refunds?")
            .await;
        assert!(matches!(result, Err(RagError::Timeout { seconds: 5 })));
    }
}
