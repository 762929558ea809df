//! Ask command - answer one question with citations.

use super::{runtime, short_id, Workspace};
use anyhow::{Context, Result};
use colored::Colorize;
use murag_core::Message;
use murag_rag::{ConversationService, Exchange, RagError};
use tokio::runtime::Runtime;

/// Ask a question, in a new conversation unless one is given.
pub fn run(question: &str, conversation: Option<String>) -> Result<()> {
    if question.trim().is_empty() {
        anyhow::bail!("Question is empty");
    }

    let ws = Workspace::open()?;
    let rt = runtime()?;
    let service = ws.conversations(ws.backend()?, ws.snapshots()?);

    let conversation_id = match conversation {
        Some(id) => service.get(&id).context("Unknown conversation")?.id,
        None => service.start(Some(question))?.id,
    };

    println!("{} {}", "Question:".cyan().bold(), question.trim());
    println!("{}", "─".repeat(70));
    println!();

    ask_in(&rt, &service, &conversation_id, question)?;

    println!(
        "{}",
        format!(
            "Continue with: murag ask --conversation {} \"...\"",
            conversation_id
        )
        .dimmed()
    );
    Ok(())
}

/// Submit `question` to a conversation and print the answer.
pub fn ask_in(
    rt: &Runtime,
    service: &ConversationService,
    conversation_id: &str,
    question: &str,
) -> Result<()> {
    match rt.block_on(service.submit(conversation_id, question)) {
        Ok(exchange) => {
            print_exchange(&exchange);
            Ok(())
        }
        Err(RagError::EmptyQuery) => Ok(()),
        Err(e) if e.is_unavailable() => Err(anyhow::anyhow!(
            "{}\nIs Ollama running? Check with 'murag status'.",
            e
        )),
        Err(e) => Err(e.into()),
    }
}

fn print_exchange(exchange: &Exchange) {
    println!("{}", "Answer:".green().bold());
    println!();
    println!("{}", exchange.assistant.content);
    println!();
    print_citations(&exchange.assistant, exchange.implicit_citation);
}

/// Print the citations of an assistant message.
pub fn print_citations(message: &Message, implicit: bool) {
    if message.citations.is_empty() {
        return;
    }

    println!("{}", "─".repeat(70));
    let heading = if implicit {
        "Best matching source:"
    } else {
        "Sources:"
    };
    println!("{}", heading.cyan().bold());
    for citation in &message.citations {
        println!(
            "  [{}] {} {} (similarity: {:.0}%)",
            citation.ordinal,
            citation.label().white(),
            format!("[{}]", short_id(&citation.document_id)).dimmed(),
            citation.score * 100.0
        );
        println!("      {}", format!("murag cite {}", citation.id).dimmed());
    }
    println!();
}
