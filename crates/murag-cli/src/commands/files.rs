//! Document listing and management commands.

use super::{format_size, short_id, Workspace};
use anyhow::Result;
use colored::Colorize;
use murag_core::{DocumentStatus, Locator};

/// List uploaded documents.
pub fn list(status: Option<String>, limit: i64) -> Result<()> {
    let ws = Workspace::open()?;

    let status = match status {
        Some(s) => Some(
            DocumentStatus::from_str(&s)
                .ok_or_else(|| anyhow::anyhow!("Unknown status: {} (processing, completed, failed)", s))?,
        ),
        None => None,
    };

    let documents = ws.db.list_documents(status, Some(limit))?;
    if documents.is_empty() {
        println!(
            "{}",
            "No documents yet. Use 'murag upload <path>' to add some.".dimmed()
        );
        return Ok(());
    }

    println!("{}", "Documents".cyan().bold());
    println!("{}", "─".repeat(70));

    for doc in &documents {
        let status = match doc.status {
            DocumentStatus::Completed => "●".green(),
            DocumentStatus::Processing => "◐".blue(),
            DocumentStatus::Failed => "✗".red(),
        };
        println!(
            "{} {} {} {} {}",
            status,
            short_id(&doc.id).dimmed(),
            doc.filename.white(),
            format!("[{}]", doc.doc_type).dimmed(),
            format_size(doc.size_bytes).dimmed()
        );
        if doc.status == DocumentStatus::Processing {
            println!("    stage: {}", doc.stage);
        }
        if let Some(err) = &doc.error {
            println!("    {}", err.red());
        }
    }

    Ok(())
}

/// Show one document and its chunks.
pub fn show(id: &str) -> Result<()> {
    let ws = Workspace::open()?;
    let doc = ws.db.get_document_by_prefix(id)?;
    let chunks = ws.db.get_chunks_by_document(&doc.id)?;

    println!("{}", doc.filename.cyan().bold());
    println!("{}", "─".repeat(70));
    println!("  ID: {}", doc.id);
    println!("  Type: {}", doc.doc_type);
    println!("  Size: {}", format_size(doc.size_bytes));
    println!("  Status: {} ({})", doc.status, doc.stage);
    println!("  Uploaded: {}", doc.uploaded_at.format("%Y-%m-%d %H:%M"));
    if let Some(err) = &doc.error {
        println!("  Error: {}", err.red());
    }
    if doc.metadata.as_object().map(|m| !m.is_empty()).unwrap_or(false) {
        println!("  Metadata: {}", doc.metadata);
    }

    println!();
    println!("{} ({})", "Chunks".white().bold(), chunks.len());
    for chunk in chunks.iter().take(10) {
        let location = match &chunk.locator {
            Locator::TimeRange { .. } => chunk.locator.timestamp().unwrap_or_default(),
            other => other.to_string(),
        };
        let preview: String = chunk.content.chars().take(80).collect();
        println!(
            "  {} {}",
            format!("[{}]", location).dimmed(),
            preview.replace('\n', " ")
        );
    }
    if chunks.len() > 10 {
        println!("  {}", format!("...and {} more", chunks.len() - 10).dimmed());
    }

    Ok(())
}

/// Remove a document and everything derived from it.
pub fn remove(id: &str) -> Result<()> {
    let ws = Workspace::open()?;
    let doc = ws.db.get_document_by_prefix(id)?;

    let deletion = ws.ingestor().remove(&doc.id)?;
    println!(
        "{} {} ({} chunks, {} citations)",
        "Removed:".green().bold(),
        deletion.document.filename,
        deletion.chunks_removed,
        deletion.citations_removed
    );

    Ok(())
}

/// Queue a document for extraction again.
pub fn reprocess(id: &str) -> Result<()> {
    let ws = Workspace::open()?;
    let doc = ws.db.get_document_by_prefix(id)?;

    if ws.ingestor().reprocess(&doc.id)? {
        println!("{} {}", "Queued:".green().bold(), doc.filename);
    } else {
        println!(
            "{} {} is already being extracted.",
            "Note:".yellow().bold(),
            doc.filename
        );
    }

    Ok(())
}
