//! Status command - pipeline queue, external tools and model availability.

use super::{runtime, short_id, Workspace};
use anyhow::Result;
use colored::Colorize;
use murag_core::{DocumentStatus, JobStatus};

pub fn run() -> Result<()> {
    let ws = Workspace::open()?;
    let db = &ws.db;

    println!("{}", "MuRAG Status".cyan().bold());
    println!("{}", "─".repeat(50));

    let counts = db.job_counts()?;

    println!();
    println!("{}", "Pipeline Queue".white().bold());
    println!("  {} Pending: {}", "○".yellow(), counts.pending);
    println!("  {} Processing: {}", "◐".blue(), counts.processing);
    println!("  {} Done: {}", "●".green(), counts.done);
    if counts.failed > 0 {
        println!("  {} Failed: {}", "✗".red(), counts.failed);
    }

    let in_progress = db.list_documents(Some(DocumentStatus::Processing), Some(10))?;
    if !in_progress.is_empty() {
        println!();
        println!("{}", "In Progress".white().bold());
        for doc in &in_progress {
            println!(
                "  {} {} {} ({})",
                "▶".blue(),
                short_id(&doc.id).dimmed(),
                doc.filename,
                doc.stage
            );
        }
    }

    let failed = db.list_jobs(Some(JobStatus::Failed), Some(3))?;
    if !failed.is_empty() {
        println!();
        println!("{}", "Recent Failures".red().bold());
        for job in &failed {
            let name = db
                .get_document(&job.document_id)
                .map(|d| d.filename)
                .unwrap_or_else(|_| job.document_id.clone());
            println!("  {} {} ({} job, {} attempts)", "✗".red(), name, job.kind, job.attempts);
            if let Some(err) = &job.error {
                println!("    {}", err.dimmed());
            }
        }
    }

    println!();
    println!("{}", "External Tools".white().bold());
    for (tool, available) in murag_process::check_dependencies() {
        let mark = if available { "✓".green() } else { "✗".red() };
        println!("  {} {}", mark, tool);
    }

    println!();
    println!("{}", "Ollama".white().bold());
    let backend = ws.backend()?;
    let rt = runtime()?;
    if rt.block_on(backend.client().is_available()) {
        println!("  {} {}", "✓".green(), ws.config.ollama.host);
        for model in [&ws.config.ollama.model, &ws.config.ollama.embedding_model] {
            let present = rt.block_on(backend.client().has_model(model)).unwrap_or(false);
            let mark = if present { "✓".green() } else { "✗".red() };
            println!("  {} {}", mark, model);
        }
    } else {
        println!(
            "  {} not reachable at {} (start it with 'ollama serve')",
            "✗".red(),
            ws.config.ollama.host
        );
    }

    if counts.pending == 0 && counts.processing == 0 {
        println!();
        println!(
            "{}",
            "Nothing queued. Use 'murag upload <path>' to add content.".dimmed()
        );
    }

    Ok(())
}
