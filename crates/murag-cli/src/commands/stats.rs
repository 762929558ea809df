//! Stats command - index and usage statistics.

use super::{format_size, Workspace};
use anyhow::Result;
use colored::Colorize;

pub fn run() -> Result<()> {
    let ws = Workspace::open()?;
    let stats = ws.db.get_stats()?;

    println!("{}", "MuRAG Statistics".cyan().bold());
    println!("{}", "─".repeat(50));

    println!();
    println!("{}", "Documents".white().bold());
    println!("  Total: {}", stats.total_documents.to_string().green());
    for (doc_type, count) in &stats.documents_by_type {
        let icon = match doc_type.as_str() {
            "pdf" => "📄",
            "docx" => "📝",
            "image" => "🖼️",
            "audio" => "🎵",
            _ => "📁",
        };
        println!("    {} {}: {}", icon, doc_type, count);
    }
    for (status, count) in &stats.documents_by_status {
        println!("    {}: {}", status, count);
    }

    println!();
    println!("{}", "Index".white().bold());
    println!("  Chunks: {}", stats.total_chunks);
    println!("  Embeddings: {}", stats.total_embeddings);
    if let Some(dims) = stats.embedding_dimensions {
        println!("  Dimensions: {}", dims);
    }

    println!();
    println!("{}", "Pipeline".white().bold());
    println!("  Pending: {}", stats.jobs_pending);
    println!("  Processing: {}", stats.jobs_processing);
    if stats.jobs_failed > 0 {
        println!("  Failed: {}", stats.jobs_failed.to_string().red());
    }

    println!();
    println!("{}", "Conversations".white().bold());
    println!("  Conversations: {}", stats.total_conversations);
    println!("  Messages: {}", stats.total_messages);
    println!("  Citations: {}", stats.total_citations);
    match stats.citation_accuracy() {
        Some(accuracy) => println!(
            "  Citation accuracy: {:.1}% ({}/{} markers)",
            accuracy * 100.0,
            stats.citation_markers_valid,
            stats.citation_markers_total
        ),
        None => println!("  Citation accuracy: {}", "n/a".dimmed()),
    }

    println!();
    println!("{}", "Storage".white().bold());
    println!("  Database: {}", format_size(stats.database_size_bytes));
    if !ws.db.integrity_check()? {
        println!("  {}", "Integrity check failed".red().bold());
    }

    Ok(())
}
