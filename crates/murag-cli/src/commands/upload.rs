//! Upload command: add files to the store and queue them for indexing.

use super::{format_size, process, short_id, Workspace};
use anyhow::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use murag_ingest::UploadOutcome;
use std::path::Path;

/// Upload a file or every supported file under a directory.
pub fn run(path: &str, wait: bool) -> Result<()> {
    let ws = Workspace::open()?;
    let ingestor = ws.ingestor();

    let path = Path::new(path);
    if !path.exists() {
        anyhow::bail!("Path does not exist: {}", path.display());
    }

    if path.is_file() {
        let outcome = ingestor.upload_path(path)?;
        print_outcome(&outcome);
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
        pb.set_message(format!("Scanning {}", path.display()));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        let outcomes = ingestor.upload_directory(path)?;
        pb.finish_and_clear();

        if outcomes.is_empty() {
            println!("{}", "No supported files found.".yellow());
            return Ok(());
        }

        let duplicates = outcomes.iter().filter(|o| o.was_duplicate).count();
        for outcome in &outcomes {
            print_outcome(outcome);
        }
        println!();
        println!(
            "{} {} files",
            "Uploaded:".green().bold(),
            outcomes.len() - duplicates
        );
        if duplicates > 0 {
            println!("{} {} already stored", "Skipped:".yellow().bold(), duplicates);
        }
    }

    if wait {
        println!();
        process::run_once(&ws)?;
    } else {
        println!();
        println!(
            "{}",
            "Queued for indexing. Run 'murag process' or 'murag serve' to index.".dimmed()
        );
    }

    Ok(())
}

fn print_outcome(outcome: &UploadOutcome) {
    let doc = &outcome.document;
    if outcome.was_duplicate {
        println!(
            "{} {} (already stored as {})",
            "Duplicate:".yellow().bold(),
            doc.filename,
            short_id(&doc.id)
        );
    } else {
        println!(
            "{} {} {} ({}, {})",
            "Uploaded:".green().bold(),
            doc.filename,
            format!("[{}]", short_id(&doc.id)).dimmed(),
            doc.doc_type,
            format_size(doc.size_bytes)
        );
    }
}
