//! Process command: run the indexing pipeline in the foreground.

use super::{runtime, Workspace};
use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use murag_core::DocumentStatus;
use murag_ingest::{PipelineConfig, PipelineWorker};
use tokio::sync::watch;

pub fn run(once: bool) -> Result<()> {
    let ws = Workspace::open()?;
    if once {
        run_once(&ws)
    } else {
        run_forever(&ws)
    }
}

/// Drain every job that is due, then print a summary.
pub fn run_once(ws: &Workspace) -> Result<()> {
    let rt = runtime()?;
    let backend = ws.backend()?;

    if !rt.block_on(backend.client().is_available()) {
        println!(
            "{} Ollama is not reachable at {}; embedding jobs will be retried later.",
            "Warning:".yellow().bold(),
            ws.config.ollama.host
        );
    }

    let worker = PipelineWorker::new(ws.db.clone(), backend, PipelineConfig::from_config(&ws.config));

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message("Processing queue...");
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    // May run beside `murag serve`, so claimed jobs are never recovered here.
    let processed = rt
        .block_on(worker.run_once())
        .context("Pipeline failed")?;
    pb.finish_and_clear();

    let counts = ws.db.job_counts()?;
    println!("{} {} jobs", "Processed:".green().bold(), processed);
    if counts.pending > 0 {
        println!("  {} {} waiting to retry", "○".yellow(), counts.pending);
    }

    let failed = ws.db.list_documents(Some(DocumentStatus::Failed), Some(5))?;
    for doc in &failed {
        println!(
            "  {} {}: {}",
            "✗".red(),
            doc.filename,
            doc.error.as_deref().unwrap_or("unknown error").dimmed()
        );
    }

    Ok(())
}

fn run_forever(ws: &Workspace) -> Result<()> {
    let rt = runtime()?;
    let worker = PipelineWorker::new(
        ws.db.clone(),
        ws.backend()?,
        PipelineConfig::from_config(&ws.config),
    );

    println!(
        "{} (max {} concurrent jobs). Press Ctrl+C to stop.",
        "Processing uploads".cyan().bold(),
        ws.config.processing.max_concurrent_jobs
    );

    rt.block_on(async {
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(true);
            }
        });
        worker.run(rx).await
    })?;

    println!("{}", "Stopped.".dimmed());
    Ok(())
}
