//! Serve command - HTTP API plus the background pipeline in one process.

use super::{runtime, Workspace};
use anyhow::{Context, Result};
use colored::Colorize;
use murag_server::AppState;
use std::net::SocketAddr;
use tokio::sync::watch;

pub fn run(host: Option<String>, port: Option<u16>) -> Result<()> {
    let ws = Workspace::open()?;
    let host = host.unwrap_or_else(|| ws.config.server.host.clone());
    let port = port.unwrap_or(ws.config.server.port);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

    let rt = runtime()?;
    let backend = ws.backend()?;
    let snapshots = ws.snapshots()?;
    let worker = ws.worker(backend.clone(), snapshots.clone());
    let state = AppState::with_snapshots(
        ws.db.clone(),
        ws.ingestor(),
        snapshots.clone(),
        backend.clone(),
        backend.clone(),
        ws.config.clone(),
    );

    println!("{}", "MuRAG server".cyan().bold());
    println!("  API:     http://{}/api", addr);
    println!("  Index:   {} chunks", snapshots.current().len());
    println!("  Workers: {}", ws.config.processing.max_concurrent_jobs);
    println!("{}", "Press Ctrl+C to stop.".dimmed());

    rt.block_on(async {
        if !backend.client().is_available().await {
            println!(
                "{} Ollama is not reachable at {}; questions and embedding will fail until it is.",
                "Warning:".yellow().bold(),
                ws.config.ollama.host
            );
        }

        let (tx, rx) = watch::channel(false);
        let pipeline = tokio::spawn(async move { worker.run(rx).await });

        let served = murag_server::serve(state, addr, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

        let _ = tx.send(true);
        pipeline.await.context("Pipeline worker panicked")??;
        served.with_context(|| format!("Server on {} failed", addr))
    })?;

    println!("{}", "Stopped.".dimmed());
    Ok(())
}
