//! Initialize MuRAG.

use super::get_paths;
use anyhow::{Context, Result};
use colored::Colorize;
use murag_config::Config;
use murag_db::Database;

pub fn run() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let paths = get_paths(&config)?;

    if paths.is_initialized() {
        println!("{} MuRAG is already initialized.", "Note:".yellow().bold());
        println!("  Config: {}", paths.config_file.display());
        println!("  Database: {}", paths.database_file.display());
        return Ok(());
    }

    println!("{}", "Initializing MuRAG...".cyan().bold());

    paths.ensure_dirs().context("Failed to create directories")?;
    println!("  {} Created directories", "✓".green());

    if !paths.config_file.exists() {
        Config::create_default_file(&paths.config_file).context("Failed to create config file")?;
        println!("  {} Created config: {}", "✓".green(), paths.config_file.display());
    }

    Database::open(&paths.database_file).context("Failed to initialize database")?;
    println!("  {} Created database: {}", "✓".green(), paths.database_file.display());
    println!("  {} Blob store: {}", "✓".green(), paths.blob_dir.display());

    let missing: Vec<&str> = murag_process::check_dependencies()
        .into_iter()
        .filter(|(_, available)| !available)
        .map(|(tool, _)| tool)
        .collect();
    if !missing.is_empty() {
        println!();
        println!(
            "{} Not installed: {}. Scanned pages, images or audio will fail until they are.",
            "Warning:".yellow().bold(),
            missing.join(", ")
        );
    }

    println!();
    println!("{}", "MuRAG initialized successfully!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Pull models: {}", "ollama pull nomic-embed-text".cyan());
    println!("  2. Upload files: {}", "murag upload ~/Documents/handbook.pdf".cyan());
    println!("  3. Index them: {}", "murag process --once".cyan());
    println!("  4. Ask away: {}", "murag chat".cyan());

    Ok(())
}
