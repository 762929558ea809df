//! Configuration commands.

use super::get_paths;
use anyhow::{Context, Result};
use colored::Colorize;
use murag_config::{AppPaths, Config};
use std::process::Command;

fn config_file() -> Result<std::path::PathBuf> {
    let paths = AppPaths::new().context("Failed to determine application directories")?;
    Ok(paths.config_file)
}

pub fn show() -> Result<()> {
    let path = config_file()?;

    if !path.exists() {
        anyhow::bail!("Config file not found. Run 'murag init' first.");
    }

    let contents = std::fs::read_to_string(&path).context("Failed to read config file")?;

    println!("{}", "Current Configuration".cyan().bold());
    println!("{}", "─".repeat(50));
    println!("{}", contents);

    Ok(())
}

pub fn edit() -> Result<()> {
    let path = config_file()?;

    if !path.exists() {
        anyhow::bail!("Config file not found. Run 'murag init' first.");
    }

    let editor = std::env::var("EDITOR").unwrap_or_else(|_| {
        if cfg!(target_os = "macos") {
            "open -t".to_string()
        } else {
            "nano".to_string()
        }
    });

    let parts: Vec<&str> = editor.split_whitespace().collect();
    let (cmd, args) = parts.split_first().context("Invalid editor command")?;

    let status = Command::new(cmd)
        .args(args)
        .arg(&path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        anyhow::bail!("Editor exited with error");
    }

    Config::load_from(&path).context("Edited configuration is invalid")?;
    println!("{} Configuration saved.", "✓".green());

    Ok(())
}

/// Print where config, database and blobs live.
pub fn path() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let paths = get_paths(&config)?;

    println!("Config:   {}", paths.config_file.display());
    println!("Database: {}", paths.database_file.display());
    println!("Blobs:    {}", paths.blob_dir.display());

    Ok(())
}

pub fn set(key: &str, value: &str) -> Result<()> {
    let path = config_file()?;
    let mut config = Config::load_from(&path).context("Failed to load config")?;

    config.set(key, value)?;
    config.save_to(&path).context("Failed to save config")?;

    println!("{} Set {} = {}", "✓".green(), key.cyan(), value);

    Ok(())
}
