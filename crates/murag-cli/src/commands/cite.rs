//! Cite command - open the source behind a citation.

use super::Workspace;
use anyhow::Result;
use colored::Colorize;
use murag_rag::{resolve, Preview};

pub fn run(citation_id: &str) -> Result<()> {
    let ws = Workspace::open()?;
    let preview = resolve(&ws.db, citation_id)?;

    println!("{}", preview.label.cyan().bold());
    println!("{}", "─".repeat(70));
    println!("{}", "Cited passage:".white().bold());
    println!("{}", preview.chunk_text);
    println!();

    match &preview.preview {
        Preview::Page {
            page,
            page_text,
            region,
        } => {
            println!("{}", format!("Page {}", page).white().bold());
            if let Some(r) = region {
                println!(
                    "{}",
                    format!("(scanned; text at x={} y={} {}x{})", r.x, r.y, r.width, r.height).dimmed()
                );
            }
            println!("{}", page_text);
        }
        Preview::ImageRegion { region, blob_path } => {
            match region {
                Some(r) => println!(
                    "Highlight region: x={} y={} {}x{}",
                    r.x, r.y, r.width, r.height
                ),
                None => println!("Whole image"),
            }
            println!("{}", blob_path.dimmed());
        }
        Preview::AudioRange {
            start,
            end,
            seek_seconds,
            window,
        } => {
            println!(
                "Play from {} ({:.1}s - {:.1}s)",
                murag_core::format_timestamp(*seek_seconds).green().bold(),
                start,
                end
            );
            println!();
            for line in window {
                let stamp = format!("[{}]", murag_core::format_timestamp(line.start));
                if line.cited {
                    println!("{} {}", stamp.green(), line.text.white().bold());
                } else {
                    println!("{} {}", stamp.dimmed(), line.text.dimmed());
                }
            }
        }
    }

    Ok(())
}
