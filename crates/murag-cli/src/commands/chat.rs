//! Chat command - interactive conversation REPL.

use super::{ask::ask_in, runtime, Workspace};
use anyhow::Result;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

/// Run an interactive chat, resuming `conversation` when given.
pub fn run(conversation: Option<String>) -> Result<()> {
    let ws = Workspace::open()?;
    let rt = runtime()?;
    let snapshots = ws.snapshots()?;
    let service = ws.conversations(ws.backend()?, snapshots.clone());

    let conversation = match conversation {
        Some(id) => service.get(&id)?,
        None => service.start(None)?,
    };

    let mut rl = DefaultEditor::new()?;
    let history_path = ws.paths.data_dir.join("chat_history");
    let _ = rl.load_history(&history_path);

    println!("{}", "MuRAG Chat".cyan().bold());
    println!("{}", "─".repeat(50));
    println!(
        "{} chunks indexed. Type {} for commands, {} to exit.",
        snapshots.current().len(),
        "/help".cyan(),
        "/exit".cyan()
    );
    println!("{}", format!("Conversation {}", conversation.id).dimmed());
    println!();

    loop {
        match rl.readline(&format!("{} ", "you>".green().bold())) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                match line {
                    "/exit" | "/quit" | "/q" => break,
                    "/help" | "/?" => print_help(),
                    "/reload" => match snapshots.refresh() {
                        Ok(snapshot) => println!("Index reloaded ({} chunks).", snapshot.len()),
                        Err(e) => eprintln!("{} {}", "Error:".red(), e),
                    },
                    "/history" => super::history::print_messages(&service.history(&conversation.id)?),
                    question => {
                        println!();
                        if let Err(e) = ask_in(&rt, &service, &conversation.id, question) {
                            eprintln!("{} {}", "Error:".red(), e);
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("{} {:?}", "Error:".red(), err);
                break;
            }
        }
    }

    let _ = rl.save_history(&history_path);
    println!("Goodbye!");
    Ok(())
}

fn print_help() {
    println!("{}", "Commands".white().bold());
    println!("  {}  reload the index after new uploads finish", "/reload ".cyan());
    println!("  {}  show this conversation so far", "/history".cyan());
    println!("  {}  leave the chat", "/exit   ".cyan());
    println!("Anything else is sent as a question.");
}
