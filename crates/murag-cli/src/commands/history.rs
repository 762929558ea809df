//! History command - list conversations or replay one.

use super::{ask::print_citations, short_id, Workspace};
use anyhow::Result;
use colored::Colorize;
use murag_core::{Message, Role};

pub fn run(conversation: Option<String>, limit: i64) -> Result<()> {
    let ws = Workspace::open()?;

    match conversation {
        Some(id) => {
            let conversation = ws.db.get_conversation(&id)?;
            println!(
                "{} {}",
                "Conversation".cyan().bold(),
                conversation.title.as_deref().unwrap_or("(untitled)")
            );
            println!("{}", conversation.id.dimmed());
            println!("{}", "─".repeat(70));
            print_messages(&ws.db.get_messages(&conversation.id)?);
        }
        None => {
            let conversations = ws.db.list_conversations(Some(limit))?;
            if conversations.is_empty() {
                println!("{}", "No conversations yet. Try 'murag ask \"...\"'.".dimmed());
                return Ok(());
            }

            println!("{}", "Conversations".cyan().bold());
            println!("{}", "─".repeat(70));
            for conversation in &conversations {
                println!(
                    "{} {} {}",
                    short_id(&conversation.id).dimmed(),
                    conversation.created_at.format("%Y-%m-%d %H:%M").to_string().dimmed(),
                    conversation.title.as_deref().unwrap_or("(untitled)").white()
                );
            }
            println!();
            println!("{}", "Replay one with: murag history <conversation-id>".dimmed());
        }
    }

    Ok(())
}

/// Print messages in order, assistant answers with their citations.
pub fn print_messages(messages: &[Message]) {
    if messages.is_empty() {
        println!("{}", "(no messages)".dimmed());
        return;
    }

    for message in messages {
        let who = match message.role {
            Role::User => "you".green().bold(),
            Role::Assistant => "murag".cyan().bold(),
        };
        println!(
            "{} {}",
            who,
            message.created_at.format("%H:%M:%S").to_string().dimmed()
        );
        println!("{}", message.content);
        println!();
        if message.role == Role::Assistant {
            print_citations(message, false);
        }
    }
}
