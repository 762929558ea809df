//! Prompt construction for citation-grounded answers.

/// A numbered source passage given to the model.
#[derive(Debug, Clone)]
pub struct PromptSource {
    /// The `[n]` number the model must cite it by.
    pub number: usize,
    /// Where it comes from, e.g. `report.pdf, page 3`.
    pub label: String,
    pub content: String,
}

/// Build the user prompt: numbered sources, then the question.
pub fn build_prompt(question: &str, sources: &[PromptSource]) -> String {
    let mut prompt = String::new();

    prompt.push_str("Sources:\n");
    prompt.push_str("─────────────────────────────────────\n");

    for source in sources {
        prompt.push_str(&format!("\n[{}] {}\n", source.number, source.label));
        prompt.push_str(source.content.trim());
        prompt.push('\n');
    }

    prompt.push_str("\n─────────────────────────────────────\n\n");
    prompt.push_str(&format!("Question: {}\n\n", question.trim()));
    prompt.push_str("Answer:");

    prompt
}

/// System prompt asking for `[n]` citations.
pub fn system_prompt() -> &'static str {
    r#"You answer questions using only the numbered sources provided.

Guidelines:
- Cite every claim with the number of its source in square brackets, like [1] or [2][3]
- Only cite numbers that appear in the source list
- If the sources do not contain the answer, say so plainly
- Be concise
- Do not make up information not present in the sources"#
}

/// Truncate content to at most `max_chars` characters, adding an ellipsis if cut.
pub fn truncate_content(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        content.to_string()
    } else {
        let truncated: String = content.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_prompt_numbers_sources() {
        let sources = vec![
            PromptSource {
                number: 1,
                label: "handbook.pdf, page 4".to_string(),
                content: "Refunds are processed within 14 days.".to_string(),
            },
            PromptSource {
                number: 2,
                label: "standup.mp3 @ 00:02:35".to_string(),
                content: "  We ship on Friday.  ".to_string(),
            },
        ];

        let prompt = build_prompt("When do refunds arrive?", &sources);

        assert!(prompt.contains("[1] handbook.pdf, page 4\nRefunds are processed"));
        assert!(prompt.contains("[2] standup.mp3 @ 00:02:35\nWe ship on Friday.\n"));
        assert!(prompt.contains("Question: When do refunds arrive?"));
        assert!(prompt.ends_with("Answer:"));
    }

    #[test]
    fn test_system_prompt_mentions_markers() {
        assert!(system_prompt().contains("[1]"));
    }

    #[test]
    fn test_truncate_content() {
        assert_eq!(truncate_content("Hello", 10), "Hello");

        let truncated = truncate_content("This is a very long string that should be truncated", 20);
        assert_eq!(truncated.chars().count(), 20);
        assert!(truncated.ends_with("..."));

        assert_eq!(truncate_content("日本語のテキストです", 5), "日本...");
    }
}
