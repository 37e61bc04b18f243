//! Prompts and the default question set.
//!
//! The system instruction is identical in both evaluation modes so the only
//! variable between them is how the document context is presented.
//! Callers can override both via [`crate::config::BenchmarkConfig`]; the
//! constants here are used only when no override is provided.

/// Default system instruction sent first in every request.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You will be given a long-context document and a question. You must answer the question based on what you read.";

/// Questions asked when the config does not supply its own list.
///
/// They target details scattered through the first pages of the reference
/// novel, including one cloze-style fill-in.
pub const DEFAULT_QUESTIONS: &[&str] = &[
    "How does the baron describe the painter in the context of his daughter marrying him?",
    "What is Joseph described as wearing when with Madonna?",
    "Describe the Baron's provisions",
    "What did Wilhelm have in his mouth?",
    "I should have liked to have made him a ____; but",
];

/// Parse a questions file: one question per line, blank lines skipped.
pub fn parse_questions(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_questions_are_distinct() {
        let mut qs = DEFAULT_QUESTIONS.to_vec();
        qs.sort_unstable();
        qs.dedup();
        assert_eq!(qs.len(), DEFAULT_QUESTIONS.len());
    }

    #[test]
    fn parse_questions_skips_blank_lines() {
        let qs = parse_questions("  first?\n\n\tsecond?  \r\n\n");
        assert_eq!(qs, vec!["first?", "second?"]);
    }
}
