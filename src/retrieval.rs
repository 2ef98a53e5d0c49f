//! Context composition: retrieved memories plus the user's query

use crate::prompt::{CURRENT_QUERY_LABEL, MEMORY_CONTEXT_LABEL};
use crate::storage::QueryMatch;

/// Rendered in place of the memory list when nothing was retrieved.
/// Facts are always rendered with a `- ` bullet, so this line cannot
/// collide with one.
pub const NO_MEMORIES_SENTINEL: &str = "No relevant memories found.";

/// A memory that was retrieved with its relevance score
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedMemory {
    pub id: String,
    pub text: String,
    pub score: f32,
}

impl From<QueryMatch> for RetrievedMemory {
    fn from(m: QueryMatch) -> Self {
        Self {
            id: m.id,
            text: m.payload.text,
            score: m.score,
        }
    }
}

/// Retrieved context ready for injection into a prompt
#[derive(Debug, Clone, Default)]
pub struct RetrievalContext {
    /// Ranked best first, as returned by the index
    pub memories: Vec<RetrievedMemory>,
}

impl RetrievalContext {
    pub fn new(memories: Vec<RetrievedMemory>) -> Self {
        Self { memories }
    }

    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }

    /// Bulleted list of facts in ranking order, or the sentinel line
    pub fn format_for_prompt(&self) -> String {
        if self.memories.is_empty() {
            return NO_MEMORIES_SENTINEL.to_string();
        }

        self.memories
            .iter()
            .map(|m| format!("- {}", single_line(&m.text)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One fact per line, whatever the stored text contains
fn single_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build the two-section prompt sent to the chat session
pub fn compose(retrieved: &[RetrievedMemory], query: &str) -> String {
    let context = RetrievalContext::new(retrieved.to_vec());
    format!(
        "{}\n{}\n\n{}\n{}",
        MEMORY_CONTEXT_LABEL,
        context.format_for_prompt(),
        CURRENT_QUERY_LABEL,
        query
    )
}
