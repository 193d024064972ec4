//! Bounded, most-recent-first history of successful prompts.

use serde::Serialize;

/// Maximum number of prompts kept.
pub const HISTORY_LIMIT: usize = 15;

const LABEL_MAX_CHARS: usize = 25;
const LABEL_KEEP_CHARS: usize = 22;

/// Distinct prompts ordered by recency of successful use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PromptHistory {
    entries: Vec<String>,
}

impl PromptHistory {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful prompt: moves it to the front, dropping the oldest
    /// entry once the limit is exceeded.
    pub fn record(&mut self, prompt: &str) {
        if let Some(pos) = self.entries.iter().position(|p| p == prompt) {
            let existing = self.entries.remove(pos);
            self.entries.insert(0, existing);
            return;
        }
        self.entries.insert(0, prompt.to_string());
        self.entries.truncate(HISTORY_LIMIT);
    }

    /// Entries, most recent first.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Returns the entry at `index` (0 = most recent).
    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no prompt has succeeded yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Short display label for a prompt.
    pub fn label(prompt: &str) -> String {
        if prompt.chars().count() > LABEL_MAX_CHARS {
            let head: String = prompt.chars().take(LABEL_KEEP_CHARS).collect();
            format!("{head}...")
        } else {
            prompt.to_string()
        }
    }
}
