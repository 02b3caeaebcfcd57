//! Bounded conversation history

use std::collections::VecDeque;
use std::fmt;

/// Speaker of a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Label used when formatting context
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

/// One role-tagged message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

/// Sliding window of the last `max_exchanges` user/assistant pairs
///
/// Holds at most `2 * max_exchanges` entries; the oldest entries are evicted
/// first.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    max_exchanges: usize,
    entries: VecDeque<HistoryEntry>,
}

impl ConversationHistory {
    /// Create an empty history
    #[must_use]
    pub fn new(max_exchanges: usize) -> Self {
        Self {
            max_exchanges,
            entries: VecDeque::with_capacity(max_exchanges * 2 + 1),
        }
    }

    /// Append a user turn
    pub fn add_user_message(&mut self, message: impl Into<String>) {
        self.push(Role::User, message.into());
    }

    /// Append an assistant turn
    pub fn add_assistant_message(&mut self, message: impl Into<String>) {
        self.push(Role::Assistant, message.into());
    }

    fn push(&mut self, role: Role, content: String) {
        self.entries.push_back(HistoryEntry { role, content });

        let capacity = self.capacity();
        while self.entries.len() > capacity {
            self.entries.pop_front();
        }
    }

    /// Most entries the window will hold
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.max_exchanges * 2
    }

    /// Format the window as `Role: text` lines, oldest first
    ///
    /// Empty history yields an empty string.
    #[must_use]
    pub fn context(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{}: {}", e.role.label(), e.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Iterate over entries, oldest first
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Most recent entry
    #[must_use]
    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of entries held
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries are held
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ConversationHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.context())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_context() {
        let history = ConversationHistory::new(3);
        assert!(history.is_empty());
        assert_eq!(history.context(), "");
    }

    #[test]
    fn test_context_format() {
        let mut history = ConversationHistory::new(3);
        history.add_user_message("my dog is limping");
        history.add_assistant_message("How long has this been going on?");

        assert_eq!(
            history.context(),
            "User: my dog is limping\nAssistant: How long has this been going on?"
        );
        assert_eq!(history.to_string(), history.context());
    }

    #[test]
    fn test_sliding_window_evicts_oldest() {
        let mut history = ConversationHistory::new(2);
        for i in 0..5 {
            history.add_user_message(format!("q{i}"));
            history.add_assistant_message(format!("a{i}"));
            assert!(history.len() <= 4);
        }

        let contents: Vec<&str> = history.entries().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["q3", "a3", "q4", "a4"]);
        assert_eq!(history.entries().next().map(|e| e.role), Some(Role::User));
    }

    #[test]
    fn test_odd_count_trims_single_entry() {
        let mut history = ConversationHistory::new(1);
        history.add_user_message("one");
        history.add_assistant_message("two");
        history.add_user_message("three");

        let contents: Vec<&str> = history.entries().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["two", "three"]);
        assert_eq!(history.last().map(|e| e.role), Some(Role::User));
    }

    #[test]
    fn test_clear() {
        let mut history = ConversationHistory::new(2);
        history.add_user_message("hi");
        history.clear();
        assert_eq!(history.len(), 0);
    }
}
