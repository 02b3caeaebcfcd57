//! Conversation context for the reasoning backend
//!
//! The history is owned by the dispatcher alone; nothing else mutates it.

mod history;

pub use history::{ConversationHistory, HistoryEntry, Role};
