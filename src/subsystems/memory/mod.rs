//! Memory subsystem — volatile, process-lifetime conversation state.
//!
//! Holds one [`HistoryStore`] shared via `Arc` by the agents that need
//! multi-turn context.  Nothing is persisted; a restart starts every chat
//! from an empty history.

pub mod history;
pub mod types;

pub use history::{DEFAULT_MAX_TURNS, HistoryStore};
pub use types::{ConversationId, Role, Turn};

use std::sync::Arc;

use tracing::info;

/// Configuration for the memory subsystem (`[memory.history]`).
#[derive(Debug, Clone, Default)]
pub struct MemoryConfig {
    /// Turns kept per conversation; `None` uses [`DEFAULT_MAX_TURNS`].
    pub max_turns: Option<usize>,
    /// Conversations kept before LRU eviction; `None` is unbounded.
    pub max_conversations: Option<usize>,
}

/// Central memory system.  Constructed once at startup, shared via `Arc`.
pub struct MemorySystem {
    history: Arc<HistoryStore>,
}

impl MemorySystem {
    pub fn new(config: MemoryConfig) -> Self {
        let history = HistoryStore::new(config.max_turns, config.max_conversations);
        info!(
            max_turns = history.max_turns(),
            max_conversations = ?config.max_conversations,
            "memory system ready"
        );
        Self { history: Arc::new(history) }
    }

    /// Shared handle to the conversation history store.
    pub fn history(&self) -> Arc<HistoryStore> {
        self.history.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_default_turn_cap() {
        let mem = MemorySystem::new(MemoryConfig::default());
        assert_eq!(mem.history().max_turns(), DEFAULT_MAX_TURNS);
    }

    #[test]
    fn history_handle_is_shared() {
        let mem = MemorySystem::new(MemoryConfig { max_turns: Some(3), max_conversations: None });
        let a = mem.history();
        let b = mem.history();
        a.build_prompt(&ConversationId::from("x"), "hi");
        assert_eq!(b.render(&ConversationId::from("x")), "User: hi");
        assert_eq!(b.max_turns(), 3);
    }
}
