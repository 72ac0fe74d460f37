//! Conversation history store — bounded per-chat transcript + prompt rendering.
//!
//! Each conversation keeps at most `max_turns` [`Turn`]s (user and bot lines
//! combined, oldest dropped first).  The store is process-wide and in-memory
//! only; nothing survives a restart.
//!
//! # Locking
//!
//! The map itself sits behind a `std::sync::Mutex`: every operation here is a
//! short, non-suspending read-modify-write.  A full exchange (prompt → model
//! call → response) spans an `.await`, so each conversation also carries an
//! async *exchange lock* handed out by [`HistoryStore::exchange_lock`].
//! Callers hold it across the whole round-trip to keep exchanges for one chat
//! strictly serialised.
//!
//! # Eviction
//!
//! With `max_conversations` set, inserting a new conversation into a full
//! store evicts the least-recently-used conversation that has no exchange in
//! flight.  Without it the number of conversations is unbounded.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use tracing::debug;

use super::types::{ConversationId, Turn};

/// Default number of turns kept per conversation.
pub const DEFAULT_MAX_TURNS: usize = 10;

struct Conversation {
    turns: VecDeque<Turn>,
    exchange: Arc<tokio::sync::Mutex<()>>,
}

impl Conversation {
    fn new() -> Self {
        Self {
            turns: VecDeque::new(),
            exchange: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    fn push(&mut self, turn: Turn, cap: usize) {
        self.turns.push_back(turn);
        while self.turns.len() > cap {
            self.turns.pop_front();
        }
    }

    fn render(&self) -> String {
        self.turns
            .iter()
            .map(Turn::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// `true` while some caller still holds a clone of the exchange lock.
    fn in_flight(&self) -> bool {
        Arc::strong_count(&self.exchange) > 1
    }
}

pub struct HistoryStore {
    max_turns: usize,
    max_conversations: Option<usize>,
    conversations: Mutex<LruCache<ConversationId, Conversation>>,
}

impl HistoryStore {
    /// `max_turns` is clamped to at least 1; a `max_conversations` of 0 is
    /// treated as unbounded.
    pub fn new(max_turns: Option<usize>, max_conversations: Option<usize>) -> Self {
        Self {
            max_turns: max_turns.unwrap_or(DEFAULT_MAX_TURNS).max(1),
            max_conversations: max_conversations.filter(|&n| n > 0),
            conversations: Mutex::new(LruCache::unbounded()),
        }
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Number of conversations currently tracked.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ── Mutations ─────────────────────────────────────────────────────

    /// Discard every turn of `id`.  Creates an empty history if absent.
    pub fn reset(&self, id: &ConversationId) {
        self.with_conversation(id, |c| c.turns.clear());
        debug!(conversation = %id, "history reset");
    }

    /// Append `message` as a user turn and render the window for the next
    /// model call.  The just-appended line is always the last one.
    pub fn build_prompt(&self, id: &ConversationId, message: &str) -> String {
        let cap = self.max_turns;
        self.with_conversation(id, |c| {
            c.push(Turn::user(message), cap);
            c.render()
        })
    }

    /// Append `text` as a bot turn, dropping the oldest turns past the cap.
    pub fn record_response(&self, id: &ConversationId, text: &str) {
        let cap = self.max_turns;
        self.with_conversation(id, |c| c.push(Turn::bot(text), cap));
    }

    // ── Reads ─────────────────────────────────────────────────────────

    /// Snapshot of the turns of `id`, oldest first.  Empty if unknown.
    pub fn history(&self, id: &ConversationId) -> Vec<Turn> {
        self.lock()
            .peek(id)
            .map(|c| c.turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Render the current window without mutating it.
    pub fn render(&self, id: &ConversationId) -> String {
        self.lock().peek(id).map(Conversation::render).unwrap_or_default()
    }

    /// Exchange lock for `id`, creating the conversation if absent.
    ///
    /// Hold the guard from [`build_prompt`](Self::build_prompt) until
    /// [`record_response`](Self::record_response) (or until the exchange is
    /// abandoned).  While any clone of the returned `Arc` is alive the
    /// conversation is never evicted.
    pub fn exchange_lock(&self, id: &ConversationId) -> Arc<tokio::sync::Mutex<()>> {
        self.with_conversation(id, |c| c.exchange.clone())
    }

    // ── Internals ─────────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, LruCache<ConversationId, Conversation>> {
        // A panic inside a closure below can only leave a half-pushed
        // VecDeque, which is still a valid history.
        self.conversations.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_conversation<R>(
        &self,
        id: &ConversationId,
        f: impl FnOnce(&mut Conversation) -> R,
    ) -> R {
        let mut map = self.lock();
        if !map.contains(id) {
            self.evict_for_insert(&mut map);
            map.put(id.clone(), Conversation::new());
        }
        match map.get_mut(id) {
            Some(c) => f(c),
            // Inserted just above under the same guard.
            None => f(&mut Conversation::new()),
        }
    }

    fn evict_for_insert(&self, map: &mut LruCache<ConversationId, Conversation>) {
        let Some(cap) = self.max_conversations else {
            return;
        };
        while map.len() >= cap {
            let victim = map
                .iter()
                .rev()
                .find(|(_, c)| !c.in_flight())
                .map(|(id, _)| id.clone());
            match victim {
                Some(id) => {
                    map.pop(&id);
                    debug!(conversation = %id, "evicted idle conversation");
                }
                // Every conversation is mid-exchange; allow a temporary overshoot.
                None => break,
            }
        }
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::memory::types::Role;

    fn id(s: &str) -> ConversationId {
        ConversationId::from(s)
    }

    #[test]
    fn first_prompt_is_single_user_line() {
        let store = HistoryStore::default();
        assert_eq!(store.build_prompt(&id("a"), "hello"), "User: hello");
        assert_eq!(store.history(&id("a")), vec![Turn::user("hello")]);
    }

    #[test]
    fn prompt_includes_prior_turns_in_order() {
        let store = HistoryStore::default();
        let c = id("a");
        store.build_prompt(&c, "hi");
        store.record_response(&c, "hello!");
        let prompt = store.build_prompt(&c, "how are you?");
        assert_eq!(prompt, "User: hi\nBot: hello!\nUser: how are you?");
    }

    #[test]
    fn empty_message_is_accepted() {
        let store = HistoryStore::default();
        assert_eq!(store.build_prompt(&id("a"), ""), "User: ");
    }

    #[test]
    fn reset_then_prompt_renders_only_new_message() {
        let store = HistoryStore::default();
        let c = id("a");
        store.build_prompt(&c, "one");
        store.record_response(&c, "two");
        store.reset(&c);
        assert_eq!(store.build_prompt(&c, "hello"), "User: hello");
    }

    #[test]
    fn reset_is_idempotent() {
        let store = HistoryStore::default();
        let c = id("a");
        store.build_prompt(&c, "one");
        store.reset(&c);
        store.reset(&c);
        assert!(store.history(&c).is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn reset_creates_empty_history_for_unknown_id() {
        let store = HistoryStore::default();
        store.reset(&id("new"));
        assert_eq!(store.len(), 1);
        assert!(store.history(&id("new")).is_empty());
    }

    #[test]
    fn length_never_exceeds_cap() {
        let store = HistoryStore::new(Some(4), None);
        let c = id("a");
        for i in 0..25 {
            if i % 3 == 0 {
                store.record_response(&c, &format!("b{i}"));
            } else {
                store.build_prompt(&c, &format!("u{i}"));
            }
            assert!(store.history(&c).len() <= 4);
        }
    }

    #[test]
    fn newest_user_line_is_always_last() {
        let store = HistoryStore::new(Some(3), None);
        let c = id("a");
        for i in 0..10 {
            let msg = format!("m{i}");
            let prompt = store.build_prompt(&c, &msg);
            assert_eq!(prompt.lines().last(), Some(format!("User: {msg}").as_str()));
            store.record_response(&c, "ok");
        }
    }

    #[test]
    fn window_keeps_last_ten_of_thirteen_turns() {
        let store = HistoryStore::default();
        let c = id("a");
        // Turns 1..=12 alternate User/Bot.
        for n in 1..=12 {
            if n % 2 == 1 {
                store.build_prompt(&c, &format!("t{n}"));
            } else {
                store.record_response(&c, &format!("t{n}"));
            }
        }
        let texts: Vec<String> = store.history(&c).into_iter().map(|t| t.text).collect();
        let expected: Vec<String> = (3..=12).map(|n| format!("t{n}")).collect();
        assert_eq!(texts, expected);

        let prompt = store.build_prompt(&c, "t13");
        let lines: Vec<&str> = prompt.lines().collect();
        assert_eq!(lines.len(), 10);
        assert_eq!(lines[0], "Bot: t4");
        assert_eq!(lines[9], "User: t13");
        for (i, n) in (4..=13).enumerate() {
            let role = if n % 2 == 1 { "User" } else { "Bot" };
            assert_eq!(lines[i], format!("{role}: t{n}"));
        }
    }

    #[test]
    fn rendering_is_suffix_of_chronological_sequence() {
        let store = HistoryStore::new(Some(5), None);
        let c = id("a");
        let mut all = Vec::new();
        for i in 0..9 {
            let msg = format!("u{i}");
            store.build_prompt(&c, &msg);
            all.push(format!("User: {msg}"));
            if i % 2 == 0 {
                let reply = format!("b{i}");
                store.record_response(&c, &reply);
                all.push(format!("Bot: {reply}"));
            }
        }
        let rendered = store.render(&c);
        let lines: Vec<String> = rendered.lines().map(str::to_string).collect();
        assert_eq!(lines.as_slice(), &all[all.len() - lines.len()..]);
    }

    #[test]
    fn record_response_on_unknown_id_creates_one_turn() {
        let store = HistoryStore::default();
        store.record_response(&id("ghost"), "orphan");
        let turns = store.history(&id("ghost"));
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, Role::Bot);
        assert_eq!(turns[0].text, "orphan");
    }

    #[test]
    fn run_of_one_role_crowds_out_the_other() {
        let store = HistoryStore::new(Some(3), None);
        let c = id("a");
        store.build_prompt(&c, "question");
        for i in 0..3 {
            store.record_response(&c, &format!("r{i}"));
        }
        assert!(store.history(&c).iter().all(|t| t.role == Role::Bot));
    }

    #[test]
    fn conversations_are_independent() {
        let store = HistoryStore::default();
        store.build_prompt(&id("a"), "for a");
        store.build_prompt(&id("b"), "for b");
        store.reset(&id("a"));
        assert!(store.history(&id("a")).is_empty());
        assert_eq!(store.render(&id("b")), "User: for b");
    }

    #[test]
    fn zero_turn_cap_is_clamped() {
        let store = HistoryStore::new(Some(0), None);
        assert_eq!(store.max_turns(), 1);
        let c = id("a");
        store.build_prompt(&c, "x");
        store.record_response(&c, "y");
        assert_eq!(store.render(&c), "Bot: y");
    }

    #[test]
    fn reads_do_not_create_entries() {
        let store = HistoryStore::default();
        assert!(store.history(&id("nobody")).is_empty());
        assert_eq!(store.render(&id("nobody")), "");
        assert!(store.is_empty());
    }

    #[test]
    fn lru_conversation_is_evicted_at_capacity() {
        let store = HistoryStore::new(None, Some(2));
        store.build_prompt(&id("a"), "1");
        store.build_prompt(&id("b"), "2");
        // Touch `a` so `b` becomes least recently used.
        store.build_prompt(&id("a"), "3");
        store.build_prompt(&id("c"), "4");

        assert_eq!(store.len(), 2);
        assert!(store.history(&id("b")).is_empty());
        assert_eq!(store.history(&id("a")).len(), 2);
        assert_eq!(store.render(&id("c")), "User: 4");
    }

    #[test]
    fn in_flight_conversation_is_not_evicted() {
        let store = HistoryStore::new(None, Some(1));
        store.build_prompt(&id("busy"), "working");
        let held = store.exchange_lock(&id("busy"));

        store.build_prompt(&id("other"), "hi");
        assert_eq!(store.len(), 2);
        assert_eq!(store.render(&id("busy")), "User: working");

        drop(held);
        store.build_prompt(&id("third"), "hey");
        assert_eq!(store.len(), 1);
        assert_eq!(store.render(&id("third")), "User: hey");
    }

    #[test]
    fn zero_conversation_cap_means_unbounded() {
        let store = HistoryStore::new(None, Some(0));
        for i in 0..50 {
            store.build_prompt(&id(&i.to_string()), "x");
        }
        assert_eq!(store.len(), 50);
    }

    #[test]
    fn exchange_lock_is_shared_per_conversation() {
        let store = HistoryStore::default();
        let a1 = store.exchange_lock(&id("a"));
        let a2 = store.exchange_lock(&id("a"));
        let b = store.exchange_lock(&id("b"));
        assert!(Arc::ptr_eq(&a1, &a2));
        assert!(!Arc::ptr_eq(&a1, &b));
    }

    #[tokio::test]
    async fn exchange_lock_serialises_holders() {
        let store = HistoryStore::default();
        let lock = store.exchange_lock(&id("a"));
        let guard = lock.clone().lock_owned().await;
        assert!(lock.try_lock().is_err());
        drop(guard);
        assert!(lock.try_lock().is_ok());
    }
}
