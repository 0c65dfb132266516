//! Per-user conversation state.
//!
//! Each user id owns one [`ConversationHistory`] behind an async mutex. The
//! router holds that mutex for a whole request, so requests for the same
//! user are serialized while different users proceed in parallel. The store
//! is bounded: idle histories expire, the least recently used history is
//! evicted when the user limit is reached, and each history keeps a rolling
//! window of turns.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use stargaze_core::config::ConversationConfig;
use stargaze_core::Turn;

use crate::error::ChatError;

// =============================================================================
// ConversationHistory
// =============================================================================

/// Ordered turns of one user's conversation.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
    max_turns: usize,
}

impl ConversationHistory {
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: Vec::new(),
            max_turns,
        }
    }

    /// Append a turn. The window is applied separately by [`Self::trim`]
    /// so a failed cycle can still be rolled back exactly.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Drop the oldest turns beyond the window.
    pub fn trim(&mut self) {
        if self.turns.len() > self.max_turns {
            let excess = self.turns.len() - self.max_turns;
            self.turns.drain(..excess);
        }
    }

    /// Remove the most recent turn. Only used to roll back a failed request.
    pub fn pop(&mut self) -> Option<Turn> {
        self.turns.pop()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

// =============================================================================
// ConversationStore
// =============================================================================

/// Shared handle to one user's history.
pub type SharedHistory = Arc<tokio::sync::Mutex<ConversationHistory>>;

struct Entry {
    history: SharedHistory,
    last_access: Instant,
}

impl Entry {
    /// A request outside the store still holds this history.
    fn in_use(&self) -> bool {
        Arc::strong_count(&self.history) > 1
    }
}

/// Bounded map from user id to conversation history.
pub struct ConversationStore {
    entries: Mutex<HashMap<String, Entry>>,
    max_users: usize,
    max_turns: usize,
    /// `None` disables idle expiry.
    idle_ttl: Option<Duration>,
}

impl ConversationStore {
    pub fn new(config: &ConversationConfig) -> Self {
        let idle_ttl = match config.idle_ttl_minutes {
            0 => None,
            minutes => Some(Duration::from_secs(u64::from(minutes) * 60)),
        };
        Self {
            entries: Mutex::new(HashMap::new()),
            max_users: config.max_users.max(1),
            max_turns: config.max_turns.max(2),
            idle_ttl,
        }
    }

    /// Get the history for `user_id`, creating it on first use.
    ///
    /// Expired histories are dropped first, so an idle user starts over.
    pub fn checkout(&self, user_id: &str) -> Result<SharedHistory, ChatError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| ChatError::Storage(format!("conversation store lock poisoned: {}", e)))?;
        let now = Instant::now();

        if let Some(ttl) = self.idle_ttl {
            let before = entries.len();
            entries.retain(|_, entry| {
                entry.in_use() || now.duration_since(entry.last_access) <= ttl
            });
            let expired = before - entries.len();
            if expired > 0 {
                tracing::debug!(expired, "Expired idle conversations");
            }
        }

        if let Some(entry) = entries.get_mut(user_id) {
            entry.last_access = now;
            return Ok(Arc::clone(&entry.history));
        }

        if entries.len() >= self.max_users {
            let oldest = entries
                .iter()
                .filter(|(_, entry)| !entry.in_use())
                .min_by_key(|(_, entry)| entry.last_access)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    entries.remove(&id);
                    tracing::debug!(user_id = %id, "Evicted least recently used conversation");
                }
                None => {
                    tracing::warn!(
                        users = entries.len(),
                        "Every conversation is in use, exceeding max_users"
                    );
                }
            }
        }

        let history = Arc::new(tokio::sync::Mutex::new(ConversationHistory::new(
            self.max_turns,
        )));
        entries.insert(
            user_id.to_string(),
            Entry {
                history: Arc::clone(&history),
                last_access: now,
            },
        );
        Ok(history)
    }

    /// Copy of a user's turns, or `None` if the user has no history.
    pub async fn snapshot(&self, user_id: &str) -> Option<Vec<Turn>> {
        let history = {
            let entries = self.entries.lock().ok()?;
            Arc::clone(&entries.get(user_id)?.history)
        };
        let guard = history.lock().await;
        Some(guard.turns().to_vec())
    }

    /// Number of users with a live history.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.entries
            .lock()
            .map(|e| e.contains_key(user_id))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_users: usize, max_turns: usize, idle_ttl_minutes: u32) -> ConversationConfig {
        ConversationConfig {
            max_users,
            max_turns,
            idle_ttl_minutes,
            retain_failed_turns: true,
        }
    }

    fn backdate(store: &ConversationStore, user_id: &str, by: Duration) {
        let mut entries = store.entries.lock().unwrap();
        let entry = entries.get_mut(user_id).unwrap();
        entry.last_access = Instant::now().checked_sub(by).unwrap();
    }

    // ---- ConversationHistory ----

    #[test]
    fn test_history_append_keeps_order() {
        let mut history = ConversationHistory::new(10);
        history.append(Turn::user("first"));
        history.append(Turn::assistant("SQL: SELECT pl_name FROM ps"));
        history.append(Turn::user("second"));

        assert_eq!(history.len(), 3);
        assert_eq!(history.turns()[0], Turn::user("first"));
        assert_eq!(history.turns()[2], Turn::user("second"));
    }

    #[test]
    fn test_history_window_drops_oldest() {
        let mut history = ConversationHistory::new(4);
        for i in 0..6 {
            history.append(Turn::user(format!("turn {}", i)));
        }
        assert_eq!(history.len(), 6);
        history.trim();
        assert_eq!(history.len(), 4);
        assert_eq!(history.turns()[0].content, "turn 2");
        assert_eq!(history.turns()[3].content, "turn 5");
    }

    #[test]
    fn test_history_pop() {
        let mut history = ConversationHistory::new(4);
        assert!(history.pop().is_none());
        history.append(Turn::user("oops"));
        assert_eq!(history.pop(), Some(Turn::user("oops")));
        assert!(history.is_empty());
    }

    // ---- ConversationStore ----

    #[tokio::test]
    async fn test_checkout_creates_lazily_and_reuses() {
        let store = ConversationStore::new(&ConversationConfig::default());
        assert!(store.is_empty());
        assert!(store.snapshot("alice").await.is_none());

        let first = store.checkout("alice").unwrap();
        first.lock().await.append(Turn::user("hello"));

        let second = store.checkout("alice").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.len(), 1);
        assert!(store.contains("alice"));
        assert_eq!(store.snapshot("alice").await.unwrap(), vec![Turn::user("hello")]);
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let store = ConversationStore::new(&ConversationConfig::default());
        store.checkout("alice").unwrap().lock().await.append(Turn::user("a"));
        store.checkout("bob").unwrap().lock().await.append(Turn::user("b"));

        assert_eq!(store.snapshot("alice").await.unwrap(), vec![Turn::user("a")]);
        assert_eq!(store.snapshot("bob").await.unwrap(), vec![Turn::user("b")]);
    }

    #[test]
    fn test_lru_eviction_at_capacity() {
        let store = ConversationStore::new(&config(2, 10, 0));
        store.checkout("a").unwrap();
        store.checkout("b").unwrap();
        backdate(&store, "a", Duration::from_secs(30));

        store.checkout("c").unwrap();
        assert_eq!(store.len(), 2);
        assert!(!store.contains("a"));
        assert!(store.contains("b"));
        assert!(store.contains("c"));
    }

    #[test]
    fn test_touching_protects_from_eviction() {
        let store = ConversationStore::new(&config(2, 10, 0));
        store.checkout("a").unwrap();
        store.checkout("b").unwrap();
        backdate(&store, "a", Duration::from_secs(30));
        backdate(&store, "b", Duration::from_secs(20));

        // Re-checking out "a" makes "b" the least recently used.
        store.checkout("a").unwrap();
        store.checkout("c").unwrap();
        assert!(store.contains("a"));
        assert!(!store.contains("b"));
    }

    #[test]
    fn test_pop_after_append_restores_full_window() {
        let mut history = ConversationHistory::new(2);
        history.append(Turn::user("q"));
        history.append(Turn::assistant("a"));
        history.append(Turn::user("failed"));
        history.pop();
        assert_eq!(history.turns(), &[Turn::user("q"), Turn::assistant("a")]);
    }

    #[test]
    fn test_held_history_is_not_evicted() {
        let store = ConversationStore::new(&config(2, 10, 0));
        let held = store.checkout("a").unwrap();
        store.checkout("b").unwrap();
        backdate(&store, "a", Duration::from_secs(30));
        backdate(&store, "b", Duration::from_secs(20));

        store.checkout("c").unwrap();
        assert!(store.contains("a"));
        assert!(!store.contains("b"));
        assert!(Arc::ptr_eq(&held, &store.checkout("a").unwrap()));
    }

    #[test]
    fn test_store_exceeds_capacity_when_all_held() {
        let store = ConversationStore::new(&config(1, 10, 0));
        let _held = store.checkout("a").unwrap();
        let _other = store.checkout("b").unwrap();
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_held_history_does_not_expire() {
        let store = ConversationStore::new(&config(10, 10, 1));
        let held = store.checkout("a").unwrap();
        held.lock().await.append(Turn::user("in flight"));
        backdate(&store, "a", Duration::from_secs(120));

        let again = store.checkout("a").unwrap();
        assert!(Arc::ptr_eq(&held, &again));
    }

    #[tokio::test]
    async fn test_idle_history_expires() {
        let store = ConversationStore::new(&config(10, 10, 1));
        store.checkout("a").unwrap().lock().await.append(Turn::user("old"));
        backdate(&store, "a", Duration::from_secs(120));

        let fresh = store.checkout("a").unwrap();
        assert!(fresh.lock().await.is_empty());
    }

    #[test]
    fn test_zero_ttl_never_expires() {
        let store = ConversationStore::new(&config(10, 10, 0));
        store.checkout("a").unwrap();
        backdate(&store, "a", Duration::from_secs(3600));
        store.checkout("b").unwrap();
        assert!(store.contains("a"));
    }

    #[tokio::test]
    async fn test_store_applies_turn_window() {
        let store = ConversationStore::new(&config(10, 2, 0));
        let history = store.checkout("a").unwrap();
        let mut guard = history.lock().await;
        guard.append(Turn::user("1"));
        guard.append(Turn::assistant("2"));
        guard.append(Turn::user("3"));
        guard.trim();
        assert_eq!(guard.len(), 2);
        assert_eq!(guard.turns()[0].content, "2");
    }

    #[tokio::test]
    async fn test_concurrent_appends_for_one_user_are_serialized() {
        let store = Arc::new(ConversationStore::new(&ConversationConfig::default()));
        let mut handles = Vec::new();
        for i in 0..20 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let history = store.checkout("shared").unwrap();
                let mut guard = history.lock().await;
                guard.append(Turn::user(format!("q{}", i)));
                tokio::task::yield_now().await;
                guard.append(Turn::assistant(format!("a{}", i)));
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let turns = store.snapshot("shared").await.unwrap();
        assert_eq!(turns.len(), 40);
        for pair in turns.chunks(2) {
            assert_eq!(pair[0].role, stargaze_core::Role::User);
            assert_eq!(pair[1].role, stargaze_core::Role::Assistant);
            assert_eq!(pair[0].content[1..], pair[1].content[1..]);
        }
    }
}
