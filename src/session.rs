//! Session registry: per-session conversation history.
//!
//! The [`SessionStore`] trait is the capability interface the HTTP layer
//! is given (get / append / clear); it is injected rather than
//! module-global so a durable or distributed backing store can be swapped
//! in later. [`InMemorySessions`] is the default implementation: an
//! unbounded `HashMap` behind an `RwLock`, with an optional per-session
//! turn cap. History does not survive a process restart.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Turn;

/// Abstract session-history backend.
///
/// All operations are async (via `async-trait`) so that a persistent
/// implementation can do I/O; the in-memory implementation returns
/// immediately-ready futures.
///
/// Unknown session identifiers are not errors: reading one yields an
/// empty history and clearing one is a no-op.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The session's turns in append order, empty if the session is unknown.
    async fn history(&self, session_id: &str) -> Result<Vec<Turn>>;

    /// Append a turn to the session, creating the session if needed.
    async fn append(&self, session_id: &str, turn: Turn) -> Result<()>;

    /// Remove the session and all its turns.
    async fn clear(&self, session_id: &str) -> Result<()>;
}

/// In-memory session store.
///
/// Appends are serialized behind the write lock, so concurrent requests
/// cannot corrupt a turn list. `max_turns` bounds each session's history
/// (oldest turns dropped first); 0 means unbounded.
pub struct InMemorySessions {
    sessions: RwLock<HashMap<String, Vec<Turn>>>,
    max_turns: usize,
}

impl InMemorySessions {
    pub fn new(max_turns: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_turns,
        }
    }
}

impl Default for InMemorySessions {
    fn default() -> Self {
        Self::new(0)
    }
}

#[async_trait]
impl SessionStore for InMemorySessions {
    async fn history(&self, session_id: &str) -> Result<Vec<Turn>> {
        let sessions = self.sessions.read().unwrap();
        Ok(sessions.get(session_id).cloned().unwrap_or_default())
    }

    async fn append(&self, session_id: &str, turn: Turn) -> Result<()> {
        let mut sessions = self.sessions.write().unwrap();
        let turns = sessions.entry(session_id.to_string()).or_default();
        turns.push(turn);
        if self.max_turns > 0 && turns.len() > self.max_turns {
            let excess = turns.len() - self.max_turns;
            turns.drain(..excess);
        }
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().unwrap();
        sessions.remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[tokio::test]
    async fn test_unknown_session_is_empty() {
        let store = InMemorySessions::default();
        assert!(store.history("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_preserves_order() {
        let store = InMemorySessions::default();
        store.append("s1", Turn::user("q1")).await.unwrap();
        store.append("s1", Turn::assistant("a1")).await.unwrap();
        store.append("s1", Turn::user("q2")).await.unwrap();
        store.append("s1", Turn::assistant("a2")).await.unwrap();

        let history = store.history("s1").await.unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0], Turn::user("q1"));
        assert_eq!(history[1], Turn::assistant("a1"));
        assert_eq!(history[2], Turn::user("q2"));
        assert_eq!(history[3], Turn::assistant("a2"));
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = InMemorySessions::default();
        store.append("s1", Turn::user("one")).await.unwrap();
        store.append("s2", Turn::user("two")).await.unwrap();

        assert_eq!(store.history("s1").await.unwrap().len(), 1);
        assert_eq!(store.history("s2").await.unwrap().len(), 1);
        assert_eq!(store.history("s1").await.unwrap()[0].content, "one");
    }

    #[tokio::test]
    async fn test_clear_removes_all_turns() {
        let store = InMemorySessions::default();
        store.append("s1", Turn::user("q")).await.unwrap();
        store.append("s1", Turn::assistant("a")).await.unwrap();
        store.clear("s1").await.unwrap();
        assert!(store.history("s1").await.unwrap().is_empty());

        // Clearing an unknown session is a no-op
        store.clear("never-seen").await.unwrap();
    }

    #[tokio::test]
    async fn test_max_turns_drops_oldest_first() {
        let store = InMemorySessions::new(4);
        for i in 0..4 {
            store.append("s1", Turn::user(format!("q{}", i))).await.unwrap();
            store
                .append("s1", Turn::assistant(format!("a{}", i)))
                .await
                .unwrap();
        }

        let history = store.history("s1").await.unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].content, "q2");
        assert_eq!(history[3].content, "a3");
        assert_eq!(history[0].role, Role::User);
    }

    #[tokio::test]
    async fn test_concurrent_appends_all_land() {
        use std::sync::Arc;

        let store = Arc::new(InMemorySessions::default());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.append("s1", Turn::user(format!("m{}", i))).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.history("s1").await.unwrap().len(), 16);
    }
}
