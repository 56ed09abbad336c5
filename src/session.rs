//! Per-user session state
//!
//! Sessions live in process memory only and are lost on restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::voice::Language;

/// One user's session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Selected language, if any
    pub language: Option<Language>,
    /// First interaction
    pub created_at: DateTime<Utc>,
    /// Last language change
    pub updated_at: DateTime<Utc>,
}

impl Session {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            language: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Store of per-user language preferences
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Current language for `user_id`, creating an empty session on first contact
    async fn get(&self, user_id: &str) -> Option<Language>;

    /// Set the language for `user_id`; the latest call wins
    async fn set(&self, user_id: &str, language: Language);
}

/// Volatile in-memory session store
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a user's session
    pub async fn session(&self, user_id: &str) -> Option<Session> {
        self.sessions.read().await.get(user_id).cloned()
    }

    /// Number of known users
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no user has interacted yet
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, user_id: &str) -> Option<Language> {
        if let Some(session) = self.sessions.read().await.get(user_id) {
            return session.language;
        }

        self.sessions
            .write()
            .await
            .entry(user_id.to_string())
            .or_insert_with(Session::new)
            .language
    }

    async fn set(&self, user_id: &str, language: Language) {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(user_id.to_string())
            .or_insert_with(Session::new);
        session.language = Some(language);
        session.updated_at = Utc::now();
        tracing::debug!(user_id, language = %language, "session language set");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unset_by_default() {
        let store = InMemorySessionStore::new();
        assert_eq!(store.get("42").await, None);
        // First contact creates the session
        assert_eq!(store.len().await, 1);
        assert!(store.session("42").await.unwrap().language.is_none());
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let store = InMemorySessionStore::new();
        store.set("42", Language::Ru).await;
        store.set("42", Language::En).await;
        assert_eq!(store.get("42").await, Some(Language::En));
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let store = InMemorySessionStore::new();
        store.set("1", Language::Ru).await;
        store.set("2", Language::En).await;
        assert_eq!(store.get("1").await, Some(Language::Ru));
        assert_eq!(store.get("2").await, Some(Language::En));
        assert_eq!(store.get("3").await, None);
    }

    #[test]
    fn test_set_updates_timestamp() {
        tokio_test::block_on(async {
            let store = InMemorySessionStore::new();
            store.get("7").await;
            let created = store.session("7").await.unwrap();
            store.set("7", Language::Ru).await;
            let updated = store.session("7").await.unwrap();

            assert_eq!(updated.created_at, created.created_at);
            assert!(updated.updated_at >= created.updated_at);
            assert_eq!(updated.language, Some(Language::Ru));
        });
    }
}
