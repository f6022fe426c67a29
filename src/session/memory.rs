//! In-memory session store

use super::errors::{SessionError, SessionResult};
use super::models::{Session, SessionKey, StateMap};
use super::store::SessionStore;
use crate::orchestration::Event;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Session store keeping every session in process memory
///
/// Creation happens under a single write lock, so concurrent first requests
/// for the same key produce exactly one session.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionKey, Session>>,
}

impl InMemorySessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the store holds no sessions
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn backend_type(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &SessionKey) -> SessionResult<Option<Session>> {
        Ok(self.sessions.read().await.get(key).cloned())
    }

    async fn create(&self, key: &SessionKey, initial_state: StateMap) -> SessionResult<Session> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(key) {
            return Err(SessionError::AlreadyExists { key: key.clone() });
        }
        let session = Session::new(key.clone(), initial_state);
        sessions.insert(key.clone(), session.clone());
        Ok(session)
    }

    async fn append_event(&self, key: &SessionKey, event: &Event) -> SessionResult<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(key)
            .ok_or_else(|| SessionError::NotFound { key: key.clone() })?;
        session.apply_event(event);
        Ok(())
    }

    async fn update_state(&self, key: &SessionKey, delta: StateMap) -> SessionResult<Session> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(key)
            .ok_or_else(|| SessionError::NotFound { key: key.clone() })?;
        session.apply_delta(&delta);
        Ok(session.clone())
    }

    async fn list_sessions(&self, app_name: &str, user_id: &str) -> SessionResult<Vec<SessionKey>> {
        let sessions = self.sessions.read().await;
        let mut keys: Vec<SessionKey> = sessions
            .keys()
            .filter(|k| k.app_name == app_name && k.user_id == user_id)
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn key(session: &str) -> SessionKey {
        SessionKey::new("weather_tutorial_app", "user_1", session)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemorySessionStore::new();
        assert!(store.get(&key("s1")).await.unwrap().is_none());

        let mut state = StateMap::new();
        state.insert("user_preference_temperature_unit".to_string(), json!("Celsius"));
        store.create(&key("s1"), state).await.unwrap();

        let session = store.get(&key("s1")).await.unwrap().unwrap();
        assert_eq!(
            session.state.get("user_preference_temperature_unit"),
            Some(&json!("Celsius"))
        );
    }

    #[tokio::test]
    async fn test_create_twice_fails() {
        let store = InMemorySessionStore::new();
        store.create(&key("s1"), StateMap::new()).await.unwrap();
        let err = store.create(&key("s1"), StateMap::new()).await.unwrap_err();
        assert!(matches!(err, SessionError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let store = InMemorySessionStore::new();
        let first = store.get_or_create(&key("s1")).await.unwrap();
        store
            .update_state(&key("s1"), StateMap::from([("k".to_string(), json!(1))]))
            .await
            .unwrap();
        let second = store.get_or_create(&key("s1")).await.unwrap();

        assert_eq!(first.key, second.key);
        assert_eq!(second.state.get("k"), Some(&json!(1)));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_get_or_create_single_session() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.get_or_create(&key("shared")).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = InMemorySessionStore::new();
        store.create(&key("a"), StateMap::new()).await.unwrap();
        store.create(&key("b"), StateMap::new()).await.unwrap();

        let event = Event::text("inv", "agent", "hi", false)
            .with_state_delta(StateMap::from([("only_a".to_string(), json!(true))]));
        store.append_event(&key("a"), &event).await.unwrap();

        let b = store.get(&key("b")).await.unwrap().unwrap();
        assert!(b.state.get("only_a").is_none());
        assert!(b.events.is_empty());
    }

    #[tokio::test]
    async fn test_append_to_missing_session() {
        let store = InMemorySessionStore::new();
        let event = Event::text("inv", "agent", "hi", false);
        let err = store.append_event(&key("missing"), &event).await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_sessions() {
        let store = InMemorySessionStore::new();
        store.create(&key("b"), StateMap::new()).await.unwrap();
        store.create(&key("a"), StateMap::new()).await.unwrap();
        store
            .create(&SessionKey::new("other_app", "user_1", "c"), StateMap::new())
            .await
            .unwrap();

        let keys = store.list_sessions("weather_tutorial_app", "user_1").await.unwrap();
        let ids: Vec<_> = keys.iter().map(|k| k.session_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
