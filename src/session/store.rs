//! Session store trait

use super::errors::{SessionError, SessionResult};
use super::models::{Session, SessionKey, StateMap};
use crate::orchestration::Event;
use async_trait::async_trait;

/// Core trait for session persistence backends
///
/// Stores must keep sessions with different keys fully isolated and must be
/// safe to share across concurrently executing runs.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Backend type name (e.g., "memory", "file")
    fn backend_type(&self) -> &'static str;

    /// Fetch a session, `None` if it does not exist
    async fn get(&self, key: &SessionKey) -> SessionResult<Option<Session>>;

    /// Create a session, failing with `AlreadyExists` if the key is taken
    async fn create(&self, key: &SessionKey, initial_state: StateMap) -> SessionResult<Session>;

    /// Append a non-partial event to the session log and apply its state delta
    async fn append_event(&self, key: &SessionKey, event: &Event) -> SessionResult<()>;

    /// Merge an explicit state delta into a stored session
    async fn update_state(&self, key: &SessionKey, delta: StateMap) -> SessionResult<Session>;

    /// List session keys for one user of one app
    async fn list_sessions(&self, app_name: &str, user_id: &str) -> SessionResult<Vec<SessionKey>>;

    /// Return the existing session, or create one with empty state.
    ///
    /// A concurrent creator winning the race is resolved by re-reading.
    async fn get_or_create(&self, key: &SessionKey) -> SessionResult<Session> {
        if let Some(session) = self.get(key).await? {
            return Ok(session);
        }

        match self.create(key, StateMap::new()).await {
            Err(SessionError::AlreadyExists { .. }) => self
                .get(key)
                .await?
                .ok_or_else(|| SessionError::NotFound { key: key.clone() }),
            other => other,
        }
    }
}
