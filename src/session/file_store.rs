//! File system session store
//!
//! Each session is one JSON document at `<base>/<app>/<user>/<session>.json`,
//! written with the write-temp-rename pattern so a crash never leaves a
//! half-written session behind.

use super::errors::{SessionError, SessionResult};
use super::models::{Session, SessionKey, StateMap};
use super::store::SessionStore;
use crate::orchestration::Event;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Session store backed by JSON files on the local filesystem
pub struct FileSessionStore {
    base_path: PathBuf,
    /// Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl FileSessionStore {
    /// Create a file session store rooted at `base_path`
    pub fn new<P: AsRef<Path>>(base_path: P) -> SessionResult<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self {
            base_path,
            write_lock: Mutex::new(()),
        })
    }

    /// Get the base path
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn user_dir(&self, app_name: &str, user_id: &str) -> PathBuf {
        self.base_path
            .join(sanitize_segment(app_name))
            .join(sanitize_segment(user_id))
    }

    fn session_path(&self, key: &SessionKey) -> PathBuf {
        self.user_dir(&key.app_name, &key.user_id)
            .join(format!("{}.json", sanitize_segment(&key.session_id)))
    }

    async fn read_session(&self, path: &Path) -> SessionResult<Option<Session>> {
        match fs::read(path).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_session(&self, session: &Session) -> SessionResult<()> {
        let path = self.session_path(&session.key);
        let parent = path
            .parent()
            .ok_or_else(|| SessionError::unavailable("Session path has no parent directory"))?;
        fs::create_dir_all(parent).await?;

        let data = serde_json::to_vec_pretty(session)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let temp_path = parent.join(format!("{}.tmp.{}", file_name, Uuid::new_v4()));

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(SessionError::unavailable(format!(
                "Failed to commit session write: {}",
                e
            )));
        }
        Ok(())
    }

    async fn modify<F>(&self, key: &SessionKey, apply: F) -> SessionResult<Session>
    where
        F: FnOnce(&mut Session) + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut session = self
            .read_session(&self.session_path(key))
            .await?
            .ok_or_else(|| SessionError::NotFound { key: key.clone() })?;
        apply(&mut session);
        self.write_session(&session).await?;
        Ok(session)
    }
}

/// Encode a key segment as a single path component.
///
/// ASCII alphanumerics, `-` and `_` pass through; every other byte becomes
/// `%XX`. The mapping is injective so distinct keys never share a file, and
/// no encoded segment can contain a separator or start with `.`. The empty
/// segment is `%`, which no non-empty segment encodes to.
fn sanitize_segment(segment: &str) -> String {
    if segment.is_empty() {
        return "%".to_string();
    }
    let mut encoded = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

#[async_trait]
impl SessionStore for FileSessionStore {
    fn backend_type(&self) -> &'static str {
        "file"
    }

    async fn get(&self, key: &SessionKey) -> SessionResult<Option<Session>> {
        self.read_session(&self.session_path(key)).await
    }

    async fn create(&self, key: &SessionKey, initial_state: StateMap) -> SessionResult<Session> {
        let _guard = self.write_lock.lock().await;
        if self.read_session(&self.session_path(key)).await?.is_some() {
            return Err(SessionError::AlreadyExists { key: key.clone() });
        }
        let session = Session::new(key.clone(), initial_state);
        self.write_session(&session).await?;
        Ok(session)
    }

    async fn append_event(&self, key: &SessionKey, event: &Event) -> SessionResult<()> {
        self.modify(key, |session| session.apply_event(event)).await?;
        Ok(())
    }

    async fn update_state(&self, key: &SessionKey, delta: StateMap) -> SessionResult<Session> {
        self.modify(key, |session| session.apply_delta(&delta)).await
    }

    async fn list_sessions(&self, app_name: &str, user_id: &str) -> SessionResult<Vec<SessionKey>> {
        let dir = self.user_dir(app_name, user_id);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(session) = self.read_session(&path).await? {
                keys.push(session.key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}
