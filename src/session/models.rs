//! Session data model

use crate::orchestration::Event;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Named, JSON-valued state shared by the stages of a run
pub type StateMap = HashMap<String, serde_json::Value>;

/// Identity of a conversation session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
}

impl SessionKey {
    /// Create a session key
    pub fn new(
        app_name: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.app_name, self.user_id, self.session_id)
    }
}

/// A conversation session: persisted state plus an append-only event log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub key: SessionKey,
    #[serde(default)]
    pub state: StateMap,
    #[serde(default)]
    pub events: Vec<Event>,
    pub created_at: DateTime<Utc>,
    pub last_update_time: DateTime<Utc>,
}

impl Session {
    /// Create a fresh session with the given initial state
    pub fn new(key: SessionKey, state: StateMap) -> Self {
        let now = Utc::now();
        Self {
            key,
            state,
            events: Vec::new(),
            created_at: now,
            last_update_time: now,
        }
    }

    /// Append an event to the log and apply its state delta.
    ///
    /// Partial events are streaming artifacts and never enter the log.
    pub fn apply_event(&mut self, event: &Event) {
        if event.partial {
            return;
        }
        self.apply_delta(&event.state_delta);
        self.events.push(event.clone());
    }

    /// Merge a state delta into the session state
    pub fn apply_delta(&mut self, delta: &StateMap) {
        for (key, value) in delta {
            self.state.insert(key.clone(), value.clone());
        }
        self.last_update_time = Utc::now();
    }
}
