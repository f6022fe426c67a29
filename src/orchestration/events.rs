//! Runtime events
//!
//! Every observable step of a run is an [`Event`]. Its payload is a tagged
//! [`EventKind`] so consumers can match exhaustively instead of probing for
//! optional fields.

use crate::provider::{Message, Part, Role, ToolCall, ToolResponse};
use crate::session::StateMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author name of events recording client input
pub const USER_AUTHOR: &str = "user";

/// Content carried by an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventContent {
    Text { text: String },
    FunctionCall(ToolCall),
    FunctionResponse(ToolResponse),
}

/// Control signals emitted by the executor and orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlSignal {
    /// A stage asked the enclosing loop to stop
    Escalate,
    /// A stage handed the turn to one of its sub-stages
    Transfer { to: String },
    /// A stage failed inside a sequence that continues on failure
    StageFailed { stage: String, message: String },
    /// A loop reached a terminal state
    LoopFinished {
        name: String,
        iterations: u32,
        escalated: bool,
    },
}

/// Event payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum EventKind {
    Content(EventContent),
    Control(ControlSignal),
    Error { message: String },
}

/// One unit of observable run output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub invocation_id: String,
    /// Stage (or `user`) that produced the event
    pub author: String,
    pub timestamp: DateTime<Utc>,
    /// Streaming fragment rather than a final value
    #[serde(default)]
    pub partial: bool,
    pub kind: EventKind,
    /// State keys written by this event
    #[serde(default, skip_serializing_if = "StateMap::is_empty")]
    pub state_delta: StateMap,
}

impl Event {
    pub fn new(invocation_id: impl Into<String>, author: impl Into<String>, kind: EventKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            invocation_id: invocation_id.into(),
            author: author.into(),
            timestamp: Utc::now(),
            partial: false,
            kind,
            state_delta: StateMap::new(),
        }
    }

    /// Text content event
    pub fn text(
        invocation_id: impl Into<String>,
        author: impl Into<String>,
        text: impl Into<String>,
        partial: bool,
    ) -> Self {
        let mut event = Self::new(
            invocation_id,
            author,
            EventKind::Content(EventContent::Text { text: text.into() }),
        );
        event.partial = partial;
        event
    }

    pub fn error(
        invocation_id: impl Into<String>,
        author: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(
            invocation_id,
            author,
            EventKind::Error {
                message: message.into(),
            },
        )
    }

    pub fn control(
        invocation_id: impl Into<String>,
        author: impl Into<String>,
        signal: ControlSignal,
    ) -> Self {
        Self::new(invocation_id, author, EventKind::Control(signal))
    }

    pub fn content(
        invocation_id: impl Into<String>,
        author: impl Into<String>,
        content: EventContent,
    ) -> Self {
        Self::new(invocation_id, author, EventKind::Content(content))
    }

    pub fn with_state_delta(mut self, delta: StateMap) -> Self {
        self.state_delta = delta;
        self
    }

    /// Text payload, if this is a text content event
    pub fn text_content(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Content(EventContent::Text { text }) => Some(text),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Error { message } => Some(message),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, EventKind::Error { .. })
    }

    /// A non-partial text event: a stage's final answer
    pub fn is_final(&self) -> bool {
        !self.partial && self.text_content().is_some()
    }

    /// Conversation message equivalent, used to rebuild model history.
    ///
    /// Partial fragments, control signals and errors have none.
    pub fn to_message(&self) -> Option<Message> {
        if self.partial {
            return None;
        }
        let EventKind::Content(content) = &self.kind else {
            return None;
        };
        let message = match content {
            EventContent::Text { text } if self.author == USER_AUTHOR => Message::user(text.clone()),
            EventContent::Text { text } => Message::model(text.clone()),
            EventContent::FunctionCall(call) => Message {
                role: Role::Model,
                parts: vec![Part::ToolCall(call.clone())],
            },
            EventContent::FunctionResponse(response) => Message {
                role: Role::Tool,
                parts: vec![Part::ToolResponse(response.clone())],
            },
        };
        Some(message)
    }
}
