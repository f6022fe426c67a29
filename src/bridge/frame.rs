//! Client-facing frames

use crate::orchestration::{Event, EventContent, EventKind};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Mime type of text content frames
pub const TEXT_PLAIN: &str = "text/plain";

/// One unit of the client stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Frame {
    /// Partial content, forwarded as soon as it is produced
    Content { mime_type: String, data: String },
    /// Terminal error
    Error { error: String, turn_complete: bool },
    /// Terminal end-of-turn marker
    TurnComplete {
        turn_complete: bool,
        interrupted: bool,
    },
}

impl Frame {
    pub fn text(data: impl Into<String>) -> Self {
        Self::Content {
            mime_type: TEXT_PLAIN.to_string(),
            data: data.into(),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
            turn_complete: true,
        }
    }

    pub fn turn_complete() -> Self {
        Self::TurnComplete {
            turn_complete: true,
            interrupted: false,
        }
    }

    /// Frame for an event, if the event is client-visible.
    ///
    /// Only non-empty partial text and errors are; final aggregates, tool
    /// traffic and control signals stay internal.
    pub fn from_event(event: &Event) -> Option<Self> {
        match &event.kind {
            EventKind::Error { message } => Some(Self::error(message.clone())),
            EventKind::Content(EventContent::Text { text }) if event.partial && !text.is_empty() => {
                Some(Self::text(text.clone()))
            }
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Content { .. })
    }

    /// JSON encoding of the frame
    pub fn to_json(&self) -> String {
        let value = match self {
            Self::Content { mime_type, data } => json!({ "mime_type": mime_type, "data": data }),
            Self::Error {
                error,
                turn_complete,
            } => json!({ "error": error, "turn_complete": turn_complete }),
            Self::TurnComplete {
                turn_complete,
                interrupted,
            } => json!({ "turn_complete": turn_complete, "interrupted": interrupted }),
        };
        value.to_string()
    }

    /// Server-sent event encoding: `data: <json>\n\n`
    pub fn to_sse(&self) -> String {
        format!("data: {}\n\n", self.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::ControlSignal;

    #[test]
    fn test_frame_encodings() {
        let content: serde_json::Value = serde_json::from_str(&Frame::text("Hello").to_json()).unwrap();
        assert_eq!(content, json!({"mime_type": "text/plain", "data": "Hello"}));

        let sse = Frame::turn_complete().to_sse();
        let body = sse
            .strip_prefix("data: ")
            .and_then(|s| s.strip_suffix("\n\n"))
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(value, json!({"turn_complete": true, "interrupted": false}));

        let error: Frame = serde_json::from_str(&Frame::error("boom").to_json()).unwrap();
        assert_eq!(error, Frame::error("boom"));
    }

    #[test]
    fn test_from_event_visibility() {
        let partial = Event::text("inv", "agent", "Hel", true);
        let empty = Event::text("inv", "agent", "", true);
        let complete = Event::text("inv", "agent", "Hello", false);
        let control = Event::control("inv", "agent", ControlSignal::Escalate);
        let error = Event::error("inv", "agent", "boom");

        assert_eq!(Frame::from_event(&partial), Some(Frame::text("Hel")));
        assert_eq!(Frame::from_event(&empty), None);
        assert_eq!(Frame::from_event(&complete), None);
        assert_eq!(Frame::from_event(&control), None);
        assert!(Frame::from_event(&error).unwrap().is_terminal());
    }
}
