//! Client request validation

use super::frame::TEXT_PLAIN;
use crate::provider::Message;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Malformed client request, rejected before any run starts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Mime type not supported: {0}")]
    UnsupportedMimeType(String),

    #[error("Invalid request payload: {0}")]
    InvalidPayload(String),
}

impl ProtocolError {
    /// Synchronous `{error}` response body
    pub fn to_response(&self) -> Value {
        json!({ "error": self.to_string() })
    }
}

/// New input sent by a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRequest {
    pub mime_type: String,
    pub data: String,
}

impl ClientRequest {
    /// Plain text input
    pub fn text(data: impl Into<String>) -> Self {
        Self {
            mime_type: TEXT_PLAIN.to_string(),
            data: data.into(),
        }
    }

    /// Validate the request and turn it into the run's user message
    pub fn into_message(self) -> Result<Message, ProtocolError> {
        if self.mime_type != TEXT_PLAIN {
            return Err(ProtocolError::UnsupportedMimeType(self.mime_type));
        }
        Ok(Message::user(self.data))
    }
}
