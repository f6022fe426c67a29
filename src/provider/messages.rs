//! Conversation and generation types exchanged with a model provider

use serde::{Deserialize, Serialize};

/// Author of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
    Tool,
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this call
    pub id: String,
    /// Name of the tool to invoke
    pub name: String,
    /// Arguments as a JSON value (already parsed)
    #[serde(default)]
    pub args: serde_json::Value,
}

impl ToolCall {
    /// Create a tool call with a generated id
    pub fn new(name: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            id: format!("call_{}", uuid::Uuid::new_v4().simple()),
            name: name.into(),
            args,
        }
    }
}

/// The result of a tool invocation, fed back to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub id: String,
    pub name: String,
    pub response: serde_json::Value,
}

/// One piece of a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Part {
    Text(String),
    ToolCall(ToolCall),
    ToolResponse(ToolResponse),
}

/// A conversation message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Message {
    /// Create a user text message
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::Text(text.into())],
        }
    }

    /// Create a model text message
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::Text(text.into())],
        }
    }

    /// Concatenated text of all text parts
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Schema of a tool advertised to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Everything a provider needs for one model turn
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// Name of the stage issuing the request
    pub stage: String,
    /// Rendered system instruction
    pub instruction: String,
    /// Conversation contents visible to the model
    pub contents: Vec<Message>,
    /// Tools the model may call
    pub tools: Vec<ToolDeclaration>,
}

impl ModelRequest {
    /// Text of the most recent user-authored message, empty when none
    pub fn latest_user_text(&self) -> String {
        self.contents
            .iter()
            .rev()
            .find(|m| m.role == Role::User && m.parts.iter().any(|p| matches!(p, Part::Text(_))))
            .map(Message::text)
            .unwrap_or_default()
    }
}

/// Generation configuration passed through to the provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateConfig {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

/// One item of a streamed model response
#[derive(Debug, Clone, PartialEq)]
pub enum ModelChunk {
    /// A text fragment (`partial = true`) or the final aggregated text
    Text { text: String, partial: bool },
    /// A request to invoke a tool
    ToolCall(ToolCall),
}

impl ModelChunk {
    /// Streaming text fragment
    pub fn partial(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            partial: true,
        }
    }

    /// Final aggregated text
    pub fn complete(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            partial: false,
        }
    }
}

/// A synthesized model answer, used when a guardrail replaces the real call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelResponse {
    pub text: String,
}

impl ModelResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}
