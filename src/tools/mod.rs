//! Tool invocation interface
//!
//! Concrete domain tools live outside the runtime. They implement [`Tool`]
//! and receive a [`ToolContext`] through which they may read and write the
//! run's state map or raise the loop escalation signal.

pub mod builtin;
pub mod registry;

pub use builtin::{ExitLoopTool, FnTool};
pub use registry::ToolRegistry;

use crate::provider::ToolDeclaration;
use crate::session::StateMap;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Outcome reported by a tool: `{status: success, payload}` or
/// `{status: error, error_message}`.
///
/// An `Error` status is an ordinary result handed back to the model, not a
/// stage failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    Success { payload: Value },
    Error { error_message: String },
}

impl ToolResult {
    pub fn success(payload: Value) -> Self {
        Self::Success { payload }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error_message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// JSON form as seen by the model and the event log
    pub fn to_value(&self) -> Value {
        match self {
            Self::Success { payload } => serde_json::json!({
                "status": "success",
                "payload": payload,
            }),
            Self::Error { error_message } => serde_json::json!({
                "status": "error",
                "error_message": error_message,
            }),
        }
    }
}

/// Failures raised by a tool implementation; these fail the calling stage
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Tool not found: {0}")]
    NotFound(String),
}

/// Run-scoped handle passed to a tool call
///
/// Writes are staged and only reach the run state once the call succeeds.
pub struct ToolContext<'a> {
    stage: &'a str,
    invocation_id: &'a str,
    state: &'a StateMap,
    delta: StateMap,
    escalate: bool,
}

impl<'a> ToolContext<'a> {
    pub fn new(stage: &'a str, invocation_id: &'a str, state: &'a StateMap) -> Self {
        Self {
            stage,
            invocation_id,
            state,
            delta: StateMap::new(),
            escalate: false,
        }
    }

    /// Name of the stage the tool runs for
    pub fn stage(&self) -> &str {
        self.stage
    }

    pub fn invocation_id(&self) -> &str {
        self.invocation_id
    }

    /// Read a state key, including writes staged by this call
    pub fn get_state(&self, key: &str) -> Option<&Value> {
        self.delta.get(key).or_else(|| self.state.get(key))
    }

    /// Write a state key; visible to every later stage of the run
    pub fn set_state(&mut self, key: impl Into<String>, value: Value) {
        self.delta.insert(key.into(), value);
    }

    /// Raise the escalation signal that ends the enclosing loop
    pub fn escalate(&mut self) {
        self.escalate = true;
    }

    pub fn is_escalated(&self) -> bool {
        self.escalate
    }

    /// Consume the context, returning the state writes and escalation flag
    pub fn into_actions(self) -> (StateMap, bool) {
        (self.delta, self.escalate)
    }
}

/// An externally implemented function the model can call
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name
    fn name(&self) -> &str;

    /// Human readable description, shown to the model
    fn description(&self) -> &str;

    /// JSON schema of the arguments
    fn parameters(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    /// Declaration advertised to the model
    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }

    /// Execute the tool
    async fn call(&self, args: Value, ctx: &mut ToolContext<'_>) -> Result<ToolResult, ToolError>;
}
