//! Guardrails: interceptors run before a model call or a tool call
//!
//! A guardrail inspects the pending invocation together with the run's state
//! and returns a [`Decision`]. Guardrails are registered per stage, in order,
//! and are immutable for the lifetime of a run.

pub mod builtin;
pub mod chain;

pub use builtin::{BlockArgumentGuardrail, BlockKeywordGuardrail};
pub use chain::{GuardrailChain, Intercepted, ModelGuardrails, ToolGuardrails};

use crate::provider::{ModelRequest, ModelResponse};
use crate::session::StateMap;
use crate::tools::ToolResult;
use serde_json::Value;
use thiserror::Error;

/// Verdict of a single guardrail
#[derive(Debug, Clone, PartialEq)]
pub enum Decision<T> {
    /// Let the invocation (or the next guardrail) run
    Proceed,
    /// Skip the invocation and use `result` in its place.
    ///
    /// When `audit_flag` is set, that state key is written as `true`.
    ShortCircuit { result: T, audit_flag: Option<String> },
}

impl<T> Decision<T> {
    pub fn short_circuit(result: T, audit_flag: Option<String>) -> Self {
        Self::ShortCircuit { result, audit_flag }
    }

    pub fn is_proceed(&self) -> bool {
        matches!(self, Self::Proceed)
    }
}

/// Descriptor of a pending model call
#[derive(Debug, Clone, Copy)]
pub struct ModelCall<'a> {
    pub stage: &'a str,
    pub request: &'a ModelRequest,
}

/// Descriptor of a pending tool call
#[derive(Debug, Clone, Copy)]
pub struct ToolCallInfo<'a> {
    pub stage: &'a str,
    pub tool_name: &'a str,
    pub args: &'a Value,
}

/// Unexpected guardrail failure; the chain logs it and proceeds
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GuardrailError {
    #[error("Guardrail received invalid input: {0}")]
    InvalidInput(String),

    #[error("Guardrail failed: {0}")]
    Internal(String),
}

/// Guardrail evaluated before a model call
pub trait ModelGuardrail: Send + Sync {
    fn name(&self) -> &str;

    fn check(
        &self,
        call: &ModelCall<'_>,
        state: &StateMap,
    ) -> Result<Decision<ModelResponse>, GuardrailError>;
}

/// Guardrail evaluated before a tool call
pub trait ToolGuardrail: Send + Sync {
    fn name(&self) -> &str;

    fn check(
        &self,
        call: &ToolCallInfo<'_>,
        state: &StateMap,
    ) -> Result<Decision<ToolResult>, GuardrailError>;
}
