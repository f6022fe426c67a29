//! Ordered guardrail chains

use super::{Decision, ModelCall, ModelGuardrail, ToolCallInfo, ToolGuardrail};
use crate::provider::ModelResponse;
use crate::session::StateMap;
use crate::tools::ToolResult;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Substitute result produced by the first short-circuiting guardrail
#[derive(Debug, Clone, PartialEq)]
pub struct Intercepted<T> {
    pub result: T,
    /// Name of the guardrail that fired
    pub guardrail: String,
    pub audit_flag: Option<String>,
}

impl<T> Intercepted<T> {
    /// State writes implied by the interception
    pub fn state_delta(&self) -> StateMap {
        let mut delta = StateMap::new();
        if let Some(flag) = &self.audit_flag {
            delta.insert(flag.clone(), Value::Bool(true));
        }
        delta
    }
}

/// Guardrails evaluated in registration order
pub struct GuardrailChain<G: ?Sized> {
    guardrails: Vec<Arc<G>>,
}

pub type ModelGuardrails = GuardrailChain<dyn ModelGuardrail>;
pub type ToolGuardrails = GuardrailChain<dyn ToolGuardrail>;

impl<G: ?Sized> GuardrailChain<G> {
    pub fn new() -> Self {
        Self {
            guardrails: Vec::new(),
        }
    }

    /// Append a guardrail; it runs after every guardrail already registered
    pub fn push(&mut self, guardrail: Arc<G>) {
        self.guardrails.push(guardrail);
    }

    /// Builder form of [`push`](Self::push)
    pub fn with(mut self, guardrail: Arc<G>) -> Self {
        self.push(guardrail);
        self
    }

    pub fn len(&self) -> usize {
        self.guardrails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guardrails.is_empty()
    }
}

impl<G: ?Sized> Default for GuardrailChain<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: ?Sized> Clone for GuardrailChain<G> {
    fn clone(&self) -> Self {
        Self {
            guardrails: self.guardrails.clone(),
        }
    }
}

impl<G: ?Sized> std::fmt::Debug for GuardrailChain<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardrailChain")
            .field("len", &self.guardrails.len())
            .finish()
    }
}

impl GuardrailChain<dyn ModelGuardrail> {
    /// Evaluate the chain before a model call.
    ///
    /// Returns `None` when every guardrail proceeds.
    pub fn before_model(
        &self,
        call: &ModelCall<'_>,
        state: &StateMap,
    ) -> Option<Intercepted<ModelResponse>> {
        for guardrail in &self.guardrails {
            match guardrail.check(call, state) {
                Ok(Decision::Proceed) => continue,
                Ok(Decision::ShortCircuit { result, audit_flag }) => {
                    info!(
                        stage = call.stage,
                        guardrail = guardrail.name(),
                        "Model call short-circuited"
                    );
                    return Some(Intercepted {
                        result,
                        guardrail: guardrail.name().to_string(),
                        audit_flag,
                    });
                }
                Err(e) => {
                    warn!(
                        stage = call.stage,
                        guardrail = guardrail.name(),
                        error = %e,
                        "Model guardrail failed, proceeding"
                    );
                }
            }
        }
        None
    }
}

impl GuardrailChain<dyn ToolGuardrail> {
    /// Evaluate the chain before a tool call.
    ///
    /// Returns `None` when every guardrail proceeds.
    pub fn before_tool(
        &self,
        call: &ToolCallInfo<'_>,
        state: &StateMap,
    ) -> Option<Intercepted<ToolResult>> {
        for guardrail in &self.guardrails {
            match guardrail.check(call, state) {
                Ok(Decision::Proceed) => continue,
                Ok(Decision::ShortCircuit { result, audit_flag }) => {
                    info!(
                        stage = call.stage,
                        tool = call.tool_name,
                        guardrail = guardrail.name(),
                        "Tool call short-circuited"
                    );
                    return Some(Intercepted {
                        result,
                        guardrail: guardrail.name().to_string(),
                        audit_flag,
                    });
                }
                Err(e) => {
                    warn!(
                        stage = call.stage,
                        tool = call.tool_name,
                        guardrail = guardrail.name(),
                        error = %e,
                        "Tool guardrail failed, proceeding"
                    );
                }
            }
        }
        None
    }
}
