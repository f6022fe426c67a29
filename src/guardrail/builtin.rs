//! Built-in guardrails

use super::{Decision, GuardrailError, ModelCall, ModelGuardrail, ToolCallInfo, ToolGuardrail};
use crate::provider::ModelResponse;
use crate::session::StateMap;
use crate::tools::ToolResult;
use serde_json::Value;
use tracing::debug;

/// Default audit flag of [`BlockKeywordGuardrail`]
pub const KEYWORD_BLOCK_FLAG: &str = "guardrail_block_keyword_triggered";

/// Default audit flag of [`BlockArgumentGuardrail`]
pub const TOOL_BLOCK_FLAG: &str = "guardrail_tool_block_triggered";

/// Blocks a model call when the latest user input contains a keyword.
///
/// Matching is case-insensitive.
#[derive(Debug, Clone)]
pub struct BlockKeywordGuardrail {
    keyword: String,
    flag: String,
    message: String,
}

impl BlockKeywordGuardrail {
    pub fn new(keyword: impl Into<String>) -> Self {
        let keyword = keyword.into().to_uppercase();
        let message = format!(
            "I cannot process this request because it contains the blocked keyword '{}'.",
            keyword
        );
        Self {
            keyword,
            flag: KEYWORD_BLOCK_FLAG.to_string(),
            message,
        }
    }

    /// Override the audit flag key
    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flag = flag.into();
        self
    }

    /// Override the substitute response text
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }
}

impl ModelGuardrail for BlockKeywordGuardrail {
    fn name(&self) -> &str {
        "block_keyword"
    }

    fn check(
        &self,
        call: &ModelCall<'_>,
        _state: &StateMap,
    ) -> Result<Decision<ModelResponse>, GuardrailError> {
        let text = call.request.latest_user_text();
        if !self.keyword.is_empty() && text.to_uppercase().contains(&self.keyword) {
            debug!(stage = call.stage, keyword = %self.keyword, "Blocked keyword found");
            return Ok(Decision::short_circuit(
                ModelResponse::new(self.message.clone()),
                Some(self.flag.clone()),
            ));
        }
        Ok(Decision::Proceed)
    }
}

/// Blocks calls to one tool when a string argument equals a value.
///
/// Comparison is case-insensitive. The substitute result is a tool error
/// whose message may reference the offending value as `{value}` (rendered
/// capitalized).
#[derive(Debug, Clone)]
pub struct BlockArgumentGuardrail {
    tool: String,
    argument: String,
    value: String,
    flag: String,
    message: String,
}

impl BlockArgumentGuardrail {
    pub fn new(
        tool: impl Into<String>,
        argument: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let tool = tool.into();
        let argument = argument.into();
        let message = format!(
            "Policy restriction: Calls to '{}' with {} '{{value}}' are currently disabled by a tool guardrail.",
            tool, argument
        );
        Self {
            tool,
            argument,
            value: value.into().to_lowercase(),
            flag: TOOL_BLOCK_FLAG.to_string(),
            message,
        }
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flag = flag.into();
        self
    }

    /// Override the error message template
    pub fn with_message(mut self, template: impl Into<String>) -> Self {
        self.message = template.into();
        self
    }
}

impl ToolGuardrail for BlockArgumentGuardrail {
    fn name(&self) -> &str {
        "block_argument"
    }

    fn check(
        &self,
        call: &ToolCallInfo<'_>,
        _state: &StateMap,
    ) -> Result<Decision<ToolResult>, GuardrailError> {
        if call.tool_name != self.tool {
            return Ok(Decision::Proceed);
        }

        let args = call.args.as_object().ok_or_else(|| {
            GuardrailError::InvalidInput(format!(
                "arguments of '{}' are not an object",
                call.tool_name
            ))
        })?;

        match args.get(&self.argument).and_then(Value::as_str) {
            Some(value) if value.to_lowercase() == self.value => {
                debug!(stage = call.stage, tool = call.tool_name, "Blocked tool argument");
                let message = self.message.replace("{value}", &capitalize(value));
                Ok(Decision::short_circuit(
                    ToolResult::error(message),
                    Some(self.flag.clone()),
                ))
            }
            _ => Ok(Decision::Proceed),
        }
    }
}

pub(crate) fn capitalize(value: &str) -> String {
    let lower = value.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
