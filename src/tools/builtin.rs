//! Built-in tools

use super::{Tool, ToolContext, ToolError, ToolResult};
use async_trait::async_trait;
use serde_json::Value;

/// Name of the loop exit tool
pub const EXIT_LOOP_TOOL: &str = "exit_loop";

/// Signals that the enclosing loop should stop after the current iteration
#[derive(Debug, Clone, Copy, Default)]
pub struct ExitLoopTool;

#[async_trait]
impl Tool for ExitLoopTool {
    fn name(&self) -> &str {
        EXIT_LOOP_TOOL
    }

    fn description(&self) -> &str {
        "Call this function ONLY when the critique indicates no further changes are needed, \
         signaling the iterative process should end."
    }

    async fn call(&self, _args: Value, ctx: &mut ToolContext<'_>) -> Result<ToolResult, ToolError> {
        tracing::debug!(stage = ctx.stage(), "exit_loop triggered");
        ctx.escalate();
        Ok(ToolResult::success(serde_json::json!({})))
    }
}

type ToolFn =
    dyn Fn(Value, &mut ToolContext<'_>) -> Result<ToolResult, ToolError> + Send + Sync + 'static;

/// Tool backed by a synchronous closure
pub struct FnTool {
    name: String,
    description: String,
    parameters: Value,
    func: Box<ToolFn>,
}

impl FnTool {
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, func: F) -> Self
    where
        F: Fn(Value, &mut ToolContext<'_>) -> Result<ToolResult, ToolError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({ "type": "object", "properties": {} }),
            func: Box::new(func),
        }
    }

    /// Set the argument schema
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    async fn call(&self, args: Value, ctx: &mut ToolContext<'_>) -> Result<ToolResult, ToolError> {
        (self.func)(args, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::StateMap;
    use serde_json::json;

    #[tokio::test]
    async fn test_exit_loop_escalates() {
        let state = StateMap::new();
        let mut ctx = ToolContext::new("RefinerAgent", "inv", &state);
        let result = ExitLoopTool.call(json!({}), &mut ctx).await.unwrap();
        assert!(result.is_success());
        assert!(ctx.is_escalated());
    }

    #[tokio::test]
    async fn test_fn_tool_reads_arguments() {
        let tool = FnTool::new("say_hello", "Provides a simple greeting", |args, _ctx| {
            let name = args.get("name").and_then(Value::as_str).unwrap_or("there");
            Ok(ToolResult::success(json!(format!("Hello, {}!", name))))
        })
        .with_parameters(json!({
            "type": "object",
            "properties": { "name": { "type": "string" } }
        }));

        let state = StateMap::new();
        let mut ctx = ToolContext::new("greeting_agent", "inv", &state);
        let result = tool.call(json!({"name": "Ada"}), &mut ctx).await.unwrap();
        assert_eq!(result, ToolResult::success(json!("Hello, Ada!")));
        assert_eq!(tool.declaration().parameters["properties"]["name"]["type"], "string");
    }
}
