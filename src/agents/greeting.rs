//! Greeting and farewell specialists

use crate::guardrail::{BlockKeywordGuardrail, ModelGuardrails, ToolGuardrails};
use crate::orchestration::ModelStage;
use crate::provider::ModelProvider;
use crate::tools::{FnTool, Tool, ToolResult};
use serde_json::{json, Value};
use std::sync::Arc;

pub const GREETING_AGENT: &str = "greeting_agent";
pub const FAREWELL_AGENT: &str = "farewell_agent";

/// Keyword the greeting stage refuses to process
pub const BLOCKED_KEYWORD: &str = "BLOCK";

/// `say_hello(name?)`
pub fn say_hello_tool() -> Arc<dyn Tool> {
    let tool = FnTool::new(
        "say_hello",
        "Provides a simple greeting. If a name is provided, it will be used.",
        |args: Value, _ctx| {
            let greeting = match args.get("name").and_then(Value::as_str) {
                Some(name) if !name.trim().is_empty() => format!("Hello, {}!", name.trim()),
                _ => "Hello there!".to_string(),
            };
            Ok(ToolResult::success(json!({ "greeting": greeting })))
        },
    )
    .with_parameters(json!({
        "type": "object",
        "properties": {
            "name": { "type": "string", "description": "The name of the person to greet." }
        }
    }));
    Arc::new(tool)
}

/// `say_goodbye()`
pub fn say_goodbye_tool() -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        "say_goodbye",
        "Provides a simple farewell message to conclude the conversation.",
        |_args, _ctx| {
            Ok(ToolResult::success(
                json!({ "farewell": "Goodbye! Have a great day." }),
            ))
        },
    ))
}

/// Default before-model chain of the greeting stage
pub fn greeting_guardrails() -> ModelGuardrails {
    ModelGuardrails::new().with(Arc::new(BlockKeywordGuardrail::new(BLOCKED_KEYWORD)))
}

/// Stage answering simple greetings through `say_hello`.
///
/// Inputs containing `BLOCK` never reach the model.
pub fn greeting_stage(model: Arc<dyn ModelProvider>) -> ModelStage {
    greeting_stage_with_guardrails(model, greeting_guardrails())
}

/// Greeting stage screened by the given before-model chain
pub fn greeting_stage_with_guardrails(
    model: Arc<dyn ModelProvider>,
    guardrails: ModelGuardrails,
) -> ModelStage {
    ModelStage::new(GREETING_AGENT, model)
        .with_description("Handles simple greetings and hellos using the 'say_hello' tool.")
        .with_instruction(
            "You are the Greeting Agent. Your ONLY task is to provide a friendly greeting to the user. \
             Use the 'say_hello' tool to generate the greeting. \
             If the user provides their name, make sure to pass it to the tool. \
             Do not engage in any other conversation or tasks.",
        )
        .with_tool(say_hello_tool())
        .with_guardrails(guardrails, ToolGuardrails::new())
}

pub fn farewell_stage(model: Arc<dyn ModelProvider>) -> ModelStage {
    ModelStage::new(FAREWELL_AGENT, model)
        .with_description("Handles simple farewells and goodbyes using the 'say_goodbye' tool.")
        .with_instruction(
            "You are the Farewell Agent. Your ONLY task is to provide a polite goodbye message. \
             Use the 'say_goodbye' tool when the user indicates they are leaving or ending the conversation \
             (e.g., using words like 'bye', 'goodbye', 'thanks bye', 'see you'). \
             Do not perform any other actions.",
        )
        .with_tool(say_goodbye_tool())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guardrail::builtin::KEYWORD_BLOCK_FLAG;
    use crate::orchestration::{PlanNode, Runner, RunnerConfig};
    use crate::provider::Message;
    use crate::session::{InMemorySessionStore, StateMap};
    use crate::testing::ScriptedProvider;
    use crate::tools::ToolContext;

    #[tokio::test]
    async fn test_say_hello() {
        let tool = say_hello_tool();
        let state = StateMap::new();

        let mut ctx = ToolContext::new(GREETING_AGENT, "e-1", &state);
        let result = tool.call(json!({"name": "Alice"}), &mut ctx).await.unwrap();
        assert_eq!(result, ToolResult::success(json!({"greeting": "Hello, Alice!"})));

        let mut ctx = ToolContext::new(GREETING_AGENT, "e-1", &state);
        let result = tool.call(json!({}), &mut ctx).await.unwrap();
        assert_eq!(result, ToolResult::success(json!({"greeting": "Hello there!"})));
    }

    #[tokio::test]
    async fn test_blocked_keyword_skips_model() {
        let provider = ScriptedProvider::new().text("should not be used");
        let root = PlanNode::leaf(greeting_stage(Arc::new(provider.clone())));
        let store = Arc::new(InMemorySessionStore::new());
        let runner = Runner::new(RunnerConfig::default(), root, store);

        let report = runner
            .run_collect("user_1", "session_1", Message::user("please block this"))
            .await
            .unwrap();

        assert_eq!(provider.call_count(), 0);
        assert_eq!(report.state.get(KEYWORD_BLOCK_FLAG), Some(&json!(true)));
        assert_eq!(
            report.final_text(),
            Some("I cannot process this request because it contains the blocked keyword 'BLOCK'.")
        );
    }

    #[tokio::test]
    async fn test_farewell_uses_tool() {
        let provider = ScriptedProvider::new()
            .tool_call("say_goodbye", json!({}))
            .text("Goodbye! Have a great day.");
        let root = PlanNode::leaf(farewell_stage(Arc::new(provider.clone())));
        let runner = Runner::new(
            RunnerConfig::default(),
            root,
            Arc::new(InMemorySessionStore::new()),
        );

        let report = runner
            .run_collect("user_1", "session_1", Message::user("bye"))
            .await
            .unwrap();

        assert_eq!(provider.call_count(), 2);
        assert_eq!(report.final_text(), Some("Goodbye! Have a great day."));
        let declared: Vec<String> = provider.requests()[0]
            .tools
            .iter()
            .map(|d| d.name.clone())
            .collect();
        assert_eq!(declared, vec!["say_goodbye".to_string()]);
    }
}
