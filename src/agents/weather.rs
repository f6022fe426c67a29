//! Weather coordinator
//!
//! A model stage answering weather questions with stateful tools and handing
//! greetings and farewells to the specialists in [`super::greeting`].

use super::greeting::{farewell_stage, greeting_guardrails, greeting_stage_with_guardrails};
use crate::guardrail::builtin::capitalize;
use crate::guardrail::{BlockArgumentGuardrail, ModelGuardrails, ToolGuardrails};
use crate::orchestration::ModelStage;
use crate::provider::ModelProvider;
use crate::tools::{FnTool, Tool, ToolError, ToolResult};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::{json, Value};
use std::sync::Arc;

pub const WEATHER_AGENT: &str = "weather_agent_v1";
pub const WEATHER_TOOL: &str = "get_weather_stateful";
pub const TIME_TOOL: &str = "get_current_time";

/// Reads `Celsius` (default) or `Fahrenheit`
pub const TEMPERATURE_UNIT_KEY: &str = "user_preference_temperature_unit";
pub const LAST_CITY_KEY: &str = "last_city_checked_stateful";
pub const WEATHER_REPORT_KEY: &str = "last_weather_report";

/// City the weather tool refuses to look up
pub const BLOCKED_CITY: &str = "Paris";

const WEATHER_INSTRUCTION: &str = "You are the main Weather Agent coordinating a team. \
Your primary responsibility is to provide weather information. \
Use the 'get_weather_stateful' tool ONLY for specific weather requests (e.g., 'weather in London'). \
You have specialized sub-agents: \
1. 'greeting_agent': Handles simple greetings like 'Hi', 'Hello'. Delegate to it for these. \
2. 'farewell_agent': Handles simple farewells like 'Bye', 'See you'. Delegate to it for these. \
Analyze the user's query. If it's a greeting, delegate to 'greeting_agent'. \
If it's a farewell, delegate to 'farewell_agent'. \
If it's a weather request, handle it yourself using 'get_weather_stateful'. \
For anything else, respond appropriately or state you cannot handle it.";

struct Conditions {
    temp_c: f64,
    condition: &'static str,
}

fn lookup_weather(city: &str) -> Option<Conditions> {
    let normalized: String = city.to_lowercase().split_whitespace().collect();
    match normalized.as_str() {
        "newyork" => Some(Conditions {
            temp_c: 25.0,
            condition: "sunny",
        }),
        "london" => Some(Conditions {
            temp_c: 15.0,
            condition: "cloudy",
        }),
        "tokyo" => Some(Conditions {
            temp_c: 18.0,
            condition: "light rain",
        }),
        _ => None,
    }
}

fn city_argument(args: &Value) -> Result<&str, ToolError> {
    args.get("city")
        .and_then(Value::as_str)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ToolError::InvalidArguments("missing string argument 'city'".to_string()))
}

fn city_parameters() -> Value {
    json!({
        "type": "object",
        "properties": {
            "city": { "type": "string", "description": "The name of the city." }
        },
        "required": ["city"]
    })
}

/// Weather report honoring the session's temperature unit preference.
///
/// Records the looked-up city under `last_city_checked_stateful`.
pub fn weather_tool() -> Arc<dyn Tool> {
    let tool = FnTool::new(
        WEATHER_TOOL,
        "Retrieves weather for a city and converts the temperature to the unit stored in session state.",
        |args: Value, ctx| {
            let city = city_argument(&args)?;
            let fahrenheit = ctx
                .get_state(TEMPERATURE_UNIT_KEY)
                .and_then(Value::as_str)
                .is_some_and(|unit| unit.eq_ignore_ascii_case("fahrenheit"));

            let Some(conditions) = lookup_weather(city) else {
                return Ok(ToolResult::error(format!(
                    "Sorry, I don't have weather information for '{}'.",
                    city
                )));
            };

            let (temperature, unit) = if fahrenheit {
                (conditions.temp_c * 9.0 / 5.0 + 32.0, "°F")
            } else {
                (conditions.temp_c, "°C")
            };
            let report = format!(
                "The weather in {} is {} with a temperature of {:.0}{}.",
                capitalize(city),
                conditions.condition,
                temperature,
                unit
            );

            ctx.set_state(LAST_CITY_KEY, json!(city));
            Ok(ToolResult::success(json!({ "report": report })))
        },
    )
    .with_parameters(city_parameters());
    Arc::new(tool)
}

/// Local time in a supported city
pub fn time_tool() -> Arc<dyn Tool> {
    let tool = FnTool::new(
        TIME_TOOL,
        "Returns the current time in a specified city.",
        |args: Value, _ctx| {
            let city = city_argument(&args)?;
            Ok(match current_time_in(city, Utc::now()) {
                Some(report) => ToolResult::success(json!({ "report": report })),
                None => ToolResult::error(format!(
                    "Sorry, I don't have timezone information for {}.",
                    city
                )),
            })
        },
    )
    .with_parameters(city_parameters());
    Arc::new(tool)
}

fn zone_for_city(city: &str) -> Option<Tz> {
    let normalized: String = city.to_lowercase().split_whitespace().collect();
    match normalized.as_str() {
        "newyork" => Some(Tz::America__New_York),
        "london" => Some(Tz::Europe__London),
        "tokyo" => Some(Tz::Asia__Tokyo),
        _ => None,
    }
}

/// Time report for `city` at `now`, `None` for unknown cities
pub fn current_time_in(city: &str, now: DateTime<Utc>) -> Option<String> {
    let local = now.with_timezone(&zone_for_city(city)?);
    Some(format!(
        "The current time in {} is {}",
        city,
        local.format("%Y-%m-%d %H:%M:%S %Z%z")
    ))
}

/// Weather coordinator with greeting and farewell delegation.
///
/// Weather lookups for Paris are refused by a tool guardrail; the final
/// answer is stored under `last_weather_report`.
pub fn weather_coordinator(model: Arc<dyn ModelProvider>) -> ModelStage {
    weather_coordinator_with_guardrails(model, greeting_guardrails(), weather_guardrails())
}

/// Default before-tool chain of the coordinator
pub fn weather_guardrails() -> ToolGuardrails {
    let paris_guardrail = BlockArgumentGuardrail::new(WEATHER_TOOL, "city", BLOCKED_CITY)
        .with_message(
            "Policy restriction: Weather checks for '{value}' are currently disabled by a tool guardrail.",
        );
    ToolGuardrails::new().with(Arc::new(paris_guardrail))
}

/// Coordinator whose tool calls pass `tool_guardrails` and whose greeting
/// specialist is screened by `greeting_guardrails`
pub fn weather_coordinator_with_guardrails(
    model: Arc<dyn ModelProvider>,
    greeting_guardrails: ModelGuardrails,
    tool_guardrails: ToolGuardrails,
) -> ModelStage {
    ModelStage::new(WEATHER_AGENT, Arc::clone(&model))
        .with_description(
            "The main coordinator agent. Handles weather requests and delegates greetings/farewells to specialists.",
        )
        .with_instruction(WEATHER_INSTRUCTION)
        .with_tool(time_tool())
        .with_tool(weather_tool())
        .with_guardrails(ModelGuardrails::new(), tool_guardrails)
        .with_sub_stage(Arc::new(greeting_stage_with_guardrails(
            Arc::clone(&model),
            greeting_guardrails,
        )))
        .with_sub_stage(Arc::new(farewell_stage(model)))
        .with_output_key(WEATHER_REPORT_KEY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guardrail::builtin::TOOL_BLOCK_FLAG;
    use crate::orchestration::{EventContent, EventKind, PlanNode, Runner, RunnerConfig};
    use crate::provider::Message;
    use crate::session::{InMemorySessionStore, StateMap};
    use crate::testing::ScriptedProvider;
    use crate::tools::ToolContext;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[tokio::test]
    async fn test_weather_honors_unit_preference() {
        let tool = weather_tool();
        let mut state = StateMap::new();
        state.insert(TEMPERATURE_UNIT_KEY.to_string(), json!("Fahrenheit"));

        let mut ctx = ToolContext::new(WEATHER_AGENT, "e-1", &state);
        let result = tool.call(json!({"city": "New York"}), &mut ctx).await.unwrap();
        assert_eq!(
            result,
            ToolResult::success(json!({
                "report": "The weather in New york is sunny with a temperature of 77°F."
            }))
        );
        let (delta, escalated) = ctx.into_actions();
        assert_eq!(delta.get(LAST_CITY_KEY), Some(&json!("New York")));
        assert!(!escalated);
    }

    #[tokio::test]
    async fn test_weather_unknown_city() {
        let tool = weather_tool();
        let state = StateMap::new();
        let mut ctx = ToolContext::new(WEATHER_AGENT, "e-1", &state);

        let result = tool.call(json!({"city": "Atlantis"}), &mut ctx).await.unwrap();
        assert!(!result.is_success());
        assert!(ctx.into_actions().0.is_empty());

        let mut ctx = ToolContext::new(WEATHER_AGENT, "e-1", &state);
        assert!(matches!(
            tool.call(json!({}), &mut ctx).await,
            Err(ToolError::InvalidArguments(_))
        ));
    }

    #[test]
    fn test_current_time_offsets() {
        let summer = at("2025-07-01T12:00:00Z");
        let winter = at("2025-01-15T12:00:00Z");

        assert_eq!(
            current_time_in("New York", summer).unwrap(),
            "The current time in New York is 2025-07-01 08:00:00 EDT-0400"
        );
        assert_eq!(
            current_time_in("New York", winter).unwrap(),
            "The current time in New York is 2025-01-15 07:00:00 EST-0500"
        );
        assert!(current_time_in("London", summer).unwrap().contains("13:00:00 BST"));
        assert!(current_time_in("London", winter).unwrap().contains("12:00:00 GMT"));
        assert!(current_time_in("Tokyo", winter).unwrap().contains("21:00:00 JST"));
        assert_eq!(current_time_in("Atlantis", winter), None);
    }

    #[tokio::test]
    async fn test_paris_is_blocked() {
        let provider = ScriptedProvider::new()
            .tool_call(WEATHER_TOOL, json!({"city": "paris"}))
            .text("Sorry, weather checks for Paris are disabled.");
        let root = PlanNode::leaf(weather_coordinator(Arc::new(provider.clone())));
        let runner = Runner::new(
            RunnerConfig::default(),
            root,
            Arc::new(InMemorySessionStore::new()),
        );

        let report = runner
            .run_collect("user_1", "session_1", Message::user("How about Paris?"))
            .await
            .unwrap();

        assert_eq!(report.state.get(TOOL_BLOCK_FLAG), Some(&json!(true)));
        assert!(report.state.get(LAST_CITY_KEY).is_none());
        assert_eq!(
            report.state.get(WEATHER_REPORT_KEY),
            Some(&json!("Sorry, weather checks for Paris are disabled."))
        );

        let response = report
            .events
            .iter()
            .find_map(|e| match &e.kind {
                EventKind::Content(EventContent::FunctionResponse(r)) => Some(r.response.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            response["error_message"],
            "Policy restriction: Weather checks for 'Paris' are currently disabled by a tool guardrail."
        );
    }

    #[tokio::test]
    async fn test_greeting_is_delegated() {
        let provider = ScriptedProvider::new()
            .tool_call("transfer_to_agent", json!({"agent_name": "greeting_agent"}))
            .tool_call("say_hello", json!({}))
            .text("Hello there!");
        let root = PlanNode::leaf(weather_coordinator(Arc::new(provider.clone())));
        let runner = Runner::new(
            RunnerConfig::default(),
            root,
            Arc::new(InMemorySessionStore::new()),
        );

        let report = runner
            .run_collect("user_1", "session_1", Message::user("Hi!"))
            .await
            .unwrap();

        assert_eq!(report.final_text(), Some("Hello there!"));
        // delegation does not write the coordinator's output key
        assert!(report.state.get(WEATHER_REPORT_KEY).is_none());
        let stages: Vec<String> = provider.requests().iter().map(|r| r.stage.clone()).collect();
        assert_eq!(stages, vec![WEATHER_AGENT, "greeting_agent", "greeting_agent"]);
    }
}
