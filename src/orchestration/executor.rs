//! Stage executor
//!
//! Runs a single [`Stage`] against the run context and emits its events.
//! Model stages alternate model turns and tool calls; every tool call is
//! dispatched back through [`StageExecutor::execute`] as a tool stage, so
//! tool guardrails apply uniformly.
//!
//! Stage failures never surface as `Err`: they are emitted as an event and
//! reported as [`StageOutcome::Failed`]. Only session storage errors and
//! cancellation abort the run.

use super::context::{RunContext, RunError};
use super::events::{ControlSignal, Event, EventContent};
use super::stage::{IncludeContents, ModelStage, Stage, ToolStage, TRANSFER_TOOL};
use super::template;
use crate::guardrail::{ModelCall, ToolCallInfo};
use crate::provider::{Message, ModelChunk, ModelRequest, Part, Role, ToolCall, ToolResponse};
use crate::session::StateMap;
use crate::tools::{ToolContext, ToolError, ToolResult};
use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Stage executor configuration
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum model calls within one model stage
    pub max_model_turns: u32,
    /// Bound on each external model or tool call
    pub stage_timeout: Option<Duration>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_model_turns: 10,
            stage_timeout: None,
        }
    }
}

/// Result of executing one stage
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Completed {
        /// Final text of a model stage, or the tool result
        output: Option<Value>,
        /// The stage raised the escalation signal
        escalated: bool,
    },
    Failed {
        message: String,
    },
}

impl StageOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Executes stages
#[derive(Debug, Clone, Default)]
pub struct StageExecutor {
    config: ExecutorConfig,
}

impl StageExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute a stage, emitting its events through the context
    pub fn execute<'a>(
        &'a self,
        stage: &'a Stage,
        ctx: &'a mut RunContext,
    ) -> BoxFuture<'a, Result<StageOutcome, RunError>> {
        Box::pin(async move {
            match stage {
                Stage::Model(model) => self.run_model(model, ctx).await,
                Stage::Tool(tool) => self.run_tool(tool, ctx).await,
            }
        })
    }

    async fn run_model(
        &self,
        stage: &ModelStage,
        ctx: &mut RunContext,
    ) -> Result<StageOutcome, RunError> {
        let inv = ctx.invocation_id().to_string();
        let cancel = ctx.cancel_token();

        let instruction = match template::render(&stage.instruction, &ctx.state) {
            Ok(instruction) => instruction,
            Err(e) => return self.fail(ctx, &stage.name, e.to_string()).await,
        };
        let mut contents = match stage.include_contents {
            IncludeContents::Default => ctx.history().to_vec(),
            IncludeContents::None => vec![ctx.user_message().clone()],
        };
        let tools = stage.declarations();
        let mut escalated = false;

        for turn in 1..=self.config.max_model_turns {
            let request = ModelRequest {
                stage: stage.name.clone(),
                instruction: instruction.clone(),
                contents: contents.clone(),
                tools: tools.clone(),
            };

            let call = ModelCall {
                stage: &stage.name,
                request: &request,
            };
            if let Some(intercepted) = stage.before_model.before_model(&call, &ctx.state) {
                let delta = intercepted.state_delta();
                return self
                    .complete_text(stage, ctx, intercepted.result.text, delta, false, escalated)
                    .await;
            }

            debug!(stage = %stage.name, turn, "Invoking model");
            let invoked = self
                .bounded(&cancel, stage.model.invoke(request, &stage.generate_config))
                .await?;
            let mut stream = match invoked {
                Some(Ok(stream)) => stream,
                Some(Err(e)) => return self.fail(ctx, &stage.name, e.to_string()).await,
                None => return self.fail(ctx, &stage.name, self.timed_out("Model call")).await,
            };

            let mut streamed = String::new();
            let mut final_text = None;
            let mut calls: Vec<ToolCall> = Vec::new();
            loop {
                let next = match self.bounded(&cancel, stream.next()).await? {
                    Some(next) => next,
                    None => {
                        return self.fail(ctx, &stage.name, self.timed_out("Model call")).await
                    }
                };
                match next {
                    None => break,
                    Some(Err(e)) => return self.fail(ctx, &stage.name, e.to_string()).await,
                    Some(Ok(ModelChunk::Text { text, partial: true })) => {
                        if text.is_empty() {
                            continue;
                        }
                        streamed.push_str(&text);
                        ctx.emit(Event::text(&inv, &stage.name, text, true)).await?;
                    }
                    Some(Ok(ModelChunk::Text { text, partial: false })) => final_text = Some(text),
                    Some(Ok(ModelChunk::ToolCall(call))) => calls.push(call),
                }
            }

            let streamed_any = !streamed.is_empty();
            let text = final_text.unwrap_or(streamed);
            if calls.is_empty() {
                return self
                    .complete_text(stage, ctx, text, StateMap::new(), streamed_any, escalated)
                    .await;
            }

            if !text.is_empty() {
                ctx.emit(Event::text(&inv, &stage.name, text.clone(), false))
                    .await?;
                contents.push(Message::model(text));
            }

            for call in calls {
                ctx.emit(Event::content(
                    &inv,
                    &stage.name,
                    EventContent::FunctionCall(call.clone()),
                ))
                .await?;
                contents.push(Message {
                    role: Role::Model,
                    parts: vec![Part::ToolCall(call.clone())],
                });

                if call.name == TRANSFER_TOOL && !stage.sub_stages.is_empty() {
                    return self.transfer(stage, &call, ctx, escalated).await;
                }

                let Some(tool) = stage.tools.get(&call.name) else {
                    let message = ToolError::NotFound(call.name.clone()).to_string();
                    return self.fail(ctx, &stage.name, message).await;
                };

                let dispatch = Stage::Tool(ToolStage::for_call(
                    stage.name.clone(),
                    tool,
                    &call,
                    stage.before_tool.clone(),
                ));
                match self.execute(&dispatch, ctx).await? {
                    StageOutcome::Completed {
                        output,
                        escalated: tool_escalated,
                    } => {
                        escalated |= tool_escalated;
                        contents.push(Message {
                            role: Role::Tool,
                            parts: vec![Part::ToolResponse(ToolResponse {
                                id: call.id.clone(),
                                name: call.name.clone(),
                                response: output.unwrap_or(Value::Null),
                            })],
                        });
                    }
                    failed @ StageOutcome::Failed { .. } => return Ok(failed),
                }
            }
        }

        let message = format!(
            "Stage '{}' exceeded {} model turns",
            stage.name, self.config.max_model_turns
        );
        self.fail(ctx, &stage.name, message).await
    }

    /// Finish a model stage with its final text.
    ///
    /// An empty final text is not written to the output key.
    async fn complete_text(
        &self,
        stage: &ModelStage,
        ctx: &mut RunContext,
        text: String,
        mut delta: StateMap,
        streamed: bool,
        escalated: bool,
    ) -> Result<StageOutcome, RunError> {
        let inv = ctx.invocation_id().to_string();

        // Clients only see partial content, so an unstreamed answer goes out
        // once as a single fragment.
        if !streamed && !text.is_empty() {
            ctx.emit(Event::text(&inv, &stage.name, text.clone(), true))
                .await?;
        }

        if let Some(key) = &stage.output_key {
            if !text.is_empty() {
                delta.insert(key.clone(), Value::String(text.clone()));
            }
        }
        ctx.apply_delta(&delta);

        if !text.is_empty() || !delta.is_empty() {
            let event = Event::text(&inv, &stage.name, text.clone(), false).with_state_delta(delta);
            ctx.emit(event).await?;
        }

        Ok(StageOutcome::Completed {
            output: Some(Value::String(text)),
            escalated,
        })
    }

    async fn transfer(
        &self,
        stage: &ModelStage,
        call: &ToolCall,
        ctx: &mut RunContext,
        escalated: bool,
    ) -> Result<StageOutcome, RunError> {
        let inv = ctx.invocation_id().to_string();
        let target = call
            .args
            .get("agent_name")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let Some(delegate) = stage.find_sub_stage(target) else {
            let message = format!("Unknown transfer target '{}'", target);
            return self.fail(ctx, &stage.name, message).await;
        };

        let response = ToolResult::success(json!({ "transferred_to": target }));
        ctx.emit(Event::content(
            &inv,
            &stage.name,
            EventContent::FunctionResponse(ToolResponse {
                id: call.id.clone(),
                name: call.name.clone(),
                response: response.to_value(),
            }),
        ))
        .await?;
        ctx.emit(Event::control(
            &inv,
            &stage.name,
            ControlSignal::Transfer {
                to: delegate.name.clone(),
            },
        ))
        .await?;

        info!(from = %stage.name, to = %delegate.name, "Transferring to sub-stage");
        let delegate = Stage::Model(Arc::clone(delegate));
        Ok(match self.execute(&delegate, ctx).await? {
            StageOutcome::Completed {
                output,
                escalated: delegate_escalated,
            } => StageOutcome::Completed {
                output,
                escalated: escalated || delegate_escalated,
            },
            failed => failed,
        })
    }

    async fn run_tool(
        &self,
        stage: &ToolStage,
        ctx: &mut RunContext,
    ) -> Result<StageOutcome, RunError> {
        let inv = ctx.invocation_id().to_string();
        let tool_name = stage.tool.name().to_string();

        let call_id = match &stage.call_id {
            Some(id) => id.clone(),
            None => {
                let call = ToolCall::new(tool_name.clone(), stage.args.clone());
                ctx.emit(Event::content(
                    &inv,
                    &stage.name,
                    EventContent::FunctionCall(call.clone()),
                ))
                .await?;
                call.id
            }
        };

        let info = ToolCallInfo {
            stage: &stage.name,
            tool_name: &tool_name,
            args: &stage.args,
        };
        let (result, mut delta, escalate) = match stage.before_tool.before_tool(&info, &ctx.state) {
            Some(intercepted) => {
                let delta = intercepted.state_delta();
                (intercepted.result, delta, false)
            }
            None => {
                let cancel = ctx.cancel_token();
                let (called, (delta, escalate)) = {
                    let mut tool_ctx = ToolContext::new(&stage.name, &inv, &ctx.state);
                    let called = self
                        .bounded(&cancel, stage.tool.call(stage.args.clone(), &mut tool_ctx))
                        .await?;
                    (called, tool_ctx.into_actions())
                };
                match called {
                    Some(Ok(result)) => (result, delta, escalate),
                    Some(Err(e)) => return self.fail(ctx, &stage.name, e.to_string()).await,
                    None => {
                        let message = self.timed_out(&format!("Tool '{}'", tool_name));
                        return self.fail(ctx, &stage.name, message).await;
                    }
                }
            }
        };

        let response = result.to_value();
        if let Some(key) = &stage.output_key {
            delta.insert(key.clone(), response.clone());
        }
        ctx.apply_delta(&delta);

        let event = Event::content(
            &inv,
            &stage.name,
            EventContent::FunctionResponse(ToolResponse {
                id: call_id,
                name: tool_name,
                response: response.clone(),
            }),
        )
        .with_state_delta(delta);
        ctx.emit(event).await?;

        if escalate {
            ctx.set_escalated(true);
            ctx.emit(Event::control(&inv, &stage.name, ControlSignal::Escalate))
                .await?;
        }

        Ok(StageOutcome::Completed {
            output: Some(response),
            escalated: escalate,
        })
    }

    /// Report a stage failure.
    ///
    /// Inside a continue-on-failure sequence the failure is a control signal;
    /// otherwise it is an error event, which ends the client stream.
    async fn fail(
        &self,
        ctx: &mut RunContext,
        stage: &str,
        message: String,
    ) -> Result<StageOutcome, RunError> {
        let inv = ctx.invocation_id().to_string();
        let event = if ctx.recovers_failures() {
            warn!(stage, error = %message, "Stage failed, continuing");
            Event::control(
                &inv,
                stage,
                ControlSignal::StageFailed {
                    stage: stage.to_string(),
                    message: message.clone(),
                },
            )
        } else {
            error!(stage, error = %message, "Stage failed");
            Event::error(&inv, stage, message.clone())
        };
        ctx.emit(event).await?;
        Ok(StageOutcome::Failed { message })
    }

    /// Await an external call, bounded by cancellation and the stage timeout.
    ///
    /// `Ok(None)` means the timeout expired.
    async fn bounded<F: Future>(
        &self,
        cancel: &CancellationToken,
        fut: F,
    ) -> Result<Option<F::Output>, RunError> {
        let limited = async {
            match self.config.stage_timeout {
                Some(limit) => tokio::time::timeout(limit, fut).await.ok(),
                None => Some(fut.await),
            }
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RunError::Cancelled),
            out = limited => Ok(out),
        }
    }

    fn timed_out(&self, what: &str) -> String {
        let secs = self
            .config
            .stage_timeout
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        format!("{} timed out after {}s", what, secs)
    }
}
