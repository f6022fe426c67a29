//! Agent orchestration - runtime core for multi-stage agents
//!
//! This module provides the execution logic between a client turn and the
//! stages that answer it:
//! - Events and the per-run context they flow through
//! - Stage execution (model turns, tool calls, delegation)
//! - Plan composition (sequential, loop-until-escalation, leaf)
//! - The [`Runner`] tying sessions, plans and event streaming together
//!
//! ## Data flow
//!
//! ```text
//! Runner::run ─► SessionStore::get_or_create ─► RunContext
//!                                                  │
//!                        Orchestrator::execute(PlanNode)
//!                                                  │
//!                        StageExecutor::execute(Stage) ─► guardrails ─► model / tool
//!                                                  │
//!                                           RunContext::emit ─► EventStream ─► bridge
//! ```
//!
//! A run is a single sequential task: no two stages of one run execute
//! concurrently, so a stage always observes every earlier state write.

pub mod context;
pub mod events;
pub mod executor;
pub mod orchestrator;
pub mod plan;
pub mod runtime;
pub mod stage;
pub mod template;
pub mod workflow;

pub use context::{EventSink, RunContext, RunError, RunObserver};
pub use events::{ControlSignal, Event, EventContent, EventKind, USER_AUTHOR};
pub use executor::{ExecutorConfig, StageExecutor, StageOutcome};
pub use orchestrator::Orchestrator;
pub use plan::{FailurePolicy, PlanNode};
pub use runtime::{EventStream, RunReport, Runner, RunnerConfig};
pub use stage::{IncludeContents, ModelStage, Stage, ToolStage, TRANSFER_TOOL};
pub use template::TemplateError;
pub use workflow::{NodeStatus, NodeTransition, PlanTrace};
