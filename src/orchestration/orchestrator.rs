//! Workflow orchestrator
//!
//! Walks a [`PlanNode`] tree over one run context. Each node moves through
//! `Pending -> Running -> {Completed, Escalated, Exhausted, Failed}`; the
//! transitions are recorded in the run's [`PlanTrace`](super::PlanTrace).
//!
//! ```text
//! Loop(RefinementLoop, max 5)
//!   └── Sequential(body)
//!         ├── Leaf(CriticAgent)   -> writes `criticism`
//!         └── Leaf(RefinerAgent)  -> writes `current_document` or escalates
//! ```
//!
//! Escalation is only inspected after a full loop iteration.

use super::context::{RunContext, RunError};
use super::events::{ControlSignal, Event};
use super::executor::{StageExecutor, StageOutcome};
use super::plan::{FailurePolicy, PlanNode};
use super::stage::Stage;
use super::workflow::NodeStatus;
use futures_util::future::BoxFuture;
use tracing::{debug, info, warn};

/// Executes plan trees
#[derive(Debug, Clone, Default)]
pub struct Orchestrator {
    executor: StageExecutor,
}

impl Orchestrator {
    pub fn new(executor: StageExecutor) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &StageExecutor {
        &self.executor
    }

    /// Execute a node and return its terminal status
    pub fn execute<'a>(
        &'a self,
        node: &'a PlanNode,
        ctx: &'a mut RunContext,
    ) -> BoxFuture<'a, Result<NodeStatus, RunError>> {
        Box::pin(async move {
            self.record(ctx, node.name(), None);

            let status = match node {
                PlanNode::Sequential {
                    name,
                    children,
                    on_failure,
                } => self.run_sequential(name, children, *on_failure, ctx).await?,
                PlanNode::Loop {
                    name,
                    body,
                    max_iterations,
                } => self.run_loop(name, body, *max_iterations, ctx).await?,
                PlanNode::Leaf(stage) => self.run_leaf(stage, ctx).await?,
            };

            self.record(ctx, node.name(), Some(status.clone()));
            Ok(status)
        })
    }

    async fn run_sequential(
        &self,
        name: &str,
        children: &[PlanNode],
        on_failure: FailurePolicy,
        ctx: &mut RunContext,
    ) -> Result<NodeStatus, RunError> {
        let recovers = on_failure == FailurePolicy::Continue;
        if recovers {
            ctx.enter_recover_scope();
        }

        let mut result = Ok(NodeStatus::Completed);
        for child in children {
            match self.execute(child, ctx).await {
                Ok(NodeStatus::Failed(message)) if !recovers => {
                    debug!(sequence = name, child = child.name(), "Aborting sequence");
                    result = Ok(NodeStatus::Failed(message));
                    break;
                }
                Ok(NodeStatus::Failed(message)) => {
                    warn!(sequence = name, child = child.name(), error = %message, "Child failed, continuing");
                }
                Ok(_) => {}
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }

        if recovers {
            ctx.exit_recover_scope();
        }
        result
    }

    async fn run_loop(
        &self,
        name: &str,
        body: &PlanNode,
        max_iterations: u32,
        ctx: &mut RunContext,
    ) -> Result<NodeStatus, RunError> {
        let mut iterations = 0;
        let mut escalated = false;

        while iterations < max_iterations {
            iterations += 1;
            ctx.set_escalated(false);
            debug!(loop_name = name, iteration = iterations, "Loop iteration");

            if let NodeStatus::Failed(message) = self.execute(body, ctx).await? {
                ctx.set_escalated(false);
                return Ok(NodeStatus::Failed(message));
            }
            if ctx.escalated() {
                escalated = true;
                break;
            }
        }

        // Escalation is consumed here; an enclosing loop must not see it.
        ctx.set_escalated(false);
        info!(loop_name = name, iterations, escalated, "Loop finished");

        let inv = ctx.invocation_id().to_string();
        ctx.emit(Event::control(
            &inv,
            name,
            ControlSignal::LoopFinished {
                name: name.to_string(),
                iterations,
                escalated,
            },
        ))
        .await?;

        Ok(if escalated {
            NodeStatus::Escalated
        } else {
            NodeStatus::Exhausted
        })
    }

    async fn run_leaf(&self, stage: &Stage, ctx: &mut RunContext) -> Result<NodeStatus, RunError> {
        Ok(match self.executor.execute(stage, ctx).await? {
            StageOutcome::Completed {
                escalated: true, ..
            } => NodeStatus::Escalated,
            StageOutcome::Completed { .. } => NodeStatus::Completed,
            StageOutcome::Failed { message } => NodeStatus::Failed(message),
        })
    }

    fn record(&self, ctx: &mut RunContext, node: &str, status: Option<NodeStatus>) {
        let trace = ctx.trace_mut();
        let recorded = match status {
            None => trace.start(node),
            Some(status) => trace.transition_to(node, status),
        };
        if let Err(e) = recorded {
            warn!(node, error = %e, "Plan trace rejected transition");
        }
    }
}
