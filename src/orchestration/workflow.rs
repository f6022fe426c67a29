//! Plan node lifecycle tracking

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle state of a plan node within one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Not yet started
    Pending,
    /// Currently running
    Running,
    /// Finished successfully
    Completed,
    /// Finished early on an escalation signal
    Escalated,
    /// Loop ran out of iterations without escalation; a best-effort result
    Exhausted,
    /// Failed with error
    Failed(String),
}

impl NodeStatus {
    /// Get human-readable name for the status
    pub fn name(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Escalated => "escalated",
            Self::Exhausted => "exhausted",
            Self::Failed(_) => "failed",
        }
    }

    /// Check if this is a terminal status
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Whether a node may move from `self` to `next`
    pub fn can_transition_to(&self, next: &NodeStatus) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Running),
            Self::Running => next.is_terminal(),
            // A node inside a loop body runs again on the next iteration
            _ => matches!(next, Self::Pending),
        }
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed(message) => write!(f, "failed: {}", message),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// One recorded status change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTransition {
    pub node: String,
    pub from: NodeStatus,
    pub to: NodeStatus,
    pub at: DateTime<Utc>,
}

/// Status history of every plan node touched by a run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanTrace {
    current: HashMap<String, NodeStatus>,
    transitions: Vec<NodeTransition>,
}

impl PlanTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status of a node; nodes never started are `Pending`
    pub fn status(&self, node: &str) -> NodeStatus {
        self.current.get(node).cloned().unwrap_or(NodeStatus::Pending)
    }

    /// Every recorded transition, oldest first
    pub fn transitions(&self) -> &[NodeTransition] {
        &self.transitions
    }

    /// Transitions of a single node
    pub fn history(&self, node: &str) -> Vec<&NodeTransition> {
        self.transitions.iter().filter(|t| t.node == node).collect()
    }

    /// Transition a node, rejecting moves the lifecycle does not allow
    pub fn transition_to(&mut self, node: &str, next: NodeStatus) -> Result<()> {
        let from = self.status(node);
        if !from.can_transition_to(&next) {
            anyhow::bail!("Invalid transition for node '{}': {} -> {}", node, from, next);
        }
        self.transitions.push(NodeTransition {
            node: node.to_string(),
            from,
            to: next.clone(),
            at: Utc::now(),
        });
        self.current.insert(node.to_string(), next);
        Ok(())
    }

    /// Move a node into `Running`, re-arming it first if it already finished
    pub fn start(&mut self, node: &str) -> Result<()> {
        if self.status(node).is_terminal() {
            self.transition_to(node, NodeStatus::Pending)?;
        }
        self.transition_to(node, NodeStatus::Running)
    }

    /// Number of times a node reached `Running`
    pub fn run_count(&self, node: &str) -> usize {
        self.transitions
            .iter()
            .filter(|t| t.node == node && t.to == NodeStatus::Running)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_progression() {
        let mut trace = PlanTrace::new();
        assert_eq!(trace.status("critic"), NodeStatus::Pending);

        trace.start("critic").unwrap();
        assert_eq!(trace.status("critic"), NodeStatus::Running);

        trace.transition_to("critic", NodeStatus::Completed).unwrap();
        assert!(trace.status("critic").is_terminal());
        assert_eq!(trace.history("critic").len(), 2);
    }

    #[test]
    fn test_rerun_inside_loop() {
        let mut trace = PlanTrace::new();
        for _ in 0..3 {
            trace.start("refiner").unwrap();
            trace.transition_to("refiner", NodeStatus::Completed).unwrap();
        }
        assert_eq!(trace.run_count("refiner"), 3);
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let mut trace = PlanTrace::new();
        assert!(trace.transition_to("loop", NodeStatus::Exhausted).is_err());

        trace.start("loop").unwrap();
        assert!(trace.transition_to("loop", NodeStatus::Pending).is_err());
        trace.transition_to("loop", NodeStatus::Exhausted).unwrap();
        assert!(trace
            .transition_to("loop", NodeStatus::Failed("late".to_string()))
            .is_err());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(NodeStatus::Exhausted.to_string(), "exhausted");
        assert_eq!(
            NodeStatus::Failed("boom".to_string()).to_string(),
            "failed: boom"
        );
    }
}
