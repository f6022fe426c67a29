//! Plan nodes: the static shape of a workflow

use super::stage::Stage;
use serde::{Deserialize, Serialize};

/// What a sequence does when a child fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Skip the remaining children and fail the sequence
    #[default]
    Abort,
    /// Run the remaining children; the sequence still completes
    Continue,
}

/// A node of an execution plan
#[derive(Debug, Clone)]
pub enum PlanNode {
    /// Children run strictly in order
    Sequential {
        name: String,
        children: Vec<PlanNode>,
        on_failure: FailurePolicy,
    },
    /// Body repeats until a stage escalates or `max_iterations` is reached
    Loop {
        name: String,
        body: Box<PlanNode>,
        max_iterations: u32,
    },
    Leaf(Stage),
}

impl PlanNode {
    pub fn sequential(name: impl Into<String>, children: Vec<PlanNode>) -> Self {
        Self::Sequential {
            name: name.into(),
            children,
            on_failure: FailurePolicy::Abort,
        }
    }

    pub fn looped(name: impl Into<String>, body: PlanNode, max_iterations: u32) -> Self {
        Self::Loop {
            name: name.into(),
            body: Box::new(body),
            max_iterations,
        }
    }

    pub fn leaf(stage: impl Into<Stage>) -> Self {
        Self::Leaf(stage.into())
    }

    /// Set the failure policy of a sequential node; other nodes are unchanged
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        if let Self::Sequential { on_failure, .. } = &mut self {
            *on_failure = policy;
        }
        self
    }

    /// Set the failure policy of every sequential node in the tree
    pub fn with_failure_policy_all(self, policy: FailurePolicy) -> Self {
        match self {
            Self::Sequential { name, children, .. } => Self::Sequential {
                name,
                children: children
                    .into_iter()
                    .map(|child| child.with_failure_policy_all(policy))
                    .collect(),
                on_failure: policy,
            },
            Self::Loop {
                name,
                body,
                max_iterations,
            } => Self::Loop {
                name,
                body: Box::new(body.with_failure_policy_all(policy)),
                max_iterations,
            },
            leaf @ Self::Leaf(_) => leaf,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Sequential { name, .. } | Self::Loop { name, .. } => name,
            Self::Leaf(stage) => stage.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CountingTool;
    use crate::orchestration::ToolStage;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_node_names_and_policy() {
        let tool = Arc::new(CountingTool::new("say_hello", json!("hi")));
        let leaf = PlanNode::leaf(ToolStage::new("greeter", tool, json!({})));
        assert_eq!(leaf.name(), "greeter");

        let seq = PlanNode::sequential("pipeline", vec![leaf.clone()])
            .with_failure_policy(FailurePolicy::Continue);
        assert!(matches!(
            seq,
            PlanNode::Sequential {
                on_failure: FailurePolicy::Continue,
                ..
            }
        ));

        let lp = PlanNode::looped("RefinementLoop", seq, 5).with_failure_policy(FailurePolicy::Continue);
        assert_eq!(lp.name(), "RefinementLoop");
        assert!(matches!(lp, PlanNode::Loop { max_iterations: 5, .. }));
    }

    #[test]
    fn test_failure_policy_reaches_nested_sequences() {
        let tool = Arc::new(CountingTool::new("say_hello", json!("hi")));
        let leaf = PlanNode::leaf(ToolStage::new("greeter", tool, json!({})));
        let body = PlanNode::sequential("body", vec![leaf.clone()]);
        let root = PlanNode::sequential("root", vec![leaf, PlanNode::looped("loop", body, 3)])
            .with_failure_policy_all(FailurePolicy::Continue);

        let PlanNode::Sequential {
            children,
            on_failure,
            ..
        } = &root
        else {
            panic!("expected a sequential root");
        };
        assert_eq!(*on_failure, FailurePolicy::Continue);
        let PlanNode::Loop { body, .. } = &children[1] else {
            panic!("expected a loop");
        };
        assert!(matches!(
            body.as_ref(),
            PlanNode::Sequential {
                on_failure: FailurePolicy::Continue,
                ..
            }
        ));
    }
}
