//! Tool registry

use super::Tool;
use crate::provider::ToolDeclaration;
use std::sync::Arc;

/// Ordered, name-addressable set of tools attached to a stage
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    /// Look up a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    /// Declarations of every registered tool, in registration order
    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        self.tools.iter().map(|t| t.declaration()).collect()
    }

    /// Names of every registered tool
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ExitLoopTool, FnTool, ToolResult};
    use serde_json::json;

    #[test]
    fn test_registry_lookup_and_replace() {
        let mut registry = ToolRegistry::new();
        assert!(registry.is_empty());

        registry.register(Arc::new(ExitLoopTool));
        registry.register(Arc::new(FnTool::new("say_hello", "Greets", |_args, _ctx| {
            Ok(ToolResult::success(json!("Hello!")))
        })));
        assert_eq!(registry.names(), vec!["exit_loop", "say_hello"]);

        registry.register(Arc::new(FnTool::new("say_hello", "Greets again", |_args, _ctx| {
            Ok(ToolResult::success(json!("Hi!")))
        })));
        assert_eq!(registry.len(), 2);
        let declarations = registry.declarations();
        assert_eq!(declarations[1].description, "Greets again");
        assert!(registry.get("missing").is_none());
    }
}
