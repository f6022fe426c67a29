//! Stage definitions
//!
//! Stages are stateless descriptions of work. All effects go through the run
//! state and the emitted events.

use crate::guardrail::{ModelGuardrail, ModelGuardrails, ToolGuardrail, ToolGuardrails};
use crate::provider::{GenerateConfig, ModelProvider, ToolCall, ToolDeclaration};
use crate::tools::{Tool, ToolRegistry};
use serde_json::{json, Value};
use std::sync::Arc;

/// Name of the tool a model stage calls to hand over to a sub-stage
pub const TRANSFER_TOOL: &str = "transfer_to_agent";

/// Conversation contents a model stage sees
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IncludeContents {
    /// Session history plus the current run
    #[default]
    Default,
    /// Only the instruction and the current user input
    None,
}

/// One LLM turn, possibly calling tools or delegating to a sub-stage
#[derive(Clone)]
pub struct ModelStage {
    pub name: String,
    pub description: String,
    pub instruction: String,
    pub model: Arc<dyn ModelProvider>,
    pub tools: ToolRegistry,
    pub sub_stages: Vec<Arc<ModelStage>>,
    pub output_key: Option<String>,
    pub include_contents: IncludeContents,
    pub generate_config: GenerateConfig,
    pub before_model: ModelGuardrails,
    pub before_tool: ToolGuardrails,
}

impl ModelStage {
    pub fn new(name: impl Into<String>, model: Arc<dyn ModelProvider>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            instruction: String::new(),
            model,
            tools: ToolRegistry::new(),
            sub_stages: Vec::new(),
            output_key: None,
            include_contents: IncludeContents::Default,
            generate_config: GenerateConfig::default(),
            before_model: ModelGuardrails::new(),
            before_tool: ToolGuardrails::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Instruction template; `{key}` placeholders are filled from state
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn with_sub_stage(mut self, stage: Arc<ModelStage>) -> Self {
        self.sub_stages.push(stage);
        self
    }

    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    pub fn with_include_contents(mut self, include: IncludeContents) -> Self {
        self.include_contents = include;
        self
    }

    pub fn with_generate_config(mut self, config: GenerateConfig) -> Self {
        self.generate_config = config;
        self
    }

    pub fn with_model_guardrail(mut self, guardrail: Arc<dyn ModelGuardrail>) -> Self {
        self.before_model.push(guardrail);
        self
    }

    pub fn with_tool_guardrail(mut self, guardrail: Arc<dyn ToolGuardrail>) -> Self {
        self.before_tool.push(guardrail);
        self
    }

    /// Replace both guardrail chains
    pub fn with_guardrails(mut self, model: ModelGuardrails, tool: ToolGuardrails) -> Self {
        self.before_model = model;
        self.before_tool = tool;
        self
    }

    pub fn find_sub_stage(&self, name: &str) -> Option<&Arc<ModelStage>> {
        self.sub_stages.iter().find(|s| s.name == name)
    }

    /// Tool declarations advertised to the model, including the transfer
    /// tool when sub-stages exist
    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        let mut declarations = self.tools.declarations();
        if !self.sub_stages.is_empty() {
            declarations.push(self.transfer_declaration());
        }
        declarations
    }

    fn transfer_declaration(&self) -> ToolDeclaration {
        let names: Vec<&str> = self.sub_stages.iter().map(|s| s.name.as_str()).collect();
        let summary: Vec<String> = self
            .sub_stages
            .iter()
            .map(|s| format!("- {}: {}", s.name, s.description))
            .collect();
        ToolDeclaration {
            name: TRANSFER_TOOL.to_string(),
            description: format!(
                "Transfer the conversation to another agent better suited to answer.\n{}",
                summary.join("\n")
            ),
            parameters: json!({
                "type": "object",
                "properties": {
                    "agent_name": { "type": "string", "enum": names }
                },
                "required": ["agent_name"]
            }),
        }
    }
}

impl std::fmt::Debug for ModelStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelStage")
            .field("name", &self.name)
            .field("model", &self.model.model_name())
            .field("tools", &self.tools)
            .field("sub_stages", &self.sub_stages.len())
            .field("output_key", &self.output_key)
            .finish()
    }
}

/// A single tool invocation
#[derive(Clone)]
pub struct ToolStage {
    /// Author of the emitted events
    pub name: String,
    pub tool: Arc<dyn Tool>,
    pub args: Value,
    /// Set when the call was requested by a model turn
    pub call_id: Option<String>,
    pub output_key: Option<String>,
    pub before_tool: ToolGuardrails,
}

impl ToolStage {
    /// Standalone tool stage with fixed arguments
    pub fn new(name: impl Into<String>, tool: Arc<dyn Tool>, args: Value) -> Self {
        Self {
            name: name.into(),
            tool,
            args,
            call_id: None,
            output_key: None,
            before_tool: ToolGuardrails::new(),
        }
    }

    /// Tool stage answering a model's tool call
    pub fn for_call(
        author: impl Into<String>,
        tool: Arc<dyn Tool>,
        call: &ToolCall,
        before_tool: ToolGuardrails,
    ) -> Self {
        Self {
            name: author.into(),
            tool,
            args: call.args.clone(),
            call_id: Some(call.id.clone()),
            output_key: None,
            before_tool,
        }
    }

    /// Write the tool result into this state key
    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    pub fn with_tool_guardrail(mut self, guardrail: Arc<dyn ToolGuardrail>) -> Self {
        self.before_tool.push(guardrail);
        self
    }
}

impl std::fmt::Debug for ToolStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolStage")
            .field("name", &self.name)
            .field("tool", &self.tool.name())
            .field("args", &self.args)
            .field("output_key", &self.output_key)
            .finish()
    }
}

/// A unit of execution
#[derive(Debug, Clone)]
pub enum Stage {
    Model(Arc<ModelStage>),
    Tool(ToolStage),
}

impl Stage {
    pub fn name(&self) -> &str {
        match self {
            Self::Model(stage) => &stage.name,
            Self::Tool(stage) => &stage.name,
        }
    }
}

impl From<ModelStage> for Stage {
    fn from(stage: ModelStage) -> Self {
        Self::Model(Arc::new(stage))
    }
}

impl From<Arc<ModelStage>> for Stage {
    fn from(stage: Arc<ModelStage>) -> Self {
        Self::Model(stage)
    }
}

impl From<ToolStage> for Stage {
    fn from(stage: ToolStage) -> Self {
        Self::Tool(stage)
    }
}
