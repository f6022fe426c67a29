//! TOML configuration loading.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::agents::{document_refinement_pipeline_with, weather_coordinator_with_guardrails};
use crate::guardrail::builtin::{KEYWORD_BLOCK_FLAG, TOOL_BLOCK_FLAG};
use crate::guardrail::{
    BlockArgumentGuardrail, BlockKeywordGuardrail, ModelGuardrail, ModelGuardrails,
    ToolGuardrail, ToolGuardrails,
};
use crate::orchestration::{ExecutorConfig, FailurePolicy, PlanNode, RunnerConfig};
use crate::provider::ModelProvider;
use crate::session::{FileSessionStore, InMemorySessionStore, SessionStore};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub guardrails: GuardrailsConfig,
}

/// Run execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    /// Capacity of the channel between a run and its consumer
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    #[serde(default = "default_max_model_turns")]
    pub max_model_turns: u32,
    /// Bound on each external model or tool call. Unbounded when absent.
    #[serde(default)]
    pub stage_timeout_seconds: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            event_buffer: default_event_buffer(),
            max_model_turns: default_max_model_turns(),
            stage_timeout_seconds: None,
        }
    }
}

fn default_app_name() -> String {
    "ark".to_string()
}

fn default_event_buffer() -> usize {
    1
}

fn default_max_model_turns() -> u32 {
    10
}

/// Plan composition defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

fn default_max_iterations() -> u32 {
    5
}

/// Session storage backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionBackend {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub backend: SessionBackend,
    /// Base directory of the file backend
    #[serde(default)]
    pub path: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Markdown run transcript. No transcript is written when absent.
    #[serde(default)]
    pub transcript_file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            transcript_file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

/// Ordered guardrail definitions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardrailsConfig {
    #[serde(default)]
    pub model: Vec<GuardrailSpec>,
    #[serde(default)]
    pub tool: Vec<GuardrailSpec>,
}

impl GuardrailsConfig {
    /// Build the model and tool chains, preserving declaration order.
    pub fn build(&self) -> Result<(ModelGuardrails, ToolGuardrails)> {
        let mut model = ModelGuardrails::new();
        for spec in &self.model {
            model.push(spec.build_model()?);
        }
        let mut tool = ToolGuardrails::new();
        for spec in &self.tool {
            tool.push(spec.build_tool()?);
        }
        Ok((model, tool))
    }
}

/// One configured guardrail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GuardrailSpec {
    BlockKeyword {
        keyword: String,
        #[serde(default)]
        flag: Option<String>,
    },
    BlockArgument {
        tool: String,
        argument: String,
        value: String,
        #[serde(default)]
        flag: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
}

impl GuardrailSpec {
    /// Build a before-model guardrail. Only `block_keyword` applies to model calls.
    pub fn build_model(&self) -> Result<Arc<dyn ModelGuardrail>> {
        match self {
            Self::BlockKeyword { keyword, flag } => {
                let guardrail = BlockKeywordGuardrail::new(keyword)
                    .with_flag(flag.as_deref().unwrap_or(KEYWORD_BLOCK_FLAG));
                Ok(Arc::new(guardrail))
            }
            Self::BlockArgument { tool, .. } => {
                bail!("block_argument guardrail for '{}' cannot guard model calls", tool)
            }
        }
    }

    /// Build a before-tool guardrail. Only `block_argument` applies to tool calls.
    pub fn build_tool(&self) -> Result<Arc<dyn ToolGuardrail>> {
        match self {
            Self::BlockArgument {
                tool,
                argument,
                value,
                flag,
                message,
            } => {
                let mut guardrail = BlockArgumentGuardrail::new(tool, argument, value)
                    .with_flag(flag.as_deref().unwrap_or(TOOL_BLOCK_FLAG));
                if let Some(message) = message {
                    guardrail = guardrail.with_message(message);
                }
                Ok(Arc::new(guardrail))
            }
            Self::BlockKeyword { keyword, .. } => {
                bail!("block_keyword guardrail '{}' cannot guard tool calls", keyword)
            }
        }
    }
}

impl Configuration {
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            max_model_turns: self.runtime.max_model_turns,
            stage_timeout: self.runtime.stage_timeout_seconds.map(Duration::from_secs),
        }
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            app_name: self.runtime.app_name.clone(),
            event_buffer: self.runtime.event_buffer.max(1),
            executor: self.executor_config(),
        }
    }

    /// Weather coordinator guarded by the configured chains.
    ///
    /// `guardrails.tool` screens the coordinator's tool calls and
    /// `guardrails.model` screens its greeting specialist. Without guardrail
    /// sections nothing is blocked.
    pub fn weather_plan(&self, model: Arc<dyn ModelProvider>) -> Result<PlanNode> {
        let (model_chain, tool_chain) = self.guardrails.build()?;
        Ok(PlanNode::leaf(weather_coordinator_with_guardrails(
            model,
            model_chain,
            tool_chain,
        )))
    }

    /// Refinement pipeline using `workflow.max_iterations` and applying
    /// `workflow.failure_policy` to every sequence.
    pub fn refinement_plan(&self, model: Arc<dyn ModelProvider>) -> PlanNode {
        document_refinement_pipeline_with(model, self.workflow.max_iterations)
            .with_failure_policy_all(self.workflow.failure_policy)
    }

    /// Instantiate the configured session backend.
    pub fn session_store(&self) -> Result<Arc<dyn SessionStore>> {
        match self.session.backend {
            SessionBackend::Memory => Ok(Arc::new(InMemorySessionStore::new())),
            SessionBackend::File => {
                let path = self
                    .session
                    .path
                    .as_deref()
                    .context("session.path is required for the file backend")?;
                let store = FileSessionStore::new(path)
                    .with_context(|| format!("Failed to open session directory: {}", path))?;
                Ok(Arc::new(store))
            }
        }
    }
}

/// Loads and manages TOML configuration.
#[derive(Debug)]
pub struct ConfigurationLoader {
    pub config_path: PathBuf,
    pub config: Configuration,
}

impl ConfigurationLoader {
    /// Initialize configuration loader.
    ///
    /// # Arguments
    /// * `config_path` - Path to TOML config file. If None, uses `config/ark.toml`
    ///   when present and the default configuration otherwise.
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let config_path = config_path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("config/ark.toml"));

        let config = if config_path.exists() {
            Self::load_config(&config_path)?
        } else {
            Configuration::default()
        };

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Create a configuration loader from a pre-parsed Configuration.
    pub fn from_config(config: Configuration) -> Self {
        Self {
            config_path: PathBuf::from("config/ark.toml"),
            config,
        }
    }

    /// Load configuration from TOML file.
    fn load_config(path: &Path) -> Result<Configuration> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }

    /// Get configuration value by dot-notation key.
    pub fn get_string(&self, key: &str) -> Option<String> {
        match key {
            "runtime.app_name" => Some(self.config.runtime.app_name.clone()),
            "logging.level" => Some(self.config.logging.level.clone()),
            "logging.transcript_file" => self.config.logging.transcript_file.clone(),
            "server.bind" => Some(self.config.server.bind.clone()),
            "session.path" => self.config.session.path.clone(),
            _ => None,
        }
    }

    /// Get numeric configuration value.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        match key {
            "runtime.event_buffer" => Some(self.config.runtime.event_buffer as u64),
            "runtime.max_model_turns" => Some(self.config.runtime.max_model_turns as u64),
            "runtime.stage_timeout_seconds" => self.config.runtime.stage_timeout_seconds,
            "workflow.max_iterations" => Some(self.config.workflow.max_iterations as u64),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::refinement::LOOP_NAME;
    use crate::agents::weather::LAST_CITY_KEY;
    use crate::orchestration::{NodeStatus, Runner};
    use crate::provider::Message;
    use crate::testing::ScriptedProvider;
    use std::fs;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Configuration::default();
        assert_eq!(config.runtime.app_name, "ark");
        assert_eq!(config.runtime.event_buffer, 1);
        assert_eq!(config.runtime.max_model_turns, 10);
        assert_eq!(config.runtime.stage_timeout_seconds, None);
        assert_eq!(config.workflow.max_iterations, 5);
        assert_eq!(config.workflow.failure_policy, FailurePolicy::Abort);
        assert_eq!(config.session.backend, SessionBackend::Memory);
        assert!(config.guardrails.model.is_empty());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let loader = ConfigurationLoader::new(Some(Path::new("/nonexistent/ark.toml"))).unwrap();
        assert_eq!(loader.get_string("runtime.app_name"), Some("ark".to_string()));
        assert_eq!(loader.get_u64("workflow.max_iterations"), Some(5));
        assert_eq!(loader.get_u64("runtime.stage_timeout_seconds"), None);
    }

    #[test]
    fn test_empty_file_is_valid() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "").unwrap();

        let loader = ConfigurationLoader::new(Some(temp_file.path())).unwrap();
        assert_eq!(loader.config.runtime.max_model_turns, 10);
        assert_eq!(loader.config.server.bind, "127.0.0.1:8080");
    }

    #[test]
    fn test_config_from_toml() {
        let toml_content = r#"
[runtime]
app_name = "weather_tutorial_app"
event_buffer = 4
stage_timeout_seconds = 30

[workflow]
max_iterations = 3
failure_policy = "continue"

[session]
backend = "file"
path = "/tmp/ark-sessions"

[logging]
level = "debug"
transcript_file = "/tmp/ark-transcript.md"

[[guardrails.model]]
kind = "block_keyword"
keyword = "block"

[[guardrails.tool]]
kind = "block_argument"
tool = "get_weather_stateful"
argument = "city"
value = "Paris"
flag = "paris_blocked"
"#;

        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), toml_content).unwrap();

        let loader = ConfigurationLoader::new(Some(temp_file.path())).unwrap();
        let config = &loader.config;
        assert_eq!(config.runtime.app_name, "weather_tutorial_app");
        assert_eq!(config.workflow.failure_policy, FailurePolicy::Continue);
        assert_eq!(config.session.backend, SessionBackend::File);
        assert_eq!(loader.get_string("logging.level"), Some("debug".to_string()));

        let runner = config.runner_config();
        assert_eq!(runner.event_buffer, 4);
        assert_eq!(runner.executor.stage_timeout, Some(Duration::from_secs(30)));
        assert_eq!(runner.executor.max_model_turns, 10);

        assert_eq!(
            config.guardrails.tool[0],
            GuardrailSpec::BlockArgument {
                tool: "get_weather_stateful".to_string(),
                argument: "city".to_string(),
                value: "Paris".to_string(),
                flag: Some("paris_blocked".to_string()),
                message: None,
            }
        );
        let (model, tool) = config.guardrails.build().unwrap();
        assert_eq!(model.len(), 1);
        assert_eq!(tool.len(), 1);
    }

    #[test]
    fn test_bundled_config_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/ark.toml");
        let loader = ConfigurationLoader::new(Some(&path)).unwrap();

        assert_eq!(loader.config.runtime.app_name, "weather_tutorial_app");
        let (model, tool) = loader.config.guardrails.build().unwrap();
        assert_eq!(model.len(), 1);
        assert_eq!(tool.len(), 1);
    }

    fn load(toml_content: &str) -> Configuration {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), toml_content).unwrap();
        ConfigurationLoader::new(Some(temp_file.path())).unwrap().config
    }

    #[tokio::test]
    async fn test_refinement_plan_follows_workflow_section() {
        let config = load("[workflow]\nmax_iterations = 2\nfailure_policy = \"continue\"\n");
        let provider = ScriptedProvider::new()
            .text("draft")
            .with_fallback_text("Needs a stronger opening sentence.");
        let plan = config.refinement_plan(Arc::new(provider.clone()));
        assert!(matches!(
            plan,
            PlanNode::Sequential {
                on_failure: FailurePolicy::Continue,
                ..
            }
        ));

        let runner = Runner::new(
            config.runner_config(),
            plan,
            Arc::new(InMemorySessionStore::new()),
        );
        let report = runner
            .run_collect("user_1", "s", Message::user("a lighthouse"))
            .await
            .unwrap();

        // writer + (critic + refiner) * 2
        assert_eq!(provider.call_count(), 5);
        assert_eq!(report.trace.status(LOOP_NAME), NodeStatus::Exhausted);
    }

    #[tokio::test]
    async fn test_weather_plan_uses_configured_guardrails() {
        let config = load(
            r#"
[[guardrails.tool]]
kind = "block_argument"
tool = "get_weather_stateful"
argument = "city"
value = "Tokyo"
flag = "tokyo_blocked"
"#,
        );
        let provider = ScriptedProvider::new()
            .tool_call("get_weather_stateful", serde_json::json!({"city": "Tokyo"}))
            .text("Tokyo is off limits.")
            .tool_call("get_weather_stateful", serde_json::json!({"city": "Paris"}))
            .text("No data for Paris.");
        let plan = config.weather_plan(Arc::new(provider.clone())).unwrap();
        let runner = Runner::new(
            config.runner_config(),
            plan,
            Arc::new(InMemorySessionStore::new()),
        );

        let tokyo = runner
            .run_collect("user_1", "s", Message::user("Weather in Tokyo?"))
            .await
            .unwrap();
        assert_eq!(tokyo.state.get("tokyo_blocked"), Some(&serde_json::json!(true)));
        assert!(tokyo.state.get(LAST_CITY_KEY).is_none());

        // Paris is only blocked by the default chain, which the config replaced
        let paris = runner
            .run_collect("user_1", "s", Message::user("Weather in Paris?"))
            .await
            .unwrap();
        assert!(paris.state.get(TOOL_BLOCK_FLAG).is_none());
        assert_eq!(provider.call_count(), 4);
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[runtime\napp_name = ").unwrap();

        let err = ConfigurationLoader::new(Some(temp_file.path())).unwrap_err();
        assert!(err.to_string().contains("Failed to parse TOML config"));
    }

    #[test]
    fn test_misplaced_guardrail_rejected() {
        let guardrails = GuardrailsConfig {
            model: vec![GuardrailSpec::BlockArgument {
                tool: "get_weather_stateful".to_string(),
                argument: "city".to_string(),
                value: "Paris".to_string(),
                flag: None,
                message: None,
            }],
            tool: Vec::new(),
        };
        assert!(guardrails.build().is_err());
    }

    #[test]
    fn test_file_backend_requires_path() {
        let mut config = Configuration::default();
        config.session.backend = SessionBackend::File;
        assert!(config.session_store().is_err());

        let dir = tempfile::tempdir().unwrap();
        config.session.path = Some(dir.path().to_string_lossy().to_string());
        let store = config.session_store().unwrap();
        assert_eq!(store.backend_type(), "file");
    }
}
