//! Runtime configuration.
//!
//! Settings come from a TOML file (every section optional) and a handful of
//! environment overrides, optionally loaded from an explicit `.env` file.
//!
//! # Example
//!
//! ```no_run
//! use ark::config::{ConfigurationLoader, EnvironmentLoader};
//!
//! let env = EnvironmentLoader::new(None);
//! let loader = ConfigurationLoader::new(env.config_path().as_deref()).unwrap();
//! let config = &loader.config;
//!
//! let runner_config = config.runner_config();
//! let (model_guardrails, tool_guardrails) = config.guardrails.build().unwrap();
//! assert_eq!(runner_config.app_name, config.runtime.app_name);
//! # let _ = (model_guardrails, tool_guardrails);
//! ```

pub mod config;
pub mod environment;

pub use self::config::{
    Configuration, ConfigurationLoader, GuardrailSpec, GuardrailsConfig, LoggingConfig,
    RuntimeConfig, ServerConfig, SessionBackend, SessionConfig, WorkflowConfig,
};
pub use self::environment::{EnvironmentLoader, CONFIG_VAR, LOG_VAR};
