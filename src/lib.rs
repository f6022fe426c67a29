//! Agent Runtime Kit (ARK) - execution runtime for multi-stage LLM agents
//!
//! ARK runs a client turn through a plan of model and tool stages and streams
//! the result back:
//!
//! - **`session`** - Session store contract with memory and file backends
//! - **`guardrail`** - Before-model / before-tool interception chains
//! - **`provider`** - Model provider interface
//! - **`tools`** - Tool interface, registry and the `exit_loop` tool
//! - **`orchestration`** - Stage executor, plan orchestrator and [`Runner`](orchestration::Runner)
//! - **`bridge`** - Event to client frame conversion
//! - **`agents`** - Ready-made weather and document refinement plans
//!
//! Optional modules:
//!
//! - **`config`** - TOML configuration and `.env` loading
//! - **`observability`** - `tracing` setup and markdown run transcripts
//! - **`server`** - HTTP endpoint streaming frames as server-sent events
//!
//! # Features
//!
//! ```toml
//! [dependencies]
//! ark = { version = "0.1", features = ["config", "observability"] }
//! # Or enable everything:
//! ark = { version = "0.1", features = ["all"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use ark::prelude::*;
//! use std::sync::Arc;
//!
//! async fn example(model: Arc<dyn ModelProvider>) {
//!     let root = PlanNode::leaf(ark::agents::weather_coordinator(model));
//!     let store = Arc::new(InMemorySessionStore::new());
//!     let runner = Arc::new(Runner::new(RunnerConfig::default(), root, store));
//!
//!     let frames = runner.send("user_1", "session_1", ClientRequest::text("Hi!")).unwrap();
//!     // forward `frames` to the client
//! }
//! ```

pub mod agents;
pub mod bridge;
pub mod guardrail;
pub mod orchestration;
pub mod provider;
pub mod session;
pub mod tools;

/// Configuration management (enabled with the `config` feature)
#[cfg(feature = "config")]
pub mod config;

/// Observability utilities (enabled with the `observability` feature)
#[cfg(feature = "observability")]
pub mod observability;

/// HTTP surface (enabled with the `server` feature)
#[cfg(feature = "server")]
pub mod server;

/// Test utilities (enabled with the `test-utils` feature)
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::bridge::{ClientRequest, Frame, FrameStream, ProtocolError};
    pub use crate::guardrail::{
        Decision, GuardrailChain, ModelGuardrail, ModelGuardrails, ToolGuardrail, ToolGuardrails,
    };
    pub use crate::orchestration::{
        Event, EventKind, FailurePolicy, ModelStage, NodeStatus, PlanNode, RunObserver, RunReport,
        Runner, RunnerConfig, Stage, ToolStage,
    };
    pub use crate::provider::{Message, ModelProvider, ModelRequest, ProviderError};
    pub use crate::session::{InMemorySessionStore, SessionKey, SessionStore, StateMap};
    pub use crate::tools::{Tool, ToolContext, ToolError, ToolResult};

    #[cfg(feature = "config")]
    pub use crate::config::{Configuration, ConfigurationLoader, EnvironmentLoader};

    #[cfg(feature = "observability")]
    pub use crate::observability::Logger;
}
