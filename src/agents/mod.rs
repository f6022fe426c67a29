//! Ready-made plans
//!
//! - [`weather_coordinator`]: weather answers with stateful tools, a Paris
//!   tool guardrail and delegation to greeting/farewell specialists
//! - [`document_refinement_pipeline`]: initial draft, then critique and
//!   refinement until the critic is satisfied or five rounds have run
//!
//! All builders take the model provider to run every stage on. The
//! `_with_guardrails` variants and `config::Configuration` replace
//! the default guardrail chains.

pub mod greeting;
pub mod refinement;
pub mod weather;

pub use greeting::{
    farewell_stage, greeting_guardrails, greeting_stage, greeting_stage_with_guardrails,
    say_goodbye_tool, say_hello_tool,
};
pub use refinement::{
    document_refinement_pipeline, document_refinement_pipeline_with, COMPLETION_PHRASE,
};
pub use weather::{
    current_time_in, time_tool, weather_coordinator, weather_coordinator_with_guardrails,
    weather_guardrails, weather_tool,
};
