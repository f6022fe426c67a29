//! Model provider abstraction.
//!
//! The runtime never talks to an inference endpoint directly. A provider
//! turns a [`ModelRequest`] into a stream of [`ModelChunk`]s: text fragments
//! marked partial, an optional final aggregated text, and tool call requests.
//! Failures travel inside the stream as [`ProviderError`] values.

use super::messages::{GenerateConfig, ModelChunk, ModelRequest};
use futures_util::Stream;
use std::pin::Pin;
use thiserror::Error;

/// Errors surfaced by a model provider
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Model call timed out: {0}")]
    Timeout(String),

    #[error("Model request failed: {0}")]
    Request(String),

    #[error("Malformed model output: {0}")]
    MalformedOutput(String),
}

/// Type alias for a streamed model response
pub type ModelStream = Pin<Box<dyn Stream<Item = Result<ModelChunk, ProviderError>> + Send>>;

/// Core trait that all model providers must implement
#[async_trait::async_trait]
pub trait ModelProvider: Send + Sync {
    /// Start one model turn
    ///
    /// # Arguments
    /// * `request` - Instruction, visible conversation and tool declarations
    /// * `config` - Generation configuration
    ///
    /// # Returns
    /// Stream of text fragments and tool call requests
    async fn invoke(
        &self,
        request: ModelRequest,
        config: &GenerateConfig,
    ) -> Result<ModelStream, ProviderError>;

    /// Provider name for logging
    fn provider_name(&self) -> &str;

    /// Model identifier (e.g., "gemini-2.0-flash")
    fn model_name(&self) -> String;
}
