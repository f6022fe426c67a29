//! Model provider interface
//!
//! Prompt construction, token generation and retries against a remote
//! endpoint belong to implementations of [`ModelProvider`]; this module only
//! fixes the shape of what flows across that seam.

pub mod messages;
pub mod traits;

pub use messages::{
    GenerateConfig, Message, ModelChunk, ModelRequest, ModelResponse, Part, Role, ToolCall,
    ToolDeclaration, ToolResponse,
};
pub use traits::{ModelProvider, ModelStream, ProviderError};
