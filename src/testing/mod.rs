//! Test utilities and mock implementations
//!
//! Provides a scripted model provider, counting tools and a failing session
//! store for driving whole runs without a real model or storage engine.

pub mod mocks;

pub use mocks::{CountingTool, ScriptedProvider, ScriptedTurn, UnavailableSessionStore};
