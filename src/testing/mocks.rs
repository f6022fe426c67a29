//! Mock implementations of the runtime's external seams

use crate::orchestration::Event;
use crate::provider::{
    GenerateConfig, ModelChunk, ModelProvider, ModelRequest, ModelStream, ProviderError, ToolCall,
};
use crate::session::{Session, SessionError, SessionKey, SessionResult, SessionStore, StateMap};
use crate::tools::{Tool, ToolContext, ToolError, ToolResult};
use async_trait::async_trait;
use futures_util::stream;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One scripted model turn
#[derive(Debug, Clone)]
pub enum ScriptedTurn {
    /// Stream these chunks, in order
    Chunks(Vec<Result<ModelChunk, ProviderError>>),
    /// Fail the invocation itself
    Fail(ProviderError),
    /// Return a stream that never yields
    Hang,
}

/// Model provider replaying scripted turns and recording every request
#[derive(Clone)]
pub struct ScriptedProvider {
    pub turns: Arc<Mutex<VecDeque<ScriptedTurn>>>,
    pub fallback: Arc<Mutex<Option<ScriptedTurn>>>,
    pub requests: Arc<Mutex<Vec<ModelRequest>>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            turns: Arc::new(Mutex::new(VecDeque::new())),
            fallback: Arc::new(Mutex::new(None)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue an arbitrary turn
    pub fn turn(self, turn: ScriptedTurn) -> Self {
        self.turns.lock().unwrap().push_back(turn);
        self
    }

    /// Queue a turn streaming the given fragments
    pub fn streamed(self, fragments: &[&str]) -> Self {
        let chunks = fragments
            .iter()
            .map(|f| Ok(ModelChunk::partial(*f)))
            .collect();
        self.turn(ScriptedTurn::Chunks(chunks))
    }

    /// Queue a turn answering with a single final text
    pub fn text(self, text: &str) -> Self {
        self.turn(ScriptedTurn::Chunks(vec![Ok(ModelChunk::complete(text))]))
    }

    /// Queue a turn requesting one tool call
    pub fn tool_call(self, name: &str, args: Value) -> Self {
        self.turn(ScriptedTurn::Chunks(vec![Ok(ModelChunk::ToolCall(
            ToolCall::new(name, args),
        ))]))
    }

    pub fn fail(self, error: ProviderError) -> Self {
        self.turn(ScriptedTurn::Fail(error))
    }

    pub fn hang(self) -> Self {
        self.turn(ScriptedTurn::Hang)
    }

    /// Turn replayed once the script is exhausted
    pub fn with_fallback(self, turn: ScriptedTurn) -> Self {
        *self.fallback.lock().unwrap() = Some(turn);
        self
    }

    pub fn with_fallback_text(self, text: &str) -> Self {
        self.with_fallback(ScriptedTurn::Chunks(vec![Ok(ModelChunk::complete(text))]))
    }

    pub fn with_fallback_tool_call(self, name: &str, args: Value) -> Self {
        self.with_fallback(ScriptedTurn::Chunks(vec![Ok(ModelChunk::ToolCall(
            ToolCall::new(name, args),
        ))]))
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn next_turn(&self) -> Option<ScriptedTurn> {
        let scripted = self.turns.lock().unwrap().pop_front();
        scripted.or_else(|| self.fallback.lock().unwrap().clone())
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn invoke(
        &self,
        request: ModelRequest,
        _config: &GenerateConfig,
    ) -> Result<ModelStream, ProviderError> {
        self.requests.lock().unwrap().push(request);
        match self.next_turn() {
            Some(ScriptedTurn::Chunks(chunks)) => Ok(Box::pin(stream::iter(chunks))),
            Some(ScriptedTurn::Fail(error)) => Err(error),
            Some(ScriptedTurn::Hang) => {
                Ok(Box::pin(stream::pending::<Result<ModelChunk, ProviderError>>()))
            }
            None => Err(ProviderError::Request("script exhausted".to_string())),
        }
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> String {
        "scripted-model".to_string()
    }
}

/// Tool returning a fixed result and counting its calls
#[derive(Clone)]
pub struct CountingTool {
    name: String,
    result: Result<Value, String>,
    calls: Arc<AtomicUsize>,
    pub last_args: Arc<Mutex<Option<Value>>>,
}

impl CountingTool {
    pub fn new(name: &str, payload: Value) -> Self {
        Self {
            name: name.to_string(),
            result: Ok(payload),
            calls: Arc::new(AtomicUsize::new(0)),
            last_args: Arc::new(Mutex::new(None)),
        }
    }

    /// Tool whose every call fails
    pub fn failing(name: &str, message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            ..Self::new(name, Value::Null)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for CountingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Test tool"
    }

    async fn call(&self, args: Value, _ctx: &mut ToolContext<'_>) -> Result<ToolResult, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_args.lock().unwrap() = Some(args);
        match &self.result {
            Ok(payload) => Ok(ToolResult::success(payload.clone())),
            Err(message) => Err(ToolError::ExecutionFailed(message.clone())),
        }
    }
}

/// Session store whose backend is always unreachable
#[derive(Debug, Clone, Default)]
pub struct UnavailableSessionStore;

impl UnavailableSessionStore {
    fn error() -> SessionError {
        SessionError::unavailable("connection refused")
    }
}

#[async_trait]
impl SessionStore for UnavailableSessionStore {
    fn backend_type(&self) -> &'static str {
        "unavailable"
    }

    async fn get(&self, _key: &SessionKey) -> SessionResult<Option<Session>> {
        Err(Self::error())
    }

    async fn create(&self, _key: &SessionKey, _initial_state: StateMap) -> SessionResult<Session> {
        Err(Self::error())
    }

    async fn append_event(&self, _key: &SessionKey, _event: &Event) -> SessionResult<()> {
        Err(Self::error())
    }

    async fn update_state(&self, _key: &SessionKey, _delta: StateMap) -> SessionResult<Session> {
        Err(Self::error())
    }

    async fn list_sessions(&self, _app_name: &str, _user_id: &str) -> SessionResult<Vec<SessionKey>> {
        Err(Self::error())
    }
}
