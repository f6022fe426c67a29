//! Runner - drives one client turn from input to terminal event

use super::context::{EventSink, RunContext, RunError, RunObserver};
use super::events::{Event, USER_AUTHOR};
use super::executor::{ExecutorConfig, StageExecutor};
use super::orchestrator::Orchestrator;
use super::plan::PlanNode;
use super::workflow::{NodeStatus, PlanTrace};
use crate::bridge::{self, ClientRequest, FrameStream, ProtocolError};
use crate::provider::Message;
use crate::session::{SessionKey, SessionStore, StateMap};
use futures_util::{FutureExt, Stream};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info};

/// Runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Application name; first component of every session key
    pub app_name: String,
    /// Capacity of the channel between a run and its consumer
    pub event_buffer: usize,
    pub executor: ExecutorConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            app_name: "ark".to_string(),
            event_buffer: 1,
            executor: ExecutorConfig::default(),
        }
    }
}

/// Outcome of a run executed with [`Runner::run_collect`]
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Terminal status of the root plan node
    pub status: NodeStatus,
    /// Every event emitted, partial fragments included
    pub events: Vec<Event>,
    /// Run state after the last stage
    pub state: StateMap,
    pub trace: PlanTrace,
}

impl RunReport {
    /// Text of the last final event, usually the user-facing answer
    pub fn final_text(&self) -> Option<&str> {
        self.events
            .iter()
            .rev()
            .filter(|e| e.author != USER_AUTHOR)
            .find(|e| e.is_final())
            .and_then(Event::text_content)
    }
}

/// Live event stream of a spawned run.
///
/// Dropping the stream cancels the run at its next suspension point.
pub struct EventStream {
    inner: ReceiverStream<Event>,
    _guard: DropGuard,
}

impl Stream for EventStream {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Executes a plan for client turns against a session store
pub struct Runner {
    config: RunnerConfig,
    root: PlanNode,
    store: Arc<dyn SessionStore>,
    orchestrator: Orchestrator,
    observer: Option<Arc<dyn RunObserver>>,
}

impl Runner {
    pub fn new(config: RunnerConfig, root: PlanNode, store: Arc<dyn SessionStore>) -> Self {
        let orchestrator = Orchestrator::new(StageExecutor::new(config.executor.clone()));
        Self {
            config,
            root,
            store,
            orchestrator,
            observer: None,
        }
    }

    /// Attach an observer, e.g. a transcript logger
    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn app_name(&self) -> &str {
        &self.config.app_name
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn session_key(&self, user_id: &str, session_id: &str) -> SessionKey {
        SessionKey::new(self.config.app_name.clone(), user_id, session_id)
    }

    /// Start a run in the background and stream its events
    pub fn run(self: &Arc<Self>, user_id: &str, session_id: &str, message: Message) -> EventStream {
        let (tx, rx) = mpsc::channel(self.config.event_buffer.max(1));
        let cancel = CancellationToken::new();
        let key = self.session_key(user_id, session_id);
        let runner = Arc::clone(self);
        let token = cancel.clone();

        tokio::spawn(async move {
            let invocation_id = new_invocation_id();
            let sink = EventSink::Channel(tx.clone());
            let mut ctx = match runner.start(&key, &invocation_id, message, sink, token).await {
                Ok(ctx) => ctx,
                Err(e) => {
                    error!(session = %key, error = %e, "Failed to resolve session");
                    let event = Event::error(&invocation_id, runner.app_name(), e.to_string());
                    let _ = tx.send(event).await;
                    return;
                }
            };
            drop(tx);

            let outcome = AssertUnwindSafe(runner.drive(&mut ctx)).catch_unwind().await;
            match outcome {
                Ok(Ok(status)) => debug!(session = %key, status = %status, "Run finished"),
                Ok(Err(RunError::Cancelled)) => debug!(session = %key, "Run cancelled by consumer"),
                Ok(Err(RunError::Session(e))) => {
                    error!(session = %key, error = %e, "Session storage failed mid-run");
                    let event = Event::error(&invocation_id, runner.app_name(), e.to_string());
                    let _ = ctx.deliver(event).await;
                }
                Err(payload) => {
                    let reason = panic_message(payload.as_ref());
                    error!(session = %key, error = %reason, "Run aborted by a panic");
                    let event = Event::error(
                        &invocation_id,
                        runner.app_name(),
                        format!("Run aborted: {}", reason),
                    );
                    let _ = ctx.deliver(event).await;
                }
            }
        });

        EventStream {
            inner: ReceiverStream::new(rx),
            _guard: cancel.drop_guard(),
        }
    }

    /// Validate a client request and stream the bridged frames.
    ///
    /// Protocol errors are returned before any run starts.
    pub fn send(
        self: &Arc<Self>,
        user_id: &str,
        session_id: &str,
        request: ClientRequest,
    ) -> Result<FrameStream, ProtocolError> {
        let message = request.into_message()?;
        Ok(bridge::frames(self.run(user_id, session_id, message)))
    }

    /// Execute a run inline and collect everything it produced
    pub async fn run_collect(
        &self,
        user_id: &str,
        session_id: &str,
        message: Message,
    ) -> Result<RunReport, RunError> {
        let key = self.session_key(user_id, session_id);
        let invocation_id = new_invocation_id();
        let sink = EventSink::Collect(Vec::new());
        let mut ctx = self
            .start(&key, &invocation_id, message, sink, CancellationToken::new())
            .await?;

        let status = self.drive(&mut ctx).await?;
        let (events, state, trace) = ctx.into_parts();
        Ok(RunReport {
            status,
            events,
            state,
            trace,
        })
    }

    async fn start(
        &self,
        key: &SessionKey,
        invocation_id: &str,
        message: Message,
        sink: EventSink,
        cancel: CancellationToken,
    ) -> Result<RunContext, RunError> {
        let session = self.store.get_or_create(key).await?;
        Ok(RunContext::new(
            invocation_id,
            session,
            message,
            sink,
            Arc::clone(&self.store),
            cancel,
        )
        .with_observer(self.observer.clone()))
    }

    async fn drive(&self, ctx: &mut RunContext) -> Result<NodeStatus, RunError> {
        let key = ctx.session_key().clone();
        let invocation_id = ctx.invocation_id().to_string();
        info!(session = %key, invocation_id = %invocation_id, "Run started");
        if let Some(observer) = ctx.observer() {
            observer.on_run_start(&key, &invocation_id);
        }

        let input = ctx.user_message().text();
        ctx.emit(Event::text(&invocation_id, USER_AUTHOR, input, false))
            .await?;

        let status = self.orchestrator.execute(&self.root, ctx).await?;

        info!(session = %key, status = %status, "Run completed");
        if let Some(observer) = ctx.observer() {
            observer.on_run_end(&key, &invocation_id, &status);
        }
        Ok(status)
    }
}

fn new_invocation_id() -> String {
    format!("e-{}", uuid::Uuid::new_v4())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
