//! Per-run execution context

use super::events::Event;
use super::workflow::{NodeStatus, PlanTrace};
use crate::provider::Message;
use crate::session::{Session, SessionError, SessionKey, SessionStore, StateMap};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Errors that end a run early
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The consumer went away or the run was cancelled
    #[error("Run cancelled")]
    Cancelled,
}

/// Hooks notified as a run progresses
pub trait RunObserver: Send + Sync {
    fn on_run_start(&self, _key: &SessionKey, _invocation_id: &str) {}

    fn on_event(&self, _key: &SessionKey, _event: &Event) {}

    fn on_run_end(&self, _key: &SessionKey, _invocation_id: &str, _status: &NodeStatus) {}
}

/// Destination of emitted events
#[derive(Debug)]
pub enum EventSink {
    /// Bounded channel towards a streaming consumer
    Channel(mpsc::Sender<Event>),
    /// In-memory buffer for non-streaming callers
    Collect(Vec<Event>),
}

/// State owned by a single run
///
/// The state map is exclusively owned by the run; persisted session state is
/// only touched through [`SessionStore::append_event`].
pub struct RunContext {
    invocation_id: String,
    session: SessionKey,
    user_message: Message,
    /// Working copy of the session state; every stage reads and writes here
    pub state: StateMap,
    history: Vec<Message>,
    escalated: bool,
    recover_scopes: usize,
    sink: EventSink,
    store: Arc<dyn SessionStore>,
    cancel: CancellationToken,
    trace: PlanTrace,
    observer: Option<Arc<dyn RunObserver>>,
}

impl RunContext {
    pub fn new(
        invocation_id: impl Into<String>,
        session: Session,
        user_message: Message,
        sink: EventSink,
        store: Arc<dyn SessionStore>,
        cancel: CancellationToken,
    ) -> Self {
        let history = session.events.iter().filter_map(Event::to_message).collect();
        Self {
            invocation_id: invocation_id.into(),
            session: session.key,
            user_message,
            state: session.state,
            history,
            escalated: false,
            recover_scopes: 0,
            sink,
            store,
            cancel,
            trace: PlanTrace::new(),
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Option<Arc<dyn RunObserver>>) -> Self {
        self.observer = observer;
        self
    }

    pub fn invocation_id(&self) -> &str {
        &self.invocation_id
    }

    pub fn session_key(&self) -> &SessionKey {
        &self.session
    }

    /// The client input that started this run
    pub fn user_message(&self) -> &Message {
        &self.user_message
    }

    /// Conversation so far: prior turns of the session plus this run
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Escalation flag of the innermost running loop iteration
    pub fn escalated(&self) -> bool {
        self.escalated
    }

    pub fn set_escalated(&mut self, escalated: bool) {
        self.escalated = escalated;
    }

    /// Whether a failure here is absorbed by a continue-on-failure ancestor
    pub fn recovers_failures(&self) -> bool {
        self.recover_scopes > 0
    }

    pub(crate) fn enter_recover_scope(&mut self) {
        self.recover_scopes += 1;
    }

    pub(crate) fn exit_recover_scope(&mut self) {
        self.recover_scopes = self.recover_scopes.saturating_sub(1);
    }

    pub fn trace(&self) -> &PlanTrace {
        &self.trace
    }

    pub(crate) fn trace_mut(&mut self) -> &mut PlanTrace {
        &mut self.trace
    }

    /// Merge writes into the run state
    pub fn apply_delta(&mut self, delta: &StateMap) {
        for (key, value) in delta {
            self.state.insert(key.clone(), value.clone());
        }
    }

    /// Emit an event: persist it (unless partial), then hand it to the sink.
    ///
    /// Suspends until the consumer has room, and fails with
    /// [`RunError::Cancelled`] once the consumer is gone.
    pub async fn emit(&mut self, event: Event) -> Result<(), RunError> {
        if self.cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }
        if !event.partial {
            self.store.append_event(&self.session, &event).await?;
            if let Some(message) = event.to_message() {
                self.history.push(message);
            }
        }
        self.deliver(event).await
    }

    /// Hand an event to the sink without persisting it
    pub(crate) async fn deliver(&mut self, event: Event) -> Result<(), RunError> {
        if let Some(observer) = &self.observer {
            observer.on_event(&self.session, &event);
        }
        match &mut self.sink {
            EventSink::Channel(tx) => {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Err(RunError::Cancelled),
                    sent = tx.send(event) => sent.map_err(|_| RunError::Cancelled),
                }
            }
            EventSink::Collect(events) => {
                events.push(event);
                Ok(())
            }
        }
    }

    pub(crate) fn observer(&self) -> Option<&Arc<dyn RunObserver>> {
        self.observer.as_ref()
    }

    /// Collected events (empty for channel sinks), final state and trace
    pub fn into_parts(self) -> (Vec<Event>, StateMap, PlanTrace) {
        let events = match self.sink {
            EventSink::Collect(events) => events,
            EventSink::Channel(_) => Vec::new(),
        };
        (events, self.state, self.trace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::InMemorySessionStore;

    async fn context(sink: EventSink) -> (RunContext, Arc<InMemorySessionStore>) {
        let store = Arc::new(InMemorySessionStore::new());
        let key = SessionKey::new("app", "user_1", "session_001");
        let session = store.get_or_create(&key).await.unwrap();
        let ctx = RunContext::new(
            "inv-1",
            session,
            Message::user("Hi!"),
            sink,
            store.clone(),
            CancellationToken::new(),
        );
        (ctx, store)
    }

    #[tokio::test]
    async fn test_emit_persists_final_events_only() {
        let (mut ctx, store) = context(EventSink::Collect(Vec::new())).await;
        ctx.emit(Event::text("inv-1", "agent", "Hel", true)).await.unwrap();
        ctx.emit(Event::text("inv-1", "agent", "Hello", false)).await.unwrap();

        let session = store.get(ctx.session_key()).await.unwrap().unwrap();
        assert_eq!(session.events.len(), 1);
        assert_eq!(ctx.history().len(), 1);

        let (events, _, _) = ctx.into_parts();
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn test_emit_fails_after_consumer_dropped() {
        let (tx, rx) = mpsc::channel(1);
        let (mut ctx, _) = context(EventSink::Channel(tx)).await;
        drop(rx);
        let result = ctx.emit(Event::text("inv-1", "agent", "Hello", true)).await;
        assert!(matches!(result, Err(RunError::Cancelled)));
    }

    #[tokio::test]
    async fn test_emit_stops_when_cancelled() {
        let (tx, _rx) = mpsc::channel(1);
        let (mut ctx, _) = context(EventSink::Channel(tx)).await;
        ctx.cancel_token().cancel();
        let result = ctx.emit(Event::text("inv-1", "agent", "Hello", true)).await;
        assert!(matches!(result, Err(RunError::Cancelled)));
    }

    #[test]
    fn test_recover_scopes_nest() {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let (mut ctx, _) = runtime.block_on(context(EventSink::Collect(Vec::new())));
        assert!(!ctx.recovers_failures());
        ctx.enter_recover_scope();
        ctx.enter_recover_scope();
        ctx.exit_recover_scope();
        assert!(ctx.recovers_failures());
        ctx.exit_recover_scope();
        assert!(!ctx.recovers_failures());
    }
}
