// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-conversation actors and the manager that routes turns to them.
//!
//! A session goes Idle -> Resolving -> Responding and back to Idle, or parks
//! in AwaitingConfirmation until the next turn carries decisions. Each actor
//! sits behind its own mutex, so turns on one conversation never overlap
//! while distinct conversations run in parallel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use driftwood_core::{DriftwoodError, Message, ScheduledTask};
use driftwood_cron::TaskCallback;
use driftwood_storage::Database;
use driftwood_storage::queries::messages;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::orchestrator::{DoneReason, EventSink, Orchestrator, TurnEvent, TurnOutcome};
use crate::resolver::{ToolDecision, TranscriptResolver};

/// States in the session FSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No turn in flight.
    Idle,
    /// Applying decisions and cleaning the transcript.
    Resolving,
    /// Running the model loop.
    Responding,
    /// The last turn left calls waiting for a decision.
    AwaitingConfirmation,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Resolving => write!(f, "resolving"),
            SessionState::Responding => write!(f, "responding"),
            SessionState::AwaitingConfirmation => write!(f, "awaiting_confirmation"),
        }
    }
}

/// One incoming turn.
#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    /// New user text, if any.
    pub content: Option<String>,
    /// Decisions on calls left pending by an earlier turn.
    pub decisions: Vec<ToolDecision>,
}

impl TurnRequest {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            decisions: Vec::new(),
        }
    }

    pub fn decisions(decisions: Vec<ToolDecision>) -> Self {
        Self {
            content: None,
            decisions,
        }
    }

    fn user_content(&self) -> Option<&str> {
        self.content.as_deref().filter(|c| !c.trim().is_empty())
    }
}

/// Owns the state of a single conversation.
pub struct SessionActor {
    conversation_id: String,
    state: SessionState,
    resolver: Arc<TranscriptResolver>,
    orchestrator: Arc<Orchestrator>,
    db: Database,
}

impl SessionActor {
    pub fn new(
        conversation_id: String,
        resolver: Arc<TranscriptResolver>,
        orchestrator: Arc<Orchestrator>,
        db: Database,
    ) -> Self {
        Self {
            conversation_id,
            state: SessionState::Idle,
            resolver,
            orchestrator,
            db,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Resolve the transcript, store the user message, and run the loop.
    pub async fn handle_turn(
        &mut self,
        request: TurnRequest,
        sink: &EventSink,
    ) -> Result<TurnOutcome, DriftwoodError> {
        let result = self.run_turn(request, sink).await;
        self.state = match &result {
            Ok(outcome) if outcome.reason == DoneReason::AwaitingConfirmation => {
                SessionState::AwaitingConfirmation
            }
            _ => SessionState::Idle,
        };
        result
    }

    async fn run_turn(
        &mut self,
        request: TurnRequest,
        sink: &EventSink,
    ) -> Result<TurnOutcome, DriftwoodError> {
        let conversation_id = self.conversation_id.clone();
        debug!(conversation_id = %conversation_id, from = %self.state, "turn started");

        self.state = SessionState::Resolving;
        let resolution = self
            .resolver
            .resolve_conversation(&self.db, &conversation_id, &request.decisions)
            .await?;
        for inv in &resolution.resolved {
            sink.emit(TurnEvent::tool_result(inv)).await;
        }

        let mut transcript = resolution.transcript;
        if let Some(content) = request.user_content() {
            let msg = Message::user_text(content);
            messages::append_message(&self.db, &conversation_id, &msg).await?;
            transcript.push(msg);
        }

        self.state = SessionState::Responding;
        let outcome = self
            .orchestrator
            .run(&conversation_id, transcript, sink)
            .await?;
        info!(
            conversation_id = %conversation_id,
            reason = %outcome.reason,
            steps = outcome.steps,
            "turn finished"
        );
        Ok(outcome)
    }
}

/// Routes turns to per-conversation actors.
pub struct SessionManager {
    sessions: Arc<DashMap<String, Arc<Mutex<SessionActor>>>>,
    resolver: Arc<TranscriptResolver>,
    orchestrator: Arc<Orchestrator>,
    db: Database,
    stream_buffer: usize,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl SessionManager {
    pub fn new(
        resolver: Arc<TranscriptResolver>,
        orchestrator: Arc<Orchestrator>,
        db: Database,
        stream_buffer: usize,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            resolver,
            orchestrator,
            db,
            stream_buffer: stream_buffer.max(1),
            shutdown,
            tracker: TaskTracker::new(),
        }
    }

    fn actor(&self, conversation_id: &str) -> Arc<Mutex<SessionActor>> {
        self.sessions
            .entry(conversation_id.to_string())
            .or_insert_with(|| {
                debug!(conversation_id, "creating session");
                Arc::new(Mutex::new(SessionActor::new(
                    conversation_id.to_string(),
                    self.resolver.clone(),
                    self.orchestrator.clone(),
                    self.db.clone(),
                )))
            })
            .clone()
    }

    /// Start a turn and return the receiving end of its event stream.
    ///
    /// The stream always ends with a `done` event. Dropping the receiver
    /// cancels the turn.
    pub fn start_turn(
        &self,
        conversation_id: &str,
        request: TurnRequest,
    ) -> Result<mpsc::Receiver<TurnEvent>, DriftwoodError> {
        if request.user_content().is_none() && request.decisions.is_empty() {
            return Err(DriftwoodError::Validation(
                "a turn needs content or at least one decision".to_string(),
            ));
        }
        if self.tracker.is_closed() {
            return Err(DriftwoodError::Internal("agent is shutting down".to_string()));
        }

        let (tx, rx) = mpsc::channel(self.stream_buffer);
        let sink = EventSink::new(tx, self.shutdown.child_token());
        let actor = self.actor(conversation_id);
        let sessions = self.sessions.clone();
        let conversation_id = conversation_id.to_string();

        self.tracker.spawn(async move {
            let mut guard = actor.lock().await;
            let done = match guard.handle_turn(request, &sink).await {
                Ok(outcome) => TurnEvent::Done {
                    reason: outcome.reason,
                    text: outcome.text,
                },
                Err(e) => {
                    error!(conversation_id = %conversation_id, error = %e, "turn failed");
                    sink.emit(TurnEvent::Error {
                        message: e.to_string(),
                        call_id: None,
                    })
                    .await;
                    TurnEvent::Done {
                        reason: DoneReason::Failed,
                        text: String::new(),
                    }
                }
            };
            let idle = guard.state() == SessionState::Idle;
            drop(guard);
            if idle {
                evict_if_unused(&sessions, &conversation_id, &actor);
            }
            sink.emit(done).await;
        });

        Ok(rx)
    }

    /// Run a fired task as a turn with no client attached.
    pub fn run_scheduled(&self, task: ScheduledTask) -> Result<(), DriftwoodError> {
        info!(task_id = %task.id, owner = %task.owner, "running scheduled task");
        let request = TurnRequest::text(format!("Running scheduled task: {}", task.payload));
        let mut rx = self.start_turn(&task.owner, request)?;

        let task_id = task.id;
        self.tracker.spawn(async move {
            while let Some(event) = rx.recv().await {
                if let TurnEvent::Done { reason, .. } = event {
                    debug!(task_id = %task_id, reason = %reason, "scheduled turn done");
                }
            }
        });
        Ok(())
    }

    /// The stored transcript of a conversation.
    pub async fn transcript(&self, conversation_id: &str) -> Result<Vec<Message>, DriftwoodError> {
        messages::load_transcript(&self.db, conversation_id).await
    }

    /// Number of conversations with a live actor.
    ///
    /// Actors are evicted once a turn leaves them idle, so this counts
    /// conversations with a turn in flight or calls awaiting a decision.
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Stop accepting turns and wait up to `timeout` for running ones.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let running = self.tracker.len();
        if running == 0 {
            info!("no active turns to drain");
            return true;
        }

        info!(count = running, "waiting for active turns to complete");
        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => {
                info!("all turns drained");
                true
            }
            Err(_) => {
                warn!(remaining = self.tracker.len(), "drain timed out, turns interrupted");
                false
            }
        }
    }
}

/// Drop an idle actor unless another turn already holds a handle to it.
///
/// The map and `actor` account for two strong references; any more means a
/// queued turn is waiting on the lock. `remove_if` holds the shard lock, so
/// no new handle can be taken while the count is checked.
fn evict_if_unused(
    sessions: &DashMap<String, Arc<Mutex<SessionActor>>>,
    conversation_id: &str,
    actor: &Arc<Mutex<SessionActor>>,
) {
    let removed = sessions.remove_if(conversation_id, |_, current| {
        Arc::ptr_eq(current, actor) && Arc::strong_count(current) == 2
    });
    if removed.is_some() {
        debug!(conversation_id, "evicted idle session");
    }
}

/// Fired tasks become turns in the conversation that scheduled them.
#[async_trait]
impl TaskCallback for SessionManager {
    async fn execute_task(&self, task: ScheduledTask) -> Result<(), DriftwoodError> {
        self.run_scheduled(task)
    }
}
