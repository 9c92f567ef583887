// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-turn loop between the model and the tools.
//!
//! Each model step streams text deltas to the client and collects complete
//! tool calls. Every step is stored as its own assistant message. Auto tools
//! run in spawned tasks and their results feed the next step; confirmation
//! tools are recorded as pending and end the turn once the step is handled.

use std::sync::Arc;

use driftwood_core::types::{ProviderStreamChunk, StreamEventType, ToolUseData};
use driftwood_core::{
    ContentPart, DriftwoodError, Message, ProviderAdapter, Role, ToolInvocation, ToolStatus,
};
use driftwood_storage::Database;
use driftwood_storage::queries::messages;
use driftwood_tools::{ToolClass, ToolContext, ToolRegistry};
use futures::StreamExt;
use serde::Serialize;
use strum::Display;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::{self, RequestSettings};

/// Orchestrator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum LoopState {
    AwaitingModel,
    ModelProducedText,
    ModelRequestedTool,
    AwaitingConfirmation,
    ExecutingTool,
    Done,
}

/// Why a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DoneReason {
    /// The model answered without calling tools.
    Completed,
    /// At least one call waits for a human decision.
    AwaitingConfirmation,
    StepBudgetExhausted,
    Cancelled,
    Failed,
}

/// Streamed to the client during a turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    TextDelta {
        text: String,
    },
    ToolCall {
        call_id: String,
        tool_name: String,
        input: serde_json::Value,
    },
    ToolResult {
        call_id: String,
        tool_name: String,
        output: String,
        is_error: bool,
    },
    ConfirmationRequired {
        call_id: String,
        tool_name: String,
        input: serde_json::Value,
    },
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
    },
    Done {
        reason: DoneReason,
        text: String,
    },
}

impl TurnEvent {
    /// The `type` tag, used as the SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            TurnEvent::TextDelta { .. } => "text_delta",
            TurnEvent::ToolCall { .. } => "tool_call",
            TurnEvent::ToolResult { .. } => "tool_result",
            TurnEvent::ConfirmationRequired { .. } => "confirmation_required",
            TurnEvent::Error { .. } => "error",
            TurnEvent::Done { .. } => "done",
        }
    }

    pub fn tool_result(inv: &ToolInvocation) -> Self {
        TurnEvent::ToolResult {
            call_id: inv.call_id.clone(),
            tool_name: inv.tool_name.clone(),
            output: inv.output.clone().unwrap_or_default(),
            is_error: inv.status == ToolStatus::Errored,
        }
    }
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub state: LoopState,
    pub reason: DoneReason,
    /// Last text the model produced during the turn.
    pub text: String,
    /// Model round-trips used.
    pub steps: u32,
}

/// Sends events and turns a dropped receiver into cancellation.
pub struct EventSink {
    tx: mpsc::Sender<TurnEvent>,
    cancel: CancellationToken,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<TurnEvent>, cancel: CancellationToken) -> Self {
        Self { tx, cancel }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn emit(&self, event: TurnEvent) {
        if self.tx.send(event).await.is_err() && !self.cancel.is_cancelled() {
            debug!("event receiver dropped, cancelling turn");
            self.cancel.cancel();
        }
    }
}

/// Settings of the loop itself.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub request: RequestSettings,
    /// Model round-trips allowed per turn.
    pub max_steps: u32,
}

pub struct Orchestrator {
    provider: Arc<dyn ProviderAdapter>,
    registry: Arc<ToolRegistry>,
    db: Database,
    settings: OrchestratorSettings,
}

/// What one model step produced.
struct StepOutput {
    text: String,
    calls: Vec<ToolUseData>,
    cancelled: bool,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn ProviderAdapter>,
        registry: Arc<ToolRegistry>,
        db: Database,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            provider,
            registry,
            db,
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Run the loop over an already resolved transcript.
    ///
    /// The final `done` event is left to the caller.
    pub async fn run(
        &self,
        conversation_id: &str,
        mut transcript: Vec<Message>,
        sink: &EventSink,
    ) -> Result<TurnOutcome, DriftwoodError> {
        let ctx = ToolContext::new(conversation_id);
        let mut last_text = String::new();
        let mut steps = 0;
        let mut state = LoopState::AwaitingModel;

        loop {
            if sink.is_cancelled() {
                return Ok(outcome(LoopState::Done, DoneReason::Cancelled, last_text, steps));
            }
            if steps >= self.settings.max_steps {
                info!(conversation_id, steps, "step budget exhausted");
                return Ok(outcome(
                    LoopState::Done,
                    DoneReason::StepBudgetExhausted,
                    last_text,
                    steps,
                ));
            }
            steps += 1;
            debug!(conversation_id, step = steps, state = %state, "requesting model step");
            state = LoopState::AwaitingModel;

            let request = context::build_request(
                &self.settings.request,
                &transcript,
                self.registry.tool_definitions(),
            );
            let step = self.stream_step(conversation_id, request, sink, &mut state).await?;
            if !step.text.is_empty() {
                last_text = step.text.clone();
            }

            if step.cancelled {
                if !step.text.is_empty() {
                    let msg = Message::new(Role::Assistant, vec![ContentPart::text(&step.text)]);
                    messages::append_message(&self.db, conversation_id, &msg).await?;
                }
                info!(conversation_id, step = steps, "turn cancelled during generation");
                return Ok(outcome(LoopState::Done, DoneReason::Cancelled, last_text, steps));
            }

            if step.calls.is_empty() {
                if !step.text.is_empty() {
                    let msg = Message::new(Role::Assistant, vec![ContentPart::text(&step.text)]);
                    messages::append_message(&self.db, conversation_id, &msg).await?;
                    transcript.push(msg);
                }
                return Ok(outcome(LoopState::Done, DoneReason::Completed, last_text, steps));
            }

            state = LoopState::ModelRequestedTool;
            debug!(conversation_id, state = %state, calls = step.calls.len(), "model requested tools");
            let mut msg = self.record_calls(step, sink).await;
            messages::append_message(&self.db, conversation_id, &msg).await?;

            let mut awaiting = false;
            for inv in msg.tool_invocations() {
                if inv.status == ToolStatus::PendingConfirmation {
                    awaiting = true;
                    sink.emit(TurnEvent::ConfirmationRequired {
                        call_id: inv.call_id.clone(),
                        tool_name: inv.tool_name.clone(),
                        input: inv.input.clone(),
                    })
                    .await;
                }
            }

            state = LoopState::ExecutingTool;
            self.execute_auto(&ctx, &mut msg, sink).await?;
            transcript.push(msg);

            if awaiting {
                info!(conversation_id, step = steps, "turn paused for confirmation");
                return Ok(outcome(
                    LoopState::AwaitingConfirmation,
                    DoneReason::AwaitingConfirmation,
                    last_text,
                    steps,
                ));
            }
        }
    }

    async fn stream_step(
        &self,
        conversation_id: &str,
        request: driftwood_core::types::ProviderRequest,
        sink: &EventSink,
        state: &mut LoopState,
    ) -> Result<StepOutput, DriftwoodError> {
        let cancel = sink.cancel_token().clone();
        let mut step = StepOutput {
            text: String::new(),
            calls: Vec::new(),
            cancelled: false,
        };

        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                step.cancelled = true;
                return Ok(step);
            }
            stream = self.provider.stream(request) => stream?,
        };

        loop {
            let chunk: Option<Result<ProviderStreamChunk, DriftwoodError>> = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    step.cancelled = true;
                    break;
                }
                chunk = stream.next() => chunk,
            };

            let chunk = match chunk {
                None => break,
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => return self.fail_step(conversation_id, step, e).await,
            };

            match chunk.event_type {
                StreamEventType::ContentBlockDelta => {
                    if let Some(text) = chunk.text {
                        *state = LoopState::ModelProducedText;
                        step.text.push_str(&text);
                        sink.emit(TurnEvent::TextDelta { text }).await;
                    }
                }
                StreamEventType::ContentBlockStop => {
                    if let Some(call) = chunk.tool_use {
                        step.calls.push(call);
                    }
                }
                StreamEventType::MessageStop => break,
                StreamEventType::Error => {
                    let e = DriftwoodError::Provider {
                        message: chunk.error.unwrap_or_else(|| "stream error".to_string()),
                        source: None,
                    };
                    return self.fail_step(conversation_id, step, e).await;
                }
                StreamEventType::MessageStart | StreamEventType::MessageDelta => {
                    if let Some(usage) = chunk.usage {
                        debug!(
                            conversation_id,
                            input_tokens = usage.input_tokens,
                            output_tokens = usage.output_tokens,
                            "usage reported"
                        );
                    }
                }
            }
        }

        Ok(step)
    }

    /// Keep whatever text arrived before a provider failure, then fail the turn.
    async fn fail_step(
        &self,
        conversation_id: &str,
        step: StepOutput,
        error: DriftwoodError,
    ) -> Result<StepOutput, DriftwoodError> {
        warn!(conversation_id, error = %error, "model stream failed");
        if !step.text.is_empty() {
            let msg = Message::new(Role::Assistant, vec![ContentPart::text(step.text)]);
            messages::append_message(&self.db, conversation_id, &msg).await?;
        }
        Err(error)
    }

    /// Classify every call of a step and build its assistant message.
    async fn record_calls(&self, step: StepOutput, sink: &EventSink) -> Message {
        let mut parts = Vec::with_capacity(step.calls.len() + 1);
        if !step.text.is_empty() {
            parts.push(ContentPart::text(step.text));
        }

        for call in step.calls {
            sink.emit(TurnEvent::ToolCall {
                call_id: call.id.clone(),
                tool_name: call.name.clone(),
                input: call.input.clone(),
            })
            .await;

            let mut inv = ToolInvocation {
                tool_name: call.name,
                input: call.input,
                call_id: call.id,
                status: ToolStatus::AutoExecuting,
                output: None,
            };

            let class = self.registry.classify(&inv.tool_name);
            let rejection = match class {
                ToolClass::Unknown => Some(format!("unknown tool `{}`", inv.tool_name)),
                _ => self
                    .registry
                    .validate(&inv.tool_name, inv.input.clone())
                    .err()
                    .map(|e| e.to_string()),
            };

            if let Some(message) = rejection {
                warn!(call_id = %inv.call_id, tool = %inv.tool_name, error = %message, "tool call rejected");
                inv.finish(format!("Error: {message}"), true);
                sink.emit(TurnEvent::Error {
                    message,
                    call_id: Some(inv.call_id.clone()),
                })
                .await;
            } else if class == ToolClass::ConfirmationRequired {
                inv.status = ToolStatus::PendingConfirmation;
            }

            parts.push(ContentPart::ToolInvocation(inv));
        }

        Message::new(Role::Assistant, parts)
    }

    /// Run the auto-executing calls of `msg` one at a time, persisting each result.
    async fn execute_auto(
        &self,
        ctx: &ToolContext,
        msg: &mut Message,
        sink: &EventSink,
    ) -> Result<(), DriftwoodError> {
        for idx in 0..msg.parts.len() {
            let Some(inv) = msg.parts[idx].as_tool_invocation() else {
                continue;
            };
            if inv.status != ToolStatus::AutoExecuting {
                continue;
            }
            // Undispatched calls stay auto-executing and are cleaned up next turn.
            if sink.is_cancelled() {
                break;
            }

            let registry = self.registry.clone();
            let task_ctx = ctx.clone();
            let name = inv.tool_name.clone();
            let input = inv.input.clone();
            let handle =
                tokio::spawn(async move { registry.invoke(&task_ctx, &name, input).await });

            // Dispatched work always finishes, even when the turn is cancelled.
            let result = match handle.await {
                Ok(result) => result,
                Err(join) => Err(DriftwoodError::Internal(format!("tool task failed: {join}"))),
            };

            let Some(inv) = msg.parts[idx].as_tool_invocation_mut() else {
                continue;
            };
            match result {
                Ok(output) => inv.finish(output.content, output.is_error),
                Err(e) => {
                    warn!(call_id = %inv.call_id, tool = %inv.tool_name, error = %e, "tool failed");
                    inv.finish(format!("Error: {e}"), true);
                }
            }
            let event = TurnEvent::tool_result(inv);
            debug!(call_id = %inv.call_id, tool = %inv.tool_name, status = %inv.status, "tool finished");

            messages::update_message_parts(&self.db, msg).await?;
            if !sink.is_cancelled() {
                sink.emit(event).await;
            }
        }
        Ok(())
    }
}

fn outcome(state: LoopState, reason: DoneReason, text: String, steps: u32) -> TurnOutcome {
    TurnOutcome {
        state,
        reason,
        text,
        steps,
    }
}
