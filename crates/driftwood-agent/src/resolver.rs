// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Normalizes a transcript before it is replayed to the model.
//!
//! Three passes run at the start of every turn:
//!
//! 1. decisions carried by the turn mark pending calls approved or denied;
//! 2. cleanup removes every call still pending or auto-executing, then drops
//!    messages left empty;
//! 3. resolution runs approved calls through [`ConfirmationExecutors`] and
//!    answers denied calls with [`DENIED_OUTPUT`].
//!
//! Completed and errored calls are never touched, so resolving an already
//! resolved transcript changes nothing.

use std::collections::HashSet;

use driftwood_core::{ContentPart, DriftwoodError, Message, ToolInvocation, ToolStatus};
use driftwood_storage::Database;
use driftwood_storage::queries::messages;
use driftwood_tools::{ConfirmationExecutors, ToolContext};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Output recorded for a call the user refused.
pub const DENIED_OUTPUT: &str = "Error: User denied access to tool execution";

/// A human decision on a pending call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDecision {
    pub call_id: String,
    pub decision: Decision,
}

impl ToolDecision {
    pub fn approve(call_id: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            decision: Decision::Approve,
        }
    }

    pub fn deny(call_id: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            decision: Decision::Deny,
        }
    }
}

/// Result of a resolution run.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// The normalized transcript, in original order.
    pub transcript: Vec<Message>,
    /// Messages whose parts changed.
    pub updated: Vec<Message>,
    /// Ids of messages dropped because cleanup emptied them.
    pub removed: Vec<String>,
    /// Calls that received a result during this run.
    pub resolved: Vec<ToolInvocation>,
}

impl Resolution {
    pub fn is_unchanged(&self) -> bool {
        self.updated.is_empty() && self.removed.is_empty()
    }
}

pub struct TranscriptResolver {
    executors: ConfirmationExecutors,
}

impl TranscriptResolver {
    pub fn new(executors: ConfirmationExecutors) -> Self {
        Self { executors }
    }

    /// Load, resolve, and persist a conversation's transcript.
    ///
    /// Only messages that changed are rewritten.
    pub async fn resolve_conversation(
        &self,
        db: &Database,
        conversation_id: &str,
        decisions: &[ToolDecision],
    ) -> Result<Resolution, DriftwoodError> {
        let transcript = messages::load_transcript(db, conversation_id).await?;
        let ctx = ToolContext::new(conversation_id);
        let resolution = self.resolve(&ctx, transcript, decisions).await;

        if !resolution.is_unchanged() {
            messages::rewrite_messages(
                db,
                conversation_id,
                &resolution.updated,
                &resolution.removed,
            )
            .await?;
            info!(
                conversation_id,
                updated = resolution.updated.len(),
                removed = resolution.removed.len(),
                resolved = resolution.resolved.len(),
                "transcript rewritten"
            );
        }
        Ok(resolution)
    }

    /// Run all three passes over an in-memory transcript.
    pub async fn resolve(
        &self,
        ctx: &ToolContext,
        mut transcript: Vec<Message>,
        decisions: &[ToolDecision],
    ) -> Resolution {
        let mut changed: HashSet<String> = HashSet::new();

        apply_decisions(&mut transcript, decisions, &mut changed);
        let (mut transcript, removed) = cleanup(transcript, &mut changed);
        let resolved = self.execute_decided(ctx, &mut transcript, &mut changed).await;

        let updated = transcript
            .iter()
            .filter(|m| changed.contains(&m.id))
            .cloned()
            .collect();

        Resolution {
            transcript,
            updated,
            removed,
            resolved,
        }
    }

    async fn execute_decided(
        &self,
        ctx: &ToolContext,
        transcript: &mut [Message],
        changed: &mut HashSet<String>,
    ) -> Vec<ToolInvocation> {
        let mut resolved = Vec::new();

        for msg in transcript.iter_mut() {
            for part in msg.parts.iter_mut() {
                let Some(inv) = part.as_tool_invocation_mut() else {
                    continue;
                };
                match inv.status {
                    ToolStatus::Approved => {
                        let result = self
                            .executors
                            .execute(ctx, &inv.tool_name, inv.input.clone())
                            .await;
                        match result {
                            Ok(output) => inv.finish(output.content, output.is_error),
                            Err(e) => {
                                warn!(call_id = %inv.call_id, tool = %inv.tool_name, error = %e, "approved tool failed");
                                inv.finish(format!("Error: {e}"), true);
                            }
                        }
                        info!(call_id = %inv.call_id, tool = %inv.tool_name, status = %inv.status, "approved tool executed");
                    }
                    ToolStatus::Denied => {
                        inv.finish(DENIED_OUTPUT, false);
                        debug!(call_id = %inv.call_id, tool = %inv.tool_name, "denied tool answered");
                    }
                    _ => continue,
                }
                changed.insert(msg.id.clone());
                resolved.push(inv.clone());
            }
        }

        resolved
    }
}

/// Mark pending calls approved or denied.
///
/// Decisions for unknown or already-decided call ids are ignored.
pub fn apply_decisions(
    transcript: &mut [Message],
    decisions: &[ToolDecision],
    changed: &mut HashSet<String>,
) {
    for decision in decisions {
        let target = transcript.iter_mut().find_map(|msg| {
            let id = &msg.id;
            msg.parts
                .iter_mut()
                .filter_map(ContentPart::as_tool_invocation_mut)
                .find(|inv| inv.call_id == decision.call_id)
                .map(|inv| (id.clone(), inv))
        });

        match target {
            Some((message_id, inv)) if inv.status == ToolStatus::PendingConfirmation => {
                inv.status = match decision.decision {
                    Decision::Approve => ToolStatus::Approved,
                    Decision::Deny => ToolStatus::Denied,
                };
                debug!(call_id = %decision.call_id, status = %inv.status, "decision applied");
                changed.insert(message_id);
            }
            Some((_, inv)) => {
                warn!(call_id = %decision.call_id, status = %inv.status, "ignoring decision for a call that is not pending");
            }
            None => {
                warn!(call_id = %decision.call_id, "ignoring decision for unknown call");
            }
        }
    }
}

/// Remove non-terminal tool parts and the messages they leave empty.
///
/// Returns the cleaned transcript and the ids of removed messages.
pub fn cleanup(
    transcript: Vec<Message>,
    changed: &mut HashSet<String>,
) -> (Vec<Message>, Vec<String>) {
    let mut kept = Vec::with_capacity(transcript.len());
    let mut removed = Vec::new();

    for mut msg in transcript {
        let before = msg.parts.len();
        msg.parts.retain(|part| {
            part.as_tool_invocation()
                .is_none_or(|inv| inv.status.is_terminal())
        });

        if msg.parts.len() == before {
            kept.push(msg);
            continue;
        }

        debug!(message_id = %msg.id, dropped = before - msg.parts.len(), "removed dangling tool calls");
        if msg.parts.is_empty() {
            changed.remove(&msg.id);
            removed.push(msg.id);
        } else {
            changed.insert(msg.id.clone());
            kept.push(msg);
        }
    }

    (kept, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use driftwood_core::Role;
    use driftwood_tools::{Tool, ToolInput, ToolKind, ToolOutput};
    use serde_json::json;

    struct CountingWeather {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for CountingWeather {
        fn kind(&self) -> ToolKind {
            ToolKind::GetWeatherInformation
        }

        async fn invoke(
            &self,
            _ctx: &ToolContext,
            _input: ToolInput,
        ) -> Result<ToolOutput, DriftwoodError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ToolOutput::ok("sunny, 20°C"))
        }
    }

    fn resolver() -> (TranscriptResolver, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut executors = ConfirmationExecutors::new();
        executors.insert(Arc::new(CountingWeather {
            calls: calls.clone(),
        }));
        (TranscriptResolver::new(executors), calls)
    }

    fn call(call_id: &str, status: ToolStatus) -> ContentPart {
        ContentPart::ToolInvocation(ToolInvocation {
            tool_name: "get_weather_information".into(),
            input: json!({"location": "Oslo"}),
            call_id: call_id.into(),
            status,
            output: None,
        })
    }

    fn assistant(parts: Vec<ContentPart>) -> Message {
        Message::new(Role::Assistant, parts)
    }

    fn statuses(transcript: &[Message]) -> Vec<ToolStatus> {
        transcript
            .iter()
            .flat_map(|m| m.tool_invocations().map(|i| i.status))
            .collect()
    }

    #[tokio::test]
    async fn dangling_calls_are_cleaned() {
        let (resolver, calls) = resolver();
        let keep = assistant(vec![
            ContentPart::text("Checking."),
            call("t1", ToolStatus::PendingConfirmation),
        ]);
        let drop = assistant(vec![call("t2", ToolStatus::AutoExecuting)]);
        let transcript = vec![Message::user_text("weather?"), keep.clone(), drop.clone()];

        let res = resolver
            .resolve(&ToolContext::new("c"), transcript, &[])
            .await;

        assert_eq!(res.transcript.len(), 2);
        assert_eq!(res.transcript[1].id, keep.id);
        assert_eq!(res.transcript[1].parts, vec![ContentPart::text("Checking.")]);
        assert_eq!(res.removed, vec![drop.id]);
        assert_eq!(res.updated.len(), 1);
        assert!(res.resolved.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn approved_call_runs_once_and_is_idempotent() {
        let (resolver, calls) = resolver();
        let ctx = ToolContext::new("c");
        let transcript = vec![
            Message::user_text("weather?"),
            assistant(vec![call("t1", ToolStatus::PendingConfirmation)]),
        ];

        let first = resolver
            .resolve(&ctx, transcript, &[ToolDecision::approve("t1")])
            .await;
        assert_eq!(statuses(&first.transcript), vec![ToolStatus::Completed]);
        assert_eq!(first.resolved.len(), 1);
        assert_eq!(first.resolved[0].output.as_deref(), Some("sunny, 20°C"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let second = resolver
            .resolve(&ctx, first.transcript.clone(), &[ToolDecision::approve("t1")])
            .await;
        assert!(second.is_unchanged());
        assert_eq!(second.transcript, first.transcript);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn denied_call_gets_fixed_output() {
        let (resolver, calls) = resolver();
        let transcript = vec![assistant(vec![call("t1", ToolStatus::PendingConfirmation)])];

        let res = resolver
            .resolve(&ToolContext::new("c"), transcript, &[ToolDecision::deny("t1")])
            .await;

        let inv = res.transcript[0].tool_invocations().next().unwrap();
        assert_eq!(inv.status, ToolStatus::Completed);
        assert_eq!(inv.output.as_deref(), Some(DENIED_OUTPUT));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn approved_without_executor_errors() {
        let resolver = TranscriptResolver::new(ConfirmationExecutors::new());
        let transcript = vec![assistant(vec![call("t1", ToolStatus::Approved)])];

        let res = resolver
            .resolve(&ToolContext::new("c"), transcript, &[])
            .await;
        let inv = res.transcript[0].tool_invocations().next().unwrap();
        assert_eq!(inv.status, ToolStatus::Errored);
        assert!(inv.output.as_deref().unwrap().starts_with("Error:"));
    }

    #[tokio::test]
    async fn resolution_follows_transcript_order() {
        let (resolver, _) = resolver();
        let transcript = vec![
            assistant(vec![
                call("a", ToolStatus::Denied),
                call("b", ToolStatus::PendingConfirmation),
            ]),
            assistant(vec![call("c", ToolStatus::Approved)]),
        ];
        let res = resolver
            .resolve(&ToolContext::new("c"), transcript, &[ToolDecision::approve("b")])
            .await;
        let order: Vec<_> = res.resolved.iter().map(|i| i.call_id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    #[tracing_test::traced_test]
    fn unknown_and_repeated_decisions_are_ignored() {
        let mut transcript = vec![assistant(vec![call("t1", ToolStatus::Completed)])];
        let mut changed = HashSet::new();
        apply_decisions(
            &mut transcript,
            &[ToolDecision::approve("t1"), ToolDecision::deny("nope")],
            &mut changed,
        );
        assert!(changed.is_empty());
        assert_eq!(statuses(&transcript), vec![ToolStatus::Completed]);
        assert!(logs_contain("ignoring decision for unknown call"));
    }

    #[tokio::test]
    async fn only_changed_messages_are_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("t.db").to_string_lossy())
            .await
            .unwrap();

        let untouched = Message::user_text("weather?");
        let pending = assistant(vec![
            ContentPart::text("Let me check."),
            call("t1", ToolStatus::PendingConfirmation),
        ]);
        let dangling = assistant(vec![call("t2", ToolStatus::AutoExecuting)]);
        for msg in [&untouched, &pending, &dangling] {
            messages::append_message(&db, "c1", msg).await.unwrap();
        }

        let (resolver, calls) = resolver();
        let res = resolver
            .resolve_conversation(&db, "c1", &[ToolDecision::approve("t1")])
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(res.updated.len(), 1);
        assert_eq!(res.updated[0].id, pending.id);
        assert_eq!(res.removed, vec![dangling.id.clone()]);

        let stored = messages::load_transcript(&db, "c1").await.unwrap();
        assert_eq!(stored, res.transcript);
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0], untouched);
        assert_eq!(statuses(&stored), vec![ToolStatus::Completed]);

        // A second pass finds nothing to do.
        let again = resolver.resolve_conversation(&db, "c1", &[]).await.unwrap();
        assert!(again.is_unchanged());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn decision_wire_format() {
        let d: ToolDecision =
            serde_json::from_value(json!({"call_id": "t1", "decision": "approve"})).unwrap();
        assert_eq!(d, ToolDecision::approve("t1"));
        assert!(serde_json::from_value::<ToolDecision>(json!({"call_id": "t1", "decision": "maybe"})).is_err());
    }
}
