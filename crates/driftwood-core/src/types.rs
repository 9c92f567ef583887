// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transcript, scheduling, storage and provider types shared across crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter behind a [`crate::PluginAdapter`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Provider,
    Storage,
    Gateway,
}

// --- Transcript types ---

/// Author of a transcript message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Lifecycle of a tool invocation recorded in the transcript.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ToolStatus {
    /// Waiting for a human to approve or deny the call.
    PendingConfirmation,
    /// A human approved the call; it runs on the next resolution pass.
    Approved,
    /// A human denied the call; it is answered with a fixed denial output.
    Denied,
    /// Dispatched to an auto-executing tool and not yet finished.
    AutoExecuting,
    /// Finished with an output.
    Completed,
    /// Finished with an error output.
    Errored,
}

impl ToolStatus {
    /// Whether the part carries a decision or a result.
    ///
    /// Non-terminal parts left in a transcript at the start of a turn are
    /// dangling and get removed by the cleanup pass.
    pub fn is_terminal(self) -> bool {
        !matches!(self, ToolStatus::PendingConfirmation | ToolStatus::AutoExecuting)
    }

    /// Whether the part has a final output the model can see.
    pub fn is_resolved(self) -> bool {
        matches!(self, ToolStatus::Completed | ToolStatus::Errored)
    }
}

/// A tool call requested by the model, with its current status and output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    pub tool_name: String,
    pub input: serde_json::Value,
    pub call_id: String,
    pub status: ToolStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl ToolInvocation {
    /// Marks the invocation finished with the given output.
    pub fn finish(&mut self, output: impl Into<String>, is_error: bool) {
        self.status = if is_error {
            ToolStatus::Errored
        } else {
            ToolStatus::Completed
        };
        self.output = Some(output.into());
    }
}

/// One ordered piece of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ContentPart {
    Text { value: String },
    ToolInvocation(ToolInvocation),
}

impl ContentPart {
    pub fn text(value: impl Into<String>) -> Self {
        ContentPart::Text {
            value: value.into(),
        }
    }

    pub fn as_tool_invocation(&self) -> Option<&ToolInvocation> {
        match self {
            ContentPart::ToolInvocation(inv) => Some(inv),
            ContentPart::Text { .. } => None,
        }
    }

    pub fn as_tool_invocation_mut(&mut self) -> Option<&mut ToolInvocation> {
        match self {
            ContentPart::ToolInvocation(inv) => Some(inv),
            ContentPart::Text { .. } => None,
        }
    }
}

/// A single transcript entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub parts: Vec<ContentPart>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Creates a message with a fresh id and the current timestamp.
    pub fn new(role: Role, parts: Vec<ContentPart>) -> Self {
        Self {
            id: uuid_like_id(),
            role,
            parts,
            created_at: Utc::now(),
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![ContentPart::text(text)])
    }

    /// Concatenates all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text { value } => Some(value.as_str()),
                ContentPart::ToolInvocation(_) => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn tool_invocations(&self) -> impl Iterator<Item = &ToolInvocation> {
        self.parts.iter().filter_map(ContentPart::as_tool_invocation)
    }
}

fn uuid_like_id() -> String {
    format!("msg_{}", uuid::Uuid::new_v4().simple())
}

// --- Scheduling types ---

/// When a scheduled task fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    /// Fire once at an absolute time.
    At { at: DateTime<Utc> },
    /// Fire once after a delay counted from scheduling time.
    After { seconds: u64 },
    /// Fire on every match of a cron expression until cancelled.
    Cron { expression: String },
}

impl Trigger {
    /// One-shot triggers delete their task after firing.
    pub fn is_one_shot(&self) -> bool {
        !matches!(self, Trigger::Cron { .. })
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::At { at } => write!(f, "at {}", at.to_rfc3339()),
            Trigger::After { seconds } => write!(f, "after {seconds}s"),
            Trigger::Cron { expression } => write!(f, "cron `{expression}`"),
        }
    }
}

/// A deferred invocation of the scheduler callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: String,
    /// Conversation that created the task.
    pub owner: String,
    pub trigger: Trigger,
    /// Description handed to the callback when the task fires.
    pub payload: String,
    /// Name of the callback invoked on firing.
    pub callback: String,
    pub created_at: DateTime<Utc>,
    pub next_run_at: DateTime<Utc>,
}

// --- Bottle store types ---

/// A single stored message in a bottle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BottleEntry {
    pub id: i64,
    pub text: String,
}

// --- Provider types ---

/// A request to a model provider.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub model: String,
    pub system_prompt: Option<String>,
    pub messages: Vec<ProviderMessage>,
    pub max_tokens: u32,
    pub stream: bool,
    /// Provider-format tool definitions (`name`, `description`, `input_schema`).
    pub tools: Option<Vec<serde_json::Value>>,
}

/// One message in provider wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderMessage {
    /// "user" or "assistant".
    pub role: String,
    pub content: Vec<ContentBlock>,
}

/// Content block in provider wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

/// Kinds of events in a streaming provider response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEventType {
    MessageStart,
    ContentBlockDelta,
    /// Emitted when a tool-use block completes, carrying the parsed call.
    ContentBlockStop,
    MessageDelta,
    MessageStop,
    Error,
}

/// Token usage reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A complete tool call assembled from streamed deltas.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolUseData {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// A single chunk from a streaming provider response.
#[derive(Debug, Clone)]
pub struct ProviderStreamChunk {
    pub event_type: StreamEventType,
    pub text: Option<String>,
    pub usage: Option<TokenUsage>,
    pub error: Option<String>,
    pub tool_use: Option<ToolUseData>,
    pub stop_reason: Option<String>,
}

impl ProviderStreamChunk {
    /// A chunk of the given type with every payload field empty.
    pub fn empty(event_type: StreamEventType) -> Self {
        Self {
            event_type,
            text: None,
            usage: None,
            error: None,
            tool_use: None,
            stop_reason: None,
        }
    }

    pub fn text_delta(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::empty(StreamEventType::ContentBlockDelta)
        }
    }

    pub fn tool_use(data: ToolUseData) -> Self {
        Self {
            tool_use: Some(data),
            ..Self::empty(StreamEventType::ContentBlockStop)
        }
    }
}
