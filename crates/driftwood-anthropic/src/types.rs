// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Messages API request types and SSE event types.

use serde::{Deserialize, Serialize};

/// A tool definition for the Messages API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema of the tool input.
    pub input_schema: serde_json::Value,
}

// --- Request types ---

/// A streaming request to the Messages API.
#[derive(Debug, Clone, Serialize)]
pub struct MessageRequest {
    pub model: String,

    pub messages: Vec<ApiMessage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    pub max_tokens: u32,

    pub stream: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
}

/// A single message in the Anthropic conversation format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiMessage {
    /// "user" or "assistant".
    pub role: String,
    pub content: ApiContent,
}

/// Message content: a bare string or typed blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiContent {
    Text(String),
    Blocks(Vec<ApiContentBlock>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApiContentBlock {
    Text {
        text: String,
    },
    /// Sent by the assistant.
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// Sent by the user in answer to a `tool_use`.
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

// --- Response types ---

/// The message object carried by `message_start`.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    pub id: String,
    pub model: String,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: ApiUsage,
}

/// A content block announced by `content_block_start`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseContentBlock {
    Text {
        text: String,
    },
    /// The model is requesting a tool invocation; input arrives as JSON deltas.
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApiUsage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

// --- SSE event types ---

#[derive(Debug, Clone, Deserialize)]
pub struct SseMessageStart {
    pub message: MessageResponse,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SseContentBlockStart {
    pub index: usize,
    pub content_block: ResponseContentBlock,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SseContentBlockDelta {
    pub index: usize,
    pub delta: SseDelta,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SseDelta {
    TextDelta { text: String },
    /// Partial JSON of a tool_use input.
    InputJsonDelta { partial_json: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct SseContentBlockStop {
    pub index: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SseMessageDelta {
    pub delta: SseMessageDeltaInfo,
    pub usage: Option<ApiUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SseMessageDeltaInfo {
    pub stop_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SseError {
    pub error: ApiErrorDetail,
}

/// Body of a non-2xx API response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(rename = "type")]
    pub type_: String,
    pub message: String,
}
