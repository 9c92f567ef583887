// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversion of a stored transcript into provider messages.
//!
//! Each resolved tool invocation becomes a `tool_use` block in its assistant
//! message plus a `tool_result` block in the user message that follows.
//! Consecutive messages with the same role are merged, since the Messages API
//! requires alternating roles.

use driftwood_core::types::{ContentBlock, ProviderMessage, ProviderRequest};
use driftwood_core::{ContentPart, Message, Role, ToolStatus};
use tracing::debug;

/// Model and limits applied to every request of a turn.
#[derive(Debug, Clone)]
pub struct RequestSettings {
    pub model: String,
    pub max_tokens: u32,
    /// Overrides the provider's own system prompt when set.
    pub system_prompt: Option<String>,
}

/// Build a streaming request from the transcript and the tool catalog.
pub fn build_request(
    settings: &RequestSettings,
    transcript: &[Message],
    tools: Vec<serde_json::Value>,
) -> ProviderRequest {
    ProviderRequest {
        model: settings.model.clone(),
        system_prompt: settings.system_prompt.clone(),
        messages: to_provider_messages(transcript),
        max_tokens: settings.max_tokens,
        stream: true,
        tools: (!tools.is_empty()).then_some(tools),
    }
}

pub fn to_provider_messages(transcript: &[Message]) -> Vec<ProviderMessage> {
    let mut out: Vec<ProviderMessage> = Vec::new();

    for msg in transcript {
        match msg.role {
            Role::System => {
                debug!(message_id = %msg.id, "skipping system message in provider context");
            }
            Role::User => {
                let blocks = text_blocks(&msg.parts);
                push_merged(&mut out, "user", blocks);
            }
            Role::Assistant => {
                let mut assistant = Vec::new();
                let mut results = Vec::new();
                for part in &msg.parts {
                    match part {
                        ContentPart::Text { value } if !value.is_empty() => {
                            assistant.push(ContentBlock::Text {
                                text: value.clone(),
                            });
                        }
                        ContentPart::Text { .. } => {}
                        ContentPart::ToolInvocation(inv) if inv.status.is_resolved() => {
                            assistant.push(ContentBlock::ToolUse {
                                id: inv.call_id.clone(),
                                name: inv.tool_name.clone(),
                                input: inv.input.clone(),
                            });
                            results.push(ContentBlock::ToolResult {
                                tool_use_id: inv.call_id.clone(),
                                content: inv.output.clone().unwrap_or_default(),
                                is_error: (inv.status == ToolStatus::Errored)
                                    .then_some(true),
                            });
                        }
                        // A tool_use without a result is rejected by the API.
                        ContentPart::ToolInvocation(inv) => {
                            debug!(call_id = %inv.call_id, status = %inv.status, "omitting unresolved tool call");
                        }
                    }
                }
                push_merged(&mut out, "assistant", assistant);
                push_merged(&mut out, "user", results);
            }
        }
    }

    out
}

fn text_blocks(parts: &[ContentPart]) -> Vec<ContentBlock> {
    parts
        .iter()
        .filter_map(|p| match p {
            ContentPart::Text { value } if !value.is_empty() => Some(ContentBlock::Text {
                text: value.clone(),
            }),
            _ => None,
        })
        .collect()
}

fn push_merged(out: &mut Vec<ProviderMessage>, role: &str, blocks: Vec<ContentBlock>) {
    if blocks.is_empty() {
        return;
    }
    match out.last_mut() {
        Some(last) if last.role == role => last.content.extend(blocks),
        _ => out.push(ProviderMessage {
            role: role.to_string(),
            content: blocks,
        }),
    }
}
