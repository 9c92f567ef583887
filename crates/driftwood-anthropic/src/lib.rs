// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Messages API provider for the Driftwood agent.
//!
//! Implements [`ProviderAdapter`] over the streaming endpoint. Tool calls
//! arrive as a `tool_use` block start followed by `input_json_delta`
//! fragments; they are accumulated and emitted as one complete call when the
//! block stops.

pub mod client;
pub mod sse;
pub mod types;

use std::collections::HashMap;

use async_trait::async_trait;
use driftwood_config::DriftwoodConfig;
use driftwood_core::types::{
    AdapterType, ContentBlock, HealthStatus, ProviderRequest, ProviderStreamChunk,
    StreamEventType, TokenUsage, ToolUseData,
};
use driftwood_core::{DriftwoodError, PluginAdapter, ProviderAdapter, ProviderStream};
use futures::stream::StreamExt;
use tracing::{debug, info, warn};

use crate::client::AnthropicClient;
use crate::sse::StreamEvent;
use crate::types::{
    ApiContent, ApiContentBlock, ApiMessage, ApiUsage, MessageRequest, ResponseContentBlock,
    SseDelta,
};

/// Tool-use blocks in flight, keyed by content block index: (id, name, partial JSON).
type PendingToolUses = HashMap<usize, (String, String, String)>;

/// Anthropic provider implementing [`ProviderAdapter`].
///
/// API key resolution order: config, then `ANTHROPIC_API_KEY`, else error.
pub struct AnthropicProvider {
    client: AnthropicClient,
    system_prompt: String,
}

impl AnthropicProvider {
    pub async fn new(config: &DriftwoodConfig) -> Result<Self, DriftwoodError> {
        let api_key = resolve_api_key(&config.anthropic.api_key)?;
        let system_prompt = load_system_prompt(
            &config.agent.name,
            &config.agent.system_prompt,
            &config.agent.system_prompt_file,
        )
        .await;

        let client = AnthropicClient::new(&api_key, &config.anthropic.api_version)?;

        info!(
            model = config.anthropic.default_model,
            "Anthropic provider initialized"
        );

        Ok(Self {
            client,
            system_prompt,
        })
    }

    pub fn with_client(client: AnthropicClient, system_prompt: impl Into<String>) -> Self {
        Self {
            client,
            system_prompt: system_prompt.into(),
        }
    }

    fn to_message_request(&self, request: &ProviderRequest) -> MessageRequest {
        let messages = request
            .messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.clone(),
                content: convert_content_blocks(&m.content),
            })
            .collect();

        let system = request
            .system_prompt
            .clone()
            .unwrap_or_else(|| self.system_prompt.clone());

        let tools = request
            .tools
            .as_ref()
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| {
                        serde_json::from_value::<types::ToolDefinition>(v.clone())
                            .inspect_err(|e| warn!(error = %e, "skipping malformed tool definition"))
                            .ok()
                    })
                    .collect::<Vec<_>>()
            })
            .filter(|v| !v.is_empty());

        MessageRequest {
            model: request.model.clone(),
            messages,
            system: Some(system),
            max_tokens: request.max_tokens,
            stream: request.stream,
            tools,
        }
    }
}

#[async_trait]
impl PluginAdapter for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, DriftwoodError> {
        // No API call: health checks should not spend tokens.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), DriftwoodError> {
        debug!("Anthropic provider shutting down");
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicProvider {
    async fn stream(&self, request: ProviderRequest) -> Result<ProviderStream, DriftwoodError> {
        let api_request = self.to_message_request(&request);
        let event_stream = self.client.stream_message(&api_request).await?;

        let mut pending: PendingToolUses = HashMap::new();
        let mut stop_reason: Option<String> = None;

        let chunks = event_stream.filter_map(move |result| {
            let chunk = match result {
                Ok(event) => map_stream_event(event, &mut pending, &mut stop_reason),
                Err(e) => Some(Err(e)),
            };
            async move { chunk }
        });

        Ok(Box::pin(chunks))
    }
}

/// Map one SSE event to a chunk, accumulating tool-use JSON across deltas.
fn map_stream_event(
    event: StreamEvent,
    pending: &mut PendingToolUses,
    stop_reason: &mut Option<String>,
) -> Option<Result<ProviderStreamChunk, DriftwoodError>> {
    match event {
        StreamEvent::ContentBlockStart(start) => {
            if let ResponseContentBlock::ToolUse { id, name, .. } = start.content_block {
                pending.insert(start.index, (id, name, String::new()));
            }
            None
        }
        StreamEvent::ContentBlockDelta(delta) => match delta.delta {
            SseDelta::TextDelta { text } => Some(Ok(ProviderStreamChunk::text_delta(text))),
            SseDelta::InputJsonDelta { partial_json } => {
                if let Some((_, _, json)) = pending.get_mut(&delta.index) {
                    json.push_str(&partial_json);
                }
                None
            }
        },
        StreamEvent::ContentBlockStop(stop) => {
            let (id, name, json) = pending.remove(&stop.index)?;
            let input = if json.trim().is_empty() {
                serde_json::Value::Object(serde_json::Map::new())
            } else {
                // Unparseable input is passed through; tool validation rejects it.
                serde_json::from_str(&json).unwrap_or_else(|e| {
                    warn!(error = %e, json = %json, "failed to parse tool_use input JSON");
                    serde_json::json!({"_parse_error": e.to_string(), "_raw": json})
                })
            };
            Some(Ok(ProviderStreamChunk::tool_use(ToolUseData { id, name, input })))
        }
        StreamEvent::MessageStart(start) => Some(Ok(ProviderStreamChunk {
            usage: Some(usage(&start.message.usage)),
            ..ProviderStreamChunk::empty(StreamEventType::MessageStart)
        })),
        StreamEvent::MessageDelta(md) => {
            if let Some(reason) = &md.delta.stop_reason {
                *stop_reason = Some(reason.clone());
            }
            Some(Ok(ProviderStreamChunk {
                usage: md.usage.as_ref().map(usage),
                stop_reason: md.delta.stop_reason,
                ..ProviderStreamChunk::empty(StreamEventType::MessageDelta)
            }))
        }
        StreamEvent::MessageStop => Some(Ok(ProviderStreamChunk {
            stop_reason: stop_reason.clone(),
            ..ProviderStreamChunk::empty(StreamEventType::MessageStop)
        })),
        StreamEvent::Error(err) => Some(Ok(ProviderStreamChunk {
            error: Some(format!("{}: {}", err.error.type_, err.error.message)),
            ..ProviderStreamChunk::empty(StreamEventType::Error)
        })),
        StreamEvent::Ping => None,
    }
}

fn usage(u: &ApiUsage) -> TokenUsage {
    TokenUsage {
        input_tokens: u.input_tokens,
        output_tokens: u.output_tokens,
    }
}

/// Resolve the API key from config or the environment.
pub fn resolve_api_key(config_key: &Option<String>) -> Result<String, DriftwoodError> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Ok(key.clone());
    }

    std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
        DriftwoodError::Config(
            "Anthropic API key not found. Set anthropic.api_key in config or the ANTHROPIC_API_KEY environment variable.".into(),
        )
    })
}

/// System prompt by priority: file, then inline, then a default naming the agent.
pub async fn load_system_prompt(
    agent_name: &str,
    inline_prompt: &Option<String>,
    prompt_file: &Option<String>,
) -> String {
    if let Some(file_path) = prompt_file {
        match tokio::fs::read_to_string(file_path).await {
            Ok(content) => {
                let trimmed = content.trim();
                if !trimmed.is_empty() {
                    info!(path = file_path, "loaded system prompt from file");
                    return trimmed.to_string();
                }
            }
            Err(e) => {
                warn!(path = file_path, error = %e, "failed to read system prompt file, falling back");
            }
        }
    }

    if let Some(prompt) = inline_prompt
        && !prompt.is_empty()
    {
        return prompt.clone();
    }

    format!(
        "You are {agent_name}, a friendly assistant by the sea. You can throw and retrieve \
         messages in bottles, schedule tasks, and look up local time and weather."
    )
}

fn convert_content_blocks(blocks: &[ContentBlock]) -> ApiContent {
    if let [ContentBlock::Text { text }] = blocks {
        return ApiContent::Text(text.clone());
    }

    ApiContent::Blocks(
        blocks
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => ApiContentBlock::Text { text: text.clone() },
                ContentBlock::ToolUse { id, name, input } => ApiContentBlock::ToolUse {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                },
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                } => ApiContentBlock::ToolResult {
                    tool_use_id: tool_use_id.clone(),
                    content: content.clone(),
                    is_error: *is_error,
                },
            })
            .collect(),
    )
}
