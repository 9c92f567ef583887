// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock model provider for deterministic testing.
//!
//! Responses are popped from a FIFO queue. When the queue is empty the
//! fallback response is used, which lets a test model call a tool forever.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use driftwood_core::types::{
    AdapterType, HealthStatus, ProviderRequest, ProviderStreamChunk, StreamEventType, TokenUsage,
    ToolUseData,
};
use driftwood_core::{DriftwoodError, PluginAdapter, ProviderAdapter, ProviderStream};
use futures::{StreamExt, stream};
use tokio::sync::Mutex;

/// One scripted model step.
#[derive(Debug, Clone, PartialEq)]
pub enum MockResponse {
    /// Plain text, streamed in word-sized deltas.
    Text(String),
    /// Optional text followed by tool calls.
    ToolCalls {
        text: Option<String>,
        calls: Vec<(String, serde_json::Value)>,
    },
    /// The stream yields an error after any text.
    Error(String),
}

impl MockResponse {
    pub fn text(text: impl Into<String>) -> Self {
        MockResponse::Text(text.into())
    }

    /// A single tool call with no text.
    pub fn tool(name: impl Into<String>, input: serde_json::Value) -> Self {
        MockResponse::ToolCalls {
            text: None,
            calls: vec![(name.into(), input)],
        }
    }
}

/// A mock provider that streams pre-configured responses.
pub struct MockProvider {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    fallback: MockResponse,
    requests: Arc<Mutex<Vec<ProviderRequest>>>,
    next_call: AtomicUsize,
    chunk_delay: Option<Duration>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::with_responses(Vec::new())
    }

    pub fn with_responses(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            fallback: MockResponse::text("mock response"),
            requests: Arc::new(Mutex::new(Vec::new())),
            next_call: AtomicUsize::new(1),
            chunk_delay: None,
        }
    }

    /// Response used once the queue is drained.
    pub fn with_fallback(mut self, fallback: MockResponse) -> Self {
        self.fallback = fallback;
        self
    }

    /// Pause before each chunk, so tests can cancel mid-stream.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    pub async fn add_response(&self, response: MockResponse) {
        self.responses.lock().await.push_back(response);
    }

    /// Every request received so far.
    pub async fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    async fn next_response(&self) -> MockResponse {
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }

    fn call_id(&self) -> String {
        format!("call_{}", self.next_call.fetch_add(1, Ordering::Relaxed))
    }

    /// Chunk sequence shaped like a real streaming response:
    /// MessageStart -> deltas / tool calls -> MessageDelta -> MessageStop.
    fn chunks(&self, response: MockResponse) -> Vec<Result<ProviderStreamChunk, DriftwoodError>> {
        let mut chunks = vec![Ok(ProviderStreamChunk::empty(StreamEventType::MessageStart))];
        let (text, calls, error) = match response {
            MockResponse::Text(text) => (Some(text), Vec::new(), None),
            MockResponse::ToolCalls { text, calls } => (text, calls, None),
            MockResponse::Error(message) => (None, Vec::new(), Some(message)),
        };

        if let Some(text) = text {
            for word in text.split_inclusive(' ') {
                chunks.push(Ok(ProviderStreamChunk::text_delta(word)));
            }
        }
        if let Some(message) = error {
            chunks.push(Err(DriftwoodError::Provider {
                message,
                source: None,
            }));
            return chunks;
        }

        let stop_reason = if calls.is_empty() { "end_turn" } else { "tool_use" };
        for (name, input) in calls {
            chunks.push(Ok(ProviderStreamChunk::tool_use(ToolUseData {
                id: self.call_id(),
                name,
                input,
            })));
        }
        chunks.push(Ok(ProviderStreamChunk {
            usage: Some(TokenUsage {
                input_tokens: 10,
                output_tokens: 20,
            }),
            stop_reason: Some(stop_reason.to_string()),
            ..ProviderStreamChunk::empty(StreamEventType::MessageDelta)
        }));
        chunks.push(Ok(ProviderStreamChunk::empty(StreamEventType::MessageStop)));
        chunks
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, DriftwoodError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), DriftwoodError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn stream(&self, request: ProviderRequest) -> Result<ProviderStream, DriftwoodError> {
        self.requests.lock().await.push(request);
        let response = self.next_response().await;
        let chunks = self.chunks(response);

        match self.chunk_delay {
            Some(delay) => Ok(Box::pin(stream::iter(chunks).then(move |chunk| async move {
                tokio::time::sleep(delay).await;
                chunk
            }))),
            None => Ok(Box::pin(stream::iter(chunks))),
        }
    }
}
