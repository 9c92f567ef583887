// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the full agent stack over a temp SQLite database
//! and a [`MockProvider`]. `send()` drives a turn and collects its events.

use std::sync::Arc;
use std::time::Duration;

use driftwood_agent::{
    Orchestrator, OrchestratorSettings, RequestSettings, SessionManager, ToolDecision,
    TranscriptResolver, TurnEvent, TurnRequest,
};
use driftwood_config::model::WeatherConfig;
use driftwood_core::{DriftwoodError, Message};
use driftwood_cron::Scheduler;
use driftwood_storage::{BottleStore, Database};
use driftwood_tools::{
    BuiltinDeps, ConfirmationExecutors, ToolRegistry, WeatherClient, register_builtins,
};
use tokio_util::sync::CancellationToken;

use crate::mock_provider::{MockProvider, MockResponse};

/// Nothing listens on the discard port, so weather lookups fail fast.
const UNREACHABLE_URL: &str = "http://127.0.0.1:9";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    responses: Vec<MockResponse>,
    fallback: Option<MockResponse>,
    chunk_delay: Option<Duration>,
    max_steps: u32,
    bottle_capacity: u32,
    weather_base_url: String,
    stream_buffer: usize,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            responses: Vec::new(),
            fallback: None,
            chunk_delay: None,
            max_steps: 10,
            bottle_capacity: 100,
            weather_base_url: UNREACHABLE_URL.to_string(),
            stream_buffer: 64,
        }
    }

    pub fn with_mock_responses(mut self, responses: Vec<MockResponse>) -> Self {
        self.responses = responses;
        self
    }

    /// Response the model gives once the scripted ones run out.
    pub fn with_fallback(mut self, fallback: MockResponse) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_bottle_capacity(mut self, capacity: u32) -> Self {
        self.bottle_capacity = capacity;
        self
    }

    /// Serve geocoding from `{url}/v1/search` and forecasts from `{url}/v1/forecast`.
    pub fn with_weather_base_url(mut self, url: impl Into<String>) -> Self {
        self.weather_base_url = url.into();
        self
    }

    pub fn with_stream_buffer(mut self, size: usize) -> Self {
        self.stream_buffer = size;
        self
    }

    pub async fn build(self) -> Result<TestHarness, DriftwoodError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| DriftwoodError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");
        let db = Database::open(&db_path.to_string_lossy()).await?;

        let bottles = BottleStore::new(db.clone(), "default", self.bottle_capacity);
        let scheduler = Scheduler::new(db.clone(), Duration::from_secs(60));
        let weather = Arc::new(WeatherClient::new(&WeatherConfig {
            geocoding_url: format!("{}/v1/search", self.weather_base_url),
            forecast_url: format!("{}/v1/forecast", self.weather_base_url),
            timeout_secs: 2,
        })?);

        let mut registry = ToolRegistry::new();
        let mut executors = ConfirmationExecutors::new();
        register_builtins(
            &mut registry,
            &mut executors,
            BuiltinDeps {
                bottles: bottles.clone(),
                scheduler: scheduler.clone(),
                weather,
            },
        )?;

        let mut provider = MockProvider::with_responses(self.responses);
        if let Some(fallback) = self.fallback {
            provider = provider.with_fallback(fallback);
        }
        if let Some(delay) = self.chunk_delay {
            provider = provider.with_chunk_delay(delay);
        }
        let mock_provider = Arc::new(provider);

        let orchestrator = Arc::new(Orchestrator::new(
            mock_provider.clone(),
            Arc::new(registry),
            db.clone(),
            OrchestratorSettings {
                request: RequestSettings {
                    model: "mock-model".to_string(),
                    max_tokens: 1024,
                    system_prompt: Some("You are a test assistant.".to_string()),
                },
                max_steps: self.max_steps,
            },
        ));
        let resolver = Arc::new(TranscriptResolver::new(executors));
        let shutdown = CancellationToken::new();
        let sessions = Arc::new(SessionManager::new(
            resolver,
            orchestrator,
            db.clone(),
            self.stream_buffer,
            shutdown.clone(),
        ));

        Ok(TestHarness {
            mock_provider,
            db,
            bottles,
            scheduler,
            sessions,
            shutdown,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment over a temp database.
pub struct TestHarness {
    pub mock_provider: Arc<MockProvider>,
    pub db: Database,
    pub bottles: BottleStore,
    pub scheduler: Scheduler,
    pub sessions: Arc<SessionManager>,
    /// Cancelling this cancels every running turn.
    pub shutdown: CancellationToken,
    /// Kept alive so the database outlives the harness.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Run a turn to completion and return every event it produced.
    pub async fn send(
        &self,
        conversation_id: &str,
        request: TurnRequest,
    ) -> Result<Vec<TurnEvent>, DriftwoodError> {
        let mut rx = self.sessions.start_turn(conversation_id, request)?;
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        Ok(events)
    }

    pub async fn send_text(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<Vec<TurnEvent>, DriftwoodError> {
        self.send(conversation_id, TurnRequest::text(text)).await
    }

    pub async fn decide(
        &self,
        conversation_id: &str,
        decisions: Vec<ToolDecision>,
    ) -> Result<Vec<TurnEvent>, DriftwoodError> {
        self.send(conversation_id, TurnRequest::decisions(decisions)).await
    }

    pub async fn transcript(&self, conversation_id: &str) -> Result<Vec<Message>, DriftwoodError> {
        self.sessions.transcript(conversation_id).await
    }
}

/// Concatenated `text_delta` payloads.
pub fn streamed_text(events: &[TurnEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            TurnEvent::TextDelta { text } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

/// The final `done` event, if the stream has one.
pub fn done_event(events: &[TurnEvent]) -> Option<&TurnEvent> {
    events.iter().rev().find(|e| matches!(e, TurnEvent::Done { .. }))
}
