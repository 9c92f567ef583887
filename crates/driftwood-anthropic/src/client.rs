// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Anthropic Messages API.

use std::time::Duration;

use driftwood_core::DriftwoodError;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::{debug, warn};

use crate::sse::{self, EventStream};
use crate::types::{ApiErrorResponse, MessageRequest};

const API_BASE_URL: &str = "https://api.anthropic.com/v1/messages";

/// Authenticated client with one retry on transient errors (429, 500, 503, 529).
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: reqwest::Client,
    max_retries: u32,
    retry_delay: Duration,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(api_key: &str, api_version: &str) -> Result<Self, DriftwoodError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key).map_err(|e| {
                DriftwoodError::Config(format!("invalid API key header value: {e}"))
            })?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_str(api_version).map_err(|e| {
                DriftwoodError::Config(format!("invalid API version header value: {e}"))
            })?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| DriftwoodError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            max_retries: 1,
            retry_delay: Duration::from_secs(1),
            base_url: API_BASE_URL.to_string(),
        })
    }

    /// Point the client at another endpoint, such as a local mock server.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    #[cfg(test)]
    fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Send a streaming request and return the parsed SSE events.
    pub async fn stream_message(
        &self,
        request: &MessageRequest,
    ) -> Result<EventStream, DriftwoodError> {
        let mut req = request.clone();
        req.stream = true;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, "retrying streaming request after transient error");
                tokio::time::sleep(self.retry_delay).await;
            }

            let response = self
                .client
                .post(&self.base_url)
                .json(&req)
                .send()
                .await
                .map_err(|e| DriftwoodError::Provider {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(status = %status, attempt, "streaming response received");

            if status.is_success() {
                return Ok(sse::parse_sse_stream(response));
            }

            let body = response.text().await.unwrap_or_default();
            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, body = %body, "transient error, will retry");
                continue;
            }

            return Err(DriftwoodError::Provider {
                message: describe_error(status, &body),
                source: None,
            });
        }

        Err(DriftwoodError::Provider {
            message: "streaming request failed after retries".into(),
            source: None,
        })
    }
}

fn describe_error(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(api_err) => format!(
            "Anthropic API error ({}): {}",
            api_err.error.type_, api_err.error.message
        ),
        Err(_) => format!("API returned {status}: {body}"),
    }
}

fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503 | 529)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sse::StreamEvent;
    use crate::types::{ApiContent, ApiMessage};
    use futures::StreamExt;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const STOP_ONLY: &str = "event: message_stop\ndata: {}\n\n";

    fn test_client(base_url: &str) -> AnthropicClient {
        AnthropicClient::new("test-api-key", "2023-06-01")
            .unwrap()
            .with_base_url(base_url)
            .with_retry_delay(Duration::from_millis(10))
    }

    fn test_request() -> MessageRequest {
        MessageRequest {
            model: "claude-sonnet-4-20250514".into(),
            messages: vec![ApiMessage {
                role: "user".into(),
                content: ApiContent::Text("Hello".into()),
            }],
            system: None,
            max_tokens: 1024,
            stream: false,
            tools: None,
        }
    }

    fn sse(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/event-stream")
            .set_body_string(body.to_string())
    }

    #[tokio::test]
    async fn sends_headers_and_forces_stream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("x-api-key", "test-api-key"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(body_partial_json(serde_json::json!({"stream": true})))
            .respond_with(sse(STOP_ONLY))
            .expect(1)
            .mount(&server)
            .await;

        let mut stream = test_client(&server.uri())
            .stream_message(&test_request())
            .await
            .unwrap();
        assert!(matches!(stream.next().await.unwrap().unwrap(), StreamEvent::MessageStop));
    }

    #[tokio::test]
    async fn retries_once_on_529() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(sse(STOP_ONLY))
            .mount(&server)
            .await;

        let result = test_client(&server.uri()).stream_message(&test_request()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn exhausts_retries_on_503() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "error": {"type": "overloaded_error", "message": "Service overloaded"}
            })))
            .expect(2)
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .stream_message(&test_request())
            .await
            .err()
            .unwrap()
            .to_string();
        assert!(err.contains("overloaded_error"), "got: {err}");
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .expect(1)
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .stream_message(&test_request())
            .await
            .err()
            .unwrap()
            .to_string();
        assert!(err.contains("400"), "got: {err}");
    }
}
