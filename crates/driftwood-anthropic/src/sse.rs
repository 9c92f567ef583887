// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SSE parser for Messages API streaming responses.

use std::pin::Pin;

use driftwood_core::DriftwoodError;
use eventsource_stream::Eventsource;
use futures::stream::{Stream, StreamExt};
use serde::de::DeserializeOwned;

use crate::types::{
    SseContentBlockDelta, SseContentBlockStart, SseContentBlockStop, SseError, SseMessageDelta,
    SseMessageStart,
};

/// Typed SSE events from the Anthropic streaming protocol.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    MessageStart(SseMessageStart),
    ContentBlockStart(SseContentBlockStart),
    ContentBlockDelta(SseContentBlockDelta),
    ContentBlockStop(SseContentBlockStop),
    MessageDelta(SseMessageDelta),
    MessageStop,
    Ping,
    Error(SseError),
}

pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, DriftwoodError>> + Send>>;

/// Parse a streaming response body into [`StreamEvent`]s.
///
/// Unknown event names are skipped.
pub fn parse_sse_stream(response: reqwest::Response) -> EventStream {
    let events = response.bytes_stream().eventsource();

    let mapped = events.filter_map(|result| async move {
        match result {
            Ok(event) => parse_event(&event.event, &event.data),
            Err(e) => Some(Err(DriftwoodError::Provider {
                message: format!("SSE stream error: {e}"),
                source: None,
            })),
        }
    });

    Box::pin(mapped)
}

fn parse_event(name: &str, data: &str) -> Option<Result<StreamEvent, DriftwoodError>> {
    let parsed = match name {
        "message_start" => decode(name, data).map(StreamEvent::MessageStart),
        "content_block_start" => decode(name, data).map(StreamEvent::ContentBlockStart),
        "content_block_delta" => decode(name, data).map(StreamEvent::ContentBlockDelta),
        "content_block_stop" => decode(name, data).map(StreamEvent::ContentBlockStop),
        "message_delta" => decode(name, data).map(StreamEvent::MessageDelta),
        "message_stop" => Ok(StreamEvent::MessageStop),
        "ping" => Ok(StreamEvent::Ping),
        "error" => decode(name, data).map(StreamEvent::Error),
        _ => return None,
    };
    Some(parsed)
}

fn decode<T: DeserializeOwned>(name: &str, data: &str) -> Result<T, DriftwoodError> {
    serde_json::from_str(data).map_err(|e| DriftwoodError::Provider {
        message: format!("failed to parse {name}: {e}"),
        source: Some(Box::new(e)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SseDelta;

    async fn mock_sse_response(sse_text: &str) -> reqwest::Response {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse_text.to_string()),
            )
            .mount(&server)
            .await;

        reqwest::get(&server.uri()).await.unwrap()
    }

    #[tokio::test]
    async fn parse_text_delta() {
        let sse = "event: content_block_delta\ndata: {\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Ahoy\"}}\n\n";
        let mut stream = parse_sse_stream(mock_sse_response(sse).await);

        match stream.next().await.unwrap().unwrap() {
            StreamEvent::ContentBlockDelta(delta) => {
                assert_eq!(delta.index, 0);
                assert!(matches!(delta.delta, SseDelta::TextDelta { ref text } if text == "Ahoy"));
            }
            other => panic!("expected ContentBlockDelta, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn parse_json_delta() {
        let sse = "event: content_block_delta\ndata: {\"index\":1,\"delta\":{\"type\":\"input_json_delta\",\"partial_json\":\"{\\\"loc\"}}\n\n";
        let mut stream = parse_sse_stream(mock_sse_response(sse).await);

        match stream.next().await.unwrap().unwrap() {
            StreamEvent::ContentBlockDelta(delta) => {
                assert!(matches!(
                    delta.delta,
                    SseDelta::InputJsonDelta { ref partial_json } if partial_json == "{\"loc"
                ));
            }
            other => panic!("expected ContentBlockDelta, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_events_are_skipped() {
        let sse = "event: something_new\ndata: {\"foo\":\"bar\"}\n\nevent: ping\ndata: {}\n\nevent: message_stop\ndata: {}\n\n";
        let mut stream = parse_sse_stream(mock_sse_response(sse).await);

        assert!(matches!(stream.next().await.unwrap().unwrap(), StreamEvent::Ping));
        assert!(matches!(stream.next().await.unwrap().unwrap(), StreamEvent::MessageStop));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn malformed_payload_is_provider_error() {
        let sse = "event: content_block_delta\ndata: {not json}\n\n";
        let mut stream = parse_sse_stream(mock_sse_response(sse).await);

        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, DriftwoodError::Provider { .. }));
        assert!(err.to_string().contains("content_block_delta"));
    }

    #[tokio::test]
    async fn parse_error_event() {
        let sse = "event: error\ndata: {\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n\n";
        let mut stream = parse_sse_stream(mock_sse_response(sse).await);

        match stream.next().await.unwrap().unwrap() {
            StreamEvent::Error(err) => {
                assert_eq!(err.error.type_, "overloaded_error");
                assert_eq!(err.error.message, "Overloaded");
            }
            other => panic!("expected Error, got {other:?}"),
        }
    }
}
