// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server-Sent Events encoding of turn events.
//!
//! Each [`TurnEvent`] becomes one SSE event whose name is the event's `type`
//! and whose data is the event as JSON:
//!
//! ```text
//! event: text_delta
//! data: {"type":"text_delta","text":"Ahoy"}
//!
//! event: done
//! data: {"type":"done","reason":"completed","text":"Ahoy"}
//! ```
//!
//! The stream ends after `done`. Dropping the response drops the receiver,
//! which cancels the turn.

use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive, Sse};
use driftwood_agent::TurnEvent;
use futures::stream::{self, Stream};
use tokio::sync::mpsc;
use tracing::warn;

pub fn turn_stream(
    rx: mpsc::Receiver<TurnEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        Some((Ok(to_sse(&event)), rx))
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

pub fn to_sse(event: &TurnEvent) -> Event {
    match Event::default().event(event.name()).json_data(event) {
        Ok(sse) => sse,
        Err(e) => {
            warn!(error = %e, event = event.name(), "failed to encode event");
            Event::default()
                .event("error")
                .data(r#"{"type":"error","message":"failed to encode event"}"#)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;
    use driftwood_agent::DoneReason;

    #[tokio::test]
    async fn stream_ends_after_sender_drops() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(TurnEvent::TextDelta { text: "hi".into() }).await.unwrap();
        tx.send(TurnEvent::Done {
            reason: DoneReason::Completed,
            text: "hi".into(),
        })
        .await
        .unwrap();
        drop(tx);

        let body = turn_stream(rx).into_response().into_body();
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("event: text_delta\ndata: {\"type\":\"text_delta\",\"text\":\"hi\"}"));
        assert!(text.contains("event: done"));
        assert!(text.contains("\"reason\":\"completed\""));
    }
}
