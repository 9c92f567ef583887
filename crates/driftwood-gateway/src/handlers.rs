// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use driftwood_agent::{ToolDecision, TurnRequest};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::server::GatewayState;
use crate::sse;

/// Request body for `POST /v1/conversations/{id}/messages`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostMessageBody {
    /// New user text.
    #[serde(default)]
    pub content: Option<String>,
    /// Decisions on calls awaiting confirmation.
    #[serde(default)]
    pub decisions: Vec<ToolDecision>,
}

impl From<PostMessageBody> for TurnRequest {
    fn from(body: PostMessageBody) -> Self {
        TurnRequest {
            content: body.content,
            decisions: body.decisions,
        }
    }
}

/// Response body for `GET /v1/health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_sessions: usize,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

/// POST /v1/conversations/{id}/messages
///
/// Starts a turn and streams its events as SSE.
pub async fn post_messages(
    State(state): State<GatewayState>,
    Path(conversation_id): Path<String>,
    Json(body): Json<PostMessageBody>,
) -> Response {
    debug!(
        conversation_id = %conversation_id,
        has_content = body.content.is_some(),
        decisions = body.decisions.len(),
        "turn requested"
    );

    match state.sessions.start_turn(&conversation_id, body.into()) {
        Ok(rx) => sse::turn_stream(rx).into_response(),
        Err(e) if e.is_validation() => error_response(StatusCode::BAD_REQUEST, e.to_string()),
        Err(e) => {
            error!(conversation_id = %conversation_id, error = %e, "failed to start turn");
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

/// GET /v1/conversations/{id}/messages
pub async fn get_messages(
    State(state): State<GatewayState>,
    Path(conversation_id): Path<String>,
) -> Response {
    match state.sessions.transcript(&conversation_id).await {
        Ok(transcript) => Json(transcript).into_response(),
        Err(e) => {
            error!(conversation_id = %conversation_id, error = %e, "failed to load transcript");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to load transcript")
        }
    }
}

/// GET /v1/health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions: state.sessions.active_sessions(),
    })
}

pub async fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "not found")
}
