// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway exposing conversations over JSON and Server-Sent Events.
//!
//! Routes:
//! - `POST /v1/conversations/{id}/messages` starts a turn and streams its events
//! - `GET /v1/conversations/{id}/messages` returns the stored transcript
//! - `GET /v1/health` reports liveness and the number of live sessions

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{GatewayState, ServerConfig, router, start_server};
