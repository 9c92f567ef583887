// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::routing::get;
use driftwood_agent::SessionManager;
use driftwood_core::DriftwoodError;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub sessions: Arc<SessionManager>,
    /// Process start time for uptime calculation.
    pub start_time: Instant,
}

impl GatewayState {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self {
            sessions,
            start_time: Instant::now(),
        }
    }
}

/// Gateway server configuration (mirrors `GatewayConfig` from driftwood-config).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// All routes with middleware applied.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route(
            "/v1/conversations/{id}/messages",
            get(handlers::get_messages).post(handlers::post_messages),
        )
        .route("/v1/health", get(handlers::get_health))
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until `shutdown` is cancelled.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), DriftwoodError> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| DriftwoodError::Gateway {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| DriftwoodError::Gateway {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    info!("gateway stopped");
    Ok(())
}
