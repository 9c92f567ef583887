// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Driftwood agent.

use thiserror::Error;

/// The primary error type used across Driftwood crates.
#[derive(Debug, Error)]
pub enum DriftwoodError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Rejected input: bad tool arguments, unknown trigger type, unknown tool name.
    ///
    /// Surfaced to the user or model as a message; the conversation continues.
    #[error("validation error: {0}")]
    Validation(String),

    /// A third-party HTTP service failed or returned nothing useful.
    #[error("external service error: {message}")]
    ExternalService {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Model provider errors (API failure, malformed stream).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// HTTP transport errors (bind failure, server error).
    #[error("gateway error: {message}")]
    Gateway {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DriftwoodError {
    /// Returns true when the error is a caller mistake rather than a system failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, DriftwoodError::Validation(_))
    }
}
