// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Model backend trait.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::DriftwoodError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ProviderRequest, ProviderStreamChunk};

/// A boxed stream of provider chunks.
pub type ProviderStream =
    Pin<Box<dyn Stream<Item = Result<ProviderStreamChunk, DriftwoodError>> + Send>>;

/// Adapter for a language model backend.
///
/// Given the transcript, the tool catalog and the system prompt, the backend
/// streams either text deltas or complete tool calls.
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    /// Sends a request and returns a stream of response chunks.
    async fn stream(&self, request: ProviderRequest) -> Result<ProviderStream, DriftwoodError>;
}
