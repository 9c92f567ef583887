// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base adapter trait.

use async_trait::async_trait;

use crate::error::DriftwoodError;
use crate::types::{AdapterType, HealthStatus};

/// Identity, lifecycle, and health check shared by every adapter.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Human-readable name of this adapter instance.
    fn name(&self) -> &str;

    fn version(&self) -> semver::Version;

    fn adapter_type(&self) -> AdapterType;

    async fn health_check(&self) -> Result<HealthStatus, DriftwoodError>;

    /// Releases any held resources.
    async fn shutdown(&self) -> Result<(), DriftwoodError>;
}
