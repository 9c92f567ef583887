// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Driftwood agent.
//!
//! Holds the error type, the transcript and scheduling data model, and the
//! model backend trait used throughout the workspace.

pub mod error;
pub mod traits;
pub mod types;

pub use error::DriftwoodError;
pub use types::{
    AdapterType, BottleEntry, ContentPart, HealthStatus, Message, Role, ScheduledTask,
    ToolInvocation, ToolStatus, Trigger,
};

pub use traits::{PluginAdapter, ProviderAdapter, ProviderStream};
