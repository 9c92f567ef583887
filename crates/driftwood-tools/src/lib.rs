// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool catalog and built-in tools for the Driftwood agent.
//!
//! Tools fall into two classes. Auto-execute tools run as soon as the model
//! asks for them, through [`ToolRegistry::invoke`]. Confirmation-required tools
//! are listed in the catalog but only run from [`ConfirmationExecutors`] once a
//! human has approved the call.

pub mod builtin;
pub mod kind;
pub mod tool;

pub use builtin::{BuiltinDeps, WeatherClient, register_builtins};
pub use kind::{ToolInput, ToolKind};
pub use tool::{
    ConfirmationExecutors, Tool, ToolClass, ToolContext, ToolDefinition, ToolOutput, ToolRegistry,
};
