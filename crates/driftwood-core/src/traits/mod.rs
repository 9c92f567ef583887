// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! Adapters extend [`PluginAdapter`] and use `#[async_trait]` so they can be
//! held as trait objects.

pub mod adapter;
pub mod provider;

pub use adapter::PluginAdapter;
pub use provider::{ProviderAdapter, ProviderStream};
