// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Driftwood integration tests.
//!
//! # Components
//!
//! - [`MockProvider`] - scripted model that streams text or tool calls
//! - [`TestHarness`] - temp database, built-in tools, scheduler and session
//!   manager wired the way the binary wires them

pub mod harness;
pub mod mock_provider;

pub use harness::{TestHarness, TestHarnessBuilder, done_event, streamed_text};
pub use mock_provider::{MockProvider, MockResponse};
