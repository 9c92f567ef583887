// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turn handling for the Driftwood agent.
//!
//! A turn flows through three pieces:
//! - [`TranscriptResolver`] applies confirmation decisions and removes
//!   dangling tool calls from the stored transcript
//! - [`Orchestrator`] streams model steps and runs auto-executing tools
//!   until the model answers, a call needs confirmation, or the step budget
//!   runs out
//! - [`SessionManager`] serializes turns per conversation and hands the
//!   caller a bounded stream of [`TurnEvent`]s

pub mod context;
pub mod orchestrator;
pub mod resolver;
pub mod session;
pub mod shutdown;

pub use context::RequestSettings;
pub use orchestrator::{
    DoneReason, EventSink, LoopState, Orchestrator, OrchestratorSettings, TurnEvent, TurnOutcome,
};
pub use resolver::{DENIED_OUTPUT, Decision, Resolution, ToolDecision, TranscriptResolver};
pub use session::{SessionActor, SessionManager, SessionState, TurnRequest};
pub use shutdown::install_signal_handler;
