// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduled task engine.
//!
//! Tasks are persisted in SQLite and fired by a single loop that sleeps until
//! the next due time. Firing hands the task to a [`TaskCallback`].

pub mod scheduler;
pub mod trigger;

pub use scheduler::{CancelOutcome, EXECUTE_TASK, Scheduler, TaskCallback};
pub use trigger::TriggerSpec;
