// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for the Driftwood agent.
//!
//! WAL-mode SQLite with embedded migrations and a single-writer connection
//! via `tokio-rusqlite`. Provides the bounded bottle store plus transcript and
//! scheduled-task queries.

pub mod bottles;
pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use bottles::BottleStore;
pub use database::Database;
pub use models::*;
