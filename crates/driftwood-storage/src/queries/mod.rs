// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query functions over the shared [`crate::Database`].

pub mod messages;
pub mod tasks;

/// Wrap a JSON decode failure in a column as a rusqlite conversion error.
pub(crate) fn json_column_err(idx: usize, e: serde_json::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}
