// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded refinery migrations, run on every [`crate::Database::open`].

use driftwood_core::DriftwoodError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Apply pending migrations. Applied versions are tracked in
/// `refinery_schema_history`, so repeated calls are no-ops.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), DriftwoodError> {
    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(|e| DriftwoodError::Storage {
            source: Box::new(e),
        })?;
    for migration in report.applied_migrations() {
        tracing::debug!(version = migration.version(), name = migration.name(), "migration applied");
    }
    Ok(())
}
