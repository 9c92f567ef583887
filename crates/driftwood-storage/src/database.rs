// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection management: PRAGMA setup, migrations, and lifecycle.
//!
//! Every statement runs on the single background thread owned by
//! `tokio-rusqlite`. Do not open additional connections for writes.

use std::path::Path;

use async_trait::async_trait;
use driftwood_core::{AdapterType, DriftwoodError, HealthStatus, PluginAdapter};
use tracing::{debug, info};

/// Handle to the single-writer SQLite connection. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database in WAL mode and run migrations.
    pub async fn open(path: &str) -> Result<Self, DriftwoodError> {
        Self::open_with(path, true).await
    }

    /// Open with an explicit journal mode choice.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, DriftwoodError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| DriftwoodError::Storage {
                source: Box::new(e),
            })?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| DriftwoodError::Storage {
                source: Box::new(e),
            })?;

        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            if wal_mode {
                conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            }
            conn.execute_batch("PRAGMA synchronous = NORMAL; PRAGMA foreign_keys = ON;")?;
            conn.busy_timeout(std::time::Duration::from_secs(5))?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        conn.call(|conn| crate::migrations::run_migrations(conn))
            .await
            .map_err(|e| DriftwoodError::Storage {
                source: Box::new(e),
            })?;

        info!(path, wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// The underlying connection, for query modules.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL so the database file is self-contained.
    pub async fn close(&self) -> Result<(), DriftwoodError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for Database {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, DriftwoodError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), DriftwoodError> {
        self.close().await
    }
}

/// Wrap a `tokio-rusqlite` error as a storage error.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> DriftwoodError {
    DriftwoodError::Storage {
        source: Box::new(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("test.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();

        let tables: Vec<String> = db
            .connection()
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect()
            })
            .await
            .unwrap();

        assert!(tables.contains(&"bottles".to_string()));
        assert!(tables.contains(&"messages".to_string()));
        assert!(tables.contains(&"scheduled_tasks".to_string()));
        assert!(tables.contains(&"refinery_schema_history".to_string()));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let path = path.to_str().unwrap();

        let db = Database::open(path).await.unwrap();
        db.close().await.unwrap();
        drop(db);

        let db = Database::open(path).await.unwrap();
        assert_eq!(db.health_check().await.unwrap(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn wal_mode_is_applied() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();

        let mode: String = db
            .connection()
            .call(|conn| -> Result<String, rusqlite::Error> {
                conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))
            })
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }
}
