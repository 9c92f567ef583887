// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded, randomized message-in-a-bottle store.
//!
//! Holds at most `capacity` entries per store key. Inserting into a full
//! store evicts a uniformly random existing entry first; popping removes and
//! returns a uniformly random entry. Each operation runs as one immediate
//! transaction on the writer thread, so the capacity bound holds under any
//! interleaving of callers.

use driftwood_core::{BottleEntry, DriftwoodError};
use rusqlite::{OptionalExtension, TransactionBehavior, params};
use tracing::debug;

use crate::database::{Database, map_tr_err};

/// A logical bottle store within the shared `bottles` table.
#[derive(Clone)]
pub struct BottleStore {
    db: Database,
    store_key: String,
    capacity: u32,
}

impl BottleStore {
    /// Capacity used when none is configured.
    pub const DEFAULT_CAPACITY: u32 = 100;

    /// A store over `db`. A capacity of zero is treated as one.
    pub fn new(db: Database, store_key: impl Into<String>, capacity: u32) -> Self {
        Self {
            db,
            store_key: store_key.into(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn store_key(&self) -> &str {
        &self.store_key
    }

    /// Insert `text`, evicting random entries first if the store is full.
    ///
    /// Returns the id of the new entry. The new entry is never evicted by its
    /// own insert.
    pub async fn insert(&self, text: &str) -> Result<i64, DriftwoodError> {
        let store_key = self.store_key.clone();
        let capacity = i64::from(self.capacity);
        let text = text.to_string();

        let (id, evicted) = self
            .db
            .connection()
            .call(move |conn| -> Result<(i64, usize), rusqlite::Error> {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                let count: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM bottles WHERE store_key = ?1",
                    params![store_key],
                    |row| row.get(0),
                )?;

                let evicted = if count >= capacity {
                    tx.execute(
                        "DELETE FROM bottles WHERE id IN (
                             SELECT id FROM bottles WHERE store_key = ?1
                             ORDER BY random() LIMIT ?2
                         )",
                        params![store_key, count - capacity + 1],
                    )?
                } else {
                    0
                };

                tx.execute(
                    "INSERT INTO bottles (store_key, text) VALUES (?1, ?2)",
                    params![store_key, text],
                )?;
                let id = tx.last_insert_rowid();
                tx.commit()?;
                Ok((id, evicted))
            })
            .await
            .map_err(map_tr_err)?;

        debug!(store_key = %self.store_key, id, evicted, "bottle thrown");
        Ok(id)
    }

    /// Remove and return one uniformly random entry.
    ///
    /// An empty store yields `None` and is left untouched.
    pub async fn pop_random(&self) -> Result<Option<BottleEntry>, DriftwoodError> {
        let store_key = self.store_key.clone();

        let entry = self
            .db
            .connection()
            .call(move |conn| -> Result<Option<BottleEntry>, rusqlite::Error> {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                let picked = tx
                    .query_row(
                        "SELECT id, text FROM bottles WHERE store_key = ?1
                         ORDER BY random() LIMIT 1",
                        params![store_key],
                        |row| {
                            Ok(BottleEntry {
                                id: row.get(0)?,
                                text: row.get(1)?,
                            })
                        },
                    )
                    .optional()?;

                let Some(entry) = picked else {
                    return Ok(None);
                };

                let deleted = tx.execute("DELETE FROM bottles WHERE id = ?1", params![entry.id])?;
                if deleted != 1 {
                    return Err(rusqlite::Error::StatementChangedRows(deleted));
                }
                tx.commit()?;
                Ok(Some(entry))
            })
            .await
            .map_err(map_tr_err)?;

        match &entry {
            Some(e) => debug!(store_key = %self.store_key, id = e.id, "bottle retrieved"),
            None => debug!(store_key = %self.store_key, "bottle store empty"),
        }
        Ok(entry)
    }

    /// Number of entries currently held.
    pub async fn count(&self) -> Result<u64, DriftwoodError> {
        let store_key = self.store_key.clone();
        self.db
            .connection()
            .call(move |conn| -> Result<u64, rusqlite::Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM bottles WHERE store_key = ?1",
                    params![store_key],
                    |row| row.get(0),
                )?;
                Ok(count.unsigned_abs())
            })
            .await
            .map_err(map_tr_err)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use tempfile::tempdir;

    async fn setup(capacity: u32) -> (BottleStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bottles.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        (BottleStore::new(db, "test", capacity), dir)
    }

    #[tokio::test]
    async fn count_never_exceeds_capacity() {
        let (store, _dir) = setup(10).await;
        for i in 0..35 {
            store.insert(&format!("bottle-{i}")).await.unwrap();
            assert!(store.count().await.unwrap() <= 10);
        }
        assert_eq!(store.count().await.unwrap(), 10);
    }

    #[tokio::test]
    async fn hundred_and_first_insert_survives_eviction() {
        let (store, _dir) = setup(100).await;
        for i in 1..=101 {
            store.insert(&format!("bottle-{i}")).await.unwrap();
        }
        assert_eq!(store.count().await.unwrap(), 100);

        let mut seen = HashSet::new();
        while let Some(entry) = store.pop_random().await.unwrap() {
            seen.insert(entry.text);
        }
        assert_eq!(seen.len(), 100);
        assert!(seen.contains("bottle-101"));
    }

    #[tokio::test]
    async fn pop_on_empty_store_is_none_and_harmless() {
        let (store, _dir) = setup(5).await;
        assert!(store.pop_random().await.unwrap().is_none());
        assert_eq!(store.count().await.unwrap(), 0);

        store.insert("after").await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn pop_decreases_count_and_never_repeats() {
        let (store, _dir) = setup(20).await;
        for i in 0..20 {
            store.insert(&format!("bottle-{i}")).await.unwrap();
        }

        let mut ids = HashSet::new();
        let mut expected = 20;
        while let Some(entry) = store.pop_random().await.unwrap() {
            expected -= 1;
            assert!(ids.insert(entry.id), "entry {} returned twice", entry.id);
            assert_eq!(store.count().await.unwrap(), expected);
        }
        assert_eq!(ids.len(), 20);
    }

    #[tokio::test]
    async fn ids_are_monotonic() {
        let (store, _dir) = setup(3).await;
        let a = store.insert("a").await.unwrap();
        let b = store.insert("b").await.unwrap();
        let c = store.insert("c").await.unwrap();
        let d = store.insert("d").await.unwrap();
        assert!(a < b && b < c && c < d);
    }

    #[tokio::test]
    async fn store_keys_are_independent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bottles.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        let north = BottleStore::new(db.clone(), "north", 2);
        let south = BottleStore::new(db, "south", 2);

        north.insert("n1").await.unwrap();
        north.insert("n2").await.unwrap();
        north.insert("n3").await.unwrap();
        south.insert("s1").await.unwrap();

        assert_eq!(north.count().await.unwrap(), 2);
        assert_eq!(south.count().await.unwrap(), 1);
        assert_eq!(south.pop_random().await.unwrap().unwrap().text, "s1");
        assert!(south.pop_random().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_inserts_respect_capacity() {
        let (store, _dir) = setup(10).await;
        let mut handles = Vec::new();
        for i in 0..40 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.insert(&format!("bottle-{i}")).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.count().await.unwrap(), 10);
    }

    #[tokio::test]
    async fn text_is_stored_verbatim() {
        let (store, _dir) = setup(5).await;
        let text = "'); DROP TABLE bottles; --";
        store.insert(text).await.unwrap();
        assert_eq!(store.pop_random().await.unwrap().unwrap().text, text);
    }

    #[tokio::test]
    async fn zero_capacity_is_clamped() {
        let (store, _dir) = setup(0).await;
        assert_eq!(store.capacity(), 1);
        store.insert("a").await.unwrap();
        store.insert("b").await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
